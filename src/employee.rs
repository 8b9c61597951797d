use chrono::NaiveDate;
use garde::Validate;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::CONFIG;
use crate::backend::{Backend, BackendError};
use crate::model::{Employee, JobHistory};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum EmployeeError {
    #[error("Please fill in all required fields: {0}")]
    Validation(#[from] garde::Report),

    #[error("{field} is not a date: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("employee {0} already exists")]
    Exists(String),

    #[error("employee {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for EmployeeError {
    fn from(e: BackendError) -> Self {
        EmployeeError::Backend(e)
    }
}

/// The add/edit form as submitted. Dates are `YYYY-MM-DD` or empty.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct EmployeeForm {
    #[garde(length(min = 1, max = 32))]
    pub empno: String,
    #[garde(length(min = 1, max = 64))]
    pub firstname: String,
    #[garde(length(min = 1, max = 64))]
    pub lastname: String,
    #[garde(length(chars, max = 1))]
    #[serde(default)]
    pub gender: String,
    #[garde(skip)]
    #[serde(default)]
    pub birthdate: String,
    #[garde(skip)]
    #[serde(default)]
    pub hiredate: String,
    #[garde(skip)]
    #[serde(default)]
    pub sepdate: String,
}

impl EmployeeForm {
    fn trimmed(&self) -> Self {
        Self {
            empno: self.empno.trim().to_string(),
            firstname: self.firstname.trim().to_string(),
            lastname: self.lastname.trim().to_string(),
            gender: self.gender.trim().to_string(),
            birthdate: self.birthdate.trim().to_string(),
            hiredate: self.hiredate.trim().to_string(),
            sepdate: self.sepdate.trim().to_string(),
        }
    }

    fn to_employee(&self) -> Result<Employee, EmployeeError> {
        let form = self.trimmed();
        form.validate()?;

        Ok(Employee {
            birthdate: parse_date("birthdate", &form.birthdate)?,
            hiredate: parse_date("hiredate", &form.hiredate)?,
            sepdate: parse_date("sepdate", &form.sepdate)?,
            gender: non_empty(form.gender),
            firstname: Some(form.firstname),
            lastname: Some(form.lastname),
            empno: form.empno,
        })
    }
}

impl From<&Employee> for EmployeeForm {
    fn from(e: &Employee) -> Self {
        let date = |d: Option<NaiveDate>| {
            d.map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default()
        };
        Self {
            empno: e.empno.clone(),
            firstname: e.firstname.clone().unwrap_or_default(),
            lastname: e.lastname.clone().unwrap_or_default(),
            gender: e.gender.clone().unwrap_or_default(),
            birthdate: date(e.birthdate),
            hiredate: date(e.hiredate),
            sepdate: date(e.sepdate),
        }
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, EmployeeError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| EmployeeError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

pub fn get<B: Backend>(backend: &B, empno: &str) -> Result<Employee, EmployeeError> {
    backend
        .employee(empno)?
        .ok_or_else(|| EmployeeError::NotFound(empno.to_string()))
}

/// Adds an employee and opens their job history with the new-hire position.
/// The hire date defaults to `today`.
pub fn add<B: Backend>(
    backend: &B,
    form: &EmployeeForm,
    today: NaiveDate,
) -> Result<Employee, EmployeeError> {
    let mut employee = form.to_employee()?;
    let hiredate = *employee.hiredate.get_or_insert(today);

    match backend.insert_employee(&employee) {
        Ok(()) => {}
        Err(BackendError::Conflict(_)) => return Err(EmployeeError::Exists(employee.empno)),
        Err(e) => return Err(e.into()),
    }
    info!(empno = employee.empno, "employee added");

    let initial = JobHistory {
        empno: employee.empno.clone(),
        jobcode: CONFIG.new_hire.jobcode.to_string(),
        deptcode: Some(CONFIG.new_hire.deptcode.to_string()),
        effdate: hiredate,
        salary: Some(0.0),
    };
    if let Err(e) = backend.insert_job_history(&initial) {
        warn!(empno = employee.empno, error = %e, "could not write initial job history");
    }

    Ok(employee)
}

pub fn edit<B: Backend>(backend: &B, form: &EmployeeForm) -> Result<Employee, EmployeeError> {
    let employee = form.to_employee()?;
    if !backend.update_employee(&employee)? {
        return Err(EmployeeError::NotFound(employee.empno));
    }
    info!(empno = employee.empno, "employee updated");
    Ok(employee)
}

/// Removes an employee and their job history.
pub fn delete<B: Backend>(backend: &B, empno: &str) -> Result<(), EmployeeError> {
    get(backend, empno)?;
    let rows = backend.delete_job_history_for(empno)?;
    backend.delete_employee(empno)?;
    info!(empno, history_rows = rows, "employee deleted");
    Ok(())
}
