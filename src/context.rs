use std::collections::HashMap;

use serde_derive::Serialize;

use crate::CONFIG;
use crate::attendance;
use crate::auth::Session;
use crate::directory::join::{EmployeeWithDetails, JobHistoryWithDetails};
use crate::gate;
use crate::leave;
use crate::model::{AttendanceRecord, Department, Job, LeaveRequest, LeaveStatus, Role};

/// Shared by every page: who is signed in and where they are.
#[derive(Serialize, Debug, Clone, Default)]
pub struct Page {
    pub path: String,
    pub user: Option<Session>,
}

impl Page {
    pub fn new(path: &str, user: Option<&Session>) -> Self {
        Self {
            path: path.to_string(),
            user: user.cloned(),
        }
    }

    pub fn user_name(&self) -> &str {
        self.user.as_ref().map(|u| u.name.as_str()).unwrap_or_default()
    }

    pub fn role_label(&self) -> &'static str {
        self.user.as_ref().map(|u| u.role.label()).unwrap_or_default()
    }

    pub fn is_reviewer(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.is_reviewer())
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == Role::Admin)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: &str, label: &str, current: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            selected: value == current,
        }
    }
}

fn or_missing(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(CONFIG.labels.missing)
        .to_string()
}

fn date(value: Option<chrono::NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| CONFIG.labels.missing.to_string())
}

fn salary(value: f64) -> String {
    format!("{:.2}", value)
}

#[derive(Serialize, Debug, Clone)]
pub struct EmployeeRow {
    pub empno: String,
    /// `/employees/<empno>` with the number percent-encoded.
    pub href: String,
    pub name: String,
    pub gender: String,
    pub hiredate: String,
    pub job: String,
    pub department: String,
    pub salary: String,
}

impl From<&EmployeeWithDetails> for EmployeeRow {
    fn from(e: &EmployeeWithDetails) -> Self {
        let name = e.employee.full_name();
        Self {
            empno: e.employee.empno.clone(),
            href: format!("/employees/{}", gate::encode_segment(&e.employee.empno)),
            name: if name.is_empty() {
                CONFIG.labels.unnamed.to_string()
            } else {
                name
            },
            gender: or_missing(e.employee.gender.as_deref()),
            hiredate: date(e.employee.hiredate),
            job: e.job.clone(),
            department: e.department.clone(),
            salary: salary(e.salary),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DepartmentRow {
    pub code: String,
    pub name: String,
    pub headcount: usize,
}

impl DepartmentRow {
    pub fn new(department: &Department, headcount: usize) -> Self {
        Self {
            code: department.deptcode.clone(),
            name: or_missing(department.deptname.as_deref()),
            headcount,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct JobRow {
    pub code: String,
    pub description: String,
    pub headcount: usize,
}

impl JobRow {
    pub fn new(job: &Job, headcount: usize) -> Self {
        Self {
            code: job.jobcode.clone(),
            description: or_missing(job.jobdesc.as_deref()),
            headcount,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct HistoryRow {
    pub empno: String,
    pub employee: String,
    pub job: String,
    pub department: String,
    pub effdate: String,
    pub salary: String,
}

impl From<&JobHistoryWithDetails> for HistoryRow {
    fn from(h: &JobHistoryWithDetails) -> Self {
        Self {
            empno: h.history.empno.clone(),
            employee: h.employee_name.clone(),
            job: h.job_desc.clone(),
            department: h.dept_name.clone(),
            effdate: h.history.effdate.format("%Y-%m-%d").to_string(),
            salary: h
                .history
                .salary
                .map(salary)
                .unwrap_or_else(|| CONFIG.labels.missing.to_string()),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct AttendanceRow {
    pub user: String,
    pub date: String,
    pub clock_in: String,
    pub clock_out: String,
    pub worked: String,
    pub status: String,
}

impl From<&AttendanceRecord> for AttendanceRow {
    fn from(r: &AttendanceRecord) -> Self {
        let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        Self {
            user: r.user_id.clone(),
            date: r.date.format("%Y-%m-%d").to_string(),
            clock_in: time(r.clock_in),
            clock_out: time(r.clock_out),
            worked: attendance::worked(r)
                .map(attendance::format_duration)
                .unwrap_or_else(|| "-".to_string()),
            status: or_missing(r.status.as_deref()),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct LeaveRow {
    pub id: String,
    pub user: String,
    pub leave_type: &'static str,
    pub start_date: String,
    pub end_date: String,
    pub days: i64,
    pub reason: String,
    pub status: &'static str,
    pub pending: bool,
}

impl From<&LeaveRequest> for LeaveRow {
    fn from(r: &LeaveRequest) -> Self {
        Self {
            id: r.id.clone(),
            user: r.user_id.clone(),
            leave_type: r.leave_type.label(),
            start_date: r.start_date.format("%Y-%m-%d").to_string(),
            end_date: r.end_date.format("%Y-%m-%d").to_string(),
            days: leave::days(r),
            reason: r.reason.clone().unwrap_or_default(),
            status: r.status.as_str(),
            pending: r.status == LeaveStatus::Pending,
        }
    }
}

/// Swaps the user id a row was built with for a display name.
pub fn name_user(user: &mut String, names: &HashMap<String, String>) {
    if let Some(name) = names.get(user.as_str()) {
        *user = name.clone();
    }
}
