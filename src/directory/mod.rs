use serde_derive::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::backend::{Backend, BackendError};
use crate::model::{Department, Job};

pub mod filter;
pub mod join;

use filter::{FilterState, Filtered};
use join::{EmployeeWithDetails, Headcounts, JobHistoryWithDetails};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not load departments: {0}")]
    Departments(#[source] BackendError),

    #[error("could not load jobs: {0}")]
    Jobs(#[source] BackendError),

    #[error("could not load employees: {0}")]
    Employees(#[source] BackendError),

    #[error("could not load job history: {0}")]
    JobHistory(#[source] BackendError),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub employees: usize,
    pub departments: usize,
    pub jobs: usize,
    pub job_history: usize,
}

/// Everything the dashboards show, fetched in one go and joined. Nothing is
/// cached; a mutation is followed by a fresh [`Directory::load`].
#[derive(Debug, Clone)]
pub struct Directory {
    pub departments: Vec<Department>,
    pub jobs: Vec<Job>,
    pub employees: Vec<EmployeeWithDetails>,
    pub job_history: Vec<JobHistoryWithDetails>,
    headcounts: Headcounts,
}

impl Directory {
    /// Fetches departments, jobs, employees and job history, in that order.
    /// The first failing fetch aborts the rest.
    pub fn load<B: Backend>(backend: &B) -> Result<Self, LoadError> {
        let departments = backend.departments().map_err(LoadError::Departments);
        let departments = log_fetch("department", departments)?;

        let jobs = log_fetch("job", backend.jobs().map_err(LoadError::Jobs))?;

        let employees = log_fetch(
            "employee",
            backend.employees().map_err(LoadError::Employees),
        )?;

        let history = log_fetch(
            "jobhistory",
            backend.job_history().map_err(LoadError::JobHistory),
        )?;

        let joined_employees =
            join::employees_with_details(&employees, &departments, &jobs, &history);
        let joined_history =
            join::job_history_with_details(&history, &employees, &departments, &jobs);

        Ok(Self {
            headcounts: Headcounts::new(&joined_employees),
            departments,
            jobs,
            employees: joined_employees,
            job_history: joined_history,
        })
    }

    pub fn filter(&self, filter: &FilterState) -> Filtered<'_> {
        filter.apply(
            &self.employees,
            &self.departments,
            &self.jobs,
            &self.job_history,
        )
    }

    pub fn summary(&self) -> Summary {
        Summary {
            employees: self.employees.len(),
            departments: self.departments.len(),
            jobs: self.jobs.len(),
            job_history: self.job_history.len(),
        }
    }

    pub fn headcounts(&self) -> &Headcounts {
        &self.headcounts
    }

    /// Department display names offered by the search bar's filter.
    pub fn department_names(&self) -> Vec<&str> {
        self.departments
            .iter()
            .filter_map(|d| d.deptname.as_deref())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter_map(|j| j.jobdesc.as_deref())
            .filter(|desc| !desc.is_empty())
            .collect()
    }
}

fn log_fetch<T>(table: &str, result: Result<Vec<T>, LoadError>) -> Result<Vec<T>, LoadError> {
    match &result {
        Ok(rows) => debug!(table, rows = rows.len(), "fetched"),
        Err(e) => error!(table, error = %e, "fetch failed"),
    }
    result
}
