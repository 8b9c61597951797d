use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::{
    AttendanceRecord, Department, Employee, Job, JobHistory, LeaveRequest, User,
};

pub mod sqlitebe;

#[cfg(test)]
pub mod test_backend;

pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[cfg(test)]
    #[error("backend error: {0}")]
    Backend(String),
}

/// The data tables: `employee`, `department`, `job`, `jobhistory`,
/// `attendance` and `leave_requests`.
pub trait Backend {
    fn departments(&self) -> Result<Vec<Department>, BackendError>;
    fn jobs(&self) -> Result<Vec<Job>, BackendError>;
    fn employees(&self) -> Result<Vec<Employee>, BackendError>;
    /// Ordered by `effdate`, most recent first.
    fn job_history(&self) -> Result<Vec<JobHistory>, BackendError>;

    fn employee(&self, empno: &str) -> Result<Option<Employee>, BackendError>;
    fn insert_employee(&self, employee: &Employee) -> Result<(), BackendError>;
    /// Returns false when no employee has `employee.empno`.
    fn update_employee(&self, employee: &Employee) -> Result<bool, BackendError>;
    fn delete_employee(&self, empno: &str) -> Result<bool, BackendError>;

    fn insert_department(&self, department: &Department) -> Result<(), BackendError>;
    fn insert_job(&self, job: &Job) -> Result<(), BackendError>;
    fn insert_job_history(&self, history: &JobHistory) -> Result<(), BackendError>;
    fn delete_job_history_for(&self, empno: &str) -> Result<usize, BackendError>;

    /// Ordered by `date`, most recent first. `None` lists every user.
    fn attendance(&self, user_id: Option<&str>) -> Result<Vec<AttendanceRecord>, BackendError>;
    fn attendance_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, BackendError>;
    fn insert_attendance(&self, record: &AttendanceRecord) -> Result<(), BackendError>;
    fn update_attendance(&self, record: &AttendanceRecord) -> Result<bool, BackendError>;

    /// Ordered by `created_at`, most recent first. `None` lists every user.
    fn leave_requests(&self, user_id: Option<&str>) -> Result<Vec<LeaveRequest>, BackendError>;
    fn leave_request(&self, id: &str) -> Result<Option<LeaveRequest>, BackendError>;
    fn insert_leave_request(&self, request: &LeaveRequest) -> Result<(), BackendError>;
    fn update_leave_request(&self, request: &LeaveRequest) -> Result<bool, BackendError>;
}

/// Accounts and sessions. Session tokens are only ever stored hashed.
pub trait AuthBackend {
    fn user(&self, id: &str) -> Result<Option<User>, BackendError>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>, BackendError>;
    /// Fails with [`BackendError::Conflict`] when the email is taken.
    fn insert_user(&self, user: &User) -> Result<(), BackendError>;

    fn insert_session(
        &self,
        token_hash: &str,
        user_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;
    fn session_user(&self, token_hash: &str) -> Result<Option<User>, BackendError>;
    fn delete_session(&self, token_hash: &str) -> Result<bool, BackendError>;
}
