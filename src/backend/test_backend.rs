use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};

use crate::backend::{AuthBackend, Backend, BackendError};
use crate::model::{
    AttendanceRecord, Department, Employee, Job, JobHistory, LeaveRequest, User,
};

#[derive(Default)]
struct Tables {
    departments: Vec<Department>,
    jobs: Vec<Job>,
    employees: Vec<Employee>,
    job_history: Vec<JobHistory>,
    attendance: Vec<AttendanceRecord>,
    leave_requests: Vec<LeaveRequest>,
    users: Vec<User>,
    sessions: Vec<(String, String)>,
    failing: Option<&'static str>,
}

/// In-memory backend. Rows keep insertion order, the same way a table scan
/// without ORDER BY would return them.
#[derive(Clone, Default)]
pub struct TestBackend {
    data: Arc<Mutex<Tables>>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read of `table` fail until cleared with `None`.
    pub fn fail_on(&self, table: Option<&'static str>) {
        self.data.lock().unwrap().failing = table;
    }

    fn check(&self, tables: &Tables, table: &str) -> Result<(), BackendError> {
        match tables.failing {
            Some(t) if t == table => Err(BackendError::Backend(format!("{} unavailable", table))),
            _ => Ok(()),
        }
    }
}

impl Backend for TestBackend {
    fn departments(&self) -> Result<Vec<Department>, BackendError> {
        let data = self.data.lock().unwrap();
        self.check(&data, "department")?;
        Ok(data.departments.clone())
    }

    fn jobs(&self) -> Result<Vec<Job>, BackendError> {
        let data = self.data.lock().unwrap();
        self.check(&data, "job")?;
        Ok(data.jobs.clone())
    }

    fn employees(&self) -> Result<Vec<Employee>, BackendError> {
        let data = self.data.lock().unwrap();
        self.check(&data, "employee")?;
        Ok(data.employees.clone())
    }

    fn job_history(&self) -> Result<Vec<JobHistory>, BackendError> {
        let data = self.data.lock().unwrap();
        self.check(&data, "jobhistory")?;
        let mut rows = data.job_history.clone();
        rows.sort_by(|a, b| b.effdate.cmp(&a.effdate));
        Ok(rows)
    }

    fn employee(&self, empno: &str) -> Result<Option<Employee>, BackendError> {
        let data = self.data.lock().unwrap();
        Ok(data.employees.iter().find(|e| e.empno == empno).cloned())
    }

    fn insert_employee(&self, employee: &Employee) -> Result<(), BackendError> {
        let mut data = self.data.lock().unwrap();
        if data.employees.iter().any(|e| e.empno == employee.empno) {
            return Err(BackendError::Conflict(format!(
                "employee {} already exists",
                employee.empno
            )));
        }
        data.employees.push(employee.clone());
        Ok(())
    }

    fn update_employee(&self, employee: &Employee) -> Result<bool, BackendError> {
        let mut data = self.data.lock().unwrap();
        match data.employees.iter_mut().find(|e| e.empno == employee.empno) {
            Some(existing) => {
                *existing = employee.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_employee(&self, empno: &str) -> Result<bool, BackendError> {
        let mut data = self.data.lock().unwrap();
        let before = data.employees.len();
        data.employees.retain(|e| e.empno != empno);
        Ok(data.employees.len() != before)
    }

    fn insert_department(&self, department: &Department) -> Result<(), BackendError> {
        self.data.lock().unwrap().departments.push(department.clone());
        Ok(())
    }

    fn insert_job(&self, job: &Job) -> Result<(), BackendError> {
        self.data.lock().unwrap().jobs.push(job.clone());
        Ok(())
    }

    fn insert_job_history(&self, history: &JobHistory) -> Result<(), BackendError> {
        let mut data = self.data.lock().unwrap();
        self.check(&data, "jobhistory")?;
        data.job_history.push(history.clone());
        Ok(())
    }

    fn delete_job_history_for(&self, empno: &str) -> Result<usize, BackendError> {
        let mut data = self.data.lock().unwrap();
        let before = data.job_history.len();
        data.job_history.retain(|h| h.empno != empno);
        Ok(before - data.job_history.len())
    }

    fn attendance(&self, user_id: Option<&str>) -> Result<Vec<AttendanceRecord>, BackendError> {
        let data = self.data.lock().unwrap();
        let mut rows: Vec<_> = data
            .attendance
            .iter()
            .filter(|r| user_id.is_none_or(|u| r.user_id == u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    fn attendance_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .attendance
            .iter()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    fn insert_attendance(&self, record: &AttendanceRecord) -> Result<(), BackendError> {
        self.data.lock().unwrap().attendance.push(record.clone());
        Ok(())
    }

    fn update_attendance(&self, record: &AttendanceRecord) -> Result<bool, BackendError> {
        let mut data = self.data.lock().unwrap();
        match data.attendance.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn leave_requests(&self, user_id: Option<&str>) -> Result<Vec<LeaveRequest>, BackendError> {
        let data = self.data.lock().unwrap();
        let mut rows: Vec<_> = data
            .leave_requests
            .iter()
            .filter(|r| user_id.is_none_or(|u| r.user_id == u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn leave_request(&self, id: &str) -> Result<Option<LeaveRequest>, BackendError> {
        let data = self.data.lock().unwrap();
        Ok(data.leave_requests.iter().find(|r| r.id == id).cloned())
    }

    fn insert_leave_request(&self, request: &LeaveRequest) -> Result<(), BackendError> {
        self.data.lock().unwrap().leave_requests.push(request.clone());
        Ok(())
    }

    fn update_leave_request(&self, request: &LeaveRequest) -> Result<bool, BackendError> {
        let mut data = self.data.lock().unwrap();
        match data.leave_requests.iter_mut().find(|r| r.id == request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl AuthBackend for TestBackend {
    fn user(&self, id: &str) -> Result<Option<User>, BackendError> {
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, BackendError> {
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    fn insert_user(&self, user: &User) -> Result<(), BackendError> {
        let mut data = self.data.lock().unwrap();
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(BackendError::Conflict(format!(
                "an account for {} already exists",
                user.email
            )));
        }
        data.users.push(user.clone());
        Ok(())
    }

    fn insert_session(
        &self,
        token_hash: &str,
        user_id: &str,
        _created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.data
            .lock()
            .unwrap()
            .sessions
            .push((token_hash.to_string(), user_id.to_string()));
        Ok(())
    }

    fn session_user(&self, token_hash: &str) -> Result<Option<User>, BackendError> {
        let data = self.data.lock().unwrap();
        let user_id = data
            .sessions
            .iter()
            .find(|(hash, _)| hash == token_hash)
            .map(|(_, user_id)| user_id.clone());
        Ok(user_id.and_then(|id| data.users.iter().find(|u| u.id == id).cloned()))
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool, BackendError> {
        let mut data = self.data.lock().unwrap();
        let before = data.sessions.len();
        data.sessions.retain(|(hash, _)| hash != token_hash);
        Ok(data.sessions.len() != before)
    }
}
