use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::backend::{AuthBackend, Backend, BackendError};
use crate::model::{
    AttendanceRecord, Department, Employee, Job, JobHistory, LeaveRequest, User,
};

pub struct SqliteBackend<'a> {
    pub conn: &'a Connection,
}

impl<'a> SqliteBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn create_tables(&self) -> Result<(), BackendError> {
        self.conn.execute_batch(super::SCHEMA)?;
        Ok(())
    }

    fn collect<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, BackendError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn conflict(err: rusqlite::Error, what: impl FnOnce() -> String) -> BackendError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            BackendError::Conflict(what())
        }
        e => BackendError::Sqlite(e),
    }
}

const EMPLOYEE_COLUMNS: &str = "empno, firstname, lastname, birthdate, hiredate, gender, sepdate";

fn employee_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        empno: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        birthdate: row.get(3)?,
        hiredate: row.get(4)?,
        gender: row.get(5)?,
        sepdate: row.get(6)?,
    })
}

const ATTENDANCE_COLUMNS: &str =
    "id, user_id, date, clock_in, clock_out, status, notes, created_at, updated_at";

fn attendance_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        clock_in: row.get(3)?,
        clock_out: row.get(4)?,
        status: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const LEAVE_COLUMNS: &str = "id, user_id, type, start_date, end_date, reason, status, created_at, updated_at, reviewer_id, reviewed_at";

fn leave_row(row: &Row<'_>) -> rusqlite::Result<LeaveRequest> {
    Ok(LeaveRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        leave_type: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        reason: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        reviewer_id: row.get(9)?,
        reviewed_at: row.get(10)?,
    })
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, created_at";

fn user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl<'a> Backend for SqliteBackend<'a> {
    fn departments(&self) -> Result<Vec<Department>, BackendError> {
        self.collect("SELECT deptcode, deptname FROM department", [], |row| {
            Ok(Department {
                deptcode: row.get(0)?,
                deptname: row.get(1)?,
            })
        })
    }

    fn jobs(&self) -> Result<Vec<Job>, BackendError> {
        self.collect("SELECT jobcode, jobdesc FROM job", [], |row| {
            Ok(Job {
                jobcode: row.get(0)?,
                jobdesc: row.get(1)?,
            })
        })
    }

    fn employees(&self) -> Result<Vec<Employee>, BackendError> {
        self.collect(
            &format!("SELECT {EMPLOYEE_COLUMNS} FROM employee"),
            [],
            employee_row,
        )
    }

    fn job_history(&self) -> Result<Vec<JobHistory>, BackendError> {
        self.collect(
            "SELECT empno, jobcode, deptcode, effdate, salary FROM jobhistory ORDER BY effdate DESC",
            [],
            |row| {
                Ok(JobHistory {
                    empno: row.get(0)?,
                    jobcode: row.get(1)?,
                    deptcode: row.get(2)?,
                    effdate: row.get(3)?,
                    salary: row.get(4)?,
                })
            },
        )
    }

    fn employee(&self, empno: &str) -> Result<Option<Employee>, BackendError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {EMPLOYEE_COLUMNS} FROM employee WHERE empno = ?1"),
                [empno],
                employee_row,
            )
            .optional()?)
    }

    fn insert_employee(&self, employee: &Employee) -> Result<(), BackendError> {
        self.conn
            .execute(
                &format!("INSERT INTO employee ({EMPLOYEE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    employee.empno,
                    employee.firstname,
                    employee.lastname,
                    employee.birthdate,
                    employee.hiredate,
                    employee.gender,
                    employee.sepdate,
                ],
            )
            .map_err(|e| conflict(e, || format!("employee {} already exists", employee.empno)))?;
        Ok(())
    }

    fn update_employee(&self, employee: &Employee) -> Result<bool, BackendError> {
        let changed = self.conn.execute(
            "UPDATE employee SET firstname = ?2, lastname = ?3, birthdate = ?4, hiredate = ?5, gender = ?6, sepdate = ?7 WHERE empno = ?1",
            params![
                employee.empno,
                employee.firstname,
                employee.lastname,
                employee.birthdate,
                employee.hiredate,
                employee.gender,
                employee.sepdate,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_employee(&self, empno: &str) -> Result<bool, BackendError> {
        let changed = self
            .conn
            .execute("DELETE FROM employee WHERE empno = ?1", [empno])?;
        Ok(changed > 0)
    }

    fn insert_department(&self, department: &Department) -> Result<(), BackendError> {
        self.conn
            .execute(
                "INSERT INTO department (deptcode, deptname) VALUES (?1, ?2)",
                params![department.deptcode, department.deptname],
            )
            .map_err(|e| conflict(e, || format!("department {} already exists", department.deptcode)))?;
        Ok(())
    }

    fn insert_job(&self, job: &Job) -> Result<(), BackendError> {
        self.conn
            .execute(
                "INSERT INTO job (jobcode, jobdesc) VALUES (?1, ?2)",
                params![job.jobcode, job.jobdesc],
            )
            .map_err(|e| conflict(e, || format!("job {} already exists", job.jobcode)))?;
        Ok(())
    }

    fn insert_job_history(&self, history: &JobHistory) -> Result<(), BackendError> {
        self.conn
            .execute(
                "INSERT INTO jobhistory (empno, jobcode, deptcode, effdate, salary) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    history.empno,
                    history.jobcode,
                    history.deptcode,
                    history.effdate,
                    history.salary,
                ],
            )
            .map_err(|e| {
                conflict(e, || {
                    format!(
                        "job history {}/{}/{} already exists",
                        history.empno, history.jobcode, history.effdate
                    )
                })
            })?;
        Ok(())
    }

    fn delete_job_history_for(&self, empno: &str) -> Result<usize, BackendError> {
        Ok(self
            .conn
            .execute("DELETE FROM jobhistory WHERE empno = ?1", [empno])?)
    }

    fn attendance(&self, user_id: Option<&str>) -> Result<Vec<AttendanceRecord>, BackendError> {
        match user_id {
            Some(user_id) => self.collect(
                &format!(
                    "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ?1 ORDER BY date DESC"
                ),
                [user_id],
                attendance_row,
            ),
            None => self.collect(
                &format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance ORDER BY date DESC"),
                [],
                attendance_row,
            ),
        }
    }

    fn attendance_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ?1 AND date = ?2"
                ),
                params![user_id, date],
                attendance_row,
            )
            .optional()?)
    }

    fn insert_attendance(&self, record: &AttendanceRecord) -> Result<(), BackendError> {
        self.conn.execute(
            &format!(
                "INSERT INTO attendance ({ATTENDANCE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                record.id,
                record.user_id,
                record.date,
                record.clock_in,
                record.clock_out,
                record.status,
                record.notes,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_attendance(&self, record: &AttendanceRecord) -> Result<bool, BackendError> {
        let changed = self.conn.execute(
            "UPDATE attendance SET clock_in = ?2, clock_out = ?3, status = ?4, notes = ?5, updated_at = ?6 WHERE id = ?1",
            params![
                record.id,
                record.clock_in,
                record.clock_out,
                record.status,
                record.notes,
                record.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }

    fn leave_requests(&self, user_id: Option<&str>) -> Result<Vec<LeaveRequest>, BackendError> {
        match user_id {
            Some(user_id) => self.collect(
                &format!(
                    "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE user_id = ?1 ORDER BY created_at DESC"
                ),
                [user_id],
                leave_row,
            ),
            None => self.collect(
                &format!("SELECT {LEAVE_COLUMNS} FROM leave_requests ORDER BY created_at DESC"),
                [],
                leave_row,
            ),
        }
    }

    fn leave_request(&self, id: &str) -> Result<Option<LeaveRequest>, BackendError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?1"),
                [id],
                leave_row,
            )
            .optional()?)
    }

    fn insert_leave_request(&self, request: &LeaveRequest) -> Result<(), BackendError> {
        self.conn.execute(
            &format!(
                "INSERT INTO leave_requests ({LEAVE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                request.id,
                request.user_id,
                request.leave_type,
                request.start_date,
                request.end_date,
                request.reason,
                request.status,
                request.created_at,
                request.updated_at,
                request.reviewer_id,
                request.reviewed_at,
            ],
        )?;
        Ok(())
    }

    fn update_leave_request(&self, request: &LeaveRequest) -> Result<bool, BackendError> {
        let changed = self.conn.execute(
            "UPDATE leave_requests SET type = ?2, start_date = ?3, end_date = ?4, reason = ?5, status = ?6, updated_at = ?7, reviewer_id = ?8, reviewed_at = ?9 WHERE id = ?1",
            params![
                request.id,
                request.leave_type,
                request.start_date,
                request.end_date,
                request.reason,
                request.status,
                request.updated_at,
                request.reviewer_id,
                request.reviewed_at,
            ],
        )?;
        Ok(changed > 0)
    }
}

impl<'a> AuthBackend for SqliteBackend<'a> {
    fn user(&self, id: &str) -> Result<Option<User>, BackendError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_row,
            )
            .optional()?)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, BackendError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                [email],
                user_row,
            )
            .optional()?)
    }

    fn insert_user(&self, user: &User) -> Result<(), BackendError> {
        self.conn
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    user.id,
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.role,
                    user.created_at,
                ],
            )
            .map_err(|e| conflict(e, || format!("an account for {} already exists", user.email)))?;
        Ok(())
    }

    fn insert_session(
        &self,
        token_hash: &str,
        user_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token_hash, user_id, created_at],
        )?;
        Ok(())
    }

    fn session_user(&self, token_hash: &str) -> Result<Option<User>, BackendError> {
        Ok(self
            .conn
            .query_row(
                "SELECT u.id, u.email, u.password_hash, u.first_name, u.last_name, u.role, u.created_at \
                 FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token_hash = ?1",
                [token_hash],
                user_row,
            )
            .optional()?)
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool, BackendError> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeaveStatus, LeaveType};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        SqliteBackend::new(&conn).create_tables().unwrap();
        conn
    }

    fn history(empno: &str, jobcode: &str, effdate: &str) -> JobHistory {
        JobHistory {
            empno: empno.to_string(),
            jobcode: jobcode.to_string(),
            deptcode: Some("D1".to_string()),
            effdate: effdate.parse().unwrap(),
            salary: Some(1000.0),
        }
    }

    #[test]
    fn test_job_history_is_ordered_most_recent_first() {
        let conn = setup_db();
        let backend = SqliteBackend::new(&conn);

        backend.insert_job_history(&history("E1", "J1", "2020-01-01")).unwrap();
        backend.insert_job_history(&history("E1", "J2", "2024-06-01")).unwrap();
        backend.insert_job_history(&history("E2", "J1", "2022-03-15")).unwrap();

        let dates: Vec<String> = backend
            .job_history()
            .unwrap()
            .into_iter()
            .map(|h| h.effdate.to_string())
            .collect();
        assert_eq!(dates, vec!["2024-06-01", "2022-03-15", "2020-01-01"]);
    }

    #[test]
    fn test_employee_crud() {
        let conn = setup_db();
        let backend = SqliteBackend::new(&conn);
        let mut employee = Employee {
            empno: "EMP001".to_string(),
            firstname: Some("Ann".to_string()),
            lastname: Some("Lee".to_string()),
            birthdate: None,
            hiredate: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            gender: Some("F".to_string()),
            sepdate: None,
        };

        backend.insert_employee(&employee).unwrap();
        assert!(matches!(
            backend.insert_employee(&employee),
            Err(BackendError::Conflict(_))
        ));

        employee.lastname = Some("Park".to_string());
        assert!(backend.update_employee(&employee).unwrap());
        assert_eq!(backend.employee("EMP001").unwrap(), Some(employee));

        assert!(backend.delete_employee("EMP001").unwrap());
        assert!(!backend.delete_employee("EMP001").unwrap());
        assert_eq!(backend.employee("EMP001").unwrap(), None);
    }

    #[test]
    fn test_leave_request_round_trip() {
        let conn = setup_db();
        let backend = SqliteBackend::new(&conn);
        let now = Utc::now();
        let request = LeaveRequest {
            id: "l1".to_string(),
            user_id: "u1".to_string(),
            leave_type: LeaveType::Sick,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            reason: None,
            status: LeaveStatus::Pending,
            created_at: now,
            updated_at: now,
            reviewer_id: None,
            reviewed_at: None,
        };
        backend.insert_leave_request(&request).unwrap();

        let loaded = backend.leave_request("l1").unwrap().unwrap();
        assert_eq!(loaded.leave_type, LeaveType::Sick);
        assert_eq!(loaded.status, LeaveStatus::Pending);
        assert_eq!(backend.leave_requests(Some("u2")).unwrap().len(), 0);
        assert_eq!(backend.leave_requests(None).unwrap().len(), 1);
    }

    #[test]
    fn test_session_resolves_user() {
        let conn = setup_db();
        let backend = SqliteBackend::new(&conn);
        let user = User {
            id: "u1".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: "x".to_string(),
            first_name: None,
            last_name: None,
            role: Some("manager".to_string()),
            created_at: Utc::now(),
        };
        backend.insert_user(&user).unwrap();
        assert!(matches!(
            backend.insert_user(&user),
            Err(BackendError::Conflict(_))
        ));

        backend.insert_session("digest", "u1", Utc::now()).unwrap();
        let found = backend.session_user("digest").unwrap().unwrap();
        assert_eq!(found.email, "ann@example.com");

        assert!(backend.delete_session("digest").unwrap());
        assert_eq!(backend.session_user("digest").unwrap(), None);
    }
}
