use std::cmp::Ordering;
use std::collections::HashMap;

use serde_derive::Serialize;

use crate::CONFIG;
use crate::model::{Department, Employee, Job, JobHistory};

/// An employee together with the position from their latest job-history row.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EmployeeWithDetails {
    #[serde(flatten)]
    pub employee: Employee,
    pub job: String,
    pub department: String,
    pub salary: f64,
}

/// A job-history row with its employee, job and department resolved to
/// display names.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JobHistoryWithDetails {
    #[serde(flatten)]
    pub history: JobHistory,
    pub employee_name: String,
    pub job_desc: String,
    pub dept_name: String,
}

struct Lookup<'a> {
    departments: HashMap<&'a str, &'a Department>,
    jobs: HashMap<&'a str, &'a Job>,
}

impl<'a> Lookup<'a> {
    // First row wins for duplicate keys, same as a front-to-back scan.
    fn new(departments: &'a [Department], jobs: &'a [Job]) -> Self {
        let mut by_dept = HashMap::new();
        for d in departments {
            by_dept.entry(d.deptcode.as_str()).or_insert(d);
        }
        let mut by_job = HashMap::new();
        for j in jobs {
            by_job.entry(j.jobcode.as_str()).or_insert(j);
        }
        Self {
            departments: by_dept,
            jobs: by_job,
        }
    }

    fn dept_name(&self, deptcode: Option<&str>) -> Option<&'a str> {
        deptcode
            .and_then(|code| self.departments.get(code))
            .and_then(|d| d.deptname.as_deref())
            .filter(|name| !name.is_empty())
    }

    fn job_desc(&self, jobcode: &str) -> Option<&'a str> {
        self.jobs
            .get(jobcode)
            .and_then(|j| j.jobdesc.as_deref())
            .filter(|desc| !desc.is_empty())
    }
}

fn salary_rank(salary: Option<f64>) -> f64 {
    salary.unwrap_or(f64::NEG_INFINITY)
}

/// Picks each employee's current job-history row: the greatest `effdate`,
/// then the greatest salary. Rows still tied keep the earliest one in
/// `history`.
pub fn latest_by_employee(history: &[JobHistory]) -> HashMap<&str, &JobHistory> {
    let mut latest: HashMap<&str, &JobHistory> = HashMap::new();

    for row in history {
        match latest.get(row.empno.as_str()).copied() {
            Some(current) => {
                let newer = match row.effdate.cmp(&current.effdate) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => {
                        salary_rank(row.salary).total_cmp(&salary_rank(current.salary))
                            == Ordering::Greater
                    }
                };
                if newer {
                    latest.insert(row.empno.as_str(), row);
                }
            }
            None => {
                latest.insert(row.empno.as_str(), row);
            }
        }
    }

    latest
}

pub fn employees_with_details(
    employees: &[Employee],
    departments: &[Department],
    jobs: &[Job],
    history: &[JobHistory],
) -> Vec<EmployeeWithDetails> {
    let lookup = Lookup::new(departments, jobs);
    let latest = latest_by_employee(history);
    let not_assigned = CONFIG.labels.not_assigned;

    employees
        .iter()
        .map(|employee| {
            let current = latest.get(employee.empno.as_str());
            let job = current
                .and_then(|h| lookup.job_desc(&h.jobcode))
                .unwrap_or(not_assigned);
            let department = current
                .and_then(|h| lookup.dept_name(h.deptcode.as_deref()))
                .unwrap_or(not_assigned);

            EmployeeWithDetails {
                employee: employee.clone(),
                job: job.to_string(),
                department: department.to_string(),
                salary: current.and_then(|h| h.salary).unwrap_or(0.0),
            }
        })
        .collect()
}

pub fn job_history_with_details(
    history: &[JobHistory],
    employees: &[Employee],
    departments: &[Department],
    jobs: &[Job],
) -> Vec<JobHistoryWithDetails> {
    let lookup = Lookup::new(departments, jobs);
    let mut by_empno: HashMap<&str, &Employee> = HashMap::new();
    for e in employees {
        by_empno.entry(e.empno.as_str()).or_insert(e);
    }
    let unknown = CONFIG.labels.unknown;

    history
        .iter()
        .map(|row| JobHistoryWithDetails {
            history: row.clone(),
            employee_name: by_empno
                .get(row.empno.as_str())
                .map(|e| e.full_name())
                .unwrap_or_else(|| unknown.to_string()),
            job_desc: lookup.job_desc(&row.jobcode).unwrap_or(unknown).to_string(),
            dept_name: lookup
                .dept_name(row.deptcode.as_deref())
                .unwrap_or(unknown)
                .to_string(),
        })
        .collect()
}

/// Employees per resolved department name and per resolved job name.
#[derive(Debug, Default, Clone)]
pub struct Headcounts {
    by_department: HashMap<String, usize>,
    by_job: HashMap<String, usize>,
}

impl Headcounts {
    pub fn new(employees: &[EmployeeWithDetails]) -> Self {
        let mut counts = Self::default();
        for e in employees {
            *counts.by_department.entry(e.department.clone()).or_insert(0) += 1;
            *counts.by_job.entry(e.job.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn department(&self, department: &Department) -> usize {
        department
            .deptname
            .as_deref()
            .and_then(|name| self.by_department.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn job(&self, job: &Job) -> usize {
        job.jobdesc
            .as_deref()
            .and_then(|desc| self.by_job.get(desc))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn employee(empno: &str, first: &str, last: &str) -> Employee {
        Employee {
            empno: empno.to_string(),
            firstname: Some(first.to_string()),
            lastname: Some(last.to_string()),
            birthdate: None,
            hiredate: None,
            gender: Some("F".to_string()),
            sepdate: None,
        }
    }

    fn history(empno: &str, jobcode: &str, deptcode: &str, effdate: &str, salary: Option<f64>) -> JobHistory {
        JobHistory {
            empno: empno.to_string(),
            jobcode: jobcode.to_string(),
            deptcode: Some(deptcode.to_string()),
            effdate: NaiveDate::parse_from_str(effdate, "%Y-%m-%d").unwrap(),
            salary,
        }
    }

    fn reference() -> (Vec<Department>, Vec<Job>) {
        (
            vec![
                Department {
                    deptcode: "D1".to_string(),
                    deptname: Some("Finance".to_string()),
                },
                Department {
                    deptcode: "D2".to_string(),
                    deptname: None,
                },
            ],
            vec![
                Job {
                    jobcode: "J1".to_string(),
                    jobdesc: Some("Analyst".to_string()),
                },
                Job {
                    jobcode: "J2".to_string(),
                    jobdesc: Some("Manager".to_string()),
                },
            ],
        )
    }

    #[test]
    fn test_employee_joined_to_current_position() {
        let (departments, jobs) = reference();
        let employees = vec![employee("EMP001", "Ann", "Lee")];
        let rows = vec![history("EMP001", "J1", "D1", "2024-01-01", Some(5000.0))];

        let joined = employees_with_details(&employees, &departments, &jobs, &rows);

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].employee.empno, "EMP001");
        assert_eq!(joined[0].job, "Analyst");
        assert_eq!(joined[0].department, "Finance");
        assert_eq!(joined[0].salary, 5000.0);
    }

    #[test]
    fn test_employee_without_history_is_not_assigned() {
        let (departments, jobs) = reference();
        let employees = vec![employee("EMP009", "Bo", "Kim")];

        let joined = employees_with_details(&employees, &departments, &jobs, &[]);

        assert_eq!(joined[0].job, "Not assigned");
        assert_eq!(joined[0].department, "Not assigned");
        assert_eq!(joined[0].salary, 0.0);
    }

    #[test]
    fn test_unresolved_codes_and_null_names_are_not_assigned() {
        let (departments, jobs) = reference();
        let employees = vec![employee("EMP001", "Ann", "Lee")];
        let rows = vec![history("EMP001", "J9", "D2", "2024-01-01", None)];

        let joined = employees_with_details(&employees, &departments, &jobs, &rows);

        assert_eq!(joined[0].job, "Not assigned");
        assert_eq!(joined[0].department, "Not assigned");
        assert_eq!(joined[0].salary, 0.0);
    }

    #[test]
    fn test_latest_row_is_greatest_effdate_regardless_of_order() {
        let (departments, jobs) = reference();
        let employees = vec![employee("EMP001", "Ann", "Lee")];
        // deliberately oldest first
        let rows = vec![
            history("EMP001", "J1", "D1", "2020-01-01", Some(3000.0)),
            history("EMP001", "J2", "D1", "2023-07-01", Some(7000.0)),
        ];

        let joined = employees_with_details(&employees, &departments, &jobs, &rows);

        assert_eq!(joined[0].job, "Manager");
        assert_eq!(joined[0].salary, 7000.0);
    }

    #[test]
    fn test_same_effdate_prefers_higher_salary() {
        let rows = vec![
            history("EMP001", "J1", "D1", "2024-01-01", Some(4000.0)),
            history("EMP001", "J2", "D1", "2024-01-01", Some(6000.0)),
            history("EMP001", "J1", "D1", "2024-01-01", None),
        ];

        let latest = latest_by_employee(&rows);

        assert_eq!(latest["EMP001"].jobcode, "J2");
    }

    #[test]
    fn test_full_tie_keeps_first_row() {
        let rows = vec![
            history("EMP001", "J2", "D1", "2024-01-01", Some(5000.0)),
            history("EMP001", "J1", "D1", "2024-01-01", Some(5000.0)),
        ];

        let latest = latest_by_employee(&rows);

        assert_eq!(latest["EMP001"].jobcode, "J2");
    }

    #[test]
    fn test_history_resolves_names_and_keeps_order() {
        let (departments, jobs) = reference();
        let employees = vec![employee("EMP001", "Ann", "Lee")];
        let rows = vec![
            history("EMP404", "J2", "D9", "2024-02-01", None),
            history("EMP001", "J1", "D1", "2024-01-01", Some(5000.0)),
        ];

        let joined = job_history_with_details(&rows, &employees, &departments, &jobs);

        assert_eq!(joined[0].employee_name, "Unknown");
        assert_eq!(joined[0].job_desc, "Manager");
        assert_eq!(joined[0].dept_name, "Unknown");
        assert_eq!(joined[1].employee_name, "Ann Lee");
        assert_eq!(joined[1].job_desc, "Analyst");
        assert_eq!(joined[1].dept_name, "Finance");
    }

    #[test]
    fn test_headcounts_by_display_name() {
        let (departments, jobs) = reference();
        let employees = vec![
            employee("EMP001", "Ann", "Lee"),
            employee("EMP002", "Raj", "Das"),
            employee("EMP003", "Mia", "Roe"),
        ];
        let rows = vec![
            history("EMP001", "J1", "D1", "2024-01-01", Some(5000.0)),
            history("EMP002", "J2", "D1", "2024-01-01", Some(8000.0)),
        ];
        let joined = employees_with_details(&employees, &departments, &jobs, &rows);

        let counts = Headcounts::new(&joined);

        assert_eq!(counts.department(&departments[0]), 2);
        assert_eq!(counts.department(&departments[1]), 0);
        assert_eq!(counts.job(&jobs[0]), 1);
        assert_eq!(counts.job(&jobs[1]), 1);
    }
}
