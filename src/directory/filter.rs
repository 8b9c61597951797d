use serde_derive::{Deserialize, Serialize};

use crate::directory::join::{EmployeeWithDetails, JobHistoryWithDetails};
use crate::model::{Department, Job, TableSelector};

/// What the dashboard search bar submits. Empty strings mean "no filter".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    #[serde(default, rename = "q")]
    pub search_query: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub table: TableSelector,
}

fn selected(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value) }
}

impl FilterState {
    /// Clears the categorical filters, keeping the search text.
    pub fn reset(&self) -> Self {
        Self {
            search_query: self.search_query.clone(),
            ..Self::default()
        }
    }

    pub fn has_search(&self) -> bool {
        selected(&self.search_query).is_some()
    }

    pub fn is_unfiltered(&self) -> bool {
        !self.has_search()
            && selected(&self.department).is_none()
            && selected(&self.job).is_none()
            && selected(&self.gender).is_none()
            && self.table == TableSelector::All
    }

    pub fn apply<'a>(
        &self,
        employees: &'a [EmployeeWithDetails],
        departments: &'a [Department],
        jobs: &'a [Job],
        job_history: &'a [JobHistoryWithDetails],
    ) -> Filtered<'a> {
        let query = Query::new(&self.search_query);
        let department = selected(&self.department);
        let job = selected(&self.job);
        let gender = selected(&self.gender);

        let employees = if self.table.shows(TableSelector::Employees) {
            employees
                .iter()
                .filter(|e| {
                    query.matches_any([
                        e.employee.full_name().as_str(),
                        e.employee.empno.as_str(),
                        e.department.as_str(),
                        e.job.as_str(),
                    ])
                })
                .filter(|e| department.is_none_or(|d| e.department == d))
                .filter(|e| job.is_none_or(|j| e.job == j))
                .filter(|e| gender.is_none_or(|g| e.employee.gender.as_deref() == Some(g)))
                .collect()
        } else {
            Vec::new()
        };

        let departments = if self.table.shows(TableSelector::Departments) {
            departments
                .iter()
                .filter(|d| {
                    query.matches_any([
                        d.deptcode.as_str(),
                        d.deptname.as_deref().unwrap_or_default(),
                    ])
                })
                .collect()
        } else {
            Vec::new()
        };

        let jobs = if self.table.shows(TableSelector::Jobs) {
            jobs.iter()
                .filter(|j| {
                    query.matches_any([j.jobcode.as_str(), j.jobdesc.as_deref().unwrap_or_default()])
                })
                .collect()
        } else {
            Vec::new()
        };

        let job_history = if self.table.shows(TableSelector::JobHistory) {
            job_history
                .iter()
                .filter(|h| {
                    let salary = h.history.salary.map(|s| s.to_string()).unwrap_or_default();
                    query.matches_any([
                        h.history.empno.as_str(),
                        h.history.jobcode.as_str(),
                        h.employee_name.as_str(),
                        h.job_desc.as_str(),
                        h.dept_name.as_str(),
                        salary.as_str(),
                    ])
                })
                .filter(|h| department.is_none_or(|d| h.dept_name == d))
                .filter(|h| job.is_none_or(|j| h.job_desc == j))
                .collect()
        } else {
            Vec::new()
        };

        Filtered {
            employees,
            departments,
            jobs,
            job_history,
            searched: query.is_set(),
        }
    }
}

/// Case-insensitive substring match. An empty query matches everything.
struct Query(Option<String>);

impl Query {
    fn new(raw: &str) -> Self {
        Self(selected(raw).map(|q| q.to_lowercase()))
    }

    fn is_set(&self) -> bool {
        self.0.is_some()
    }

    fn matches_any<'s, const N: usize>(&self, fields: [&'s str; N]) -> bool {
        match &self.0 {
            Some(q) => fields.iter().any(|f| f.to_lowercase().contains(q.as_str())),
            None => true,
        }
    }
}

/// The four collections after filtering, in their original order.
#[derive(Debug)]
pub struct Filtered<'a> {
    pub employees: Vec<&'a EmployeeWithDetails>,
    pub departments: Vec<&'a Department>,
    pub jobs: Vec<&'a Job>,
    pub job_history: Vec<&'a JobHistoryWithDetails>,
    searched: bool,
}

impl Filtered<'_> {
    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
            && self.departments.is_empty()
            && self.jobs.is_empty()
            && self.job_history.is_empty()
    }

    /// A search was made and nothing matched; show one message instead of
    /// four empty tables.
    pub fn no_results(&self) -> bool {
        self.searched && self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::join::{employees_with_details, job_history_with_details};
    use crate::model::{Employee, JobHistory};
    use chrono::NaiveDate;

    struct Fixture {
        employees: Vec<EmployeeWithDetails>,
        departments: Vec<Department>,
        jobs: Vec<Job>,
        history: Vec<JobHistoryWithDetails>,
    }

    impl Fixture {
        fn new() -> Self {
            let departments = vec![
                Department {
                    deptcode: "D1".to_string(),
                    deptname: Some("Finance".to_string()),
                },
                Department {
                    deptcode: "D2".to_string(),
                    deptname: Some("IT".to_string()),
                },
            ];
            let jobs = vec![
                Job {
                    jobcode: "J1".to_string(),
                    jobdesc: Some("Analyst".to_string()),
                },
                Job {
                    jobcode: "J2".to_string(),
                    jobdesc: Some("Engineer".to_string()),
                },
            ];
            let employees = vec![
                Employee {
                    empno: "EMP001".to_string(),
                    firstname: Some("Ann".to_string()),
                    lastname: Some("Lee".to_string()),
                    birthdate: None,
                    hiredate: None,
                    gender: Some("F".to_string()),
                    sepdate: None,
                },
                Employee {
                    empno: "EMP002".to_string(),
                    firstname: Some("Tom".to_string()),
                    lastname: Some("Hart".to_string()),
                    birthdate: None,
                    hiredate: None,
                    gender: Some("M".to_string()),
                    sepdate: None,
                },
            ];
            let history = vec![
                JobHistory {
                    empno: "EMP001".to_string(),
                    jobcode: "J1".to_string(),
                    deptcode: Some("D1".to_string()),
                    effdate: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    salary: Some(5000.0),
                },
                JobHistory {
                    empno: "EMP002".to_string(),
                    jobcode: "J2".to_string(),
                    deptcode: Some("D2".to_string()),
                    effdate: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
                    salary: Some(6200.0),
                },
            ];

            Self {
                employees: employees_with_details(&employees, &departments, &jobs, &history),
                history: job_history_with_details(&history, &employees, &departments, &jobs),
                departments,
                jobs,
            }
        }

        fn apply(&self, filter: &FilterState) -> Filtered<'_> {
            filter.apply(&self.employees, &self.departments, &self.jobs, &self.history)
        }
    }

    fn empnos(filtered: &Filtered<'_>) -> Vec<String> {
        filtered
            .employees
            .iter()
            .map(|e| e.employee.empno.clone())
            .collect()
    }

    #[test]
    fn test_unfiltered_returns_everything_in_order() {
        let fixture = Fixture::new();
        let filter = FilterState::default();
        assert!(filter.is_unfiltered());

        let filtered = fixture.apply(&filter);

        assert_eq!(empnos(&filtered), vec!["EMP001", "EMP002"]);
        assert_eq!(filtered.departments.len(), 2);
        assert_eq!(filtered.jobs.len(), 2);
        assert_eq!(filtered.job_history.len(), 2);
        assert_eq!(filtered.job_history[0].history.empno, "EMP001");
        assert!(!filtered.no_results());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let fixture = Fixture::new();
        let filter = FilterState {
            search_query: "emp001".to_string(),
            ..Default::default()
        };

        let filtered = fixture.apply(&filter);

        assert_eq!(empnos(&filtered), vec!["EMP001"]);
        assert_eq!(filtered.job_history.len(), 1);
        assert!(filtered.departments.is_empty());
    }

    #[test]
    fn test_search_matches_full_name_and_resolved_names() {
        let fixture = Fixture::new();

        let by_name = FilterState {
            search_query: "ann lee".to_string(),
            ..Default::default()
        };
        assert_eq!(empnos(&fixture.apply(&by_name)), vec!["EMP001"]);

        let by_job = FilterState {
            search_query: "ENGINEER".to_string(),
            ..Default::default()
        };
        let filtered = fixture.apply(&by_job);
        assert_eq!(empnos(&filtered), vec!["EMP002"]);
        assert_eq!(filtered.jobs.len(), 1);
        assert_eq!(filtered.jobs[0].jobcode, "J2");
    }

    #[test]
    fn test_search_matches_salary_text() {
        let fixture = Fixture::new();
        let filter = FilterState {
            search_query: "6200".to_string(),
            ..Default::default()
        };

        let filtered = fixture.apply(&filter);

        assert_eq!(filtered.job_history.len(), 1);
        assert_eq!(filtered.job_history[0].history.empno, "EMP002");
        assert!(filtered.employees.is_empty());
    }

    #[test]
    fn test_department_filter_uses_display_name() {
        let fixture = Fixture::new();

        let finance = FilterState {
            department: "Finance".to_string(),
            ..Default::default()
        };
        let filtered = fixture.apply(&finance);
        assert_eq!(empnos(&filtered), vec!["EMP001"]);
        assert_eq!(filtered.job_history.len(), 1);
        // reference tables are not narrowed by categorical filters
        assert_eq!(filtered.departments.len(), 2);

        let it = FilterState {
            department: "IT".to_string(),
            ..Default::default()
        };
        assert_eq!(empnos(&fixture.apply(&it)), vec!["EMP002"]);

        let by_code = FilterState {
            department: "D1".to_string(),
            ..Default::default()
        };
        assert!(fixture.apply(&by_code).employees.is_empty());
    }

    #[test]
    fn test_gender_filter_applies_to_employees_only() {
        let fixture = Fixture::new();
        let filter = FilterState {
            gender: "M".to_string(),
            ..Default::default()
        };

        let filtered = fixture.apply(&filter);

        assert_eq!(empnos(&filtered), vec!["EMP002"]);
        assert_eq!(filtered.job_history.len(), 2);
    }

    #[test]
    fn test_table_selector_hides_other_collections() {
        let fixture = Fixture::new();
        let filter = FilterState {
            search_query: "e".to_string(),
            table: TableSelector::Employees,
            ..Default::default()
        };

        let filtered = fixture.apply(&filter);

        assert_eq!(filtered.employees.len(), 2);
        assert!(filtered.departments.is_empty());
        assert!(filtered.jobs.is_empty());
        assert!(filtered.job_history.is_empty());
    }

    #[test]
    fn test_no_results_only_when_searching() {
        let fixture = Fixture::new();

        let search = FilterState {
            search_query: "nobody".to_string(),
            ..Default::default()
        };
        let filtered = fixture.apply(&search);
        assert!(filtered.is_empty());
        assert!(filtered.no_results());

        let categorical = FilterState {
            gender: "X".to_string(),
            table: TableSelector::Employees,
            ..Default::default()
        };
        let filtered = fixture.apply(&categorical);
        assert!(filtered.is_empty());
        assert!(!filtered.no_results());
    }

    #[test]
    fn test_reset_keeps_search_text() {
        let filter = FilterState {
            search_query: "ann".to_string(),
            department: "Finance".to_string(),
            job: "Analyst".to_string(),
            gender: "F".to_string(),
            table: TableSelector::Jobs,
        };

        let reset = filter.reset();

        assert_eq!(reset.search_query, "ann");
        assert!(reset.department.is_empty());
        assert!(reset.job.is_empty());
        assert!(reset.gender.is_empty());
        assert_eq!(reset.table, TableSelector::All);
    }
}
