use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::Uri,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::error;

use crate::CONFIG;
use crate::auth::{self, Session};
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context::{
    self, AttendanceRow, DepartmentRow, EmployeeRow, HistoryRow, JobRow, LeaveRow, SelectOption,
};
use crate::directory::filter::FilterState;
use crate::directory::{Directory, LoadError, Summary};
use crate::gate;
use crate::model::{LeaveStatus, Role, TableSelector};
use crate::serve::{AppError, AppState, Authorized};
use crate::{attendance, leave};

pub const LOAD_FAILED: &str = "Failed to load dashboard data. Please try again.";

const RECENT: usize = 5;

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/employee.html")]
pub struct EmployeeDashboard {
    pub config: &'static Config,
    pub page: context::Page,
    pub today: Option<AttendanceRow>,
    pub clocked_in: bool,
    pub clocked_out: bool,
    pub leave: Vec<LeaveRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/manager.html")]
pub struct ManagerDashboard {
    pub config: &'static Config,
    pub page: context::Page,
    pub error: Option<&'static str>,
    pub summary: Option<Summary>,
    pub pending: Vec<LeaveRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/admin.html")]
pub struct AdminDashboard {
    pub config: &'static Config,
    pub page: context::Page,
    pub error: Option<&'static str>,
    pub summary: Option<Summary>,
    pub departments: Vec<DepartmentRow>,
}

fn load(state: &AppState) -> Result<Result<Directory, LoadError>, AppError> {
    let conn = state.get_conn()?;
    let loaded = Directory::load(&SqliteBackend::new(&conn));
    if let Err(e) = &loaded {
        error!(error = %e, "dashboard data unavailable");
    }
    Ok(loaded)
}

/// Sends each role to its own dashboard.
#[axum::debug_handler]
pub async fn page(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
) -> Result<Response, AppError> {
    let page = context::Page::new(gate::DASHBOARD_PATH, Some(&session));
    match session.role {
        Role::Employee => Ok(employee_dashboard(&state, &session, page)?.into_response()),
        Role::Manager => Ok(manager_dashboard(&state, &session, page)?.into_response()),
        Role::Admin => Ok(admin_dashboard(&state, page)?.into_response()),
    }
}

fn employee_dashboard(
    state: &AppState,
    session: &Session,
    page: context::Page,
) -> Result<EmployeeDashboard, AppError> {
    let conn = state.get_conn()?;
    let backend = SqliteBackend::new(&conn);

    let today = attendance::today(&backend, &session.user_id, Utc::now())?;
    let leave = leave::list(&backend, session)?;

    Ok(EmployeeDashboard {
        config: &CONFIG,
        page,
        clocked_in: today.as_ref().is_some_and(|r| r.clock_in.is_some()),
        clocked_out: today.as_ref().is_some_and(|r| r.clock_out.is_some()),
        today: today.as_ref().map(AttendanceRow::from),
        leave: leave.iter().take(RECENT).map(LeaveRow::from).collect(),
    })
}

fn manager_dashboard(
    state: &AppState,
    session: &Session,
    page: context::Page,
) -> Result<ManagerDashboard, AppError> {
    let directory = load(state)?;

    let conn = state.get_conn()?;
    let backend = SqliteBackend::new(&conn);
    let requests = leave::list(&backend, session)?;
    let pending: Vec<_> = requests
        .iter()
        .filter(|r| r.status == LeaveStatus::Pending)
        .collect();
    let names = auth::display_names(&backend, pending.iter().map(|r| r.user_id.as_str()))?;

    Ok(ManagerDashboard {
        config: &CONFIG,
        page,
        error: directory.as_ref().err().map(|_| LOAD_FAILED),
        summary: directory.as_ref().ok().map(Directory::summary),
        pending: pending
            .into_iter()
            .map(|r| {
                let mut row = LeaveRow::from(r);
                context::name_user(&mut row.user, &names);
                row
            })
            .collect(),
    })
}

fn admin_dashboard(state: &AppState, page: context::Page) -> Result<AdminDashboard, AppError> {
    let directory = load(state)?;

    let departments = match &directory {
        Ok(d) => d
            .departments
            .iter()
            .map(|dept| DepartmentRow::new(dept, d.headcounts().department(dept)))
            .collect(),
        Err(_) => Vec::new(),
    };

    Ok(AdminDashboard {
        config: &CONFIG,
        page,
        error: directory.as_ref().err().map(|_| LOAD_FAILED),
        summary: directory.as_ref().ok().map(Directory::summary),
        departments,
    })
}

#[derive(Template, WebTemplate)]
#[template(path = "directory.html")]
pub struct DirectoryTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub error: Option<&'static str>,
    pub retry_url: String,
    pub reset_url: String,
    pub show_reset: bool,
    pub q: String,
    pub gender: String,
    pub department_options: Vec<SelectOption>,
    pub job_options: Vec<SelectOption>,
    pub table_options: Vec<SelectOption>,
    pub summary: Option<Summary>,
    pub show_employees: bool,
    pub show_departments: bool,
    pub show_jobs: bool,
    pub show_history: bool,
    pub no_results: bool,
    pub employees: Vec<EmployeeRow>,
    pub departments: Vec<DepartmentRow>,
    pub jobs: Vec<JobRow>,
    pub history: Vec<HistoryRow>,
}

fn table_options(current: TableSelector) -> Vec<SelectOption> {
    [
        (TableSelector::All, "All tables"),
        (TableSelector::Employees, "Employees"),
        (TableSelector::Departments, "Departments"),
        (TableSelector::Jobs, "Jobs"),
        (TableSelector::JobHistory, "Job history"),
    ]
    .iter()
    .map(|(t, label)| SelectOption::new(t.as_str(), label, current.as_str()))
    .collect()
}

fn name_options(names: &[&str], current: &str) -> Vec<SelectOption> {
    let mut options = vec![SelectOption::new("", "All", current)];
    options.extend(names.iter().map(|n| SelectOption::new(n, n, current)));
    options
}

/// The searchable, filterable view over all four collections.
#[axum::debug_handler]
pub async fn directory(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    uri: Uri,
    Query(filter): Query<FilterState>,
) -> Result<DirectoryTemplate, AppError> {
    let retry_url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/directory".to_string());
    let reset = filter.reset();
    let reset_url = if reset.has_search() {
        format!("/directory?q={}", gate::encode_component(&reset.search_query))
    } else {
        "/directory".to_string()
    };

    let mut template = DirectoryTemplate {
        config: &CONFIG,
        page: context::Page::new("/directory", Some(&session)),
        error: None,
        retry_url,
        reset_url,
        show_reset: !filter.is_unfiltered(),
        q: filter.search_query.clone(),
        gender: filter.gender.clone(),
        department_options: Vec::new(),
        job_options: Vec::new(),
        table_options: table_options(filter.table),
        summary: None,
        show_employees: filter.table.shows(TableSelector::Employees),
        show_departments: filter.table.shows(TableSelector::Departments),
        show_jobs: filter.table.shows(TableSelector::Jobs),
        show_history: filter.table.shows(TableSelector::JobHistory),
        no_results: false,
        employees: Vec::new(),
        departments: Vec::new(),
        jobs: Vec::new(),
        history: Vec::new(),
    };

    let directory = match load(&state)? {
        Ok(directory) => directory,
        Err(_) => {
            template.error = Some(LOAD_FAILED);
            return Ok(template);
        }
    };

    let filtered = directory.filter(&filter);
    let counts = directory.headcounts();

    template.department_options = name_options(&directory.department_names(), &filter.department);
    template.job_options = name_options(&directory.job_names(), &filter.job);
    template.summary = Some(directory.summary());
    template.no_results = filtered.no_results();
    template.employees = filtered.employees.iter().map(|e| EmployeeRow::from(*e)).collect();
    template.departments = filtered
        .departments
        .iter()
        .map(|d| DepartmentRow::new(d, counts.department(d)))
        .collect();
    template.jobs = filtered
        .jobs
        .iter()
        .map(|j| JobRow::new(j, counts.job(j)))
        .collect();
    template.history = filtered.job_history.iter().map(|h| HistoryRow::from(*h)).collect();

    Ok(template)
}
