use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::CONFIG;
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context;
use crate::employee::{self, EmployeeError, EmployeeForm};
use crate::gate;
use crate::serve::{AppError, AppState, Authorized, see_other};

#[derive(Template, WebTemplate)]
#[template(path = "employee/form.html")]
pub struct EmployeeFormTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub editing: bool,
    pub action: String,
    pub form: EmployeeForm,
    pub error: Option<String>,
}

fn form_page(
    session: &crate::auth::Session,
    form: EmployeeForm,
    editing: bool,
    error: Option<String>,
) -> EmployeeFormTemplate {
    let action = if editing {
        format!("/employees/{}", gate::encode_segment(&form.empno))
    } else {
        "/employees".to_string()
    };
    EmployeeFormTemplate {
        config: &CONFIG,
        page: context::Page::new(&action, Some(session)),
        editing,
        action,
        form,
        error,
    }
}

fn is_user_error(e: &EmployeeError) -> bool {
    matches!(
        e,
        EmployeeError::Validation(_) | EmployeeError::InvalidDate { .. } | EmployeeError::Exists(_)
    )
}

fn user_message(e: &EmployeeError) -> String {
    match e {
        EmployeeError::Validation(report) => {
            if report.iter().any(|(path, _)| path.to_string() == "gender") {
                "Gender must be a single character".to_string()
            } else {
                "Please fill in all required fields".to_string()
            }
        }
        e => e.to_string(),
    }
}

#[axum::debug_handler(state = Arc<AppState>)]
pub async fn new_form(Authorized(session): Authorized) -> EmployeeFormTemplate {
    form_page(&session, EmployeeForm::default(), false, None)
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Form(form): Form<EmployeeForm>,
) -> Result<Response, AppError> {
    let conn = state.get_conn()?;

    match employee::add(&SqliteBackend::new(&conn), &form, Utc::now().date_naive()) {
        Ok(_) => Ok(see_other("/directory")),
        Err(e) if is_user_error(&e) => {
            let message = user_message(&e);
            Ok(form_page(&session, form, false, Some(message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Path(empno): Path<String>,
) -> Result<EmployeeFormTemplate, AppError> {
    let conn = state.get_conn()?;
    let existing = employee::get(&SqliteBackend::new(&conn), &empno)?;

    Ok(form_page(&session, EmployeeForm::from(&existing), true, None))
}

#[axum::debug_handler]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Path(empno): Path<String>,
    Form(mut form): Form<EmployeeForm>,
) -> Result<Response, AppError> {
    form.empno = empno;
    let conn = state.get_conn()?;

    match employee::edit(&SqliteBackend::new(&conn), &form) {
        Ok(_) => Ok(see_other("/directory")),
        Err(e) if is_user_error(&e) => {
            let message = user_message(&e);
            Ok(form_page(&session, form, true, Some(message)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "employee/delete.html")]
pub struct DeleteTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub empno: String,
    pub action: String,
    pub name: String,
}

#[axum::debug_handler]
pub async fn confirm_delete(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Path(empno): Path<String>,
) -> Result<DeleteTemplate, AppError> {
    let conn = state.get_conn()?;
    let existing = employee::get(&SqliteBackend::new(&conn), &empno)?;
    let action = format!("/employees/{}/delete", gate::encode_segment(&empno));

    Ok(DeleteTemplate {
        config: &CONFIG,
        page: context::Page::new(&action, Some(&session)),
        name: existing.full_name(),
        empno,
        action,
    })
}

#[axum::debug_handler]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Authorized(_): Authorized,
    Path(empno): Path<String>,
) -> Result<Response, AppError> {
    let conn = state.get_conn()?;
    employee::delete(&SqliteBackend::new(&conn), &empno)?;

    Ok(see_other("/directory"))
}
