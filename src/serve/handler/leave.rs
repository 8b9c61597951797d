use std::collections::HashMap;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use strum::VariantArray;

use crate::CONFIG;
use crate::auth::{self, Session};
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context::{self, LeaveRow, SelectOption};
use crate::leave::{self, Decision, LeaveForm};
use crate::model::LeaveType;
use crate::serve::{AppError, AppState, Authorized, see_other};

#[derive(Template, WebTemplate)]
#[template(path = "leave.html")]
pub struct LeaveTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub types: Vec<SelectOption>,
    pub can_review: bool,
    pub requests: Vec<LeaveRow>,
    pub error: Option<String>,
}

fn type_options() -> Vec<SelectOption> {
    LeaveType::VARIANTS
        .iter()
        .map(|t| SelectOption::new(t.as_str(), t.label(), LeaveType::Annual.as_str()))
        .collect()
}

fn render(
    state: &AppState,
    session: &Session,
    error: Option<String>,
) -> Result<LeaveTemplate, AppError> {
    let conn = state.get_conn()?;
    let backend = SqliteBackend::new(&conn);
    let requests = leave::list(&backend, session)?;
    let names = if session.role.is_reviewer() {
        auth::display_names(&backend, requests.iter().map(|r| r.user_id.as_str()))?
    } else {
        HashMap::new()
    };

    Ok(LeaveTemplate {
        config: &CONFIG,
        page: context::Page::new("/leave", Some(session)),
        types: type_options(),
        can_review: session.role.is_reviewer(),
        requests: requests
            .iter()
            .map(|r| {
                let mut row = LeaveRow::from(r);
                context::name_user(&mut row.user, &names);
                row
            })
            .collect(),
        error,
    })
}

#[axum::debug_handler]
pub async fn page(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
) -> Result<LeaveTemplate, AppError> {
    render(&state, &session, None)
}

#[axum::debug_handler]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Form(form): Form<LeaveForm>,
) -> Result<Response, AppError> {
    let result = {
        let conn = state.get_conn()?;
        leave::submit(&SqliteBackend::new(&conn), &session.user_id, &form, Utc::now())
    };
    match result {
        Ok(_) => Ok(see_other("/leave")),
        Err(e) if e.is_user_error() => {
            Ok(render(&state, &session, Some(e.to_string()))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Deserialize)]
pub struct ReviewForm {
    decision: Decision,
}

#[axum::debug_handler]
pub async fn review(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, AppError> {
    let result = {
        let conn = state.get_conn()?;
        leave::review(
            &SqliteBackend::new(&conn),
            &id,
            form.decision,
            &session.user_id,
            Utc::now(),
        )
    };
    match result {
        Ok(_) => Ok(see_other("/leave")),
        Err(e @ leave::LeaveError::AlreadyReviewed { .. }) => {
            Ok(render(&state, &session, Some(e.to_string()))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}
