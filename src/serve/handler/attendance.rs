use std::collections::HashMap;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::CONFIG;
use crate::attendance::{self, AttendanceError};
use crate::auth::{self, Session};
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context::{self, AttendanceRow};
use crate::serve::{AppError, AppState, Authorized, see_other};

#[derive(Template, WebTemplate)]
#[template(path = "attendance.html")]
pub struct AttendanceTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub clocked_in: bool,
    pub clocked_out: bool,
    pub show_user: bool,
    pub records: Vec<AttendanceRow>,
    pub error: Option<String>,
}

fn render(
    state: &AppState,
    session: &Session,
    error: Option<String>,
) -> Result<AttendanceTemplate, AppError> {
    let conn = state.get_conn()?;
    let backend = SqliteBackend::new(&conn);
    let today = attendance::today(&backend, &session.user_id, Utc::now())?;
    let records = attendance::list(&backend, session)?;
    let names = if session.role.is_reviewer() {
        auth::display_names(&backend, records.iter().map(|r| r.user_id.as_str()))?
    } else {
        HashMap::new()
    };
    let records = records
        .iter()
        .map(|r| {
            let mut row = AttendanceRow::from(r);
            context::name_user(&mut row.user, &names);
            row
        })
        .collect();

    Ok(AttendanceTemplate {
        config: &CONFIG,
        page: context::Page::new("/attendance", Some(session)),
        clocked_in: today.as_ref().is_some_and(|r| r.clock_in.is_some()),
        clocked_out: today.as_ref().is_some_and(|r| r.clock_out.is_some()),
        show_user: session.role.is_reviewer(),
        records,
        error,
    })
}

#[axum::debug_handler]
pub async fn page(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
) -> Result<AttendanceTemplate, AppError> {
    render(&state, &session, None)
}

fn after(
    state: &AppState,
    session: &Session,
    result: Result<(), AttendanceError>,
) -> Result<Response, AppError> {
    match result {
        Ok(()) => Ok(see_other("/attendance")),
        Err(e) if e.is_user_error() => {
            Ok(render(state, session, Some(e.to_string()))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn clock_in(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
) -> Result<Response, AppError> {
    let result = {
        let conn = state.get_conn()?;
        attendance::clock_in(&SqliteBackend::new(&conn), &session.user_id, Utc::now()).map(|_| ())
    };
    after(&state, &session, result)
}

#[axum::debug_handler]
pub async fn clock_out(
    State(state): State<Arc<AppState>>,
    Authorized(session): Authorized,
) -> Result<Response, AppError> {
    let result = {
        let conn = state.get_conn()?;
        attendance::clock_out(&SqliteBackend::new(&conn), &session.user_id, Utc::now()).map(|_| ())
    };
    after(&state, &session, result)
}
