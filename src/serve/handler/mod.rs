use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use strum::VariantArray;
use tracing::warn;

use crate::CONFIG;
use crate::auth::{AuthError, SignInForm, SignUpForm};
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context::{self, SelectOption};
use crate::gate;
use crate::model::Role;
use crate::serve::{
    AppError, AppState, Authorized, expired_session_cookie, see_other, see_other_with_cookie,
    session_cookie, session_token,
};

pub mod attendance;
pub mod dashboard;
pub mod employee;
pub mod leave;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub config: &'static Config,
    pub page: context::Page,
}

pub async fn index(session: Option<Authorized>) -> Result<Response, AppError> {
    if session.is_some() {
        return Ok(see_other(gate::DASHBOARD_PATH));
    }

    Ok(IndexTemplate {
        config: &CONFIG,
        page: context::Page::new("/", None),
    }
    .into_response())
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub email: String,
    pub from: String,
    pub error: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    #[serde(default)]
    from: String,
}

#[axum::debug_handler]
pub async fn login_form(Query(query): Query<LoginQuery>) -> LoginTemplate {
    LoginTemplate {
        config: &CONFIG,
        page: context::Page::new(gate::LOGIN_PATH, None),
        email: String::new(),
        from: query.from,
        error: None,
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    from: String,
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let conn = state.get_conn()?;
    let credentials = SignInForm {
        email: form.email.clone(),
        password: form.password,
    };

    match state
        .auth
        .sign_in(&SqliteBackend::new(&conn), &credentials, Utc::now())
    {
        Ok((token, _)) => {
            let target = gate::return_location(Some(form.from.as_str()));
            Ok(see_other_with_cookie(target, session_cookie(&token)?))
        }
        Err(e) if e.is_user_error() => Ok(LoginTemplate {
            config: &CONFIG,
            page: context::Page::new(gate::LOGIN_PATH, None),
            email: form.email,
            from: form.from,
            error: Some(e.to_string()),
        }
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub config: &'static Config,
    pub page: context::Page,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub roles: Vec<SelectOption>,
    pub error: Option<String>,
}

fn role_options(current: Role) -> Vec<SelectOption> {
    Role::VARIANTS
        .iter()
        .map(|r| SelectOption::new(r.as_str(), r.label(), current.as_str()))
        .collect()
}

#[axum::debug_handler]
pub async fn signup_form() -> SignupTemplate {
    SignupTemplate {
        config: &CONFIG,
        page: context::Page::new("/signup", None),
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        roles: role_options(Role::default()),
        error: None,
    }
}

/// Message shown for a rejected sign-up.
fn signup_message(e: &AuthError) -> String {
    match e {
        AuthError::Validation(report) => {
            if report.iter().any(|(path, _)| path.to_string() == "password") {
                "Password must be at least 8 characters".to_string()
            } else if report.iter().any(|(path, _)| path.to_string() == "email") {
                "Please enter a valid email address".to_string()
            } else {
                "Please fill in all required fields".to_string()
            }
        }
        e => e.to_string(),
    }
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignUpForm>,
) -> Result<Response, AppError> {
    let conn = state.get_conn()?;
    let backend = SqliteBackend::new(&conn);

    let signed_up = state
        .auth
        .sign_up(&backend, &form, Utc::now())
        .and_then(|_| {
            let credentials = SignInForm {
                email: form.email.clone(),
                password: form.password.clone(),
            };
            state.auth.sign_in(&backend, &credentials, Utc::now())
        });

    match signed_up {
        Ok((token, _)) => Ok(see_other_with_cookie(
            gate::DASHBOARD_PATH,
            session_cookie(&token)?,
        )),
        Err(e) if e.is_user_error() => Ok(SignupTemplate {
            config: &CONFIG,
            page: context::Page::new("/signup", None),
            error: Some(signup_message(&e)),
            roles: role_options(form.role),
            first_name: form.first_name,
            last_name: form.last_name,
            email: form.email,
        }
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        let conn = state.get_conn()?;
        if let Err(e) = state.auth.sign_out(&SqliteBackend::new(&conn), &token) {
            warn!(error = %e, "could not end session");
        }
    }

    Ok(see_other_with_cookie(
        gate::LOGIN_PATH,
        expired_session_cookie()?,
    ))
}
