pub mod handler;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{self, InvalidHeaderValue},
        request::Parts,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_embed::ServeEmbed;
use r2d2::Error as R2D2Error;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_embed::Embed;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::CONFIG;
use crate::attendance::AttendanceError;
use crate::auth::{AuthContext, AuthError, AuthEvent, Session};
use crate::backend::BackendError;
use crate::backend::sqlitebe::SqliteBackend;
use crate::config::Config;
use crate::context;
use crate::employee::EmployeeError;
use crate::gate::{self, AuthState, Gate};
use crate::leave::LeaveError;

#[derive(Embed, Clone)]
#[folder = "static/"]
pub struct StaticDir;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unexpected: {0}")]
    Unexpected(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Askama(#[from] askama::Error),
    #[error(transparent)]
    R2D2(#[from] R2D2Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Employee(#[from] EmployeeError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error(transparent)]
    Leave(#[from] LeaveError),
    #[error(transparent)]
    Internal(#[from] InvalidHeaderValue),
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Unexpected(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Employee(EmployeeError::NotFound(_)) | AppError::Leave(LeaveError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }

        #[cfg(debug_assertions)]
        let message = format!("Error: {:?}", self);

        #[cfg(not(debug_assertions))]
        let message = match status {
            StatusCode::NOT_FOUND => "Not Found".to_string(),
            _ => "Internal Server Error".to_string(),
        };

        (status, message).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handler::index))
        .route("/login", get(handler::login_form).post(handler::login))
        .route("/signup", get(handler::signup_form).post(handler::signup))
        .route("/logout", post(handler::logout))
        .route("/dashboard", get(handler::dashboard::page))
        .route("/directory", get(handler::dashboard::directory))
        .route("/employees/new", get(handler::employee::new_form))
        .route("/employees", post(handler::employee::create))
        .route(
            "/employees/{empno}/edit",
            get(handler::employee::edit_form),
        )
        .route("/employees/{empno}", post(handler::employee::update))
        .route(
            "/employees/{empno}/delete",
            get(handler::employee::confirm_delete).post(handler::employee::delete),
        )
        .route("/attendance", get(handler::attendance::page))
        .route("/attendance/clock-in", post(handler::attendance::clock_in))
        .route("/attendance/clock-out", post(handler::attendance::clock_out))
        .route(
            "/leave",
            get(handler::leave::page).post(handler::leave::submit),
        )
        .route("/leave/{id}/review", post(handler::leave::review))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .nest_service("/static", ServeEmbed::<StaticDir>::new())
}

pub async fn run(db: PathBuf, port: Option<&str>) -> Result<()> {
    let state = Arc::new(AppState::new(&db)?);
    let audit_subscription = state.auth.subscribe(audit);

    let app = router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", port.unwrap_or(CONFIG.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("could not listen")?;

    info!(version = env!("HRDESK_VERSION"), "Serving at http://{}/", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("could not start server")?;

    state.auth.unsubscribe(audit_subscription);
    Ok(())
}

fn audit(event: &AuthEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(target: "hrdesk::audit", event = %json, "auth transition"),
        Err(e) => warn!(error = %e, "could not serialize auth event"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
    }
    info!("shutting down");
}

pub struct AppState {
    pub db_pool: Pool<SqliteConnectionManager>,
    pub auth: AuthContext,
}

impl AppState {
    pub fn new(db: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(db);
        let db_pool = r2d2::Pool::builder()
            .max_size(CONFIG.pool.max_size as u32)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(AppState {
            db_pool,
            auth: AuthContext::new(),
        })
    }

    pub fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, R2D2Error> {
        self.db_pool.get()
    }

    /// Resolves the session cookie once. Anything that keeps the lookup from
    /// finishing leaves the request `Loading`.
    pub fn auth_state(&self, headers: &HeaderMap) -> AuthState {
        let token = session_token(headers);
        let conn = match self.get_conn() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "auth unresolved: no connection");
                return AuthState::Loading;
            }
        };
        match self.auth.resolve(&SqliteBackend::new(&conn), token.as_deref()) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "auth unresolved");
                AuthState::Loading
            }
        }
    }
}

/// A request that passed the role gate for its path.
pub struct Authorized(pub Session);

impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let requested = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let auth = state.auth_state(&parts.headers);

        match gate::check(&auth, requested, gate::required_roles(parts.uri.path())) {
            Gate::Allow(session) => Ok(Authorized(session)),
            Gate::Pending => Err(loading_page(requested)),
            Gate::RedirectToLogin { from } => Err(see_other(&gate::login_location(&from))),
            Gate::RedirectToDashboard => {
                warn!(path = parts.uri.path(), "role not allowed");
                Err(see_other(gate::DASHBOARD_PATH))
            }
        }
    }
}

impl OptionalFromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        match state.auth_state(&parts.headers) {
            AuthState::Authenticated(session) => Ok(Some(Authorized(session))),
            _ => Ok(None),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "loading.html")]
pub struct LoadingTemplate {
    pub config: &'static Config,
    pub page: context::Page,
}

fn loading_page(requested: &str) -> Response {
    let template = LoadingTemplate {
        config: &CONFIG,
        page: context::Page::new(requested, None),
    };
    let mut response = template.into_response();
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
        .headers_mut()
        .insert(HeaderName::from_static("refresh"), HeaderValue::from_static("2"));
    response
}

pub fn see_other(url: &str) -> Response {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(url) {
        Ok(location) => {
            headers.insert(header::LOCATION, location);
        }
        Err(_) => {
            headers.insert(header::LOCATION, HeaderValue::from_static("/"));
        }
    }

    (StatusCode::SEE_OTHER, headers).into_response()
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let name = CONFIG.session.cookie;
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        CONFIG.session.cookie, token
    ))
}

pub fn expired_session_cookie() -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        CONFIG.session.cookie
    ))
}

/// `see_other` with a cookie attached.
pub fn see_other_with_cookie(url: &str, cookie: HeaderValue) -> Response {
    let mut response = see_other(url);
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    response
}
