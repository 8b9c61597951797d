use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use garde::Validate;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{AuthBackend, BackendError};
use crate::gate::AuthState;
use crate::model::{Role, User};

pub mod password;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Please fill in all required fields: {0}")]
    Validation(#[from] garde::Report),

    #[error("Please enter both email and password")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account for {0} already exists")]
    EmailTaken(String),

    #[error("could not hash password: {0}")]
    Hash(String),

    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for AuthError {
    fn from(e: BackendError) -> Self {
        AuthError::Backend(e)
    }
}

impl AuthError {
    /// Errors the user can fix by changing what they typed.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, AuthError::Hash(_) | AuthError::Backend(_))
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct SignUpForm {
    #[garde(length(min = 1, max = 64))]
    pub first_name: String,
    #[garde(length(min = 1, max = 64))]
    pub last_name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(skip)]
    #[serde(default)]
    pub role: Role,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SignInForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// The signed-in user as the rest of the app sees it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.display_name(),
            role: user.role(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedUp { user_id: String, email: String },
    SignedIn { user_id: String, role: Role },
    SignedOut { user_id: String },
}

type Subscriber = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

/// Owns the auth transitions for the whole application. Create one at
/// startup and share it; listeners registered with [`AuthContext::subscribe`]
/// see every sign-up, sign-in and sign-out.
#[derive(Default)]
pub struct AuthContext {
    subscribers: Mutex<Vec<(usize, Subscriber)>>,
    next_id: Mutex<usize>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let mut next = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next;
        *next += 1;
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(sub, _)| *sub != id.0);
    }

    /// Callbacks run without the subscriber lock held, so they may
    /// subscribe or unsubscribe.
    fn notify(&self, event: AuthEvent) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(&event);
        }
    }

    pub fn sign_up<B: AuthBackend>(
        &self,
        backend: &B,
        form: &SignUpForm,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let form = SignUpForm {
            email: normalize_email(&form.email),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            ..form.clone()
        };
        form.validate()?;

        let password_hash =
            password::hash_password(&form.password).map_err(|e| AuthError::Hash(e.to_string()))?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: form.email.clone(),
            password_hash,
            first_name: Some(form.first_name),
            last_name: Some(form.last_name),
            role: Some(form.role.as_str().to_string()),
            created_at: now,
        };

        match backend.insert_user(&user) {
            Ok(()) => {}
            Err(BackendError::Conflict(_)) => return Err(AuthError::EmailTaken(user.email)),
            Err(e) => return Err(e.into()),
        }

        self.notify(AuthEvent::SignedUp {
            user_id: user.id.clone(),
            email: user.email.clone(),
        });
        Ok(user)
    }

    /// Checks the credentials and opens a session. Returns the raw token for
    /// the cookie; only its digest is stored.
    pub fn sign_in<B: AuthBackend>(
        &self,
        backend: &B,
        form: &SignInForm,
        now: DateTime<Utc>,
    ) -> Result<(String, Session), AuthError> {
        let email = normalize_email(&form.email);
        if email.is_empty() || form.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let Some(user) = backend.user_by_email(&email)? else {
            debug!(email, "sign-in for unknown account");
            return Err(AuthError::InvalidCredentials);
        };
        if !password::verify_password(&form.password, &user.password_hash) {
            warn!(user_id = user.id, "sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let (token, digest) = password::new_session_token();
        backend.insert_session(&digest, &user.id, now)?;

        let session = Session::from(&user);
        self.notify(AuthEvent::SignedIn {
            user_id: session.user_id.clone(),
            role: session.role,
        });
        Ok((token, session))
    }

    pub fn sign_out<B: AuthBackend>(&self, backend: &B, token: &str) -> Result<(), AuthError> {
        let digest = password::token_digest(token);
        let user = backend.session_user(&digest)?;
        backend.delete_session(&digest)?;
        if let Some(user) = user {
            self.notify(AuthEvent::SignedOut { user_id: user.id });
        }
        Ok(())
    }

    /// Resolves the session cookie, if any, into the request's auth state.
    pub fn resolve<B: AuthBackend>(
        &self,
        backend: &B,
        token: Option<&str>,
    ) -> Result<AuthState, AuthError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(AuthState::Unauthenticated);
        };
        match backend.session_user(&password::token_digest(token))? {
            Some(user) => Ok(AuthState::Authenticated(Session::from(&user))),
            None => Ok(AuthState::Unauthenticated),
        }
    }
}

/// Display names for `ids`. An id without an account stands for itself.
pub fn display_names<'a, B: AuthBackend>(
    backend: &B,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, String>, AuthError> {
    let mut names = HashMap::new();
    for id in ids {
        if names.contains_key(id) {
            continue;
        }
        let name = match backend.user(id)? {
            Some(user) => user.display_name(),
            None => id.to_string(),
        };
        names.insert(id.to_string(), name);
    }
    Ok(names)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
