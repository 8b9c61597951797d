use crate::auth::Session;
use crate::model::Role;

/// Where a request stands with respect to authentication. A request starts
/// out `Loading` and is resolved once from its session cookie.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Loading,
    Unauthenticated,
    Authenticated(Session),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Auth has not resolved yet; show a neutral loading view.
    Pending,
    /// Not signed in. `from` is the location to return to after login.
    RedirectToLogin { from: String },
    /// Signed in but lacking a required role.
    RedirectToDashboard,
    Allow(Session),
}

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Decides whether `state` may see `requested`. `required_roles` of `None`
/// admits any signed-in user.
pub fn check(state: &AuthState, requested: &str, required_roles: Option<&[Role]>) -> Gate {
    match state {
        AuthState::Loading => Gate::Pending,
        AuthState::Unauthenticated => Gate::RedirectToLogin {
            from: requested.to_string(),
        },
        AuthState::Authenticated(session) => match required_roles {
            Some(roles) if !roles.contains(&session.role) => Gate::RedirectToDashboard,
            _ => Gate::Allow(session.clone()),
        },
    }
}

/// The roles a route needs, by path. Unknown paths need only a session.
pub fn required_roles(path: &str) -> Option<&'static [Role]> {
    const REVIEWERS: &[Role] = &[Role::Manager, Role::Admin];
    const ADMINS: &[Role] = &[Role::Admin];

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["directory", ..] => Some(REVIEWERS),
        ["employees", ..] => Some(ADMINS),
        ["leave", _, "review"] => Some(REVIEWERS),
        _ => None,
    }
}

/// `/login?from=...` for an unauthenticated request to `from`.
pub fn login_location(from: &str) -> String {
    if from.is_empty() || from == "/" {
        return LOGIN_PATH.to_string();
    }
    format!("{}?from={}", LOGIN_PATH, encode_component(from))
}

/// Where to send a user after signing in. Only local paths are honoured.
pub fn return_location(from: Option<&str>) -> &str {
    match from {
        Some(path) if is_local_path(path) => path,
        _ => DASHBOARD_PATH,
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.starts_with(LOGIN_PATH)
}

/// Percent-encodes a query value. `/` is kept so locations stay readable.
pub fn encode_component(s: &str) -> String {
    percent_encode(s, true)
}

/// Percent-encodes one path segment, `/` included.
pub fn encode_segment(s: &str) -> String {
    percent_encode(s, false)
}

fn percent_encode(s: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
