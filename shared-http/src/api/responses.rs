use chrono::{DateTime, TimeZone, Utc};
use labdesk::access::{Icon, NavItem, NavTarget, PermittedSet, SubItem};
use labdesk::auth::{Principal, Role, Session, StaffProfile};
use serde::Serialize;

/// Response body for a successful sign-in
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// The console session token (also set as a cookie)
    pub token: String,
    /// Session expiration time in seconds from now
    pub expires_in: u64,
    pub role: Role,
    pub principal: Principal,
    /// Where the browser should go next
    pub redirect: String,
}

/// Response body for logout
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

fn to_datetime(timestamp_ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .unwrap_or_default()
}

/// The session as the console front end sees it. The backend bearer token
/// never leaves the server.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub principal: Principal,
    pub staff: Option<StaffProfile>,
    pub role: Role,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            principal: session.principal.clone(),
            staff: session.staff.clone(),
            role: session.access.role,
            permissions: session.access.permissions.iter().map(str::to_string).collect(),
            created_at: to_datetime(session.created_at),
            last_accessed: to_datetime(session.last_accessed),
            expires_at: to_datetime(session.expires_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubItemResponse {
    pub label: String,
    pub path: String,
}

impl From<&SubItem> for SubItemResponse {
    fn from(sub: &SubItem) -> Self {
        Self {
            label: sub.label.clone(),
            path: sub.path.clone(),
        }
    }
}

/// One sidebar entry: either a link or an expandable group
#[derive(Debug, Serialize)]
pub struct NavItemResponse {
    pub label: String,
    pub icon: Icon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<SubItemResponse>,
}

impl From<&NavItem> for NavItemResponse {
    fn from(item: &NavItem) -> Self {
        let (path, sub_items) = match &item.target {
            NavTarget::Path(path) => (Some(path.clone()), Vec::new()),
            NavTarget::SubItems(subs) => (None, subs.iter().map(SubItemResponse::from).collect()),
        };

        Self {
            label: item.label.clone(),
            icon: item.icon,
            path,
            sub_items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub items: Vec<NavItemResponse>,
    pub allow_list: Vec<String>,
}

impl From<&PermittedSet<'_>> for NavigationResponse {
    fn from(permitted: &PermittedSet<'_>) -> Self {
        Self {
            items: permitted.items().iter().copied().map(NavItemResponse::from).collect(),
            allow_list: permitted.allow_list().into_iter().map(str::to_string).collect(),
        }
    }
}

/// Shell of a console page: enough for the front end to render chrome
/// around the page content it fetches through the data proxy.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub route: String,
    pub title: String,
    pub principal: Principal,
    pub role: Role,
    pub navigation: NavigationResponse,
}

/// Shell of a page reachable without a session (sign-in, reset, denial)
#[derive(Debug, Serialize)]
pub struct PublicPageResponse {
    pub route: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl PublicPageResponse {
    pub fn new(route: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            title: title.into(),
            next: None,
        }
    }
}
