pub mod access_gate;
pub mod authentication;

pub use access_gate::access_gate;
pub use authentication::{require_page_session, require_session, CurrentSession, SESSION_COOKIE};
