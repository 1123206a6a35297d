//! Navigation catalog and the access gate that filters it per session.

pub mod catalog;
pub mod gate;
pub mod route;

pub use catalog::{default_catalog, Catalog, Icon, NavItem, NavTarget, SubItem};
pub use gate::{AccessGate, GateDecision, GateState, GateTracker, PermittedSet};
pub use route::{is_public, matches_prefix, normalize_path, ACCESS_DENIED, RESET_PASSWORD, ROOT, SIGN_IN};
