//! Lab REST backend: typed query/mutate calls, raw forwarding, and the
//! sign-in port the session context depends on.

pub mod client;
pub mod error;
pub mod ports;

pub use client::{ApiClient, ForwardedResponse};
pub use error::BackendError;
pub use ports::AuthBackend;
