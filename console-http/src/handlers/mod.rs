pub mod auth;
pub mod health;
pub mod navigation;
pub mod pages;
pub mod proxy;

pub use auth::{
    access_denied, current_session, login, logout, refresh_session, request_password_reset,
    reset_password_page, signin_page, update_user,
};
pub use health::health_check;
pub use navigation::navigation;
pub use pages::render_page;
pub use proxy::forward;
