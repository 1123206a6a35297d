use super::client::ApiClient;
use super::error::BackendError;
use crate::auth::{AuthError, Credentials, Principal, Role, SignInGrant, StaffProfile};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

const LOGIN_PATH: &str = "auth/login";
const FORGOT_PASSWORD_PATH: &str = "auth/forgot-password";
const CURRENT_USER_PATH: &str = "auth/me";

/// Sign-in operations the session context needs from the backend
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for identity, staff record and bearer token
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInGrant, AuthError>;

    /// Ask the backend to mail a password reset link
    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Re-read identity, staff record and role for an existing bearer token
    async fn current_user(&self, bearer: &str) -> Result<SignInGrant, AuthError>;
}

/// Wire shape of a successful `POST /auth/login`
#[derive(Debug, Deserialize)]
struct LoginPayload {
    user: Principal,
    #[serde(default)]
    staff: Option<StaffProfile>,
    token: String,
    #[serde(default)]
    role: Option<Role>,
}

impl From<LoginPayload> for SignInGrant {
    fn from(payload: LoginPayload) -> Self {
        Self {
            principal: payload.user,
            staff: payload.staff,
            bearer_token: payload.token,
            role: payload.role,
        }
    }
}

/// Wire shape of `GET /auth/me`
#[derive(Debug, Deserialize)]
struct CurrentUserPayload {
    user: Principal,
    #[serde(default)]
    staff: Option<StaffProfile>,
    #[serde(default)]
    role: Option<Role>,
}

fn map_sign_in_error(err: BackendError) -> AuthError {
    match err.status() {
        Some(400 | 401 | 403 | 404) => AuthError::InvalidCredentials,
        _ => AuthError::Backend(err.to_string()),
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignInGrant, AuthError> {
        let payload: LoginPayload = self
            .mutate(Method::POST, LOGIN_PATH, credentials, None)
            .await
            .map_err(map_sign_in_error)?;

        Ok(payload.into())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.mutate::<serde_json::Value, _>(
            Method::POST,
            FORGOT_PASSWORD_PATH,
            &json!({ "email": email }),
            None,
        )
        .await
        .map(|_| ())
        .map_err(|e| AuthError::Backend(e.to_string()))
    }

    async fn current_user(&self, bearer: &str) -> Result<SignInGrant, AuthError> {
        let payload: CurrentUserPayload = self
            .query(CURRENT_USER_PATH, &[] as &[(&str, &str)], Some(bearer))
            .await
            .map_err(map_sign_in_error)?;

        Ok(SignInGrant {
            principal: payload.user,
            staff: payload.staff,
            bearer_token: bearer.to_string(),
            role: payload.role,
        })
    }
}
