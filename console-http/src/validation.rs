use labdesk::access::{is_public, ROOT};
use thiserror::Error;

const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Nothing to update")]
    EmptyUpdate,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    if local.is_empty() || domain.is_empty() || email.len() > MAX_EMAIL_LEN || email.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }
    Ok(())
}

/// Post-login destination. Only local, non-public paths are honoured;
/// anything else lands on the dashboard.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') && !is_public(path) => {
            path.to_string()
        }
        _ => ROOT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@lab.example").is_ok());
        assert_eq!(validate_email(""), Err(ValidationError::MissingField("email")));
        assert_eq!(validate_email("no-at-sign"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("@lab.example"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("a b@lab.example"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_validate_credentials_requires_password() {
        assert_eq!(
            validate_credentials("owner@lab.example", ""),
            Err(ValidationError::MissingField("password"))
        );
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/packages/new")), "/packages/new");
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/signin")), "/");
    }
}
