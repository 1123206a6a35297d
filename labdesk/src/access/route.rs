/// Landing page of the console shell.
pub const ROOT: &str = "/";
pub const SIGN_IN: &str = "/signin";
pub const RESET_PASSWORD: &str = "/reset-password";
pub const ACCESS_DENIED: &str = "/access-denied";

/// Paths reachable without a session.
const PUBLIC_ROUTES: [&str; 3] = [SIGN_IN, RESET_PASSWORD, ACCESS_DENIED];

/// Strip query/fragment and trailing slashes; keep `/` for the root.
pub fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');

    if trimmed.is_empty() { ROOT } else { trimmed }
}

/// Segment-aware prefix match.
///
/// `/packages` matches `/packages` and `/packages/12` but not
/// `/packages-archive`. The root prefix matches only the root itself,
/// otherwise it would admit every path.
pub fn matches_prefix(prefix: &str, path: &str) -> bool {
    let prefix = normalize_path(prefix);
    let path = normalize_path(path);

    if prefix == ROOT {
        return path == ROOT;
    }

    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_ROUTES
        .iter()
        .any(|public| matches_prefix(public, path))
}
