use std::str::FromStr;
use tracing::warn;

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub backend_url: String,
    pub backend_timeout_secs: u64,
    pub data_dir: String,
    pub session_ttl_secs: u64,
    pub max_sessions: Option<u64>,
    pub legacy_owner_inference: bool,
    pub cookie_secure: bool,
    pub allowed_origins: Vec<String>,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";
    const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

    pub fn from_env() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` is the
    /// process-environment flavour of this.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let legacy_owner_inference =
            parse_bool(&lookup, "LABDESK_LEGACY_OWNER_INFERENCE").unwrap_or(true);
        if legacy_owner_inference {
            warn!(
                "Legacy owner inference is enabled: staff records without permissions are treated as owners"
            );
        }

        Self {
            host: lookup("LABDESK_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or(&lookup, "LABDESK_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            backend_url: lookup("LABDESK_BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_BACKEND_URL.to_string()),
            backend_timeout_secs: parse_or(
                &lookup,
                "LABDESK_BACKEND_TIMEOUT_SECS",
                Self::DEFAULT_BACKEND_TIMEOUT_SECS,
            ),
            data_dir: lookup("LABDESK_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            session_ttl_secs: parse_or(
                &lookup,
                "LABDESK_SESSION_TTL_SECS",
                Self::DEFAULT_SESSION_TTL_SECS,
            ),
            max_sessions: lookup("LABDESK_MAX_SESSIONS").and_then(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| warn!("Ignoring invalid LABDESK_MAX_SESSIONS value '{}'", raw))
                    .ok()
            }),
            legacy_owner_inference,
            cookie_secure: parse_bool(&lookup, "LABDESK_COOKIE_SECURE").unwrap_or(false),
            allowed_origins: lookup("LABDESK_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default {}", raw, key, default);
            default
        }),
        None => default,
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Invalid boolean '{}' for {}", raw, key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.backend_url, "http://localhost:4000");
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.max_sessions, None);
        assert!(config.legacy_owner_inference);
        assert!(!config.cookie_secure);
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("LABDESK_HTTP_PORT", "9090"),
            ("LABDESK_BACKEND_URL", "https://api.lab.example/"),
            ("LABDESK_SESSION_TTL_SECS", "60"),
            ("LABDESK_MAX_SESSIONS", "500"),
            ("LABDESK_LEGACY_OWNER_INFERENCE", "off"),
            ("LABDESK_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]);

        assert_eq!(config.http_port, 9090);
        assert_eq!(config.backend_url, "https://api.lab.example");
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.max_sessions, Some(500));
        assert!(!config.legacy_owner_inference);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("LABDESK_HTTP_PORT", "not-a-port"),
            ("LABDESK_MAX_SESSIONS", "lots"),
            ("LABDESK_COOKIE_SECURE", "maybe"),
        ]);

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.max_sessions, None);
        assert!(!config.cookie_secure);
    }
}
