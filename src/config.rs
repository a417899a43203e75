use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8980";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_PLATFORM_DOMAIN_SUFFIX: &str = "sandboxes.portside.dev";
const DEFAULT_SESSION_PROVIDER_MODE: &str = "remote";
const DEFAULT_SESSION_INTROSPECT_PATH: &str = "/v1/sessions/introspect";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

const MAX_DOMAIN_SUFFIX_LEN: usize = 253;
const MAX_DNS_LABEL_LEN: usize = 63;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub log_json: bool,
    pub platform_domain_suffix: String,
    pub session_provider_mode: String,
    pub session_provider_base_url: Option<String>,
    pub session_introspect_path: String,
    pub mock_sessions: Vec<(String, String)>,
    pub project_store_path: Option<PathBuf>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PORTSIDE_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid PORTSIDE_PLATFORM_DOMAIN_SUFFIX value '{value}': {reason}")]
    InvalidDomainSuffix { value: String, reason: &'static str },
    #[error("invalid PORTSIDE_SESSION_PROVIDER_MODE value '{value}': expected 'remote' or 'mock'")]
    InvalidSessionProviderMode { value: String },
    #[error("PORTSIDE_SESSION_PROVIDER_BASE_URL is required when the session provider mode is 'remote'")]
    MissingSessionProviderBaseUrl,
    #[error("invalid PORTSIDE_MOCK_SESSIONS entry '{value}': expected 'credential=user_id'")]
    InvalidMockSessionEntry { value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("PORTSIDE_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr_raw,
                source,
            })?;

        let log_filter = env::var("PORTSIDE_LOG_FILTER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_json = env::var("PORTSIDE_LOG_JSON")
            .ok()
            .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let platform_domain_suffix = env::var("PORTSIDE_PLATFORM_DOMAIN_SUFFIX")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLATFORM_DOMAIN_SUFFIX.to_string())
            .trim()
            .to_lowercase();
        validate_domain_suffix(&platform_domain_suffix)?;

        let session_provider_mode = env::var("PORTSIDE_SESSION_PROVIDER_MODE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_PROVIDER_MODE.to_string())
            .trim()
            .to_lowercase();

        if session_provider_mode != "remote" && session_provider_mode != "mock" {
            return Err(ConfigError::InvalidSessionProviderMode {
                value: session_provider_mode,
            });
        }

        let session_provider_base_url = env::var("PORTSIDE_SESSION_PROVIDER_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());

        if session_provider_mode == "remote" && session_provider_base_url.is_none() {
            return Err(ConfigError::MissingSessionProviderBaseUrl);
        }

        let session_introspect_path = env::var("PORTSIDE_SESSION_INTROSPECT_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_INTROSPECT_PATH.to_string());

        let mock_sessions = parse_mock_sessions(
            env::var("PORTSIDE_MOCK_SESSIONS").ok().unwrap_or_default(),
        )?;

        let project_store_path = env::var("PORTSIDE_PROJECT_STORE_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let request_timeout_seconds = env::var("PORTSIDE_REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
            .max(1);

        Ok(Self {
            bind_addr,
            log_filter,
            log_json,
            platform_domain_suffix,
            session_provider_mode,
            session_provider_base_url,
            session_introspect_path,
            mock_sessions,
            project_store_path,
            request_timeout_seconds,
        })
    }
}

#[cfg(test)]
impl Config {
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: "debug".to_string(),
            log_json: false,
            platform_domain_suffix: "sandboxes.portside.test".to_string(),
            session_provider_mode: "mock".to_string(),
            session_provider_base_url: None,
            session_introspect_path: DEFAULT_SESSION_INTROSPECT_PATH.to_string(),
            mock_sessions: Vec::new(),
            project_store_path: None,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

/// Rejects suffixes that could not appear as the tail of a sandbox hostname.
/// Checked once at startup; endpoint synthesis assumes a valid suffix.
pub fn validate_domain_suffix(suffix: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &'static str| ConfigError::InvalidDomainSuffix {
        value: suffix.to_string(),
        reason,
    };

    if suffix.is_empty() {
        return Err(invalid("suffix is empty"));
    }
    if suffix.len() > MAX_DOMAIN_SUFFIX_LEN {
        return Err(invalid("suffix exceeds 253 characters"));
    }

    for label in suffix.split('.') {
        if label.is_empty() {
            return Err(invalid("suffix contains an empty DNS label"));
        }
        if label.len() > MAX_DNS_LABEL_LEN {
            return Err(invalid("DNS label exceeds 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("DNS label starts or ends with a hyphen"));
        }
        if !label
            .chars()
            .all(|char| char.is_ascii_lowercase() || char.is_ascii_digit() || char == '-')
        {
            return Err(invalid("DNS label contains invalid characters"));
        }
    }

    Ok(())
}

fn parse_mock_sessions(raw: String) -> Result<Vec<(String, String)>, ConfigError> {
    let mut sessions = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((credential, user_id)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidMockSessionEntry {
                value: entry.to_string(),
            });
        };
        let credential = credential.trim();
        let user_id = user_id.trim();
        if credential.is_empty() || user_id.is_empty() {
            return Err(ConfigError::InvalidMockSessionEntry {
                value: entry.to_string(),
            });
        }
        sessions.push((credential.to_string(), user_id.to_string()));
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, parse_mock_sessions, validate_domain_suffix};

    #[test]
    fn accepts_conventional_domain_suffixes() {
        validate_domain_suffix("sandboxes.portside.dev").expect("valid suffix");
        validate_domain_suffix("internal").expect("single label is valid");
        validate_domain_suffix("eu-west-1.sandboxes.portside.dev").expect("valid suffix");
    }

    #[test]
    fn rejects_malformed_domain_suffixes() {
        for candidate in ["", "portside..dev", "-bad.dev", "bad-.dev", "up_case.dev"] {
            assert!(
                matches!(
                    validate_domain_suffix(candidate),
                    Err(ConfigError::InvalidDomainSuffix { .. })
                ),
                "expected rejection for suffix '{candidate}'"
            );
        }
    }

    #[test]
    fn parses_mock_session_entries() {
        let sessions =
            parse_mock_sessions("tok-alice=user_alice, tok-bob=user_bob".to_string())
                .expect("valid entries");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0], ("tok-alice".to_string(), "user_alice".to_string()));
    }

    #[test]
    fn rejects_mock_session_entries_without_user_id() {
        assert!(matches!(
            parse_mock_sessions("tok-alice".to_string()),
            Err(ConfigError::InvalidMockSessionEntry { .. })
        ));
    }
}
