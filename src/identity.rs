use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::Config;

/// The authenticated-or-anonymous result of resolving a request's session
/// credential. Produced once per request and threaded through every
/// project-scoped decision; never persisted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated { user_id: String },
    Anonymous,
}

impl Identity {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated { user_id } => Some(user_id),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{message}")]
    Provider { message: String },
}

/// External identity collaborator. An unknown, expired, or malformed
/// credential is `Ok(None)`; `Err` is reserved for transport failure, which
/// is fatal for the request it occurs on.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve_credential(&self, credential: &str)
        -> Result<Option<String>, IdentityError>;

    fn name(&self) -> &'static str;
}

/// Per-request resolution input. Built explicitly from the inbound request
/// (no ambient globals) so the provider can be substituted in tests. The
/// memo cell guarantees the provider is contacted at most once per request
/// no matter how many call sites ask for the identity.
pub struct RequestContext {
    credential: Option<String>,
    resolved: OnceCell<Identity>,
}

impl RequestContext {
    #[must_use]
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            resolved: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None)
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn SessionProvider>,
}

impl IdentityResolver {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: provider_from_config(config),
        }
    }

    pub fn with_provider(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Absent or unrecognized credentials resolve to `Anonymous`; only
    /// provider transport failure is an error. Idempotent within one
    /// `RequestContext`.
    pub async fn resolve(&self, context: &RequestContext) -> Result<Identity, IdentityError> {
        let identity = context
            .resolved
            .get_or_try_init(|| async {
                let credential = context
                    .credential
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty());
                let Some(credential) = credential else {
                    return Ok(Identity::Anonymous);
                };

                match self.provider.resolve_credential(credential).await? {
                    Some(user_id) => Ok(Identity::Authenticated { user_id }),
                    None => Ok(Identity::Anonymous),
                }
            })
            .await?;

        Ok(identity.clone())
    }
}

fn provider_from_config(config: &Config) -> Arc<dyn SessionProvider> {
    match config.session_provider_mode.as_str() {
        "mock" => Arc::new(MockSessionProvider::new(
            config.mock_sessions.iter().cloned().collect(),
        )),
        _ => match config.session_provider_base_url.as_deref() {
            Some(base_url) => Arc::new(RemoteSessionProvider::new(
                base_url,
                &config.session_introspect_path,
            )),
            // Config::from_env refuses this combination; reaching it means a
            // hand-built Config, and every resolve reports the misconfiguration.
            None => Arc::new(UnavailableSessionProvider {
                message: "session provider base URL is not configured".to_string(),
            }),
        },
    }
}

/// Credential table for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct MockSessionProvider {
    sessions: HashMap<String, String>,
}

impl MockSessionProvider {
    #[must_use]
    pub fn new(sessions: HashMap<String, String>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn resolve_credential(
        &self,
        credential: &str,
    ) -> Result<Option<String>, IdentityError> {
        Ok(self.sessions.get(credential).cloned())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Introspects credentials against the identity collaborator over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteSessionProvider {
    introspect_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IntrospectResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    user_id: Option<String>,
}

impl RemoteSessionProvider {
    #[must_use]
    pub fn new(base_url: &str, introspect_path: &str) -> Self {
        let path = if introspect_path.starts_with('/') {
            introspect_path.to_string()
        } else {
            format!("/{introspect_path}")
        };

        Self {
            introspect_url: format!("{}{}", base_url.trim_end_matches('/'), path),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SessionProvider for RemoteSessionProvider {
    async fn resolve_credential(
        &self,
        credential: &str,
    ) -> Result<Option<String>, IdentityError> {
        let response = self
            .http
            .post(&self.introspect_url)
            .json(&serde_json::json!({ "credential": credential }))
            .send()
            .await
            .map_err(|error| IdentityError::Provider {
                message: format!("session introspection request failed: {error}"),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::Provider {
                message: format!("session introspection returned status {status}"),
            });
        }

        let payload: IntrospectResponse =
            response
                .json()
                .await
                .map_err(|error| IdentityError::Provider {
                    message: format!("session introspection payload was unreadable: {error}"),
                })?;

        if !payload.active {
            return Ok(None);
        }

        Ok(payload.user_id.filter(|value| !value.trim().is_empty()))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[derive(Debug, Clone)]
struct UnavailableSessionProvider {
    message: String,
}

#[async_trait]
impl SessionProvider for UnavailableSessionProvider {
    async fn resolve_credential(
        &self,
        _credential: &str,
    ) -> Result<Option<String>, IdentityError> {
        Err(IdentityError::Provider {
            message: self.message.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingProvider {
        inner: MockSessionProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn resolve_credential(
            &self,
            credential: &str,
        ) -> Result<Option<String>, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve_credential(credential).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn counting_resolver(sessions: &[(&str, &str)]) -> (IdentityResolver, Arc<CountingProvider>) {
        let sessions = sessions
            .iter()
            .map(|(credential, user_id)| (credential.to_string(), user_id.to_string()))
            .collect();
        let provider = Arc::new(CountingProvider {
            inner: MockSessionProvider::new(sessions),
            calls: AtomicUsize::new(0),
        });
        (IdentityResolver::with_provider(provider.clone()), provider)
    }

    #[tokio::test]
    async fn missing_credential_resolves_to_anonymous_without_provider_call() {
        let (resolver, provider) = counting_resolver(&[("tok-alice", "user_alice")]);
        let context = RequestContext::anonymous();

        let identity = resolver.resolve(&context).await.expect("resolve");
        assert!(identity.is_anonymous());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_credential_resolves_to_anonymous_not_error() {
        let (resolver, _provider) = counting_resolver(&[("tok-alice", "user_alice")]);
        let context = RequestContext::new(Some("tok-nobody".to_string()));

        let identity = resolver.resolve(&context).await.expect("resolve");
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn repeated_resolution_contacts_the_provider_once() {
        let (resolver, provider) = counting_resolver(&[("tok-alice", "user_alice")]);
        let context = RequestContext::new(Some("tok-alice".to_string()));

        let first = resolver.resolve(&context).await.expect("first resolve");
        let second = resolver.resolve(&context).await.expect("second resolve");

        assert_eq!(first, second);
        assert_eq!(first.user_id(), Some("user_alice"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn whitespace_credential_is_treated_as_absent() {
        let (resolver, provider) = counting_resolver(&[]);
        let context = RequestContext::new(Some("   ".to_string()));

        let identity = resolver.resolve(&context).await.expect("resolve");
        assert!(identity.is_anonymous());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
