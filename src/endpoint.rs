use serde::Serialize;

use crate::config::Config;
use crate::project_store::ProjectDetail;

/// The single externally reachable address for a project's sandbox.
/// Recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub synthesized: bool,
}

/// Persisted-URL-first endpoint policy. Sandbox provisioning reports its
/// public address asynchronously; until it does, the orchestrator's naming
/// convention (`sandbox-{project_id}.{suffix}`) is deterministic, so the
/// synthesized address is the one the sandbox comes up on, not a placeholder.
#[derive(Debug, Clone)]
pub struct SandboxEndpointResolver {
    domain_suffix: String,
}

impl SandboxEndpointResolver {
    /// The suffix was validated when the `Config` was built; construction
    /// here cannot fail per request.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.platform_domain_suffix.clone())
    }

    #[must_use]
    pub fn new(domain_suffix: impl Into<String>) -> Self {
        Self {
            domain_suffix: domain_suffix.into(),
        }
    }

    #[must_use]
    pub fn resolve(&self, detail: &ProjectDetail) -> ResolvedEndpoint {
        let persisted = detail
            .sandboxes
            .first()
            .and_then(|sandbox| sandbox.public_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty());

        match persisted {
            Some(url) => ResolvedEndpoint {
                url: url.to_string(),
                synthesized: false,
            },
            None => ResolvedEndpoint {
                url: format!(
                    "https://sandbox-{}.{}",
                    detail.project.id, self.domain_suffix
                ),
                synthesized: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use url::Url;

    use crate::project_store::{ProjectRecord, SandboxRecord};

    use super::*;

    fn detail_with_sandbox_urls(urls: &[Option<&str>]) -> ProjectDetail {
        let now = Utc::now();
        let project = ProjectRecord {
            id: "proj_fixture01".to_string(),
            owner_user_id: "user_a".to_string(),
            name: "api".to_string(),
            created_at: now,
            updated_at: now,
        };
        let sandboxes = urls
            .iter()
            .enumerate()
            .map(|(index, url)| SandboxRecord {
                id: format!("sbx_{index}"),
                project_id: project.id.clone(),
                public_url: url.map(str::to_string),
                created_at: now + chrono::Duration::seconds(index as i64),
            })
            .collect();
        ProjectDetail {
            project,
            sandboxes,
            environments: Vec::new(),
        }
    }

    fn resolver() -> SandboxEndpointResolver {
        SandboxEndpointResolver::new("sandboxes.portside.test")
    }

    #[test]
    fn persisted_url_on_the_primary_sandbox_wins() {
        let detail =
            detail_with_sandbox_urls(&[Some("https://api-live.portside.dev"), None]);

        let endpoint = resolver().resolve(&detail);
        assert_eq!(endpoint.url, "https://api-live.portside.dev");
        assert!(!endpoint.synthesized);
    }

    #[test]
    fn missing_sandbox_synthesizes_the_conventional_address() {
        let detail = detail_with_sandbox_urls(&[]);

        let endpoint = resolver().resolve(&detail);
        assert_eq!(
            endpoint.url,
            "https://sandbox-proj_fixture01.sandboxes.portside.test"
        );
        assert!(endpoint.synthesized);
    }

    #[test]
    fn empty_persisted_url_falls_back_to_synthesis() {
        for urls in [vec![Some("")], vec![Some("   ")], vec![None]] {
            let detail = detail_with_sandbox_urls(&urls);
            let endpoint = resolver().resolve(&detail);
            assert!(endpoint.synthesized, "expected synthesis for {urls:?}");
            assert!(endpoint.url.contains(&detail.project.id));
        }
    }

    #[test]
    fn only_the_first_sandbox_is_consulted() {
        let detail = detail_with_sandbox_urls(&[None, Some("https://second.portside.dev")]);

        let endpoint = resolver().resolve(&detail);
        assert!(endpoint.synthesized);
    }

    #[test]
    fn synthesized_addresses_parse_as_https_urls() {
        let detail = detail_with_sandbox_urls(&[]);

        let endpoint = resolver().resolve(&detail);
        let parsed = Url::parse(&endpoint.url).expect("synthesized URL parses");
        assert_eq!(parsed.scheme(), "https");
    }
}
