use std::sync::Arc;

use crate::identity::Identity;
use crate::project_store::{ProjectDetail, ProjectRecord, ProjectStore, StoreError};

/// Three-way gate for project-scoped surfaces. `NotFound` covers both a
/// missing id and a project owned by someone else; callers cannot tell the
/// difference, so foreign ids leak nothing about project existence.
#[derive(Debug, Clone)]
pub enum AuthorizationOutcome {
    Authorized(ProjectDetail),
    NotFound,
    Unauthenticated,
}

#[derive(Debug, Clone)]
pub enum ProjectListing {
    Projects(Vec<ProjectRecord>),
    RedirectRequired,
}

#[derive(Clone)]
pub struct ProjectAccess {
    store: Arc<dyn ProjectStore>,
}

impl ProjectAccess {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// One store round trip, fetching the project together with its sandboxes
    /// and environment variables. Anonymous callers are rejected before the
    /// store is consulted. Store failure propagates; it is never retried.
    pub async fn authorize(
        &self,
        identity: &Identity,
        project_id: &str,
    ) -> Result<AuthorizationOutcome, StoreError> {
        let Identity::Authenticated { user_id } = identity else {
            return Ok(AuthorizationOutcome::Unauthenticated);
        };

        let Some(detail) = self.store.find_project_detail(project_id).await? else {
            tracing::debug!(
                target: "portside.access",
                project_id,
                "project lookup missed",
            );
            return Ok(AuthorizationOutcome::NotFound);
        };

        if detail.project.owner_user_id != *user_id {
            tracing::debug!(
                target: "portside.access",
                project_id,
                user_id = user_id.as_str(),
                "ownership mismatch reported as not found",
            );
            return Ok(AuthorizationOutcome::NotFound);
        }

        Ok(AuthorizationOutcome::Authorized(detail))
    }

    /// Listing gate for sidebar/settings contexts: anonymous callers are told
    /// to go to login; owners get their projects newest first.
    pub async fn list(&self, identity: &Identity) -> Result<ProjectListing, StoreError> {
        let Identity::Authenticated { user_id } = identity else {
            return Ok(ProjectListing::RedirectRequired);
        };

        let projects = self.store.list_projects_for_owner(user_id).await?;
        Ok(ProjectListing::Projects(projects))
    }
}

#[cfg(test)]
mod tests {
    use crate::project_store::{AddSandboxInput, CreateProjectInput, MemoryProjectStore};

    use super::*;

    async fn seeded() -> (ProjectAccess, ProjectRecord, ProjectRecord) {
        let store = MemoryProjectStore::in_memory();
        let mine = store
            .create_project(CreateProjectInput {
                owner_user_id: "user_a".to_string(),
                name: "api".to_string(),
                created_at: None,
            })
            .await
            .expect("create");
        let theirs = store
            .create_project(CreateProjectInput {
                owner_user_id: "user_b".to_string(),
                name: "site".to_string(),
                created_at: None,
            })
            .await
            .expect("create");
        (ProjectAccess::new(Arc::new(store)), mine, theirs)
    }

    fn user(user_id: &str) -> Identity {
        Identity::Authenticated {
            user_id: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn anonymous_is_unauthenticated_for_existing_and_missing_projects() {
        let (access, mine, _theirs) = seeded().await;

        for project_id in [mine.id.as_str(), "proj_missing"] {
            let outcome = access
                .authorize(&Identity::Anonymous, project_id)
                .await
                .expect("authorize");
            assert!(matches!(outcome, AuthorizationOutcome::Unauthenticated));
        }
    }

    #[tokio::test]
    async fn foreign_project_is_indistinguishable_from_missing() {
        let (access, _mine, theirs) = seeded().await;

        let foreign = access
            .authorize(&user("user_a"), &theirs.id)
            .await
            .expect("authorize");
        let missing = access
            .authorize(&user("user_a"), "proj_missing")
            .await
            .expect("authorize");

        assert!(matches!(foreign, AuthorizationOutcome::NotFound));
        assert!(matches!(missing, AuthorizationOutcome::NotFound));
    }

    #[tokio::test]
    async fn owner_is_authorized_with_related_collections() {
        let store = MemoryProjectStore::in_memory();
        let project = store
            .create_project(CreateProjectInput {
                owner_user_id: "user_a".to_string(),
                name: "api".to_string(),
                created_at: None,
            })
            .await
            .expect("create");
        store
            .add_sandbox(AddSandboxInput {
                project_id: project.id.clone(),
                public_url: None,
                created_at: None,
            })
            .await
            .expect("sandbox");
        store
            .set_env_var(&project.id, "DATABASE_URL", "postgres://db")
            .await
            .expect("env var");
        let access = ProjectAccess::new(Arc::new(store));

        let outcome = access
            .authorize(&user("user_a"), &project.id)
            .await
            .expect("authorize");
        let AuthorizationOutcome::Authorized(detail) = outcome else {
            panic!("expected authorized outcome");
        };
        assert_eq!(detail.project.id, project.id);
        assert_eq!(detail.sandboxes.len(), 1);
        assert_eq!(detail.environments.len(), 1);
    }

    #[tokio::test]
    async fn anonymous_listing_requires_redirect() {
        let (access, _mine, _theirs) = seeded().await;

        let listing = access.list(&Identity::Anonymous).await.expect("list");
        assert!(matches!(listing, ProjectListing::RedirectRequired));
    }

    #[tokio::test]
    async fn listing_only_returns_the_callers_projects() {
        let (access, mine, _theirs) = seeded().await;

        let listing = access.list(&user("user_a")).await.expect("list");
        let ProjectListing::Projects(projects) = listing else {
            panic!("expected project list");
        };
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, mine.id);
    }
}
