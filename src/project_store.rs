use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Persistence { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRecord {
    pub id: String,
    pub project_id: String,
    pub public_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarRecord {
    pub project_id: String,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The exact shape the authorizer fetches in one round trip: the project row
/// plus its sandboxes (creation order) and environment variables (key order).
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: ProjectRecord,
    pub sandboxes: Vec<SandboxRecord>,
    pub environments: Vec<EnvVarRecord>,
}

#[derive(Debug, Clone)]
pub struct CreateProjectInput {
    pub owner_user_id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AddSandboxInput {
    pub project_id: String,
    pub public_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// External relational collaborator, narrowed to the two reads the
/// authorization core performs. No retries live behind this trait; a failed
/// call fails the request that issued it.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find_project_detail(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectDetail>, StoreError>;

    async fn list_projects_for_owner(
        &self,
        owner_user_id: &str,
    ) -> Result<Vec<ProjectRecord>, StoreError>;
}

/// In-memory stand-in for the relational store, optionally persisted to a
/// JSON file across restarts. Writes exist for seeding and tests; the web
/// surfaces themselves only read.
#[derive(Clone)]
pub struct MemoryProjectStore {
    state: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreState {
    projects: HashMap<String, ProjectRecord>,
    sandboxes: HashMap<String, SandboxRecord>,
    env_vars: Vec<EnvVarRecord>,
}

impl MemoryProjectStore {
    pub fn from_config(config: &Config) -> Self {
        Self::with_path(config.project_store_path.clone())
    }

    #[must_use]
    pub fn with_path(path: Option<PathBuf>) -> Self {
        let state = load_state(path.as_deref());
        Self {
            state: Arc::new(RwLock::new(state)),
            path,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    pub async fn create_project(
        &self,
        input: CreateProjectInput,
    ) -> Result<ProjectRecord, StoreError> {
        let owner_user_id = normalize_non_empty(&input.owner_user_id, "owner_user_id")?;
        let name = normalize_non_empty(&input.name, "name")?;

        self.mutate(|state| {
            let now = input.created_at.unwrap_or_else(Utc::now);
            let record = ProjectRecord {
                id: format!("proj_{}", Uuid::new_v4().simple()),
                owner_user_id,
                name,
                created_at: now,
                updated_at: now,
            };
            state.projects.insert(record.id.clone(), record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn add_sandbox(
        &self,
        input: AddSandboxInput,
    ) -> Result<SandboxRecord, StoreError> {
        let project_id = normalize_non_empty(&input.project_id, "project_id")?;
        let public_url = match input.public_url.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(validate_public_url(raw)?),
            _ => None,
        };

        self.mutate(|state| {
            if !state.projects.contains_key(&project_id) {
                return Err(StoreError::NotFound);
            }

            let record = SandboxRecord {
                id: format!("sbx_{}", Uuid::new_v4().simple()),
                project_id: project_id.clone(),
                public_url: public_url.clone(),
                created_at: input.created_at.unwrap_or_else(Utc::now),
            };
            state.sandboxes.insert(record.id.clone(), record.clone());
            Ok(record)
        })
        .await
    }

    pub async fn set_env_var(
        &self,
        project_id: &str,
        key: &str,
        value: &str,
    ) -> Result<EnvVarRecord, StoreError> {
        let project_id = normalize_non_empty(project_id, "project_id")?;
        let key = normalize_non_empty(key, "key")?;
        let value = value.to_string();

        self.mutate(|state| {
            if !state.projects.contains_key(&project_id) {
                return Err(StoreError::NotFound);
            }

            let now = Utc::now();
            if let Some(existing) = state
                .env_vars
                .iter_mut()
                .find(|record| record.project_id == project_id && record.key == key)
            {
                existing.value = value;
                existing.updated_at = now;
                return Ok(existing.clone());
            }

            let record = EnvVarRecord {
                project_id,
                key,
                value,
                created_at: now,
                updated_at: now,
            };
            state.env_vars.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let (result, snapshot) = {
            let mut state = self.state.write().await;
            let result = apply(&mut state)?;
            (result, state.clone())
        };
        self.persist(&snapshot).await?;
        Ok(result)
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| StoreError::Persistence {
                    message: format!("failed to prepare project store directory: {error}"),
                })?;
        }

        let payload = serde_json::to_vec(state).map_err(|error| StoreError::Persistence {
            message: format!("failed to encode project store payload: {error}"),
        })?;
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|error| StoreError::Persistence {
                message: format!("failed to write project store payload: {error}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|error| StoreError::Persistence {
                message: format!("failed to finalize project store payload: {error}"),
            })?;

        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn find_project_detail(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectDetail>, StoreError> {
        let state = self.state.read().await;
        let Some(project) = state.projects.get(project_id).cloned() else {
            return Ok(None);
        };

        let mut sandboxes: Vec<SandboxRecord> = state
            .sandboxes
            .values()
            .filter(|record| record.project_id == project.id)
            .cloned()
            .collect();
        sandboxes.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        let mut environments: Vec<EnvVarRecord> = state
            .env_vars
            .iter()
            .filter(|record| record.project_id == project.id)
            .cloned()
            .collect();
        environments.sort_by(|left, right| left.key.cmp(&right.key));

        Ok(Some(ProjectDetail {
            project,
            sandboxes,
            environments,
        }))
    }

    async fn list_projects_for_owner(
        &self,
        owner_user_id: &str,
    ) -> Result<Vec<ProjectRecord>, StoreError> {
        let state = self.state.read().await;
        let mut projects: Vec<ProjectRecord> = state
            .projects
            .values()
            .filter(|record| record.owner_user_id == owner_user_id)
            .cloned()
            .collect();
        // Newest first is a user-facing contract for every listing surface.
        projects.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        Ok(projects)
    }
}

fn load_state(path: Option<&std::path::Path>) -> StoreState {
    let Some(path) = path else {
        return StoreState::default();
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return StoreState::default();
        }
        Err(error) => {
            tracing::warn!(
                target: "portside.store",
                path = %path.display(),
                error = %error,
                "failed to read project store; booting with empty state",
            );
            return StoreState::default();
        }
    };

    match serde_json::from_str::<StoreState>(&raw) {
        Ok(state) => state,
        Err(error) => {
            tracing::warn!(
                target: "portside.store",
                path = %path.display(),
                error = %error,
                "failed to parse project store; booting with empty state",
            );
            StoreState::default()
        }
    }
}

fn normalize_non_empty(value: &str, field: &'static str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation {
            field,
            message: "value must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_public_url(raw: &str) -> Result<String, StoreError> {
    let parsed = Url::parse(raw).map_err(|error| StoreError::Validation {
        field: "public_url",
        message: format!("not a valid URL: {error}"),
    })?;

    if parsed.scheme() != "https" {
        return Err(StoreError::Validation {
            field: "public_url",
            message: "sandbox addresses must use https".to_string(),
        });
    }
    if parsed.host_str().is_none() {
        return Err(StoreError::Validation {
            field: "public_url",
            message: "sandbox addresses must carry a host".to_string(),
        });
    }

    Ok(raw.to_string())
}
