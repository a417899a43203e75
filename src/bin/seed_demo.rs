//! Seeds a project store file with demo data so the web service has
//! something to render locally without the real relational collaborator.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use portside_web_service::project_store::{
    AddSandboxInput, CreateProjectInput, MemoryProjectStore,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portside-seed-demo")]
#[command(about = "Seed a Portside project store file with demo projects")]
struct Cli {
    /// Destination store file; also read by the service via
    /// PORTSIDE_PROJECT_STORE_PATH.
    #[arg(long)]
    store_path: PathBuf,

    /// Owner user id the demo projects belong to.
    #[arg(long, default_value = "user_demo")]
    owner: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new("info").unwrap_or_default())
        .init();

    let cli = Cli::parse();
    let store = MemoryProjectStore::with_path(Some(cli.store_path.clone()));

    let api = store
        .create_project(CreateProjectInput {
            owner_user_id: cli.owner.clone(),
            name: "demo-api".to_string(),
            created_at: None,
        })
        .await
        .context("failed to create demo-api project")?;
    store
        .add_sandbox(AddSandboxInput {
            project_id: api.id.clone(),
            public_url: Some("https://demo-api.portside.dev".to_string()),
            created_at: None,
        })
        .await
        .context("failed to add demo-api sandbox")?;
    store
        .set_env_var(&api.id, "DATABASE_URL", "postgres://localhost:5432/demo")
        .await
        .context("failed to set demo-api env var")?;

    let site = store
        .create_project(CreateProjectInput {
            owner_user_id: cli.owner.clone(),
            name: "demo-site".to_string(),
            created_at: None,
        })
        .await
        .context("failed to create demo-site project")?;
    // No public URL: the service synthesizes this project's sandbox address.
    store
        .add_sandbox(AddSandboxInput {
            project_id: site.id.clone(),
            public_url: None,
            created_at: None,
        })
        .await
        .context("failed to add demo-site sandbox")?;

    tracing::info!(
        target: "portside.seed",
        store_path = %cli.store_path.display(),
        owner = cli.owner.as_str(),
        projects = 2,
        "seeded demo project store",
    );
    Ok(())
}
