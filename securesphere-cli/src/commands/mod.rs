//! Command implementations for the securesphere CLI

pub mod admin;
pub mod migrate;
pub mod questionnaire;
pub mod score;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use securesphere_core::{Questionnaire, SphereConfig};
use securesphere_server::db::{create_pool_with_options, PgPool};

pub use admin::run_admin;
pub use migrate::run_migrate;
pub use questionnaire::run_questionnaire;
pub use score::run_score;
pub use serve::run_serve;

/// Config from `--config`, the default file, or built-in defaults, with
/// environment overrides applied.
pub(crate) fn load_config(path: Option<&Path>) -> Result<SphereConfig> {
    SphereConfig::load(path).context("failed to load configuration")
}

pub(crate) fn load_questionnaire(path: &Path) -> Result<Questionnaire> {
    Questionnaire::from_path(path)
        .with_context(|| format!("failed to load questionnaire {}", path.display()))
}

pub(crate) async fn connect(config: &SphereConfig) -> Result<PgPool> {
    create_pool_with_options(&config.database_url, config.max_connections)
        .await
        .context("failed to connect to the database")
}
