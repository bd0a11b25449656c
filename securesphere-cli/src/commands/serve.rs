//! HTTP server command

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use securesphere_server::db::{migrations, SessionRepo};
use securesphere_server::{ensure_admin, run_server, AppState, ServerConfig};

use super::{connect, load_config, load_questionnaire};

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Questionnaire CSV (overrides config)
    #[arg(long)]
    pub questionnaire: Option<PathBuf>,

    /// Skip applying the schema at startup
    #[arg(long)]
    pub no_migrate: bool,
}

pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(path) = args.questionnaire {
        config.questionnaire_path = path;
    }
    config.cors_permissive |= args.cors_permissive;

    let questionnaire = load_questionnaire(&config.questionnaire_path)?;
    let pool = connect(&config).await?;

    if !args.no_migrate {
        migrations::run(&pool).await.context("failed to apply schema")?;
    }
    if let Some(admin) = &config.bootstrap_admin {
        ensure_admin(&pool, admin)
            .await
            .context("failed to create bootstrap admin")?;
    }
    let purged = SessionRepo::new(&pool)
        .purge_expired()
        .await
        .context("failed to purge expired sessions")?;
    tracing::debug!(purged, "expired sessions removed");

    tracing::info!("Starting securesphere server on {}", config.bind);
    let server_config = ServerConfig::from(&config);
    run_server(AppState::new(pool, questionnaire, config), server_config)
        .await
        .context("Server error")?;

    Ok(())
}
