//! Schema migration command

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use securesphere_server::db::migrations;

use super::{connect, load_config};

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    let pool = connect(&config).await?;
    migrations::run(&pool).await.context("failed to apply schema")?;
    println!("Schema is up to date");
    Ok(())
}
