//! Account administration commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use securesphere_server::create_admin;
use securesphere_server::db::migrations;

use super::{connect, load_config};

#[derive(Parser, Debug)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommands,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Create a superuser account
    Create(CreateArgs),
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Login name
    #[arg(long)]
    pub username: String,

    /// Email address
    #[arg(long)]
    pub email: String,

    /// Password (8+ characters with upper, lower and digit)
    #[arg(long, env = "SECURESPHERE_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run_admin(args: AdminArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        AdminCommands::Create(args) => run_create(args, config_path).await,
    }
}

async fn run_create(args: CreateArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let pool = connect(&config).await?;
    migrations::run(&pool).await.context("failed to apply schema")?;

    let user = create_admin(&pool, &args.username, &args.email, &args.password)
        .await
        .with_context(|| format!("failed to create superuser '{}'", args.username))?;
    println!("Created superuser {} ({})", user.username, user.id);
    Ok(())
}
