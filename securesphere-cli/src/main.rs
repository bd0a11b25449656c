//! securesphere CLI - run the assessment API and administer it
//!
//! - `serve`: HTTP API (migrates and bootstraps the admin first)
//! - `migrate`: create or update the schema
//! - `admin create`: add a superuser
//! - `questionnaire show|check`: inspect the catalog CSV
//! - `score`: score an answers file offline

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "securesphere",
    author,
    version,
    about = "Security maturity assessments: questionnaire, review workflow and scoring"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.securesphere/config.toml)
    #[arg(long, short = 'c', global = true, env = "SECURESPHERE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply the database schema
    Migrate(commands::migrate::MigrateArgs),
    /// Account administration
    Admin(commands::admin::AdminArgs),
    /// Inspect the questionnaire catalog
    Questionnaire(commands::questionnaire::QuestionnaireArgs),
    /// Score a JSON file of answers against the catalog
    Score(commands::score::ScoreArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config).await?,
        Commands::Migrate(args) => commands::run_migrate(args, config).await?,
        Commands::Admin(args) => commands::run_admin(args, config).await?,
        Commands::Questionnaire(args) => commands::run_questionnaire(args, config)?,
        Commands::Score(args) => commands::run_score(args, config)?,
        Commands::Completions(args) => run_completions(args),
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
