//! Questionnaire catalog inspection

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::{load_config, load_questionnaire};

#[derive(Parser, Debug)]
pub struct QuestionnaireArgs {
    #[command(subcommand)]
    pub command: QuestionnaireCommands,
}

#[derive(Subcommand, Debug)]
pub enum QuestionnaireCommands {
    /// Print sections, questions and options
    Show(ShowArgs),
    /// Parse the catalog and report its size
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Catalog CSV (default: questionnaire_path from config)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Output JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Catalog CSV (default: questionnaire_path from config)
    pub path: Option<PathBuf>,
}

pub fn run_questionnaire(args: QuestionnaireArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        QuestionnaireCommands::Show(args) => run_show(args, config_path),
        QuestionnaireCommands::Check(args) => run_check(args, config_path),
    }
}

fn catalog_path(explicit: Option<PathBuf>, config_path: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(load_config(config_path)?.questionnaire_path),
    }
}

fn run_show(args: ShowArgs, config_path: Option<&Path>) -> Result<()> {
    let catalog = load_questionnaire(&catalog_path(args.path, config_path)?)?;

    if args.json {
        let json = serde_json::to_string_pretty(catalog.sections()).context("failed to serialize catalog")?;
        println!("{}", json);
        return Ok(());
    }

    for (idx, section) in catalog.sections().iter().enumerate() {
        println!("[{}] {}", idx, section.name);
        for question in &section.questions {
            let sub = question.sub_dimension.as_deref().unwrap_or("-");
            println!("  {:>3}. {} ({})", question.number, question.text, sub);
            for option in &question.options {
                match option.score {
                    Some(score) => println!("         {} [{}]", option.text, score),
                    None => println!("         {}", option.text),
                }
            }
        }
    }
    Ok(())
}

fn run_check(args: CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let path = catalog_path(args.path, config_path)?;
    let catalog = load_questionnaire(&path)?;
    println!(
        "OK: {} sections, {} questions ({})",
        catalog.section_count(),
        catalog.total_questions(),
        path.display()
    );
    Ok(())
}
