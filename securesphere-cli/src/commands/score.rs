//! Offline scoring of an answers file
//!
//! The file is a JSON array of `{"section", "question", "answer"}` objects,
//! the same shape the API stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use securesphere_core::{
    dimension_rollup, maturity_report, points_report, sub_dimension_scores, AnswerRecord,
    Questionnaire,
};
use serde::Serialize;

use super::{load_config, load_questionnaire};

#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// JSON file with the answers
    pub answers: PathBuf,

    /// Catalog CSV (default: questionnaire_path from config)
    #[arg(long)]
    pub questionnaire: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ScoreOutput {
    maturity: securesphere_core::MaturityReport,
    sub_dimensions: Vec<securesphere_core::GroupScore>,
    dimensions: Vec<securesphere_core::GroupScore>,
    points: securesphere_core::PointsReport,
}

fn score(catalog: &Questionnaire, answers: &[AnswerRecord]) -> ScoreOutput {
    let sub_dimensions = sub_dimension_scores(catalog, answers);
    ScoreOutput {
        maturity: maturity_report(catalog, answers),
        dimensions: dimension_rollup(&sub_dimensions),
        sub_dimensions,
        points: points_report(catalog, answers),
    }
}

pub fn run_score(args: ScoreArgs, config_path: Option<&Path>) -> Result<()> {
    let catalog_path = match args.questionnaire {
        Some(path) => path,
        None => load_config(config_path)?.questionnaire_path,
    };
    let catalog = load_questionnaire(&catalog_path)?;

    let content = fs::read_to_string(&args.answers)
        .with_context(|| format!("failed to read {}", args.answers.display()))?;
    let answers: Vec<AnswerRecord> =
        serde_json::from_str(&content).context("answers file must be a JSON array of answers")?;

    for answer in &answers {
        if catalog.find_question(&answer.question).is_none() {
            tracing::warn!(question = %answer.question, "question not in catalog, scored by letter");
        }
    }

    let output = score(&catalog, &answers);
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output).context("failed to serialize scores")?);
        }
        OutputFormat::Text => {
            println!("Overall: {:.2} ({})", output.maturity.overall, output.maturity.level);
            for section in &output.maturity.sections {
                println!(
                    "  {:<30} {:.2}  ({} answered)",
                    section.name, section.average, section.question_count
                );
            }
            println!(
                "Points: {}/{} ({:.1}%)",
                output.points.total_score, output.points.max_score, output.points.overall_percentage
            );
        }
    }
    Ok(())
}
