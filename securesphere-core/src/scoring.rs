//! Maturity scoring over questionnaire answers
//!
//! Every function here is pure: callers load the answers of one client for
//! one product and pass them in together with the catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::maturity::MaturityLevel;
use crate::questionnaire::{Questionnaire, MAX_QUESTION_SCORE};

/// One stored answer, as far as scoring is concerned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub section: String,
    pub question: String,
    pub answer: String,
}

impl AnswerRecord {
    pub fn new(
        section: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Average of one group of scored answers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScore {
    pub name: String,
    /// Rounded to 2 decimals
    pub average: f64,
    pub question_count: usize,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaturityReport {
    /// Mean of the section averages, rounded to 2 decimals (0 when empty)
    pub overall: f64,
    pub level: MaturityLevel,
    pub band: u8,
    pub sections: Vec<GroupScore>,
}

/// Cached per-section score, the shape stored in `score_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSnapshot {
    pub section: String,
    pub total_score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub questions_answered: i32,
    pub questions_total: i32,
}

/// Raw point totals, per section and overall
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsReport {
    pub sections: Vec<SectionPoints>,
    pub total_score: u32,
    pub max_score: u32,
    /// Rounded to 1 decimal
    pub overall_percentage: f64,
    /// Keyed by `"<question>:<answer>"`
    pub question_scores: HashMap<String, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionPoints {
    pub section: String,
    pub score: u32,
    pub max_score: u32,
    /// Rounded to 1 decimal
    pub percentage: f64,
    pub answered: usize,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Group answers by a key while keeping catalog order first and unknown
/// keys afterwards in order of appearance.
fn group_scores<'a, F>(
    catalog: &Questionnaire,
    answers: &'a [AnswerRecord],
    order: &[&str],
    key: F,
) -> Vec<(String, Vec<u8>)>
where
    F: Fn(&'a AnswerRecord) -> Option<String>,
{
    let mut groups: Vec<(String, Vec<u8>)> = order
        .iter()
        .map(|name| (name.to_string(), Vec::new()))
        .collect();

    for answer in answers {
        let Some(name) = key(answer) else { continue };
        let score = catalog.score_answer(&answer.question, &answer.answer);
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, scores)) => scores.push(score),
            None => groups.push((name, vec![score])),
        }
    }

    groups.retain(|(_, scores)| !scores.is_empty());
    groups
}

fn to_group_score(name: String, scores: &[u8]) -> (GroupScore, f64) {
    let total: u32 = scores.iter().map(|&s| u32::from(s)).sum();
    let average = f64::from(total) / scores.len() as f64;
    (
        GroupScore {
            name,
            average: round_to(average, 2),
            question_count: scores.len(),
            total,
        },
        average,
    )
}

/// Section averages, overall score and maturity level.
pub fn maturity_report(catalog: &Questionnaire, answers: &[AnswerRecord]) -> MaturityReport {
    let order: Vec<&str> = catalog.section_names().collect();
    let groups = group_scores(catalog, answers, &order, |a| Some(a.section.clone()));

    let mut sections = Vec::with_capacity(groups.len());
    let mut sum = 0.0;
    for (name, scores) in groups {
        let (group, average) = to_group_score(name, &scores);
        sum += average;
        sections.push(group);
    }

    let overall = if sections.is_empty() {
        0.0
    } else {
        round_to(sum / sections.len() as f64, 2)
    };

    MaturityReport {
        overall,
        level: MaturityLevel::from_score(overall),
        band: crate::maturity::maturity_band(overall),
        sections,
    }
}

/// One snapshot per answered section.
pub fn section_snapshots(catalog: &Questionnaire, answers: &[AnswerRecord]) -> Vec<SectionSnapshot> {
    let order: Vec<&str> = catalog.section_names().collect();
    group_scores(catalog, answers, &order, |a| Some(a.section.clone()))
        .into_iter()
        .map(|(name, scores)| {
            let total: u32 = scores.iter().map(|&s| u32::from(s)).sum();
            let average = f64::from(total) / scores.len() as f64;
            let questions_total = catalog
                .section_index(&name)
                .and_then(|idx| catalog.section(idx))
                .map(|s| s.questions.len())
                .unwrap_or(scores.len());
            SectionSnapshot {
                total_score: (average * 20.0) as i32,
                max_score: 100,
                percentage: average * 100.0 / f64::from(MAX_QUESTION_SCORE),
                questions_answered: scores.len() as i32,
                questions_total: questions_total as i32,
                section: name,
            }
        })
        .collect()
}

/// Overall 1-5 score from cached snapshots.
pub fn overall_from_snapshots(snapshots: &[SectionSnapshot]) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    let sum: f64 = snapshots
        .iter()
        .map(|s| s.percentage / 100.0 * f64::from(MAX_QUESTION_SCORE))
        .sum();
    sum / snapshots.len() as f64
}

/// Averages per sub-dimension, in catalog order, only where answered.
pub fn sub_dimension_scores(catalog: &Questionnaire, answers: &[AnswerRecord]) -> Vec<GroupScore> {
    let mut order: Vec<&str> = Vec::new();
    for question in catalog.questions() {
        if let Some(sub) = question.sub_dimension.as_deref() {
            if !order.contains(&sub) {
                order.push(sub);
            }
        }
    }

    group_scores(catalog, answers, &order, |a| {
        catalog.sub_dimension_of(&a.question).map(str::to_owned)
    })
    .into_iter()
    .map(|(name, scores)| to_group_score(name, &scores).0)
    .collect()
}

/// Roll sub-dimension scores up to their dimension, named by the part
/// before `" - "`. The dimension average is the mean of its sub averages.
pub fn dimension_rollup(sub_scores: &[GroupScore]) -> Vec<GroupScore> {
    let mut dims: Vec<(String, Vec<&GroupScore>)> = Vec::new();
    for sub in sub_scores {
        let dim = sub
            .name
            .split_once(" - ")
            .map(|(d, _)| d)
            .unwrap_or(&sub.name)
            .to_string();
        match dims.iter_mut().find(|(n, _)| *n == dim) {
            Some((_, subs)) => subs.push(sub),
            None => dims.push((dim, vec![sub])),
        }
    }

    dims.into_iter()
        .map(|(name, subs)| {
            let average = subs.iter().map(|s| s.average).sum::<f64>() / subs.len() as f64;
            GroupScore {
                name,
                average: round_to(average, 2),
                question_count: subs.iter().map(|s| s.question_count).sum(),
                total: subs.iter().map(|s| s.total).sum(),
            }
        })
        .collect()
}

/// Raw points per section against the best reachable points of the
/// answered questions.
pub fn points_report(catalog: &Questionnaire, answers: &[AnswerRecord]) -> PointsReport {
    let mut sections: Vec<SectionPoints> = Vec::new();
    let mut question_scores = HashMap::new();

    for answer in answers {
        let score = catalog.score_answer(&answer.question, &answer.answer);
        let max = catalog.max_score(&answer.question);
        question_scores.insert(format!("{}:{}", answer.question, answer.answer), score);

        let idx = match sections.iter().position(|s| s.section == answer.section) {
            Some(idx) => idx,
            None => {
                sections.push(SectionPoints {
                    section: answer.section.clone(),
                    score: 0,
                    max_score: 0,
                    percentage: 0.0,
                    answered: 0,
                });
                sections.len() - 1
            }
        };
        let entry = &mut sections[idx];
        entry.score += u32::from(score);
        entry.max_score += u32::from(max);
        entry.answered += 1;
    }

    for section in &mut sections {
        section.percentage = percentage(section.score, section.max_score);
    }
    sections.sort_by_key(|s| catalog.section_index(&s.section).unwrap_or(usize::MAX));

    let total_score = sections.iter().map(|s| s.score).sum();
    let max_score = sections.iter().map(|s| s.max_score).sum();

    PointsReport {
        overall_percentage: percentage(total_score, max_score),
        sections,
        total_score,
        max_score,
        question_scores,
    }
}

fn percentage(score: u32, max: u32) -> f64 {
    if max == 0 {
        0.0
    } else {
        round_to(f64::from(score) / f64::from(max) * 100.0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::tests::sample;

    fn answers() -> Vec<AnswerRecord> {
        vec![
            AnswerRecord::new("Governance", "Is there a policy?", "C) Published"),
            AnswerRecord::new("Governance", "Is training given?", "E) Continuous"),
            AnswerRecord::new("Access Control", "Is MFA enforced?", "A) No"),
        ]
    }

    #[test]
    fn empty_answers_report_zero() {
        let report = maturity_report(&sample(), &[]);
        assert_eq!(report.overall, 0.0);
        assert_eq!(report.level, MaturityLevel::Initial);
        assert_eq!(report.band, 1);
        assert!(report.sections.is_empty());
    }

    #[test]
    fn overall_is_mean_of_section_averages() {
        let report = maturity_report(&sample(), &answers());
        // Governance (3 + 5) / 2 = 4, Access Control 1
        assert_eq!(report.sections[0].name, "Governance");
        assert_eq!(report.sections[0].average, 4.0);
        assert_eq!(report.sections[0].total, 8);
        assert_eq!(report.sections[1].average, 1.0);
        assert_eq!(report.overall, 2.5);
        assert_eq!(report.level, MaturityLevel::Defined);
        assert_eq!(report.band, 3);
    }

    #[test]
    fn overall_rounds_to_two_decimals() {
        let answers = vec![
            AnswerRecord::new("Governance", "Is there a policy?", "B) Draft"),
            AnswerRecord::new("Governance", "Is training given?", "B) Yearly"),
            AnswerRecord::new("Access Control", "Is MFA enforced?", "A) No"),
            AnswerRecord::new("Other", "Loose question", "B) something"),
        ];
        let report = maturity_report(&sample(), &answers);
        // (2.5 + 1 + 2) / 3 = 1.8333
        assert_eq!(report.overall, 1.83);
        assert_eq!(report.sections.last().unwrap().name, "Other");
    }

    #[test]
    fn snapshots_scale_to_hundred() {
        let snaps = section_snapshots(&sample(), &answers());
        assert_eq!(snaps.len(), 2);
        let gov = &snaps[0];
        assert_eq!(gov.total_score, 80);
        assert_eq!(gov.max_score, 100);
        assert_eq!(gov.percentage, 80.0);
        assert_eq!(gov.questions_answered, 2);
        assert_eq!(gov.questions_total, 2);
        assert_eq!(snaps[1].total_score, 20);
    }

    #[test]
    fn overall_from_snapshots_averages() {
        let snaps = section_snapshots(&sample(), &answers());
        assert!((overall_from_snapshots(&snaps) - 2.5).abs() < 1e-9);
        assert_eq!(overall_from_snapshots(&[]), 0.0);
    }

    #[test]
    fn sub_dimensions_follow_catalog() {
        let subs = sub_dimension_scores(&sample(), &answers());
        let names: Vec<_> = subs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Governance - Policy",
                "Governance - Training",
                "Access Control - Authentication"
            ]
        );
        assert_eq!(subs[1].average, 5.0);
    }

    #[test]
    fn rollup_groups_by_prefix() {
        let subs = sub_dimension_scores(&sample(), &answers());
        let dims = dimension_rollup(&subs);
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].name, "Governance");
        assert_eq!(dims[0].average, 4.0);
        assert_eq!(dims[0].question_count, 2);
        assert_eq!(dims[1].name, "Access Control");
    }

    #[test]
    fn rollup_keeps_names_without_separator() {
        let subs = vec![GroupScore {
            name: "Standalone".into(),
            average: 3.0,
            question_count: 1,
            total: 3,
        }];
        assert_eq!(dimension_rollup(&subs)[0].name, "Standalone");
    }

    #[test]
    fn points_against_answered_maximum() {
        let report = points_report(&sample(), &answers());
        let gov = &report.sections[0];
        assert_eq!(gov.score, 8);
        // policy max 3, training max 5
        assert_eq!(gov.max_score, 8);
        assert_eq!(gov.percentage, 100.0);
        let ac = &report.sections[1];
        assert_eq!(ac.score, 1);
        assert_eq!(ac.max_score, 5);
        assert_eq!(ac.percentage, 20.0);
        assert_eq!(report.total_score, 9);
        assert_eq!(report.max_score, 13);
        assert_eq!(report.overall_percentage, 69.2);
        assert_eq!(report.question_scores["Is MFA enforced?:A) No"], 1);
    }

    #[test]
    fn points_empty() {
        let report = points_report(&sample(), &[]);
        assert_eq!(report.overall_percentage, 0.0);
        assert!(report.sections.is_empty());
    }
}
