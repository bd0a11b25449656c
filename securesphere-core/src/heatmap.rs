//! Heatmap views of a scored assessment

use serde::Serialize;

use crate::maturity::MaturityLevel;
use crate::questionnaire::{Questionnaire, MAX_QUESTION_SCORE};
use crate::scoring::{maturity_report, round_to, sub_dimension_scores, AnswerRecord, GroupScore};

const LABEL_CHARS: usize = 50;

/// Ring colours from level 1 (outermost, weakest) to level 5
pub const RING_COLORS: [&str; 5] = ["#ff4444", "#ff8800", "#ffcc00", "#88cc00", "#44cc44"];

/// One answered question on the grid heatmap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionCell {
    pub section: String,
    pub question_index: usize,
    pub question: String,
    pub full_question: String,
    pub score: u8,
    pub max_score: u8,
    pub percentage: f64,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingHeatmap {
    pub overall_score: f64,
    pub achieved_level: u8,
    pub rings: Vec<Ring>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ring {
    pub level: u8,
    pub is_achieved: bool,
    pub sub_dimensions: Vec<RingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingEntry {
    pub name: String,
    pub score: f64,
    pub is_achieved: bool,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingSegments {
    pub center_score: u8,
    pub rings: Vec<RingSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingSegment {
    pub level: u8,
    pub color: &'static str,
    pub sub_dimensions: Vec<GroupScore>,
}

fn truncate_label(text: &str) -> String {
    match text.char_indices().nth(LABEL_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// One cell per answer, indexed within its section in answer order.
pub fn question_cells(catalog: &Questionnaire, answers: &[AnswerRecord]) -> Vec<QuestionCell> {
    let mut seen: Vec<(&str, usize)> = Vec::new();
    let mut cells = Vec::with_capacity(answers.len());

    for answer in answers {
        let idx = match seen.iter_mut().find(|(s, _)| *s == answer.section) {
            Some((_, n)) => {
                *n += 1;
                *n
            }
            None => {
                seen.push((answer.section.as_str(), 0));
                0
            }
        };
        let score = catalog.score_answer(&answer.question, &answer.answer);
        cells.push(QuestionCell {
            section: answer.section.clone(),
            question_index: idx,
            question: truncate_label(&answer.question),
            full_question: answer.question.clone(),
            score,
            max_score: MAX_QUESTION_SCORE,
            percentage: f64::from(score) * 100.0 / f64::from(MAX_QUESTION_SCORE),
            answer: answer.answer.clone(),
        });
    }

    // Group cells by section in catalog order, stable within a section
    cells.sort_by_key(|c| catalog.section_index(&c.section).unwrap_or(usize::MAX));
    cells
}

/// Five concentric rings. Each sub-dimension fills the rings up to its own
/// level; a ring counts as achieved up to the overall level.
pub fn ring_heatmap(catalog: &Questionnaire, answers: &[AnswerRecord]) -> RingHeatmap {
    let report = maturity_report(catalog, answers);
    let subs = sub_dimension_scores(catalog, answers);
    let achieved = MaturityLevel::from_score(report.overall).number();

    let rings = MaturityLevel::ALL
        .iter()
        .map(|lvl| {
            let level = lvl.number();
            let sub_dimensions = subs
                .iter()
                .map(|sub| {
                    let sub_level = MaturityLevel::from_score(sub.average).number();
                    let is_achieved = level <= sub_level;
                    RingEntry {
                        name: sub.name.clone(),
                        score: sub.average,
                        is_achieved,
                        percentage: if is_achieved {
                            (sub.average / f64::from(level) * 100.0).min(100.0)
                        } else {
                            0.0
                        },
                    }
                })
                .collect();
            Ring {
                level,
                is_achieved: level <= achieved,
                sub_dimensions,
            }
        })
        .collect();

    RingHeatmap {
        overall_score: report.overall,
        achieved_level: achieved,
        rings,
    }
}

/// Sub-dimensions bucketed into coloured rings by their rounded average.
pub fn ring_segments(sub_scores: &[GroupScore]) -> RingSegments {
    let center_score = if sub_scores.is_empty() {
        0
    } else {
        let mean = sub_scores.iter().map(|s| s.average).sum::<f64>() / sub_scores.len() as f64;
        round_to(mean, 0) as u8
    };

    let rings = RING_COLORS
        .iter()
        .zip(1u8..)
        .map(|(&color, level)| RingSegment {
            level,
            color,
            sub_dimensions: sub_scores
                .iter()
                .filter(|s| s.average.round().clamp(1.0, 5.0) as u8 == level)
                .cloned()
                .collect(),
        })
        .collect();

    RingSegments { center_score, rings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::tests::sample;

    fn answers() -> Vec<AnswerRecord> {
        vec![
            AnswerRecord::new("Access Control", "Is MFA enforced?", "E) Always"),
            AnswerRecord::new("Governance", "Is there a policy?", "B) Draft"),
            AnswerRecord::new("Governance", "Is training given?", "B) Yearly"),
        ]
    }

    #[test]
    fn truncates_long_questions() {
        let long = "x".repeat(60);
        assert_eq!(truncate_label(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(truncate_label(&"y".repeat(50)), "y".repeat(50));
        assert_eq!(truncate_label("short"), "short");
    }

    #[test]
    fn cells_are_indexed_per_section() {
        let cells = question_cells(&sample(), &answers());
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].section, "Governance");
        assert_eq!(cells[0].question_index, 0);
        assert_eq!(cells[1].question_index, 1);
        assert_eq!(cells[1].score, 3);
        assert_eq!(cells[1].percentage, 60.0);
        assert_eq!(cells[2].section, "Access Control");
        assert_eq!(cells[2].question_index, 0);
        assert_eq!(cells[2].max_score, 5);
    }

    #[test]
    fn ring_heatmap_levels() {
        let heat = ring_heatmap(&sample(), &answers());
        // Governance (2 + 3) / 2 = 2.5, Access Control 5 => 3.75
        assert_eq!(heat.overall_score, 3.75);
        assert_eq!(heat.achieved_level, 4);
        assert_eq!(heat.rings.len(), 5);
        assert!(heat.rings[3].is_achieved);
        assert!(!heat.rings[4].is_achieved);

        let ring1 = &heat.rings[0];
        let policy = ring1
            .sub_dimensions
            .iter()
            .find(|s| s.name == "Governance - Policy")
            .unwrap();
        assert!(policy.is_achieved);
        assert_eq!(policy.percentage, 100.0);

        let ring3 = &heat.rings[2];
        let policy = ring3
            .sub_dimensions
            .iter()
            .find(|s| s.name == "Governance - Policy")
            .unwrap();
        assert!(!policy.is_achieved);
        assert_eq!(policy.percentage, 0.0);
    }

    #[test]
    fn ring_heatmap_empty() {
        let heat = ring_heatmap(&sample(), &[]);
        assert_eq!(heat.overall_score, 0.0);
        assert_eq!(heat.achieved_level, 1);
        assert!(heat.rings.iter().all(|r| r.sub_dimensions.is_empty()));
    }

    #[test]
    fn segments_bucket_by_rounded_average() {
        let subs = sub_dimension_scores(&sample(), &answers());
        let segments = ring_segments(&subs);
        // policy 2, training 3, authentication 5 => mean 3.33
        assert_eq!(segments.center_score, 3);
        assert_eq!(segments.rings[1].sub_dimensions.len(), 1);
        assert_eq!(segments.rings[2].sub_dimensions[0].name, "Governance - Training");
        assert_eq!(segments.rings[4].color, "#44cc44");
        assert!(segments.rings[0].sub_dimensions.is_empty());
    }

    #[test]
    fn segments_empty() {
        assert_eq!(ring_segments(&[]).center_score, 0);
    }
}
