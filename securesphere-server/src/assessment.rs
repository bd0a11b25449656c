//! Score and status recalculation after answers or reviews change

use securesphere_core::{section_snapshots, AnswerRecord, AssessmentStatus, Questionnaire};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{DbError, ProductRepo, Response, ResponseRepo, ScoreRepo};

/// Answers of one client for one product, ready for scoring
pub async fn load_answers(pool: &PgPool, product_id: Uuid, user_id: Uuid) -> Result<Vec<AnswerRecord>, DbError> {
    let responses = ResponseRepo::new(pool)
        .for_assessment(product_id, user_id)
        .await?;
    Ok(responses.iter().map(Response::record).collect())
}

/// Rewrite the cached section scores and the product status.
pub async fn recalculate(
    pool: &PgPool,
    catalog: &Questionnaire,
    product_id: Uuid,
    user_id: Uuid,
) -> Result<AssessmentStatus, DbError> {
    let answers = load_answers(pool, product_id, user_id).await?;
    let snapshots = section_snapshots(catalog, &answers);
    ScoreRepo::new(pool)
        .replace(product_id, user_id, &snapshots)
        .await?;

    let counts = ResponseRepo::new(pool)
        .counts(product_id, user_id, catalog.total_questions())
        .await?;
    let status = AssessmentStatus::derive(counts);
    ProductRepo::new(pool)
        .upsert_status(product_id, user_id, status, &counts)
        .await?;

    tracing::info!(
        %product_id,
        %user_id,
        status = status.as_str(),
        answered = counts.answered,
        reviewed = counts.reviewed,
        "assessment recalculated"
    );
    Ok(status)
}

/// Answered-question count of one catalog section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub index: usize,
    pub name: String,
    pub answered: usize,
    pub total: usize,
    pub is_complete: bool,
}

/// Progress of every catalog section, in catalog order.
pub fn section_progress(catalog: &Questionnaire, answers: &[AnswerRecord]) -> Vec<SectionProgress> {
    catalog
        .sections()
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let answered = section
                .questions
                .iter()
                .filter(|q| answers.iter().any(|a| a.question == q.text))
                .count();
            let total = section.questions.len();
            SectionProgress {
                index,
                name: section.name.clone(),
                answered,
                total,
                is_complete: total > 0 && answered == total,
            }
        })
        .collect()
}

/// First section that still has unanswered questions
pub fn next_section(progress: &[SectionProgress]) -> Option<usize> {
    progress.iter().find(|p| !p.is_complete).map(|p| p.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
Dimensions,Sub-Dimensions,Questions,Description,Options,Scores
Governance,Governance - Policy,Is there a policy?,Written policy,A) None,1
,,,,E) Published,5
,Governance - Training,Is training given?,Secure coding,A) Never,1
,,,,E) Continuous,5
Access Control,Access Control - Authentication,Is MFA enforced?,Admins,A) No,1
,,,,E) Always,5
";

    fn catalog() -> Questionnaire {
        Questionnaire::from_reader(CATALOG.as_bytes()).unwrap()
    }

    #[test]
    fn progress_counts_answers_per_section() {
        let answers = vec![
            AnswerRecord::new("Governance", "Is there a policy?", "E) Published"),
            AnswerRecord::new("Governance", "Is training given?", "A) Never"),
        ];
        let progress = section_progress(&catalog(), &answers);
        assert_eq!(progress.len(), 2);
        assert!(progress[0].is_complete);
        assert_eq!(progress[1].answered, 0);
        assert_eq!(next_section(&progress), Some(1));
    }

    #[test]
    fn nothing_next_when_all_answered() {
        let answers = vec![
            AnswerRecord::new("Governance", "Is there a policy?", "E) Published"),
            AnswerRecord::new("Governance", "Is training given?", "A) Never"),
            AnswerRecord::new("Access Control", "Is MFA enforced?", "E) Always"),
        ];
        let progress = section_progress(&catalog(), &answers);
        assert_eq!(next_section(&progress), None);
    }

    #[test]
    fn answers_outside_the_catalog_are_ignored() {
        let answers = vec![AnswerRecord::new("Legacy", "Retired question?", "A) No")];
        let progress = section_progress(&catalog(), &answers);
        assert!(progress.iter().all(|p| p.answered == 0));
        assert_eq!(next_section(&progress), Some(0));
    }
}
