//! Review decisions and reselection, each written in one transaction

use securesphere_core::{ReviewAction, DEFAULT_REJECT_REASON};
use sqlx::PgPool;
use uuid::Uuid;

use super::comments::{Comment, CommentRepo, NewComment};
use super::rejected::{NewRejected, RejectedQuestion, RejectedRepo};
use super::responses::{Response, ResponseRepo};
use super::DbError;

/// A lead's decision on one response
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub lead_id: Uuid,
    pub action: ReviewAction,
    /// Already validated comment text
    pub comment: Option<String>,
}

#[derive(Debug)]
pub struct ReviewRecord {
    pub comment: Option<Comment>,
    pub rejected: Option<RejectedQuestion>,
    /// Pending rejected entries closed by this decision
    pub cancelled: u64,
}

/// Scored replacement for a rejected answer
#[derive(Debug, Clone)]
pub struct Reselection {
    pub answer: String,
    pub score: i32,
    pub max_score: i32,
}

pub struct ReviewRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Apply a review to `response`.
    ///
    /// Flags, the lead comment and the rejected entry are written together.
    /// Any earlier pending rejected entry of the response is cancelled, so
    /// only a reject leaves one open.
    pub async fn apply(&self, response: &Response, decision: &ReviewDecision) -> Result<ReviewRecord, DbError> {
        let action = decision.action;
        let comment_text = match &decision.comment {
            Some(text) => Some(text.clone()),
            None if action.requires_comment() => Some(DEFAULT_REJECT_REASON.to_string()),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        ResponseRepo::update_flags(&mut *tx, response.id, action.flags()).await?;

        let comment = match &comment_text {
            Some(text) => Some(
                CommentRepo::insert(
                    &mut *tx,
                    &NewComment {
                        response_id: Some(response.id),
                        lead_id: decision.lead_id,
                        client_id: response.user_id,
                        product_id: response.product_id,
                        comment: text.clone(),
                        status: action.comment_status(),
                        parent_comment_id: None,
                    },
                )
                .await?,
            ),
            None => None,
        };

        let cancelled = RejectedRepo::cancel_for_response(&mut *tx, response.id).await?;
        let rejected = if action == ReviewAction::Reject {
            Some(
                RejectedRepo::insert(
                    &mut *tx,
                    &NewRejected {
                        response_id: response.id,
                        product_id: response.product_id,
                        user_id: response.user_id,
                        lead_id: decision.lead_id,
                        question_text: response.question.clone(),
                        reason: comment_text.unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string()),
                    },
                )
                .await?,
            )
        } else {
            None
        };

        tx.commit().await?;
        Ok(ReviewRecord {
            comment,
            rejected,
            cancelled,
        })
    }

    /// Store the client's new option for a rejected response and resolve
    /// its pending entries.
    ///
    /// Returns `None`, writing nothing, when the response is not rejected
    /// (approved answers stay frozen), otherwise the number of entries
    /// resolved.
    pub async fn reselect(&self, response_id: Uuid, choice: &Reselection) -> Result<Option<u64>, DbError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            ResponseRepo::reanswer_rejected(&mut *tx, response_id, &choice.answer, choice.score, choice.max_score)
                .await?;
        if !updated {
            return Ok(None);
        }
        let resolved = RejectedRepo::resolve_for_response(&mut *tx, response_id, &choice.answer).await?;
        tx.commit().await?;
        Ok(Some(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assessment, policy_answer, pool, Assessment};
    use securesphere_core::{RejectedStatus, ReviewStatus};

    async fn answered(pool: &PgPool) -> (Assessment, Response) {
        let a = assessment(pool).await;
        let responses = ResponseRepo::new(pool);
        responses
            .save_section(a.product.id, a.client.id, &[policy_answer("A) None")])
            .await
            .unwrap();
        let response = responses.for_assessment(a.product.id, a.client.id).await.unwrap().remove(0);
        (a, response)
    }

    fn decision(a: &Assessment, action: ReviewAction) -> ReviewDecision {
        ReviewDecision {
            lead_id: a.lead.id,
            action,
            comment: None,
        }
    }

    fn published() -> Reselection {
        Reselection {
            answer: "E) Published".into(),
            score: 5,
            max_score: 5,
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reject_then_reselect() {
        let pool = pool().await;
        let (a, response) = answered(&pool).await;
        let repo = ReviewRepo::new(&pool);

        let record = repo.apply(&response, &decision(&a, ReviewAction::Reject)).await.unwrap();
        let entry = record.rejected.unwrap();
        assert_eq!(entry.reason, DEFAULT_REJECT_REASON);
        assert_eq!(record.comment.unwrap().comment, DEFAULT_REJECT_REASON);
        assert_eq!(
            ResponseRepo::new(&pool).get(response.id).await.unwrap().review_status(),
            ReviewStatus::Rejected
        );

        assert_eq!(repo.reselect(response.id, &published()).await.unwrap(), Some(1));
        let after = ResponseRepo::new(&pool).get(response.id).await.unwrap();
        assert_eq!(after.answer, "E) Published");
        assert_eq!(after.score, 5);
        assert_eq!(after.review_status(), ReviewStatus::Pending);
        let entry = RejectedRepo::new(&pool).get(entry.id).await.unwrap();
        assert_eq!(entry.status(), RejectedStatus::Resolved);
        assert_eq!(entry.new_option.as_deref(), Some("E) Published"));

        // the response is no longer rejected
        assert_eq!(repo.reselect(response.id, &published()).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn approval_cancels_pending_rejection() {
        let pool = pool().await;
        let (a, response) = answered(&pool).await;
        let repo = ReviewRepo::new(&pool);

        let entry = repo
            .apply(&response, &decision(&a, ReviewAction::Reject))
            .await
            .unwrap()
            .rejected
            .unwrap();
        let record = repo.apply(&response, &decision(&a, ReviewAction::Approve)).await.unwrap();
        assert_eq!(record.cancelled, 1);
        assert!(record.rejected.is_none());
        assert!(record.comment.is_none());

        let rejected = RejectedRepo::new(&pool);
        assert_eq!(rejected.get(entry.id).await.unwrap().status(), RejectedStatus::Cancelled);
        assert!(rejected.pending_for_response(response.id).await.unwrap().is_none());

        assert_eq!(repo.reselect(response.id, &published()).await.unwrap(), None);
        let after = ResponseRepo::new(&pool).get(response.id).await.unwrap();
        assert_eq!(after.answer, "A) None");
        assert_eq!(after.review_status(), ReviewStatus::Approved);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn second_reject_replaces_pending_entry() {
        let pool = pool().await;
        let (a, response) = answered(&pool).await;
        let repo = ReviewRepo::new(&pool);

        let first = repo
            .apply(&response, &decision(&a, ReviewAction::Reject))
            .await
            .unwrap()
            .rejected
            .unwrap();
        let mut again = decision(&a, ReviewAction::Reject);
        again.comment = Some("Attach the policy document".into());
        let record = repo.apply(&response, &again).await.unwrap();
        assert_eq!(record.cancelled, 1);

        let pending = RejectedRepo::new(&pool)
            .pending_for_response(response.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(pending.id, first.id);
        assert_eq!(pending.reason, "Attach the policy document");
    }
}
