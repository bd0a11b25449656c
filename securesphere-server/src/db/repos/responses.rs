//! Questionnaire responses and their review flags

use chrono::{DateTime, Utc};
use securesphere_core::{AnswerRecord, ProgressCounts, ReviewFlags, ReviewStatus};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Response {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub section: String,
    pub question: String,
    pub question_index: i32,
    pub answer: String,
    pub client_comment: Option<String>,
    pub evidence_path: Option<String>,
    pub score: i32,
    pub max_score: i32,
    pub is_reviewed: bool,
    pub is_approved: bool,
    pub needs_client_response: bool,
    pub review_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Response {
    pub fn review_status(&self) -> ReviewStatus {
        self.review_status.parse().unwrap_or(ReviewStatus::Pending)
    }

    pub fn flags(&self) -> ReviewFlags {
        ReviewFlags {
            is_reviewed: self.is_reviewed,
            is_approved: self.is_approved,
            needs_client_response: self.needs_client_response,
            status: self.review_status(),
        }
    }

    pub fn record(&self) -> AnswerRecord {
        AnswerRecord::new(&self.section, &self.question, &self.answer)
    }
}

/// Response joined with the names a dashboard shows next to it
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResponseWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub response: Response,
    pub username: String,
    pub product_name: String,
}

/// One answer of a section save
#[derive(Debug, Clone)]
pub struct SaveAnswer {
    pub section: String,
    pub question: String,
    pub question_index: i32,
    pub answer: String,
    pub client_comment: Option<String>,
    pub score: i32,
    pub max_score: i32,
}

pub struct ResponseRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ResponseRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Response, DbError> {
        sqlx::query_as::<_, Response>("SELECT * FROM questionnaire_responses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("response", id))
    }

    /// All answers of one client for one product, in questionnaire order.
    pub async fn for_assessment(&self, product_id: Uuid, user_id: Uuid) -> Result<Vec<Response>, DbError> {
        Ok(sqlx::query_as::<_, Response>(
            r#"
            SELECT * FROM questionnaire_responses
            WHERE product_id = $1 AND user_id = $2
            ORDER BY created_at, question_index
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Upsert a section's answers in one transaction.
    ///
    /// Approved answers are left untouched; every other answer is written
    /// and its review flags reset to pending. Returns the number of rows
    /// written.
    pub async fn save_section(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        answers: &[SaveAnswer],
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for a in answers {
            let result = sqlx::query(
                r#"
                INSERT INTO questionnaire_responses
                    (id, user_id, product_id, section, question, question_index, answer,
                     client_comment, score, max_score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (user_id, product_id, question) DO UPDATE SET
                    section = EXCLUDED.section,
                    question_index = EXCLUDED.question_index,
                    answer = EXCLUDED.answer,
                    client_comment = EXCLUDED.client_comment,
                    score = EXCLUDED.score,
                    max_score = EXCLUDED.max_score,
                    is_reviewed = FALSE,
                    is_approved = FALSE,
                    needs_client_response = FALSE,
                    review_status = 'pending',
                    updated_at = NOW()
                WHERE questionnaire_responses.review_status <> 'approved'
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(product_id)
            .bind(&a.section)
            .bind(&a.question)
            .bind(a.question_index)
            .bind(&a.answer)
            .bind(&a.client_comment)
            .bind(a.score)
            .bind(a.max_score)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Write review flags. Runs on the caller's executor so a review can
    /// share one transaction with its comment and rejected entry.
    pub(crate) async fn update_flags<'e, E>(executor: E, id: Uuid, flags: ReviewFlags) -> Result<(), DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE questionnaire_responses
            SET is_reviewed = $2, is_approved = $3, needs_client_response = $4,
                review_status = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(flags.is_reviewed)
        .bind(flags.is_approved)
        .bind(flags.needs_client_response)
        .bind(flags.status.as_str())
        .execute(executor)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("response", id));
        }
        Ok(())
    }

    /// Replace a rejected answer and put the response back into pending
    /// review. Returns false, writing nothing, when the response is no
    /// longer rejected.
    pub(crate) async fn reanswer_rejected<'e, E>(
        executor: E,
        id: Uuid,
        answer: &str,
        score: i32,
        max_score: i32,
    ) -> Result<bool, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let pending = ReviewFlags::pending();
        let result = sqlx::query(
            r#"
            UPDATE questionnaire_responses
            SET answer = $2, score = $3, max_score = $4,
                is_reviewed = $5, is_approved = $6, needs_client_response = $7,
                review_status = $8, updated_at = NOW()
            WHERE id = $1 AND review_status = $9
            "#,
        )
        .bind(id)
        .bind(answer)
        .bind(score)
        .bind(max_score)
        .bind(pending.is_reviewed)
        .bind(pending.is_approved)
        .bind(pending.needs_client_response)
        .bind(pending.status.as_str())
        .bind(ReviewStatus::Rejected.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Progress counts for the status derivation. `total` is the catalog size.
    pub async fn counts(&self, product_id: Uuid, user_id: Uuid, total: usize) -> Result<ProgressCounts, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS answered,
                COUNT(*) FILTER (WHERE is_reviewed) AS reviewed,
                COUNT(*) FILTER (WHERE is_approved) AS approved,
                COUNT(*) FILTER (WHERE needs_client_response) AS needs_client_response
            FROM questionnaire_responses
            WHERE product_id = $1 AND user_id = $2
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        let count = |name: &str| row.get::<i64, _>(name).max(0) as usize;
        Ok(ProgressCounts {
            total,
            answered: count("answered"),
            reviewed: count("reviewed"),
            approved: count("approved"),
            needs_client_response: count("needs_client_response"),
        })
    }

    /// Most recently updated responses across all clients
    pub async fn latest(&self, limit: i64) -> Result<Vec<ResponseWithOwner>, DbError> {
        Ok(sqlx::query_as::<_, ResponseWithOwner>(
            r#"
            SELECT r.*, u.username, p.name AS product_name
            FROM questionnaire_responses r
            JOIN users u ON u.id = r.user_id
            JOIN products p ON p.id = r.product_id
            ORDER BY r.updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?)
    }
}
