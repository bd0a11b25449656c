//! Answers sent back to the client for a new selection

use chrono::{DateTime, Utc};
use securesphere_core::RejectedStatus;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RejectedQuestion {
    pub id: Uuid,
    pub response_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub lead_id: Uuid,
    pub question_text: String,
    pub reason: String,
    pub status: String,
    pub new_option: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RejectedQuestion {
    pub fn status(&self) -> RejectedStatus {
        self.status.parse().unwrap_or(RejectedStatus::Pending)
    }
}

#[derive(Debug, Clone)]
pub struct NewRejected {
    pub response_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub lead_id: Uuid,
    pub question_text: String,
    pub reason: String,
}

pub struct RejectedRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> RejectedRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn insert<'e, E>(executor: E, new: &NewRejected) -> Result<RejectedQuestion, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        Ok(sqlx::query_as::<_, RejectedQuestion>(
            r#"
            INSERT INTO rejected_questions
                (id, response_id, product_id, user_id, lead_id, question_text, reason, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.response_id)
        .bind(new.product_id)
        .bind(new.user_id)
        .bind(new.lead_id)
        .bind(&new.question_text)
        .bind(&new.reason)
        .bind(RejectedStatus::Pending.as_str())
        .fetch_one(executor)
        .await?)
    }

    /// Cancel every pending entry of a response.
    pub(crate) async fn cancel_for_response<'e, E>(executor: E, response_id: Uuid) -> Result<u64, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result =
            sqlx::query("UPDATE rejected_questions SET status = $2 WHERE response_id = $1 AND status = $3")
                .bind(response_id)
                .bind(RejectedStatus::Cancelled.as_str())
                .bind(RejectedStatus::Pending.as_str())
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    /// Resolve the pending entries of a response with the client's new option.
    pub(crate) async fn resolve_for_response<'e, E>(
        executor: E,
        response_id: Uuid,
        new_option: &str,
    ) -> Result<u64, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE rejected_questions
            SET status = $2, new_option = $3, resolved_at = NOW()
            WHERE response_id = $1 AND status = $4
            "#,
        )
        .bind(response_id)
        .bind(RejectedStatus::Resolved.as_str())
        .bind(new_option)
        .bind(RejectedStatus::Pending.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: Uuid) -> Result<RejectedQuestion, DbError> {
        sqlx::query_as::<_, RejectedQuestion>("SELECT * FROM rejected_questions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("rejected question", id))
    }

    pub async fn pending_for_response(&self, response_id: Uuid) -> Result<Option<RejectedQuestion>, DbError> {
        Ok(sqlx::query_as::<_, RejectedQuestion>(
            r#"
            SELECT * FROM rejected_questions
            WHERE response_id = $1 AND status = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(response_id)
        .bind(RejectedStatus::Pending.as_str())
        .fetch_optional(self.pool)
        .await?)
    }

    pub async fn pending_for_assessment(&self, product_id: Uuid, user_id: Uuid) -> Result<Vec<RejectedQuestion>, DbError> {
        Ok(sqlx::query_as::<_, RejectedQuestion>(
            r#"
            SELECT * FROM rejected_questions
            WHERE product_id = $1 AND user_id = $2 AND status = $3
            ORDER BY created_at
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(RejectedStatus::Pending.as_str())
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn pending_for_user(&self, user_id: Uuid) -> Result<Vec<RejectedQuestion>, DbError> {
        Ok(sqlx::query_as::<_, RejectedQuestion>(
            "SELECT * FROM rejected_questions WHERE user_id = $1 AND status = $2 ORDER BY created_at",
        )
        .bind(user_id)
        .bind(RejectedStatus::Pending.as_str())
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn for_user(&self, user_id: Uuid) -> Result<Vec<RejectedQuestion>, DbError> {
        Ok(sqlx::query_as::<_, RejectedQuestion>(
            "SELECT * FROM rejected_questions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Resolve pending entries whose questions were answered again in a
    /// section save. `answers` pairs question text with the new option.
    pub async fn resolve_answered(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        answers: &[(String, String)],
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut resolved = 0;
        for (question, option) in answers {
            let result = sqlx::query(
                r#"
                UPDATE rejected_questions
                SET status = $4, new_option = $5, resolved_at = NOW()
                WHERE product_id = $1 AND user_id = $2 AND question_text = $3 AND status = $6
                "#,
            )
            .bind(product_id)
            .bind(user_id)
            .bind(question)
            .bind(RejectedStatus::Resolved.as_str())
            .bind(option)
            .bind(RejectedStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
            resolved += result.rows_affected();
        }
        tx.commit().await?;
        Ok(resolved)
    }

    pub async fn count_pending_for_product(&self, product_id: Uuid, user_id: Uuid) -> Result<i64, DbError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM rejected_questions WHERE product_id = $1 AND user_id = $2 AND status = $3",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(RejectedStatus::Pending.as_str())
        .fetch_one(self.pool)
        .await?;
        Ok(row.get("n"))
    }
}
