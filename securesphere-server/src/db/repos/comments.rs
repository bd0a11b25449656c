//! Lead comments, client replies and read tracking

use chrono::{DateTime, Utc};
use securesphere_core::CommentStatus;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub response_id: Option<Uuid>,
    pub lead_id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub comment: String,
    pub status: String,
    pub parent_comment_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn status(&self) -> CommentStatus {
        self.status.parse().unwrap_or(CommentStatus::Pending)
    }
}

/// Comment with the context needed to display it
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub section: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub lead_username: String,
    pub client_username: String,
    pub product_name: String,
}

impl CommentView {
    /// Section label, `General` for comments not tied to a response
    pub fn section_label(&self) -> &str {
        self.section.as_deref().unwrap_or("General")
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub response_id: Option<Uuid>,
    pub lead_id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub comment: String,
    pub status: CommentStatus,
    pub parent_comment_id: Option<Uuid>,
}

const VIEW_SELECT: &str = r#"
    SELECT c.id, c.response_id, c.lead_id, c.client_id, c.product_id, c.comment, c.status,
           c.parent_comment_id, c.is_read, c.created_at, c.updated_at,
           r.section, r.question, r.answer,
           l.username AS lead_username, cl.username AS client_username,
           p.name AS product_name
    FROM lead_comments c
    LEFT JOIN questionnaire_responses r ON r.id = c.response_id
    JOIN users l ON l.id = c.lead_id
    JOIN users cl ON cl.id = c.client_id
    JOIN products p ON p.id = c.product_id
"#;

pub struct CommentRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: &NewComment) -> Result<Comment, DbError> {
        Self::insert(self.pool, new).await
    }

    pub(crate) async fn insert<'e, E>(executor: E, new: &NewComment) -> Result<Comment, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        Ok(sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO lead_comments
                (id, response_id, lead_id, client_id, product_id, comment, status, parent_comment_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.response_id)
        .bind(new.lead_id)
        .bind(new.client_id)
        .bind(new.product_id)
        .bind(&new.comment)
        .bind(new.status.as_str())
        .bind(new.parent_comment_id)
        .fetch_one(executor)
        .await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Comment, DbError> {
        sqlx::query_as::<_, Comment>("SELECT * FROM lead_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("comment", id))
    }

    /// Open comments addressed to a client, newest first.
    pub async fn open_for_client(&self, client_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let sql = format!(
            "{VIEW_SELECT} WHERE c.client_id = $1 AND c.status = ANY($2) ORDER BY c.created_at DESC"
        );
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(client_id)
            .bind(CommentStatus::open_strs())
            .fetch_all(self.pool)
            .await?)
    }

    /// Open comments on the given clients that the lead wrote or that
    /// reply to one of the lead's comments.
    pub async fn open_for_lead(&self, lead_id: Uuid, client_ids: &[Uuid]) -> Result<Vec<CommentView>, DbError> {
        let sql = format!(
            r#"{VIEW_SELECT}
            WHERE c.client_id = ANY($2)
              AND c.status = ANY($3)
              AND (c.lead_id = $1
                   OR c.parent_comment_id IN (SELECT id FROM lead_comments WHERE lead_id = $1))
            ORDER BY c.created_at DESC"#
        );
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(lead_id)
            .bind(client_ids)
            .bind(CommentStatus::open_strs())
            .fetch_all(self.pool)
            .await?)
    }

    /// Mark the clients' replies to this lead as read.
    pub async fn mark_client_replies_read(&self, lead_id: Uuid, client_ids: &[Uuid]) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE lead_comments SET is_read = TRUE, updated_at = NOW()
            WHERE lead_id = $1 AND client_id = ANY($2) AND status = $3 AND NOT is_read
            "#,
        )
        .bind(lead_id)
        .bind(client_ids)
        .bind(CommentStatus::ClientReply.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark one comment addressed to `client_id` read. False when the
    /// comment is not theirs.
    pub async fn mark_read(&self, id: Uuid, client_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE lead_comments SET is_read = TRUE, updated_at = NOW() WHERE id = $1 AND client_id = $2",
        )
        .bind(id)
        .bind(client_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unread lead feedback addressed to a client (their own replies excluded)
    pub async fn unread_for_client(&self, client_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let sql = format!(
            "{VIEW_SELECT} WHERE c.client_id = $1 AND NOT c.is_read AND c.status <> $2 \
             ORDER BY c.created_at DESC"
        );
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(client_id)
            .bind(CommentStatus::ClientReply.as_str())
            .fetch_all(self.pool)
            .await?)
    }

    /// Unread client replies addressed to a lead
    pub async fn unread_replies_for_lead(&self, lead_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let sql = format!(
            "{VIEW_SELECT} WHERE c.lead_id = $1 AND c.status = $2 AND NOT c.is_read \
             ORDER BY c.created_at DESC"
        );
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(lead_id)
            .bind(CommentStatus::ClientReply.as_str())
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn for_product(&self, product_id: Uuid) -> Result<Vec<CommentView>, DbError> {
        let sql = format!("{VIEW_SELECT} WHERE c.product_id = $1 ORDER BY c.created_at");
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(product_id)
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn latest(&self, limit: i64) -> Result<Vec<CommentView>, DbError> {
        let sql = format!("{VIEW_SELECT} ORDER BY c.created_at DESC LIMIT $1");
        Ok(sqlx::query_as::<_, CommentView>(&sql)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(section: Option<&str>) -> CommentView {
        let now = Utc::now();
        CommentView {
            comment: Comment {
                id: Uuid::new_v4(),
                response_id: None,
                lead_id: Uuid::new_v4(),
                client_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                comment: "Please add evidence".into(),
                status: "needs_revision".into(),
                parent_comment_id: None,
                is_read: false,
                created_at: now,
                updated_at: now,
            },
            section: section.map(Into::into),
            question: None,
            answer: None,
            lead_username: "lead".into(),
            client_username: "client".into(),
            product_name: "Payments".into(),
        }
    }

    #[test]
    fn general_section_without_response() {
        assert_eq!(view(None).section_label(), "General");
        assert_eq!(view(Some("Governance")).section_label(), "Governance");
    }

    #[test]
    fn status_parses() {
        assert_eq!(view(None).comment.status(), CommentStatus::NeedsRevision);
    }
}
