//! Invitation tokens and invitation-based registration

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::users::{NewUser, User, UserRepo};
use super::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub token: String,
    pub email: String,
    pub role: String,
    pub organization: Option<String>,
    pub invited_by: Uuid,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub token: String,
    pub email: String,
    pub role: String,
    pub organization: Option<String>,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct InvitationRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> InvitationRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, invitation: &NewInvitation) -> Result<Invitation, DbError> {
        Ok(sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitation_tokens (id, token, email, role, organization, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&invitation.token)
        .bind(&invitation.email)
        .bind(&invitation.role)
        .bind(&invitation.organization)
        .bind(invitation.invited_by)
        .bind(invitation.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(DbError::on_unique("invitation"))?)
    }

    /// Whether an unused, unexpired invitation exists for this email
    pub async fn pending_exists(&self, email: &str) -> Result<bool, DbError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invitation_tokens
                WHERE lower(email) = lower($1) AND NOT is_used AND expires_at > NOW()
            ) AS pending
            "#,
        )
        .bind(email)
        .fetch_one(self.pool)
        .await?;
        Ok(row.get("pending"))
    }

    pub async fn list_pending(&self) -> Result<Vec<Invitation>, DbError> {
        Ok(sqlx::query_as::<_, Invitation>(
            r#"
            SELECT * FROM invitation_tokens
            WHERE NOT is_used AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Invitation>, DbError> {
        Ok(
            sqlx::query_as::<_, Invitation>("SELECT * FROM invitation_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(self.pool)
                .await?,
        )
    }

    /// Revoke by marking used.
    pub async fn revoke(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE invitation_tokens SET is_used = TRUE, used_at = NOW() WHERE id = $1 AND NOT is_used",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("invitation", id));
        }
        Ok(())
    }

    /// Consume the invitation and create its user in one transaction.
    ///
    /// The invitation is claimed with a conditional update, so a token that
    /// was used or expired in the meantime yields `NotFound` and no user.
    pub async fn redeem(&self, invitation_id: Uuid, user: &NewUser) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE invitation_tokens
            SET is_used = TRUE, used_at = NOW()
            WHERE id = $1 AND NOT is_used AND expires_at > NOW()
            "#,
        )
        .bind(invitation_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(DbError::not_found("invitation", invitation_id));
        }

        let created = UserRepo::insert(&mut *tx, user).await?;
        tx.commit().await?;
        Ok(created)
    }
}
