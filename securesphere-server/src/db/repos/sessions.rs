//! Bearer-token sessions

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::users::User;
use super::DbError;

pub struct SessionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(self.pool)
            .await
            .map_err(DbError::on_unique("session"))?;
        Ok(())
    }

    /// Active user behind an unexpired token.
    pub async fn find_user(&self, token: &str) -> Result<Option<User>, DbError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.role, u.organization,
                   u.first_name, u.last_name, u.phone, u.is_active, u.first_login,
                   u.created_at, u.last_login
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW() AND u.is_active
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?)
    }

    pub async fn delete(&self, token: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
