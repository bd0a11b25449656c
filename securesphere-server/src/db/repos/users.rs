//! User accounts and lead/client assignments

use chrono::{DateTime, Utc};
use securesphere_core::Role;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{Paginated, Pagination};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, organization, first_name, \
                            last_name, phone, is_active, first_login, created_at, last_login";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub organization: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub first_login: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Parsed role. The column is CHECK-constrained, unknown text falls
    /// back to the least privileged role.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Client)
    }
}

/// Insert payload for a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub organization: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub first_login: bool,
}

/// Client row for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub organization: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub product_count: i64,
    pub leads: Vec<String>,
}

pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn insert<'e, E>(executor: E, user: &NewUser) -> Result<User, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, organization,
                               first_name, last_name, phone, first_login)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.organization)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(user.first_login)
            .fetch_one(executor)
            .await
            .map_err(DbError::on_unique("user"))
    }

    /// Create a user. A taken username is a `Conflict`.
    pub async fn create(&self, user: &NewUser) -> Result<User, DbError> {
        Self::insert(self.pool, user).await
    }

    /// Create a lead and its first client assignment in one transaction.
    pub async fn create_lead(&self, user: &NewUser, client_id: Uuid) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;
        let lead = Self::insert(&mut *tx, user).await?;
        sqlx::query("INSERT INTO lead_client_assignments (lead_id, client_id) VALUES ($1, $2)")
            .bind(lead.id)
            .bind(client_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(lead)
    }

    /// Insert a superuser unless the username exists. Returns whether a row
    /// was created.
    pub async fn ensure_superuser(&self, user: &NewUser) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, first_login)
            VALUES ($1, $2, $3, $4, 'superuser', FALSE)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1)) AS taken")
            .bind(email)
            .fetch_one(self.pool)
            .await?;
        Ok(row.get("taken"))
    }

    pub async fn touch_login(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Store a new password hash and clear the first-login flag.
    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, first_login = FALSE WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    pub async fn list(&self, page: Pagination) -> Result<Paginated<User>, DbError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, total, page))
    }

    /// Ids of the active clients assigned to a lead
    pub async fn assigned_client_ids(&self, lead_id: Uuid) -> Result<Vec<Uuid>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT a.client_id
            FROM lead_client_assignments a
            JOIN users u ON u.id = a.client_id
            WHERE a.lead_id = $1 AND u.is_active AND u.role = 'client'
            "#,
        )
        .bind(lead_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("client_id")).collect())
    }

    /// Active clients by id, ordered by username
    pub async fn clients_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DbError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id = ANY($1) AND role = 'client' AND is_active ORDER BY username"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?)
    }

    /// Assign a client to a lead. Returns false when already assigned.
    pub async fn assign(&self, lead_id: Uuid, client_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO lead_client_assignments (lead_id, client_id)
            VALUES ($1, $2)
            ON CONFLICT (lead_id, client_id) DO NOTHING
            "#,
        )
        .bind(lead_id)
        .bind(client_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove an assignment. Returns false when there was none.
    pub async fn unassign(&self, lead_id: Uuid, client_id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            "DELETE FROM lead_client_assignments WHERE lead_id = $1 AND client_id = $2",
        )
        .bind(lead_id)
        .bind(client_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All clients with product counts and assigned lead usernames.
    pub async fn client_summaries(&self) -> Result<Vec<ClientSummary>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT
                u.id, u.username, u.email, u.organization, u.is_active, u.created_at,
                (SELECT COUNT(*) FROM products p WHERE p.owner_id = u.id) AS product_count,
                COALESCE(
                    ARRAY(
                        SELECT l.username
                        FROM lead_client_assignments a
                        JOIN users l ON l.id = a.lead_id
                        WHERE a.client_id = u.id
                        ORDER BY l.username
                    ),
                    '{}'
                ) AS leads
            FROM users u
            WHERE u.role = 'client'
            ORDER BY u.organization NULLS LAST, u.username
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ClientSummary {
                id: r.get("id"),
                username: r.get("username"),
                email: r.get("email"),
                organization: r.get("organization"),
                is_active: r.get("is_active"),
                created_at: r.get("created_at"),
                product_count: r.get("product_count"),
                leads: r.get("leads"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "u".into(),
            email: "u@example.com".into(),
            password_hash: "hash".into(),
            role: role.into(),
            organization: None,
            first_name: None,
            last_name: None,
            phone: None,
            is_active: true,
            first_login: false,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn role_parses_column() {
        assert_eq!(user("lead").role(), Role::Lead);
        assert_eq!(user("superuser").role(), Role::Superuser);
        assert_eq!(user("garbage").role(), Role::Client);
    }

    #[test]
    fn password_hash_not_serialized() {
        let json = serde_json::to_value(user("client")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "client");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_username_conflicts() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::migrations::run(&pool).await.unwrap();

        let name = format!("dup-{}", Uuid::new_v4());
        let new = NewUser {
            username: name,
            email: "dup@example.com".into(),
            password_hash: "x".into(),
            role: Role::Client,
            organization: None,
            first_name: None,
            last_name: None,
            phone: None,
            first_login: false,
        };
        let repo = UserRepo::new(&pool);
        repo.create(&new).await.unwrap();
        assert!(matches!(
            repo.create(&new).await,
            Err(DbError::Conflict { resource: "user" })
        ));
    }
}
