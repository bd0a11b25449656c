//! Products, intake answers and assessment status rows

use chrono::{DateTime, Utc};
use securesphere_core::{AssessmentStatus, ProgressCounts};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;
use crate::models::NewProduct;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub application_name: String,
    pub product_owner: String,
    pub business_criticality: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product joined with the client that owns it
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub owner_username: String,
    pub owner_organization: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProfileAnswerRow {
    pub position: i16,
    pub category: String,
    pub description: Option<String>,
    pub other: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductStatusRow {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub questions_completed: i32,
    pub total_questions: i32,
    pub completion_percentage: f64,
    pub last_updated: DateTime<Utc>,
}

const PRODUCT_WITH_OWNER: &str = r#"
    SELECT p.id, p.owner_id, p.name, p.application_name, p.product_owner,
           p.business_criticality, p.description, p.is_active, p.created_at, p.updated_at,
           u.username AS owner_username, u.organization AS owner_organization
    FROM products p
    JOIN users u ON u.id = p.owner_id
"#;

pub struct ProductRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product and its intake answers together.
    pub async fn create(&self, owner_id: Uuid, product: &NewProduct) -> Result<Product, DbError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, owner_id, name, application_name, product_owner,
                                  business_criticality, description)
            VALUES ($1, $2, $3, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&product.application_name)
        .bind(&product.product_owner)
        .bind(&product.business_criticality)
        .bind(&product.description)
        .fetch_one(&mut *tx)
        .await?;

        for answer in &product.profile {
            sqlx::query(
                r#"
                INSERT INTO product_profile_answers (product_id, position, category, description, other)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(created.id)
            .bind(answer.position)
            .bind(&answer.category)
            .bind(&answer.description)
            .bind(&answer.other)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, DbError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    pub async fn get_with_owner(&self, id: Uuid) -> Result<ProductWithOwner, DbError> {
        let sql = format!("{PRODUCT_WITH_OWNER} WHERE p.id = $1");
        sqlx::query_as::<_, ProductWithOwner>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Product>, DbError> {
        Ok(sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE owner_id = $1 ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn list_for_owners(&self, owner_ids: &[Uuid]) -> Result<Vec<ProductWithOwner>, DbError> {
        let sql = format!("{PRODUCT_WITH_OWNER} WHERE p.owner_id = ANY($1) ORDER BY u.username, p.created_at");
        Ok(sqlx::query_as::<_, ProductWithOwner>(&sql)
            .bind(owner_ids)
            .fetch_all(self.pool)
            .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<ProductWithOwner>, DbError> {
        let sql = format!("{PRODUCT_WITH_OWNER} ORDER BY p.created_at DESC");
        Ok(sqlx::query_as::<_, ProductWithOwner>(&sql)
            .fetch_all(self.pool)
            .await?)
    }

    /// Delete a product. Responses, comments, scores and rejected entries
    /// go with it through `ON DELETE CASCADE`.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("product", id));
        }
        Ok(())
    }

    pub async fn profile(&self, id: Uuid) -> Result<Vec<ProfileAnswerRow>, DbError> {
        Ok(sqlx::query_as::<_, ProfileAnswerRow>(
            r#"
            SELECT position, category, description, other
            FROM product_profile_answers
            WHERE product_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn status(&self, product_id: Uuid, user_id: Uuid) -> Result<Option<ProductStatusRow>, DbError> {
        Ok(sqlx::query_as::<_, ProductStatusRow>(
            "SELECT * FROM product_statuses WHERE product_id = $1 AND user_id = $2",
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?)
    }

    pub async fn statuses_for_products(&self, product_ids: &[Uuid]) -> Result<Vec<ProductStatusRow>, DbError> {
        Ok(sqlx::query_as::<_, ProductStatusRow>(
            "SELECT * FROM product_statuses WHERE product_id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn upsert_status(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        status: AssessmentStatus,
        counts: &ProgressCounts,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO product_statuses
                (product_id, user_id, status, questions_completed, total_questions,
                 completion_percentage, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (product_id, user_id) DO UPDATE SET
                status = EXCLUDED.status,
                questions_completed = EXCLUDED.questions_completed,
                total_questions = EXCLUDED.total_questions,
                completion_percentage = EXCLUDED.completion_percentage,
                last_updated = NOW()
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(counts.answered as i32)
        .bind(counts.total as i32)
        .bind(counts.completion_percentage())
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_with_owner_serializes_flat() {
        let now = Utc::now();
        let row = ProductWithOwner {
            product: Product {
                id: Uuid::nil(),
                owner_id: Uuid::nil(),
                name: "Payments".into(),
                application_name: "Payments".into(),
                product_owner: "Jo".into(),
                business_criticality: "High".into(),
                description: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            owner_username: "acme".into(),
            owner_organization: Some("Acme".into()),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["application_name"], "Payments");
        assert_eq!(json["owner_username"], "acme");
    }
}
