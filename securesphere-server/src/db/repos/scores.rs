//! Cached per-section scores

use securesphere_core::SectionSnapshot;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::DbError;

pub struct ScoreRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ScoreRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Overwrite the snapshots of one assessment. Sections no longer
    /// present are removed so only the latest figures remain.
    pub async fn replace(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        snapshots: &[SectionSnapshot],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let sections: Vec<&str> = snapshots.iter().map(|s| s.section.as_str()).collect();
        sqlx::query(
            r#"
            DELETE FROM score_history
            WHERE product_id = $1 AND user_id = $2 AND NOT (section_name = ANY($3))
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(&sections)
        .execute(&mut *tx)
        .await?;

        for s in snapshots {
            sqlx::query(
                r#"
                INSERT INTO score_history
                    (id, product_id, user_id, section_name, total_score, max_score, percentage,
                     questions_answered, questions_total, calculated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                ON CONFLICT (product_id, user_id, section_name) DO UPDATE SET
                    total_score = EXCLUDED.total_score,
                    max_score = EXCLUDED.max_score,
                    percentage = EXCLUDED.percentage,
                    questions_answered = EXCLUDED.questions_answered,
                    questions_total = EXCLUDED.questions_total,
                    calculated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(user_id)
            .bind(&s.section)
            .bind(s.total_score)
            .bind(s.max_score)
            .bind(s.percentage)
            .bind(s.questions_answered)
            .bind(s.questions_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn for_assessment(&self, product_id: Uuid, user_id: Uuid) -> Result<Vec<SectionSnapshot>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT section_name, total_score, max_score, percentage, questions_answered, questions_total
            FROM score_history
            WHERE product_id = $1 AND user_id = $2
            ORDER BY section_name
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SectionSnapshot {
                section: r.get("section_name"),
                total_score: r.get("total_score"),
                max_score: r.get("max_score"),
                percentage: r.get("percentage"),
                questions_answered: r.get("questions_answered"),
                questions_total: r.get("questions_total"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn unknown_assessment_has_no_scores() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.unwrap();
        let repo = ScoreRepo::new(&pool);
        let none = repo
            .for_assessment(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
