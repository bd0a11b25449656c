//! Schema creation, safe to run on every start

use sqlx::PgPool;

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('client', 'lead', 'superuser')),
            organization TEXT,
            first_name TEXT,
            last_name TEXT,
            phone TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            first_login BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_login TIMESTAMPTZ
        )
        "#,
    ),
    (
        "users_email_idx",
        "CREATE INDEX IF NOT EXISTS users_email_idx ON users (lower(email))",
    ),
    (
        "lead_client_assignments",
        r#"
        CREATE TABLE IF NOT EXISTS lead_client_assignments (
            lead_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            client_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (lead_id, client_id)
        )
        "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    ),
    (
        "products",
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            application_name TEXT NOT NULL,
            product_owner TEXT NOT NULL,
            business_criticality TEXT NOT NULL,
            description TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "product_profile_answers",
        r#"
        CREATE TABLE IF NOT EXISTS product_profile_answers (
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            position SMALLINT NOT NULL CHECK (position BETWEEN 1 AND 10),
            category TEXT NOT NULL,
            description TEXT,
            other TEXT,
            PRIMARY KEY (product_id, position)
        )
        "#,
    ),
    (
        "product_statuses",
        r#"
        CREATE TABLE IF NOT EXISTS product_statuses (
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'in_progress',
            questions_completed INTEGER NOT NULL DEFAULT 0,
            total_questions INTEGER NOT NULL DEFAULT 0,
            completion_percentage DOUBLE PRECISION NOT NULL DEFAULT 0,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (product_id, user_id)
        )
        "#,
    ),
    (
        "questionnaire_responses",
        r#"
        CREATE TABLE IF NOT EXISTS questionnaire_responses (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            section TEXT NOT NULL,
            question TEXT NOT NULL,
            question_index INTEGER NOT NULL,
            answer TEXT NOT NULL,
            client_comment TEXT,
            evidence_path TEXT,
            score INTEGER NOT NULL,
            max_score INTEGER NOT NULL,
            is_reviewed BOOLEAN NOT NULL DEFAULT FALSE,
            is_approved BOOLEAN NOT NULL DEFAULT FALSE,
            needs_client_response BOOLEAN NOT NULL DEFAULT FALSE,
            review_status TEXT NOT NULL DEFAULT 'pending',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, product_id, question)
        )
        "#,
    ),
    (
        "lead_comments",
        r#"
        CREATE TABLE IF NOT EXISTS lead_comments (
            id UUID PRIMARY KEY,
            response_id UUID REFERENCES questionnaire_responses(id) ON DELETE CASCADE,
            lead_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            client_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            comment TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            parent_comment_id UUID REFERENCES lead_comments(id) ON DELETE CASCADE,
            is_read BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "lead_comments_client_idx",
        "CREATE INDEX IF NOT EXISTS lead_comments_client_idx ON lead_comments (client_id, is_read)",
    ),
    (
        "score_history",
        r#"
        CREATE TABLE IF NOT EXISTS score_history (
            id UUID PRIMARY KEY,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            section_name TEXT NOT NULL,
            total_score INTEGER NOT NULL,
            max_score INTEGER NOT NULL,
            percentage DOUBLE PRECISION NOT NULL,
            questions_answered INTEGER NOT NULL,
            questions_total INTEGER NOT NULL,
            calculated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (product_id, user_id, section_name)
        )
        "#,
    ),
    (
        "rejected_questions",
        r#"
        CREATE TABLE IF NOT EXISTS rejected_questions (
            id UUID PRIMARY KEY,
            response_id UUID NOT NULL REFERENCES questionnaire_responses(id) ON DELETE CASCADE,
            product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            lead_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            question_text TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            new_option TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            resolved_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "invitation_tokens",
        r#"
        CREATE TABLE IF NOT EXISTS invitation_tokens (
            id UUID PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('client', 'lead')),
            organization TEXT,
            invited_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            is_used BOOLEAN NOT NULL DEFAULT FALSE,
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            used_at TIMESTAMPTZ
        )
        "#,
    ),
];

/// Create every table and index that does not exist yet.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running migrations...");

    for (name, statement) in SCHEMA {
        tracing::debug!(object = name, "ensuring schema object");
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!(objects = SCHEMA.len(), "Migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_created_before_their_references() {
        let position = |name: &str| SCHEMA.iter().position(|(n, _)| *n == name).unwrap();
        assert!(position("users") < position("products"));
        assert!(position("products") < position("questionnaire_responses"));
        assert!(position("questionnaire_responses") < position("lead_comments"));
        assert!(position("questionnaire_responses") < position("rejected_questions"));
    }

    #[test]
    fn statements_are_idempotent() {
        assert!(SCHEMA
            .iter()
            .all(|(_, sql)| sql.contains("IF NOT EXISTS")));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_run_twice() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
    }
}
