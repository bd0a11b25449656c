//! Superuser accounts created outside the HTTP API

use securesphere_core::{BootstrapAdmin, Role};
use sqlx::PgPool;

use crate::auth::{hash_password_async, AuthError};
use crate::db::{DbError, NewUser, User, UserRepo};
use crate::models::{Email, NewPassword, Username, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid admin account: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Db(#[from] DbError),
}

async fn superuser(username: &str, email: &str, password: &str) -> Result<NewUser, BootstrapError> {
    let username = Username::new(username)?;
    let email = Email::new(email)?;
    let password = NewPassword::strong(password)?;
    Ok(NewUser {
        username: username.into_string(),
        email: email.into_string(),
        password_hash: hash_password_async(password.expose().to_string()).await?,
        role: Role::Superuser,
        organization: None,
        first_name: None,
        last_name: None,
        phone: None,
        first_login: false,
    })
}

/// Create the configured admin unless the username exists. Returns whether
/// an account was created.
pub async fn ensure_admin(pool: &PgPool, admin: &BootstrapAdmin) -> Result<bool, BootstrapError> {
    let new = superuser(&admin.username, &admin.email, &admin.password).await?;
    let created = UserRepo::new(pool).ensure_superuser(&new).await?;
    if created {
        tracing::info!(username = %new.username, "bootstrap superuser created");
    }
    Ok(created)
}

/// Create a superuser. A taken username is a `Conflict`.
pub async fn create_admin(
    pool: &PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, BootstrapError> {
    let new = superuser(username, email, password).await?;
    let user = UserRepo::new(pool).create(&new).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "superuser created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn weak_password_is_refused() {
        let err = superuser("admin", "admin@example.com", "short").await.unwrap_err();
        assert!(matches!(err, BootstrapError::Validation(ValidationError::TooShort { .. })));
    }

    #[tokio::test]
    async fn superuser_payload_has_hash() {
        let new = superuser("admin", "admin@example.com", "Sup3rSecret").await.unwrap();
        assert_eq!(new.role, Role::Superuser);
        assert!(new.password_hash.starts_with("$argon2"));
        assert!(!new.first_login);
    }
}
