//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use securesphere_core::{ClientScope, Principal, Role};
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::db::{SessionRepo, User, UserRepo};
use crate::models::ValidationError;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated user resolved from the session token.
///
/// Leads carry their assigned client ids in the principal.
pub struct AuthUser {
    pub user: User,
    pub principal: Principal,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn scope(&self) -> ClientScope {
        ClientScope::for_principal(&self.principal)
    }

    pub fn require_client(&self) -> Result<(), ApiError> {
        self.require(&[Role::Client], "client access required")
    }

    /// Leads and superusers
    pub fn require_reviewer(&self) -> Result<(), ApiError> {
        self.require(&[Role::Lead, Role::Superuser], "lead access required")
    }

    pub fn require_superuser(&self) -> Result<(), ApiError> {
        self.require(&[Role::Superuser], "superuser access required")
    }

    /// Fails with 403 unless the user may see data of `client_id`.
    pub fn ensure_access(&self, client_id: Uuid) -> Result<(), ApiError> {
        if self.principal.can_access_client(client_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("no access to this client"))
        }
    }

    fn require(&self, roles: &[Role], reason: &str) -> Result<(), ApiError> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(ApiError::forbidden(reason))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(ApiError::Unauthorized {
                reason: "missing bearer token",
            })?
            .to_string();

        let user = SessionRepo::new(&state.pool)
            .find_user(&token)
            .await?
            .ok_or(ApiError::Unauthorized {
                reason: "invalid or expired session",
            })?;

        let role = user.role();
        let mut principal = Principal::new(user.id, role);
        if role == Role::Lead {
            let clients = UserRepo::new(&state.pool).assigned_client_ids(user.id).await?;
            principal = principal.with_clients(clients);
        }

        Ok(Self {
            user,
            principal,
            token,
        })
    }
}

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        parse_uuid("id", &id).map(Self)
    }
}

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| {
        ApiError::Validation(ValidationError::InvalidFormat {
            field,
            reason: "invalid UUID format",
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn uuid_parsing() {
        assert!(parse_uuid("id", "not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
    }
}
