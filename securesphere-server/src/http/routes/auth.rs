//! Login, logout, invitation registration and password change

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use securesphere_core::Role;
use serde::{Deserialize, Serialize};

use crate::auth::{generate_token, hash_password_async, verify_password_async};
use crate::db::{DbError, Invitation, InvitationRepo, NewUser, SessionRepo, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;
use crate::models::validation::optional;
use crate::models::{Email, NewPassword, Username, ValidationError};

const MAX_PROFILE_FIELD_LEN: usize = 100;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    /// Leads must replace the password they were created with
    pub must_change_password: bool,
    pub user: User,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub token: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub organization: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = ApiError::Unauthorized {
        reason: "invalid username or password",
    };
    let users = UserRepo::new(&state.pool);
    let Some(user) = users
        .find_by_username(req.username.trim())
        .await?
        .filter(|u| u.is_active)
    else {
        return Err(invalid);
    };
    if !verify_password_async(req.password, user.password_hash.clone()).await {
        return Err(invalid);
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config.session_ttl_hours);
    SessionRepo::new(&state.pool)
        .create(&token, user.id, expires_at)
        .await?;
    users.touch_login(user.id).await?;

    tracing::info!(user_id = %user.id, role = %user.role(), "user logged in");
    Ok(Json(LoginResponse {
        token,
        expires_at,
        role: user.role(),
        must_change_password: user.role() == Role::Lead && user.first_login,
        user,
    }))
}

/// POST /auth/logout
async fn logout(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<StatusCode, ApiError> {
    SessionRepo::new(&state.pool).delete(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The registering email must be the invited one, ignoring case.
fn ensure_invited_email(email: &Email, invitation: &Invitation) -> Result<(), ValidationError> {
    if !email.as_str().eq_ignore_ascii_case(&invitation.email) {
        return Err(ValidationError::Mismatch {
            field: "email",
            other: "invitation email",
        });
    }
    Ok(())
}

/// POST /auth/register - redeem an invitation
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let invitation = InvitationRepo::new(&state.pool)
        .find_by_token(req.token.trim())
        .await?
        .filter(|inv| inv.is_valid_at(Utc::now()))
        .ok_or(ApiError::InvalidInvitation {
            reason: "invitation is invalid or has expired",
        })?;

    let username = Username::new(&req.username)?;
    let email = Email::new(&req.email)?;
    ensure_invited_email(&email, &invitation)?;
    let password = NewPassword::strong(&req.password)?;
    let role = invitation.role.parse::<Role>().map_err(|e| ApiError::Internal {
        message: e.to_string(),
    })?;
    let organization = optional("organization", req.organization.as_deref(), MAX_PROFILE_FIELD_LEN)?
        .or_else(|| invitation.organization.clone());

    let password_hash = hash_password_async(password.expose().to_string()).await?;
    let new_user = NewUser {
        username: username.into_string(),
        email: email.into_string(),
        password_hash,
        role,
        organization,
        first_name: optional("first_name", req.first_name.as_deref(), MAX_PROFILE_FIELD_LEN)?,
        last_name: optional("last_name", req.last_name.as_deref(), MAX_PROFILE_FIELD_LEN)?,
        phone: optional("phone", req.phone.as_deref(), MAX_PROFILE_FIELD_LEN)?,
        first_login: false,
    };

    let user = InvitationRepo::new(&state.pool)
        .redeem(invitation.id, &new_user)
        .await
        .map_err(|e| match e {
            // Claimed by a concurrent registration
            DbError::NotFound { .. } => ApiError::InvalidInvitation {
                reason: "invitation is invalid or has expired",
            },
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, role = %role, "user registered from invitation");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/password
async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if !verify_password_async(req.current_password, auth.user.password_hash.clone()).await {
        return Err(ValidationError::InvalidFormat {
            field: "current_password",
            reason: "current password is incorrect",
        }
        .into());
    }
    let password = NewPassword::confirmed(&req.new_password, &req.confirm_password)?;
    let hash = hash_password_async(password.expose().to_string()).await?;
    UserRepo::new(&state.pool).set_password(auth.id(), &hash).await?;

    tracing::info!(user_id = %auth.id(), "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me
async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/register", post(register))
        .route("/auth/password", post(change_password))
        .route("/auth/me", get(me))
}
