//! Comment inboxes, replies and unread notifications

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use securesphere_core::{CommentStatus, Role};
use serde::{Deserialize, Serialize};

use crate::db::{Comment, CommentRepo, CommentView, NewComment};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::CommentText;

const SUPERUSER_INBOX_LIMIT: i64 = 50;

/// Comments of one questionnaire section
#[derive(Debug, Serialize)]
pub struct CommentGroup {
    pub section: String,
    pub comments: Vec<CommentView>,
}

/// Group comments by section label, keeping first-seen order.
pub(crate) fn group_by_section(comments: Vec<CommentView>) -> Vec<CommentGroup> {
    let mut groups: Vec<CommentGroup> = Vec::new();
    for comment in comments {
        let label = comment.section_label().to_string();
        match groups.iter_mut().find(|g| g.section == label) {
            Some(group) => group.comments.push(comment),
            None => groups.push(CommentGroup {
                section: label,
                comments: vec![comment],
            }),
        }
    }
    groups
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub comment: String,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub count: usize,
    pub comments: Vec<CommentView>,
}

/// GET /comments - open comments for the caller, grouped by section
async fn inbox(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<CommentGroup>>, ApiError> {
    let repo = CommentRepo::new(&state.pool);
    let comments = match auth.role() {
        Role::Client => repo.open_for_client(auth.id()).await?,
        Role::Lead => {
            let clients = &auth.principal.assigned_clients;
            let open = repo.open_for_lead(auth.id(), clients).await?;
            let marked = repo.mark_client_replies_read(auth.id(), clients).await?;
            if marked > 0 {
                tracing::debug!(lead_id = %auth.id(), marked, "client replies marked read");
            }
            open
        }
        Role::Superuser => repo.latest(SUPERUSER_INBOX_LIMIT).await?,
    };
    Ok(Json(group_by_section(comments)))
}

/// POST /comments/{id}/read - a client marks a comment read
async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    auth.require_client()?;
    if !CommentRepo::new(&state.pool).mark_read(id, auth.id()).await? {
        return Err(ApiError::not_found("comment", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Whether a lead may answer `parent`: the lead wrote it, or it replies to
/// a comment the lead wrote.
async fn lead_owns_thread(repo: &CommentRepo<'_>, parent: &Comment, lead_id: uuid::Uuid) -> Result<bool, ApiError> {
    if parent.lead_id == lead_id {
        return Ok(true);
    }
    match parent.parent_comment_id {
        Some(root_id) => Ok(repo.get(root_id).await?.lead_id == lead_id),
        None => Ok(false),
    }
}

/// POST /comments/{id}/reply
async fn reply(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let text = CommentText::new(&req.comment)?;
    let repo = CommentRepo::new(&state.pool);
    let parent = repo.get(id).await?;

    let new = match auth.role() {
        Role::Client => {
            if parent.client_id != auth.id() {
                return Err(ApiError::forbidden("comment is addressed to another client"));
            }
            NewComment {
                response_id: parent.response_id,
                lead_id: parent.lead_id,
                client_id: auth.id(),
                product_id: parent.product_id,
                comment: text.into_string(),
                status: CommentStatus::ClientReply,
                parent_comment_id: Some(parent.id),
            }
        }
        Role::Lead => {
            auth.ensure_access(parent.client_id)?;
            if !lead_owns_thread(&repo, &parent, auth.id()).await? {
                return Err(ApiError::forbidden("comment thread belongs to another lead"));
            }
            NewComment {
                response_id: parent.response_id,
                lead_id: auth.id(),
                client_id: parent.client_id,
                product_id: parent.product_id,
                comment: text.into_string(),
                status: CommentStatus::LeadReply,
                parent_comment_id: Some(parent.id),
            }
        }
        Role::Superuser => return Err(ApiError::forbidden("only clients and leads can reply")),
    };

    let created = repo.create(&new).await?;
    tracing::info!(
        comment_id = %created.id,
        parent_id = %parent.id,
        status = %new.status,
        "comment reply added"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /notifications/unread
async fn unread(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UnreadResponse>, ApiError> {
    let repo = CommentRepo::new(&state.pool);
    let comments = match auth.role() {
        Role::Client => repo.unread_for_client(auth.id()).await?,
        Role::Lead => repo.unread_replies_for_lead(auth.id()).await?,
        Role::Superuser => Vec::new(),
    };
    Ok(Json(UnreadResponse {
        count: comments.len(),
        comments,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/comments", get(inbox))
        .route("/comments/{id}/read", post(mark_read))
        .route("/comments/{id}/reply", post(reply))
        .route("/notifications/unread", get(unread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn view(section: Option<&str>, text: &str) -> CommentView {
        let now = Utc::now();
        CommentView {
            comment: Comment {
                id: Uuid::new_v4(),
                response_id: None,
                lead_id: Uuid::new_v4(),
                client_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                comment: text.into(),
                status: "pending".into(),
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
    fn groups_keep_first_seen_order() {
        let groups = group_by_section(vec![
            view(Some("Access Control"), "one"),
            view(None, "two"),
            view(Some("Access Control"), "three"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].section, "Access Control");
        assert_eq!(groups[0].comments.len(), 2);
        assert_eq!(groups[1].section, "General");
    }

    #[test]
    fn empty_reply_is_invalid() {
        assert!(CommentText::new("   ").is_err());
    }
}
