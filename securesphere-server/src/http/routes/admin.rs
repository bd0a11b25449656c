//! Superuser administration: invitations, leads, clients and products

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use securesphere_core::{
    maturity_report, overall_from_snapshots, points_report, sub_dimension_scores, AssessmentStatus,
    GroupScore, MaturityReport, PointsReport, Role, SectionSnapshot,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::products::ProductSummary;
use crate::assessment;
use crate::auth::{generate_token, hash_password_async};
use crate::db::{
    ClientSummary, CommentRepo, CommentView, Invitation, InvitationRepo, NewInvitation, NewUser,
    Product, ProductRepo, ProductWithOwner, RejectedQuestion, RejectedRepo, Response, ResponseRepo,
    ScoreRepo, User, UserRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::validation::optional;
use crate::models::{
    Email, NewPassword, NewProduct, Paginated, Pagination, PaginationParams, ProductInput,
    Username, ValidationError,
};

const MAX_ORGANIZATION_LEN: usize = 100;

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: Role,
    pub organization: Option<String>,
}

#[derive(Serialize)]
pub struct InviteResponse {
    pub invitation: Invitation,
    /// Registration link to hand to the invitee
    pub link: String,
}

#[derive(Deserialize)]
pub struct CreateLeadRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub client_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization: Option<String>,
}

#[derive(Serialize)]
pub struct AssignmentChange {
    pub lead_id: Uuid,
    pub client_id: Uuid,
    pub changed: bool,
}

#[derive(Deserialize)]
pub struct AdminProductRequest {
    pub client_id: Uuid,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// Responses of one section
#[derive(Serialize)]
pub struct SectionResponses {
    pub section: String,
    pub responses: Vec<Response>,
}

#[derive(Serialize)]
pub struct ClientProductReport {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub snapshots: Vec<SectionSnapshot>,
    pub overall_score: f64,
    pub comments: Vec<CommentView>,
    pub rejected_questions: Vec<RejectedQuestion>,
    pub responses: Vec<SectionResponses>,
}

#[derive(Serialize)]
pub struct ClientDetail {
    pub client: User,
    pub products: Vec<ClientProductReport>,
    pub total_products: usize,
    pub completed_products: usize,
    pub average_completion: f64,
}

/// A root comment with its replies
#[derive(Debug, Serialize)]
pub struct CommentThread {
    pub root: CommentView,
    pub replies: Vec<CommentView>,
    pub unread_count: usize,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ThreadGroup {
    pub section: String,
    pub threads: Vec<CommentThread>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct AdminProductDetail {
    #[serde(flatten)]
    pub product: ProductWithOwner,
    pub maturity: MaturityReport,
    pub sub_dimensions: Vec<GroupScore>,
    pub threads: Vec<ThreadGroup>,
}

#[derive(Serialize)]
pub struct ProductScores {
    pub product_id: Uuid,
    pub product_name: String,
    pub owner_username: String,
    pub scores: PointsReport,
}

/// Build threads from a product's comments (oldest first). A reply joins
/// the thread of whichever comment it answers, however deep.
pub(crate) fn build_threads(comments: Vec<CommentView>) -> Vec<ThreadGroup> {
    let mut threads: Vec<CommentThread> = Vec::new();
    let mut pending: Vec<CommentView> = Vec::new();

    for view in comments {
        match view.comment.parent_comment_id {
            None => threads.push(CommentThread {
                last_activity: view.comment.created_at,
                unread_count: usize::from(!view.comment.is_read),
                root: view,
                replies: Vec::new(),
            }),
            Some(_) => pending.push(view),
        }
    }

    // Attach replies until nothing moves; orphans are dropped
    loop {
        let before = pending.len();
        let mut rest = Vec::new();
        for reply in pending {
            let parent = reply.comment.parent_comment_id;
            let thread = threads.iter_mut().find(|t| {
                Some(t.root.comment.id) == parent
                    || t.replies.iter().any(|r| Some(r.comment.id) == parent)
            });
            match thread {
                Some(thread) => {
                    thread.last_activity = thread.last_activity.max(reply.comment.created_at);
                    thread.unread_count += usize::from(!reply.comment.is_read);
                    thread.replies.push(reply);
                }
                None => rest.push(reply),
            }
        }
        pending = rest;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    let mut groups: Vec<ThreadGroup> = Vec::new();
    for mut thread in threads {
        thread.replies.sort_by_key(|r| r.comment.created_at);
        let label = thread.root.section_label().to_string();
        match groups.iter_mut().find(|g| g.section == label) {
            Some(group) => {
                group.last_activity = group.last_activity.max(thread.last_activity);
                group.threads.push(thread);
            }
            None => groups.push(ThreadGroup {
                section: label,
                last_activity: thread.last_activity,
                threads: vec![thread],
            }),
        }
    }
    for group in &mut groups {
        group.threads.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    }
    groups.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    groups
}

/// Responses grouped by section in catalog order, unknown sections last.
fn responses_by_section(state: &AppState, responses: Vec<Response>) -> Vec<SectionResponses> {
    let mut groups: Vec<SectionResponses> = state
        .questionnaire
        .section_names()
        .map(|name| SectionResponses {
            section: name.to_string(),
            responses: Vec::new(),
        })
        .collect();
    for response in responses {
        match groups.iter_mut().find(|g| g.section == response.section) {
            Some(group) => group.responses.push(response),
            None => groups.push(SectionResponses {
                section: response.section.clone(),
                responses: vec![response],
            }),
        }
    }
    groups.retain(|g| !g.responses.is_empty());
    groups
}

async fn require_role(state: &AppState, id: Uuid, role: Role, field: &'static str) -> Result<User, ApiError> {
    let user = UserRepo::new(&state.pool).get(id).await?;
    if user.role() != role {
        return Err(ValidationError::InvalidVariant {
            field,
            value: id.to_string(),
        }
        .into());
    }
    Ok(user)
}

/// POST /admin/invitations
async fn invite(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), ApiError> {
    auth.require_superuser()?;
    if !req.role.is_invitable() {
        return Err(ValidationError::InvalidVariant {
            field: "role",
            value: req.role.to_string(),
        }
        .into());
    }
    let email = Email::new(&req.email)?;

    if UserRepo::new(&state.pool).email_taken(email.as_str()).await? {
        return Err(ApiError::Conflict {
            message: "a user with this email already exists".to_string(),
        });
    }
    let invitations = InvitationRepo::new(&state.pool);
    if invitations.pending_exists(email.as_str()).await? {
        return Err(ApiError::Conflict {
            message: "a pending invitation already exists for this email".to_string(),
        });
    }

    let invitation = invitations
        .create(&NewInvitation {
            token: generate_token(),
            email: email.into_string(),
            role: req.role.as_str().to_string(),
            organization: optional("organization", req.organization.as_deref(), MAX_ORGANIZATION_LEN)?,
            invited_by: auth.id(),
            expires_at: Utc::now() + Duration::days(state.config.invitation_ttl_days),
        })
        .await?;
    let link = state.config.invitation_link(&invitation.token);

    tracing::info!(invitation_id = %invitation.id, role = %req.role, "invitation created");
    Ok((StatusCode::CREATED, Json(InviteResponse { invitation, link })))
}

/// GET /admin/invitations - pending only
async fn list_invitations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    auth.require_superuser()?;
    Ok(Json(InvitationRepo::new(&state.pool).list_pending().await?))
}

/// DELETE /admin/invitations/{id}
async fn revoke_invitation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    auth.require_superuser()?;
    InvitationRepo::new(&state.pool).revoke(id).await?;
    tracing::info!(invitation_id = %id, "invitation revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<User>>, ApiError> {
    auth.require_superuser()?;
    let page = Pagination::from(params);
    Ok(Json(UserRepo::new(&state.pool).list(page).await?))
}

/// POST /admin/leads - lead with an initial client
async fn create_lead(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    auth.require_superuser()?;
    let username = Username::new(&req.username)?;
    let email = Email::new(&req.email)?;
    let password = NewPassword::strong(&req.password)?;
    require_role(&state, req.client_id, Role::Client, "client_id").await?;

    let users = UserRepo::new(&state.pool);
    if users.email_taken(email.as_str()).await? {
        return Err(ApiError::Conflict {
            message: "a user with this email already exists".to_string(),
        });
    }
    let password_hash = hash_password_async(password.expose().to_string()).await?;

    let lead = users
        .create_lead(
            &NewUser {
                username: username.into_string(),
                email: email.into_string(),
                password_hash,
                role: Role::Lead,
                organization: optional("organization", req.organization.as_deref(), MAX_ORGANIZATION_LEN)?,
                first_name: optional("first_name", req.first_name.as_deref(), MAX_ORGANIZATION_LEN)?,
                last_name: optional("last_name", req.last_name.as_deref(), MAX_ORGANIZATION_LEN)?,
                phone: None,
                first_login: true,
            },
            req.client_id,
        )
        .await?;

    tracing::info!(lead_id = %lead.id, client_id = %req.client_id, "lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

/// PUT /admin/leads/{lead}/clients/{client}
async fn assign_client(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((lead_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AssignmentChange>, ApiError> {
    auth.require_superuser()?;
    require_role(&state, lead_id, Role::Lead, "lead_id").await?;
    require_role(&state, client_id, Role::Client, "client_id").await?;

    let changed = UserRepo::new(&state.pool).assign(lead_id, client_id).await?;
    tracing::info!(%lead_id, %client_id, changed, "client assigned");
    Ok(Json(AssignmentChange {
        lead_id,
        client_id,
        changed,
    }))
}

/// DELETE /admin/leads/{lead}/clients/{client}
async fn unassign_client(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((lead_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AssignmentChange>, ApiError> {
    auth.require_superuser()?;
    let changed = UserRepo::new(&state.pool).unassign(lead_id, client_id).await?;
    tracing::info!(%lead_id, %client_id, changed, "client unassigned");
    Ok(Json(AssignmentChange {
        lead_id,
        client_id,
        changed,
    }))
}

/// GET /admin/clients
async fn list_clients(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<ClientSummary>>, ApiError> {
    auth.require_superuser()?;
    Ok(Json(UserRepo::new(&state.pool).client_summaries().await?))
}

/// GET /admin/clients/{id}
async fn client_detail(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ClientDetail>, ApiError> {
    auth.require_superuser()?;
    let client = require_role(&state, id, Role::Client, "client id").await?;

    let products = ProductRepo::new(&state.pool);
    let rejected = RejectedRepo::new(&state.pool).for_user(client.id).await?;
    let mut reports = Vec::new();
    for product in products.list_for_owner(client.id).await? {
        let status = products.status(product.id, client.id).await?;
        let snapshots = ScoreRepo::new(&state.pool).for_assessment(product.id, client.id).await?;
        let comments = CommentRepo::new(&state.pool).for_product(product.id).await?;
        let responses = ResponseRepo::new(&state.pool)
            .for_assessment(product.id, client.id)
            .await?;

        reports.push(ClientProductReport {
            overall_score: overall_from_snapshots(&snapshots),
            snapshots,
            comments,
            rejected_questions: rejected
                .iter()
                .filter(|r| r.product_id == product.id)
                .cloned()
                .collect(),
            responses: responses_by_section(&state, responses),
            summary: ProductSummary::new(product, status.as_ref(), state.questionnaire.total_questions()),
        });
    }

    let total_products = reports.len();
    let completed_products = reports
        .iter()
        .filter(|r| r.summary.status == AssessmentStatus::Completed)
        .count();
    let average_completion = if total_products == 0 {
        0.0
    } else {
        reports.iter().map(|r| r.summary.completion_percentage).sum::<f64>() / total_products as f64
    };

    Ok(Json(ClientDetail {
        client,
        products: reports,
        total_products,
        completed_products,
        average_completion,
    }))
}

/// GET /admin/products/{id}
async fn product_detail(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<AdminProductDetail>, ApiError> {
    auth.require_superuser()?;
    let product = ProductRepo::new(&state.pool).get_with_owner(id).await?;
    let answers =
        assessment::load_answers(&state.pool, product.product.id, product.product.owner_id).await?;
    let comments = CommentRepo::new(&state.pool).for_product(id).await?;

    Ok(Json(AdminProductDetail {
        maturity: maturity_report(&state.questionnaire, &answers),
        sub_dimensions: sub_dimension_scores(&state.questionnaire, &answers),
        threads: build_threads(comments),
        product,
    }))
}

/// POST /admin/products - create a product on behalf of a client
async fn create_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<AdminProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    auth.require_superuser()?;
    require_role(&state, req.client_id, Role::Client, "client_id").await?;
    let new = NewProduct::new(req.product)?;
    let product = ProductRepo::new(&state.pool).create(req.client_id, &new).await?;
    assessment::recalculate(&state.pool, &state.questionnaire, product.id, product.owner_id).await?;

    tracing::info!(product_id = %product.id, client_id = %req.client_id, "product created by admin");
    Ok((StatusCode::CREATED, Json(product)))
}

/// DELETE /admin/products/{id}
async fn delete_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    auth.require_superuser()?;
    ProductRepo::new(&state.pool).delete(id).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/scores - points summary of every product
async fn all_scores(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<ProductScores>>, ApiError> {
    auth.require_superuser()?;
    let mut rows = Vec::new();
    for product in ProductRepo::new(&state.pool).list_all().await? {
        let answers =
            assessment::load_answers(&state.pool, product.product.id, product.product.owner_id).await?;
        rows.push(ProductScores {
            product_id: product.product.id,
            product_name: product.product.name,
            owner_username: product.owner_username,
            scores: points_report(&state.questionnaire, &answers),
        });
    }
    Ok(Json(rows))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/invitations", post(invite).get(list_invitations))
        .route("/admin/invitations/{id}", delete(revoke_invitation))
        .route("/admin/users", get(list_users))
        .route("/admin/leads", post(create_lead))
        .route(
            "/admin/leads/{lead}/clients/{client}",
            put(assign_client).delete(unassign_client),
        )
        .route("/admin/clients", get(list_clients))
        .route("/admin/clients/{id}", get(client_detail))
        .route("/admin/products", post(create_product))
        .route("/admin/products/{id}", get(product_detail).delete(delete_product))
        .route("/admin/scores", get(all_scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Comment;

    fn view(
        id: Uuid,
        parent: Option<Uuid>,
        section: Option<&str>,
        minutes: i64,
        is_read: bool,
    ) -> CommentView {
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes);
        CommentView {
            comment: Comment {
                id,
                response_id: None,
                lead_id: Uuid::nil(),
                client_id: Uuid::nil(),
                product_id: Uuid::nil(),
                comment: "text".into(),
                status: "pending".into(),
                parent_comment_id: parent,
                is_read,
                created_at: at,
                updated_at: at,
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
    fn replies_join_their_root_thread() {
        let root = Uuid::new_v4();
        let reply = Uuid::new_v4();
        let groups = build_threads(vec![
            view(root, None, Some("Governance"), 0, true),
            view(reply, Some(root), Some("Governance"), 5, false),
            view(Uuid::new_v4(), Some(reply), Some("Governance"), 10, false),
        ]);
        assert_eq!(groups.len(), 1);
        let thread = &groups[0].threads[0];
        assert_eq!(thread.replies.len(), 2);
        assert_eq!(thread.unread_count, 2);
        assert_eq!(thread.last_activity, thread.replies[1].comment.created_at);
    }

    #[test]
    fn groups_sorted_by_last_activity() {
        let groups = build_threads(vec![
            view(Uuid::new_v4(), None, Some("Governance"), 0, true),
            view(Uuid::new_v4(), None, None, 30, true),
        ]);
        assert_eq!(groups[0].section, "General");
        assert_eq!(groups[1].section, "Governance");
    }

    #[test]
    fn orphan_replies_are_dropped() {
        let groups = build_threads(vec![view(Uuid::new_v4(), Some(Uuid::new_v4()), None, 0, false)]);
        assert!(groups.is_empty());
    }

    #[test]
    fn invite_request_parses_role() {
        let req: InviteRequest =
            serde_json::from_str(r#"{"email": "a@example.com", "role": "lead"}"#).unwrap();
        assert_eq!(req.role, Role::Lead);
        assert!(serde_json::from_str::<InviteRequest>(r#"{"email": "a@example.com", "role": "admin"}"#).is_err());
    }
}
