//! Role-specific landing dashboards

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use securesphere_core::{maturity_report, overall_from_snapshots, GroupScore, MaturityLevel, Role};
use serde::Serialize;
use uuid::Uuid;

use super::comments::{group_by_section, CommentGroup};
use super::products::ProductSummary;
use crate::assessment::{next_section, section_progress};
use crate::db::{
    CommentRepo, CommentView, ProductRepo, ProductWithOwner, RejectedQuestion, RejectedRepo,
    Response, ResponseRepo, ResponseWithOwner, ScoreRepo, User, UserRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

const LATEST_RESPONSES: i64 = 100;
const LATEST_COMMENTS: i64 = 50;

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Client(ClientDashboard),
    Lead(LeadDashboard),
    Superuser(AdminDashboard),
}

#[derive(Serialize)]
pub struct ClientProductCard {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub completed_sections: usize,
    pub total_sections: usize,
    pub next_section: Option<usize>,
    pub overall_score: f64,
    pub rejected_count: i64,
    pub unread_comments: usize,
}

#[derive(Serialize)]
pub struct ClientDashboard {
    pub products: Vec<ClientProductCard>,
    pub rejected_questions: Vec<RejectedQuestion>,
    pub unread_comments: usize,
}

#[derive(Serialize)]
pub struct LeadProduct {
    pub product_id: Uuid,
    pub name: String,
    pub responses: Vec<Response>,
}

#[derive(Serialize)]
pub struct LeadClient {
    pub client: User,
    /// Products whose questionnaire is fully answered
    pub products: Vec<LeadProduct>,
}

#[derive(Serialize)]
pub struct LeadDashboard {
    pub clients: Vec<LeadClient>,
    pub unread_replies: Vec<CommentView>,
}

#[derive(Serialize)]
pub struct AdminProductRow {
    #[serde(flatten)]
    pub product: ProductWithOwner,
    pub dimensions: Vec<GroupScore>,
    pub overall: f64,
    pub level: MaturityLevel,
    pub questions_answered: usize,
    pub completion_percentage: f64,
}

#[derive(Serialize)]
pub struct AdminDashboard {
    pub products: Vec<AdminProductRow>,
    pub latest_responses: Vec<ResponseWithOwner>,
    pub latest_comments: Vec<CommentGroup>,
}

async fn client_dashboard(state: &AppState, client_id: Uuid) -> Result<ClientDashboard, ApiError> {
    let catalog = &state.questionnaire;
    let products = ProductRepo::new(&state.pool);
    let responses = ResponseRepo::new(&state.pool);
    let scores = ScoreRepo::new(&state.pool);
    let rejected = RejectedRepo::new(&state.pool);

    let unread = CommentRepo::new(&state.pool).unread_for_client(client_id).await?;

    let mut cards = Vec::new();
    for product in products.list_for_owner(client_id).await? {
        let status = products.status(product.id, client_id).await?;
        let answers: Vec<_> = responses
            .for_assessment(product.id, client_id)
            .await?
            .iter()
            .map(Response::record)
            .collect();
        let progress = section_progress(catalog, &answers);
        let snapshots = scores.for_assessment(product.id, client_id).await?;
        let rejected_count = rejected.count_pending_for_product(product.id, client_id).await?;
        let unread_comments = unread
            .iter()
            .filter(|c| c.comment.product_id == product.id)
            .count();

        cards.push(ClientProductCard {
            completed_sections: progress.iter().filter(|p| p.is_complete).count(),
            total_sections: progress.len(),
            next_section: next_section(&progress),
            overall_score: overall_from_snapshots(&snapshots),
            rejected_count,
            unread_comments,
            summary: ProductSummary::new(product, status.as_ref(), catalog.total_questions()),
        });
    }

    Ok(ClientDashboard {
        products: cards,
        rejected_questions: rejected.pending_for_user(client_id).await?,
        unread_comments: unread.len(),
    })
}

async fn lead_dashboard(state: &AppState, auth: &AuthUser) -> Result<LeadDashboard, ApiError> {
    let catalog = &state.questionnaire;
    let clients = UserRepo::new(&state.pool)
        .clients_by_ids(&auth.principal.assigned_clients)
        .await?;
    let products = ProductRepo::new(&state.pool)
        .list_for_owners(&auth.principal.assigned_clients)
        .await?;
    let responses = ResponseRepo::new(&state.pool);

    let mut rows = Vec::with_capacity(clients.len());
    for client in clients {
        let mut answered_products = Vec::new();
        for owned in products.iter().filter(|p| p.product.owner_id == client.id) {
            let product_responses = responses.for_assessment(owned.product.id, client.id).await?;
            let answers: Vec<_> = product_responses.iter().map(Response::record).collect();
            if next_section(&section_progress(catalog, &answers)).is_none() {
                answered_products.push(LeadProduct {
                    product_id: owned.product.id,
                    name: owned.product.name.clone(),
                    responses: product_responses,
                });
            }
        }
        rows.push(LeadClient {
            client,
            products: answered_products,
        });
    }

    Ok(LeadDashboard {
        clients: rows,
        unread_replies: CommentRepo::new(&state.pool)
            .unread_replies_for_lead(auth.id())
            .await?,
    })
}

async fn admin_dashboard(state: &AppState) -> Result<AdminDashboard, ApiError> {
    let catalog = &state.questionnaire;
    let responses = ResponseRepo::new(&state.pool);
    let total = catalog.total_questions();

    let mut rows = Vec::new();
    for product in ProductRepo::new(&state.pool).list_all().await? {
        let answers: Vec<_> = responses
            .for_assessment(product.product.id, product.product.owner_id)
            .await?
            .iter()
            .map(Response::record)
            .collect();
        let report = maturity_report(catalog, &answers);
        let completion_percentage = if total == 0 {
            0.0
        } else {
            answers.len() as f64 / total as f64 * 100.0
        };
        rows.push(AdminProductRow {
            product,
            dimensions: report.sections,
            overall: report.overall,
            level: report.level,
            questions_answered: answers.len(),
            completion_percentage,
        });
    }

    let comments = CommentRepo::new(&state.pool).latest(LATEST_COMMENTS).await?;
    Ok(AdminDashboard {
        products: rows,
        latest_responses: responses.latest(LATEST_RESPONSES).await?,
        latest_comments: group_by_section(comments),
    })
}

/// GET /dashboard
async fn dashboard(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<Json<Dashboard>, ApiError> {
    let body = match auth.role() {
        Role::Client => Dashboard::Client(client_dashboard(&state, auth.id()).await?),
        Role::Lead => Dashboard::Lead(lead_dashboard(&state, &auth).await?),
        Role::Superuser => Dashboard::Superuser(admin_dashboard(&state).await?),
    };
    Ok(Json(body))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_is_tagged_by_role() {
        let body = Dashboard::Client(ClientDashboard {
            products: Vec::new(),
            rejected_questions: Vec::new(),
            unread_comments: 3,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["role"], "client");
        assert_eq!(json["unread_comments"], 3);
    }

    #[test]
    fn lead_dashboard_serializes_empty() {
        let body = Dashboard::Lead(LeadDashboard {
            clients: Vec::new(),
            unread_replies: Vec::new(),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["role"], "lead");
        assert!(json["clients"].as_array().unwrap().is_empty());
    }
}
