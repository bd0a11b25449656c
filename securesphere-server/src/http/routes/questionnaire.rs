//! Questionnaire catalog endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use securesphere_core::Section;
use serde::Serialize;

use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct CatalogResponse {
    pub total_questions: usize,
    pub sections: Vec<Section>,
}

/// GET /questionnaire - any signed-in role
async fn catalog(State(state): State<Arc<AppState>>, _auth: AuthUser) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        total_questions: state.questionnaire.total_questions(),
        sections: state.questionnaire.sections().to_vec(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/questionnaire", get(catalog))
}
