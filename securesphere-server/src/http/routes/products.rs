//! Products and the client's questionnaire flow
//!
//! Section saves go through [`ResponseRepo::save_section`], which leaves
//! approved answers untouched, then scores and status are recalculated.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use securesphere_core::{
    dimension_rollup, maturity_report, points_report, question_cells, ring_heatmap, ring_segments,
    section_snapshots, sub_dimension_scores, AnswerOption, AssessmentStatus,
    GroupScore, MaturityReport, PointsReport, QuestionCell, RingHeatmap, RingSegments,
    ReviewStatus, Role, SectionSnapshot,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accessible_product;
use crate::assessment::{self, section_progress, SectionProgress};
use crate::db::{
    CommentRepo, CommentView, Product, ProductRepo, ProductStatusRow, ProfileAnswerRow,
    RejectedRepo, Response, ResponseRepo, SaveAnswer,
};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::{CommentText, NewProduct, ProductInput, ValidationError};

/// Product with its assessment progress
#[derive(Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub status: AssessmentStatus,
    pub questions_completed: i32,
    pub total_questions: i32,
    pub completion_percentage: f64,
}

impl ProductSummary {
    pub(crate) fn new(product: Product, status: Option<&ProductStatusRow>, total_questions: usize) -> Self {
        match status {
            Some(row) => Self {
                product,
                status: row.status.parse().unwrap_or(AssessmentStatus::InProgress),
                questions_completed: row.questions_completed,
                total_questions: row.total_questions,
                completion_percentage: row.completion_percentage,
            },
            None => Self {
                product,
                status: AssessmentStatus::InProgress,
                questions_completed: 0,
                total_questions: total_questions as i32,
                completion_percentage: 0.0,
            },
        }
    }
}

#[derive(Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub owner_username: String,
    pub owner_organization: Option<String>,
    pub profile: Vec<ProfileAnswerRow>,
}

/// One question of a section with the client's current answer
#[derive(Serialize)]
pub struct SectionQuestion {
    pub number: usize,
    pub index: usize,
    pub text: String,
    pub description: String,
    pub sub_dimension: Option<String>,
    pub options: Vec<AnswerOption>,
    pub response_id: Option<Uuid>,
    pub answer: Option<String>,
    pub client_comment: Option<String>,
    pub review_status: Option<ReviewStatus>,
    pub needs_client_response: bool,
}

#[derive(Serialize)]
pub struct SectionView {
    pub index: usize,
    pub name: String,
    pub questions: Vec<SectionQuestion>,
    pub progress: Vec<SectionProgress>,
}

#[derive(Deserialize)]
pub struct AnswerInput {
    pub question: String,
    pub answer: String,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveSectionRequest {
    pub answers: Vec<AnswerInput>,
}

#[derive(Serialize)]
pub struct SaveSectionResponse {
    pub saved: u64,
    pub resolved_rejections: u64,
    pub status: AssessmentStatus,
    /// `None` after the last section
    pub next_section: Option<usize>,
}

#[derive(Serialize)]
pub struct ResponseWithComments {
    #[serde(flatten)]
    pub response: Response,
    pub comments: Vec<CommentView>,
}

#[derive(Serialize)]
pub struct ResultsView {
    pub product_id: Uuid,
    pub maturity: MaturityReport,
    pub sections: Vec<SectionSnapshot>,
    pub sub_dimensions: Vec<GroupScore>,
    pub dimensions: Vec<GroupScore>,
    pub heatmap: Vec<QuestionCell>,
    pub rings: RingHeatmap,
    pub ring_segments: RingSegments,
    pub responses: Vec<ResponseWithComments>,
}

/// POST /products - a client registers an application
async fn create_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    auth.require_client()?;
    let new = NewProduct::new(input)?;
    let product = ProductRepo::new(&state.pool).create(auth.id(), &new).await?;
    assessment::recalculate(&state.pool, &state.questionnaire, product.id, product.owner_id).await?;

    tracing::info!(product_id = %product.id, user_id = %auth.id(), "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products - own products for clients, visible ones otherwise
async fn list_products(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<ProductSummary>>, ApiError> {
    let repo = ProductRepo::new(&state.pool);
    let products: Vec<Product> = match auth.role() {
        Role::Client => repo.list_for_owner(auth.id()).await?,
        Role::Lead => repo
            .list_for_owners(&auth.principal.assigned_clients)
            .await?
            .into_iter()
            .map(|p| p.product)
            .collect(),
        Role::Superuser => repo.list_all().await?.into_iter().map(|p| p.product).collect(),
    };

    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let statuses = repo.statuses_for_products(&ids).await?;
    let total = state.questionnaire.total_questions();
    let summaries = products
        .into_iter()
        .map(|p| {
            let status = statuses
                .iter()
                .find(|s| s.product_id == p.id && s.user_id == p.owner_id);
            ProductSummary::new(p, status, total)
        })
        .collect();
    Ok(Json(summaries))
}

/// GET /products/{id}
async fn get_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ProductDetail>, ApiError> {
    let repo = ProductRepo::new(&state.pool);
    let found = repo.get_with_owner(id).await?;
    auth.ensure_access(found.product.owner_id)?;

    let status = repo.status(id, found.product.owner_id).await?;
    let profile = repo.profile(id).await?;
    Ok(Json(ProductDetail {
        summary: ProductSummary::new(found.product, status.as_ref(), state.questionnaire.total_questions()),
        owner_username: found.owner_username,
        owner_organization: found.owner_organization,
        profile,
    }))
}

/// GET /products/{id}/sections/{idx}
async fn get_section(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((product_id, idx)): Path<(Uuid, usize)>,
) -> Result<Json<SectionView>, ApiError> {
    let product = accessible_product(&state, &auth, product_id).await?;
    let section = state
        .questionnaire
        .section(idx)
        .ok_or_else(|| ApiError::not_found("section", idx))?;

    let responses = ResponseRepo::new(&state.pool)
        .for_assessment(product.id, product.owner_id)
        .await?;
    let by_question: HashMap<&str, &Response> =
        responses.iter().map(|r| (r.question.as_str(), r)).collect();

    let questions = section
        .questions
        .iter()
        .map(|q| {
            let response = by_question.get(q.text.as_str()).copied();
            SectionQuestion {
                number: q.number,
                index: q.index,
                text: q.text.clone(),
                description: q.description.clone(),
                sub_dimension: q.sub_dimension.clone(),
                options: q.options.clone(),
                response_id: response.map(|r| r.id),
                answer: response.map(|r| r.answer.clone()),
                client_comment: response.and_then(|r| r.client_comment.clone()),
                review_status: response.map(Response::review_status),
                needs_client_response: response.is_some_and(|r| r.needs_client_response),
            }
        })
        .collect();

    let records: Vec<_> = responses.iter().map(Response::record).collect();
    Ok(Json(SectionView {
        index: idx,
        name: section.name.clone(),
        questions,
        progress: section_progress(&state.questionnaire, &records),
    }))
}

/// Check a section save against the catalog and score each answer.
fn prepare_answers(
    state: &AppState,
    section_name: &str,
    answers: &[AnswerInput],
) -> Result<Vec<SaveAnswer>, ApiError> {
    let catalog = &state.questionnaire;
    let mut prepared = Vec::with_capacity(answers.len());

    for input in answers {
        let question = catalog
            .find_question(&input.question)
            .filter(|q| q.dimension == section_name)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "question",
                value: input.question.clone(),
            })?;
        catalog.validate_answer(&question.text, &input.answer)?;

        prepared.push(SaveAnswer {
            section: section_name.to_string(),
            question: question.text.clone(),
            question_index: question.index as i32,
            answer: input.answer.clone(),
            client_comment: CommentText::optional(input.comment.as_deref())?.map(CommentText::into_string),
            score: i32::from(catalog.score_answer(&question.text, &input.answer)),
            max_score: i32::from(question.max_score()),
        });
    }
    Ok(prepared)
}

/// PUT /products/{id}/sections/{idx} - the owning client saves a section
async fn save_section(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((product_id, idx)): Path<(Uuid, usize)>,
    Json(req): Json<SaveSectionRequest>,
) -> Result<Json<SaveSectionResponse>, ApiError> {
    auth.require_client()?;
    let product = accessible_product(&state, &auth, product_id).await?;
    let section = state
        .questionnaire
        .section(idx)
        .ok_or_else(|| ApiError::not_found("section", idx))?;

    let answers = prepare_answers(&state, &section.name, &req.answers)?;
    let saved = ResponseRepo::new(&state.pool)
        .save_section(product.id, auth.id(), &answers)
        .await?;

    let reanswered: Vec<(String, String)> = answers
        .iter()
        .map(|a| (a.question.clone(), a.answer.clone()))
        .collect();
    let resolved_rejections = RejectedRepo::new(&state.pool)
        .resolve_answered(product.id, auth.id(), &reanswered)
        .await?;

    let status = assessment::recalculate(&state.pool, &state.questionnaire, product.id, auth.id()).await?;
    let next = idx + 1;
    tracing::info!(
        product_id = %product.id,
        user_id = %auth.id(),
        section = %section.name,
        saved,
        resolved_rejections,
        "section saved"
    );

    Ok(Json(SaveSectionResponse {
        saved,
        resolved_rejections,
        status,
        next_section: (next < state.questionnaire.section_count()).then_some(next),
    }))
}

/// GET /products/{id}/results
async fn results(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ResultsView>, ApiError> {
    let product = accessible_product(&state, &auth, id).await?;
    let catalog = &state.questionnaire;

    let responses = ResponseRepo::new(&state.pool)
        .for_assessment(product.id, product.owner_id)
        .await?;
    let answers: Vec<_> = responses.iter().map(Response::record).collect();
    let comments = CommentRepo::new(&state.pool).for_product(product.id).await?;

    let sub_dimensions = sub_dimension_scores(catalog, &answers);
    let dimensions = dimension_rollup(&sub_dimensions);
    let segments = ring_segments(&sub_dimensions);

    let responses = responses
        .into_iter()
        .map(|response| {
            let comments = comments
                .iter()
                .filter(|c| c.comment.response_id == Some(response.id))
                .cloned()
                .collect();
            ResponseWithComments { response, comments }
        })
        .collect();

    Ok(Json(ResultsView {
        product_id: product.id,
        maturity: maturity_report(catalog, &answers),
        sections: section_snapshots(catalog, &answers),
        sub_dimensions,
        dimensions,
        heatmap: question_cells(catalog, &answers),
        rings: ring_heatmap(catalog, &answers),
        ring_segments: segments,
        responses,
    }))
}

/// GET /products/{id}/scores - raw points per section
async fn scores(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<PointsReport>, ApiError> {
    let product = accessible_product(&state, &auth, id).await?;
    let answers = assessment::load_answers(&state.pool, product.id, product.owner_id).await?;
    Ok(Json(points_report(&state.questionnaire, &answers)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}/sections/{idx}", get(get_section).put(save_section))
        .route("/products/{id}/results", get(results))
        .route("/products/{id}/scores", get(scores))
}
