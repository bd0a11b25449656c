//! Lead review of responses and the client's rejected-answer reselection

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use securesphere_core::{AnswerOption, AssessmentStatus, RejectedStatus, ReviewAction, ReviewStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accessible_product;
use crate::assessment;
use crate::db::{
    RejectedQuestion, RejectedRepo, Reselection, Response, ResponseRepo, ReviewDecision, ReviewRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidUuid};
use crate::http::server::AppState;
use crate::models::CommentText;

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub action: ReviewAction,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewOutcome {
    pub response_id: Uuid,
    pub review_status: ReviewStatus,
    pub assessment_status: AssessmentStatus,
    pub comment_id: Option<Uuid>,
    pub rejected_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ResponseStatus {
    pub response_id: Uuid,
    pub review_status: ReviewStatus,
    pub is_reviewed: bool,
    pub is_approved: bool,
    pub needs_client_response: bool,
    pub rejected_id: Option<Uuid>,
}

/// Rejected entry with what the client needs to pick a new answer
#[derive(Serialize)]
pub struct RejectedView {
    #[serde(flatten)]
    pub entry: RejectedQuestion,
    pub question_number: Option<usize>,
    pub section: Option<String>,
    pub current_answer: Option<String>,
    pub options: Vec<AnswerOption>,
}

#[derive(Deserialize)]
pub struct ReselectRequest {
    pub new_option: String,
}

#[derive(Serialize)]
pub struct ReselectOutcome {
    pub response_id: Uuid,
    pub answer: String,
    pub assessment_status: AssessmentStatus,
}

/// POST /responses/{id}/review
async fn review(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ReviewOutcome>, ApiError> {
    auth.require_reviewer()?;
    let comment = CommentText::optional(req.comment.as_deref())?.map(CommentText::into_string);
    let response = ResponseRepo::new(&state.pool).get(id).await?;
    auth.ensure_access(response.user_id)?;

    let record = ReviewRepo::new(&state.pool)
        .apply(
            &response,
            &ReviewDecision {
                lead_id: auth.id(),
                action: req.action,
                comment,
            },
        )
        .await?;

    let assessment_status =
        assessment::recalculate(&state.pool, &state.questionnaire, response.product_id, response.user_id).await?;
    tracing::info!(
        response_id = %response.id,
        product_id = %response.product_id,
        lead_id = %auth.id(),
        action = %req.action,
        cancelled = record.cancelled,
        "response reviewed"
    );

    Ok(Json(ReviewOutcome {
        response_id: response.id,
        review_status: req.action.flags().status,
        assessment_status,
        comment_id: record.comment.map(|c| c.id),
        rejected_id: record.rejected.map(|r| r.id),
    }))
}

/// GET /responses/{id}/status
async fn response_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<ResponseStatus>, ApiError> {
    let response = ResponseRepo::new(&state.pool).get(id).await?;
    auth.ensure_access(response.user_id)?;
    let open = RejectedRepo::new(&state.pool).pending_for_response(id).await?;

    Ok(Json(ResponseStatus {
        response_id: response.id,
        review_status: response.review_status(),
        is_reviewed: response.is_reviewed,
        is_approved: response.is_approved,
        needs_client_response: response.needs_client_response,
        rejected_id: open.map(|r| r.id),
    }))
}

/// GET /products/{id}/rejected - the owner's pending rejected questions
async fn rejected_for_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Vec<RejectedView>>, ApiError> {
    let product = accessible_product(&state, &auth, id).await?;
    let entries = RejectedRepo::new(&state.pool)
        .pending_for_assessment(product.id, product.owner_id)
        .await?;
    let responses = ResponseRepo::new(&state.pool)
        .for_assessment(product.id, product.owner_id)
        .await?;

    let views = entries
        .into_iter()
        .map(|entry| {
            let question = state.questionnaire.find_question(&entry.question_text);
            let current_answer = responses
                .iter()
                .find(|r| r.id == entry.response_id)
                .map(|r| r.answer.clone());
            RejectedView {
                question_number: question.map(|q| q.number),
                section: question.map(|q| q.dimension.clone()),
                options: question.map(|q| q.options.clone()).unwrap_or_default(),
                current_answer,
                entry,
            }
        })
        .collect();
    Ok(Json(views))
}

fn not_rejected() -> ApiError {
    ApiError::Conflict {
        message: "only rejected responses can be reselected".to_string(),
    }
}

/// Store the client's new option, put the response back into pending
/// review and recalculate the assessment.
async fn reselect_answer(
    state: &AppState,
    response: &Response,
    new_option: &str,
) -> Result<AssessmentStatus, ApiError> {
    let catalog = &state.questionnaire;
    catalog.validate_answer(&response.question, new_option)?;

    let choice = Reselection {
        answer: new_option.to_string(),
        score: i32::from(catalog.score_answer(&response.question, new_option)),
        max_score: i32::from(catalog.max_score(&response.question)),
    };
    // The response may have been approved since it was loaded
    let resolved = ReviewRepo::new(&state.pool)
        .reselect(response.id, &choice)
        .await?
        .ok_or_else(not_rejected)?;

    let status = assessment::recalculate(&state.pool, catalog, response.product_id, response.user_id).await?;
    tracing::info!(
        response_id = %response.id,
        product_id = %response.product_id,
        user_id = %response.user_id,
        resolved,
        "rejected answer reselected"
    );
    Ok(status)
}

fn own_response(auth: &AuthUser, response: &Response) -> Result<(), ApiError> {
    auth.require_client()?;
    if response.user_id != auth.id() {
        return Err(ApiError::forbidden("response belongs to another user"));
    }
    Ok(())
}

fn ensure_rejected(response: &Response) -> Result<(), ApiError> {
    if response.review_status() != ReviewStatus::Rejected {
        return Err(not_rejected());
    }
    Ok(())
}

/// POST /rejected/{id}/resolve
async fn resolve(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<ReselectRequest>,
) -> Result<Json<ReselectOutcome>, ApiError> {
    let entry = RejectedRepo::new(&state.pool).get(id).await?;
    if entry.status() != RejectedStatus::Pending {
        return Err(ApiError::Conflict {
            message: format!("rejected question is already {}", entry.status()),
        });
    }
    let response = ResponseRepo::new(&state.pool).get(entry.response_id).await?;
    own_response(&auth, &response)?;
    ensure_rejected(&response)?;

    let assessment_status = reselect_answer(&state, &response, &req.new_option).await?;
    Ok(Json(ReselectOutcome {
        response_id: response.id,
        answer: req.new_option,
        assessment_status,
    }))
}

/// POST /responses/{id}/reselect - only while the response is rejected
async fn reselect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidUuid(id): ValidUuid,
    Json(req): Json<ReselectRequest>,
) -> Result<Json<ReselectOutcome>, ApiError> {
    let response = ResponseRepo::new(&state.pool).get(id).await?;
    own_response(&auth, &response)?;
    ensure_rejected(&response)?;

    let assessment_status = reselect_answer(&state, &response, &req.new_option).await?;
    Ok(Json(ReselectOutcome {
        response_id: response.id,
        answer: req.new_option,
        assessment_status,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/responses/{id}/review", post(review))
        .route("/responses/{id}/status", get(response_status))
        .route("/responses/{id}/reselect", post(reselect))
        .route("/products/{id}/rejected", get(rejected_for_product))
        .route("/rejected/{id}/resolve", post(resolve))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::http::server::{build_router, test_state};

    #[test]
    fn review_request_parses_action() {
        let req: ReviewRequest =
            serde_json::from_str(r#"{"action": "needs_revision", "comment": "add evidence"}"#).unwrap();
        assert_eq!(req.action, ReviewAction::NeedsRevision);

        let req: ReviewRequest = serde_json::from_str(r#"{"action": "reject"}"#).unwrap();
        assert_eq!(req.action, ReviewAction::Reject);
        assert!(req.comment.is_none());
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        assert!(serde_json::from_str::<ReviewRequest>(r#"{"action": "maybe"}"#).is_err());
    }

    #[tokio::test]
    async fn review_requires_auth() {
        let app = build_router(test_state(), false);
        let uri = format!("/responses/{}/review", Uuid::new_v4());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action": "approve"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn response_with_status(status: ReviewStatus) -> Response {
        let now = chrono::Utc::now();
        Response {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            section: "Governance".into(),
            question: "Is there a policy?".into(),
            question_index: 0,
            answer: "A) None".into(),
            client_comment: None,
            evidence_path: None,
            score: 1,
            max_score: 5,
            is_reviewed: status != ReviewStatus::Pending,
            is_approved: status == ReviewStatus::Approved,
            needs_client_response: status == ReviewStatus::Rejected,
            review_status: status.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_rejected_responses_take_a_new_answer() {
        assert!(ensure_rejected(&response_with_status(ReviewStatus::Rejected)).is_ok());
        for status in [ReviewStatus::Approved, ReviewStatus::Pending] {
            let err = ensure_rejected(&response_with_status(status)).unwrap_err();
            assert!(matches!(err, ApiError::Conflict { .. }));
        }
    }

    mod with_database {
        use super::*;
        use crate::testing::{assessment, policy_answer, pool, send, session, state, Assessment};
        use serde_json::json;

        struct Fixture {
            app: Router,
            pool: sqlx::PgPool,
            a: Assessment,
            response: Response,
            lead_token: String,
            client_token: String,
        }

        async fn fixture() -> Fixture {
            let pool = pool().await;
            let a = assessment(&pool).await;
            let responses = ResponseRepo::new(&pool);
            responses
                .save_section(a.product.id, a.client.id, &[policy_answer("A) None")])
                .await
                .unwrap();
            let response = responses.for_assessment(a.product.id, a.client.id).await.unwrap().remove(0);
            let lead_token = session(&pool, &a.lead).await;
            let client_token = session(&pool, &a.client).await;
            Fixture {
                app: build_router(state(pool.clone()), false),
                pool,
                a,
                response,
                lead_token,
                client_token,
            }
        }

        impl Fixture {
            async fn review(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
                let uri = format!("/responses/{}/review", self.response.id);
                send(&self.app, "POST", &uri, Some(&self.lead_token), body).await
            }

            async fn resolve(&self, rejected_id: &str, option: &str) -> (StatusCode, serde_json::Value) {
                let uri = format!("/rejected/{rejected_id}/resolve");
                send(&self.app, "POST", &uri, Some(&self.client_token), json!({ "new_option": option })).await
            }

            async fn stored(&self) -> Response {
                ResponseRepo::new(&self.pool).get(self.response.id).await.unwrap()
            }
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn resolve_after_approval_is_rejected() {
            let f = fixture().await;
            let (status, body) = f.review(json!({ "action": "reject", "comment": "No evidence" })).await;
            assert_eq!(status, StatusCode::OK);
            let rejected_id = body["rejected_id"].as_str().unwrap().to_string();

            let (status, body) = f.review(json!({ "action": "approve" })).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["review_status"], "approved");

            let (status, _) = f.resolve(&rejected_id, "E) Published").await;
            assert_eq!(status, StatusCode::CONFLICT);
            let stored = f.stored().await;
            assert_eq!(stored.answer, "A) None");
            assert_eq!(stored.review_status(), ReviewStatus::Approved);
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn reselect_after_approval_is_rejected() {
            let f = fixture().await;
            f.review(json!({ "action": "reject" })).await;
            f.review(json!({ "action": "approve" })).await;

            let uri = format!("/responses/{}/reselect", f.response.id);
            let (status, _) =
                send(&f.app, "POST", &uri, Some(&f.client_token), json!({ "new_option": "E) Published" })).await;
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(f.stored().await.answer, "A) None");
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn oversized_comment_leaves_response_untouched() {
            let f = fixture().await;
            let comment = "x".repeat(6000);
            let (status, body) = f.review(json!({ "action": "reject", "comment": comment })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "validation_error");

            let stored = f.stored().await;
            assert_eq!(stored.review_status(), ReviewStatus::Pending);
            assert!(!stored.is_reviewed);
            let pending = RejectedRepo::new(&f.pool)
                .pending_for_response(f.response.id)
                .await
                .unwrap();
            assert!(pending.is_none());
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn rejected_entry_resolves_once() {
            let f = fixture().await;
            let (_, body) = f.review(json!({ "action": "reject" })).await;
            let rejected_id = body["rejected_id"].as_str().unwrap().to_string();

            let (status, body) = f.resolve(&rejected_id, "E) Published").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["answer"], "E) Published");
            let stored = f.stored().await;
            assert_eq!(stored.answer, "E) Published");
            assert_eq!(stored.score, 5);
            assert_eq!(stored.review_status(), ReviewStatus::Pending);

            let (status, _) = f.resolve(&rejected_id, "A) None").await;
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(f.stored().await.answer, "E) Published");
        }

        #[tokio::test]
        #[ignore = "requires database"]
        async fn resolve_rejects_unknown_option() {
            let f = fixture().await;
            let (_, body) = f.review(json!({ "action": "reject" })).await;
            let rejected_id = body["rejected_id"].as_str().unwrap().to_string();

            let (status, _) = f.resolve(&rejected_id, "Z) Made up").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(f.stored().await.review_status(), ReviewStatus::Rejected);
            let pending = RejectedRepo::new(&f.pool)
                .pending_for_assessment(f.a.product.id, f.a.client.id)
                .await
                .unwrap();
            assert_eq!(pending.len(), 1);
        }
    }
}
