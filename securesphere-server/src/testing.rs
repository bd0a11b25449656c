//! Test fixtures: a two-question catalog and seeded accounts for the tests
//! that run against PostgreSQL (`DATABASE_URL`, `#[ignore]`d by default).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use securesphere_core::{Questionnaire, Role, SphereConfig};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::generate_token;
use crate::db::{NewUser, Product, ProductRepo, SaveAnswer, SessionRepo, User, UserRepo};
use crate::http::server::AppState;
use crate::models::NewProduct;

pub(crate) const CATALOG: &str = "\
Dimensions,Sub-Dimensions,Questions,Description,Options,Scores
Governance,Governance - Policy,Is there a policy?,Written policy,A) None,1
,,,,E) Published,5
Access Control,Access Control - Authentication,Is MFA enforced?,Admins,A) No,1
,,,,E) Always,5
";

pub(crate) const POLICY: &str = "Is there a policy?";

pub(crate) fn catalog() -> Questionnaire {
    Questionnaire::from_reader(CATALOG.as_bytes()).unwrap()
}

pub(crate) fn state(pool: PgPool) -> Arc<AppState> {
    Arc::new(AppState::new(pool, catalog(), SphereConfig::default()))
}

pub(crate) async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = crate::db::create_pool(&url).await.unwrap();
    crate::db::migrations::run(&pool).await.unwrap();
    pool
}

pub(crate) async fn user(pool: &PgPool, role: Role) -> User {
    let name = format!("{}-{}", role, Uuid::new_v4().simple());
    UserRepo::new(pool)
        .create(&NewUser {
            email: format!("{name}@example.com"),
            username: name,
            password_hash: "unused".into(),
            role,
            organization: Some("Acme".into()),
            first_name: None,
            last_name: None,
            phone: None,
            first_login: false,
        })
        .await
        .unwrap()
}

/// A client with one product and a lead assigned to the client
pub(crate) struct Assessment {
    pub client: User,
    pub lead: User,
    pub product: Product,
}

pub(crate) async fn assessment(pool: &PgPool) -> Assessment {
    let client = user(pool, Role::Client).await;
    let lead = user(pool, Role::Lead).await;
    UserRepo::new(pool).assign(lead.id, client.id).await.unwrap();
    let product = ProductRepo::new(pool)
        .create(
            client.id,
            &NewProduct {
                application_name: "Payments".into(),
                product_owner: "Jo".into(),
                business_criticality: "High".into(),
                description: None,
                profile: Vec::new(),
            },
        )
        .await
        .unwrap();
    Assessment { client, lead, product }
}

/// An answer to the Governance policy question
pub(crate) fn policy_answer(answer: &str) -> SaveAnswer {
    let score = if answer.starts_with("E)") { 5 } else { 1 };
    SaveAnswer {
        section: "Governance".into(),
        question: POLICY.into(),
        question_index: 0,
        answer: answer.into(),
        client_comment: None,
        score,
        max_score: 5,
    }
}

pub(crate) async fn session(pool: &PgPool, user: &User) -> String {
    let token = generate_token();
    SessionRepo::new(pool)
        .create(&token, user.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    token
}

/// Send a JSON request and return the status with the parsed body
/// (`Null` when empty).
pub(crate) async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
