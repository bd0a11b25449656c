//! securesphere-server: JSON API for security-maturity assessments
//!
//! Clients answer the questionnaire for their products, leads review the
//! answers, superusers administer accounts and watch aggregate scores.
//! State lives in PostgreSQL; scoring rules come from `securesphere-core`.

pub mod assessment;
pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod http;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{create_admin, ensure_admin, BootstrapError};
pub use db::{create_pool, create_pool_with_options, DbError};
pub use http::{build_router, run_server, ApiError, AppState, ServerConfig, ServerError};
