//! Route handlers organized by resource

pub mod admin;
pub mod auth;
pub mod comments;
pub mod dashboard;
pub mod health;
pub mod products;
pub mod questionnaire;
pub mod reviews;

use uuid::Uuid;

use super::error::ApiError;
use super::extractors::AuthUser;
use super::server::AppState;
use crate::db::{Product, ProductRepo};

/// Load a product the caller may see: its owner, a lead assigned to the
/// owner, or a superuser.
pub(crate) async fn accessible_product(
    state: &AppState,
    auth: &AuthUser,
    product_id: Uuid,
) -> Result<Product, ApiError> {
    let product = ProductRepo::new(&state.pool).get(product_id).await?;
    auth.ensure_access(product.owner_id)?;
    Ok(product)
}
