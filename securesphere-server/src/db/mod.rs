//! Database layer - connection pool, schema and repositories
//!
//! - One shared `PgPool`, repositories borrow it
//! - Unique constraints decide conflicts, no check-then-insert
//! - Multi-step writes run in a transaction

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options};
pub use sqlx::PgPool;
pub use repos::*;
