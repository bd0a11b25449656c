//! Repository implementations for database access
//!
//! Each repository borrows the pool and issues plain `sqlx::query` calls:
//! - List operations JOIN what they display (no N+1)
//! - Conflicts surface from unique constraints as `DbError::Conflict`
//! - Multi-step writes use a transaction

pub mod comments;
pub mod invitations;
pub mod products;
pub mod rejected;
pub mod responses;
pub mod reviews;
pub mod scores;
pub mod sessions;
pub mod users;

pub use comments::{Comment, CommentRepo, CommentView, NewComment};
pub use invitations::{Invitation, InvitationRepo, NewInvitation};
pub use products::{Product, ProductRepo, ProductStatusRow, ProductWithOwner, ProfileAnswerRow};
pub use rejected::{NewRejected, RejectedQuestion, RejectedRepo};
pub use responses::{Response, ResponseRepo, ResponseWithOwner, SaveAnswer};
pub use reviews::{Reselection, ReviewDecision, ReviewRecord, ReviewRepo};
pub use scores::ScoreRepo;
pub use sessions::SessionRepo;
pub use users::{ClientSummary, NewUser, User, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {resource} already exists")]
    Conflict { resource: &'static str },
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sqlx(e)
    }
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Turn a unique violation into `Conflict`, pass anything else through.
    pub fn on_unique(resource: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict { resource },
            _ => Self::Sqlx(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = DbError::not_found("product", "abc");
        assert_eq!(err.to_string(), "not found: product 'abc'");
    }

    #[test]
    fn non_unique_errors_pass_through() {
        let err = DbError::on_unique("user")(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
