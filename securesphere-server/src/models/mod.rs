//! Request models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod account;
pub mod comment;
pub mod pagination;
pub mod product;
pub mod validation;

pub use account::{Email, NewPassword, Username};
pub use comment::CommentText;
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use product::{NewProduct, ProductInput, ProfileAnswer, ProfileAnswerInput};
pub use validation::ValidationError;
