//! Axum extractors for request handling
//!
//! Custom extractors for authentication, ids in paths, and validated
//! bodies and query strings.

mod auth;
mod path;
mod validated;

pub use auth::AuthUser;
pub use path::IdPath;
pub use validated::{ValidatedJson, ValidatedQuery};
