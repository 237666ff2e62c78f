//! Route handlers
//!
//! All HTTP request handlers organized by resource.

pub mod conversations;
pub mod directory;
pub mod health;
pub mod messages;
