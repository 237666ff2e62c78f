//! Entity to model mappers
//!
//! Rows are converted with `TryFrom<Model> for Entity`: text columns holding
//! enum values and JSONB maps can be corrupt, which surfaces as a storage error.

mod conversation;
mod message;
mod user;
