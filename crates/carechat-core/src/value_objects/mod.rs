//! Value objects - immutable types that represent domain concepts

mod conversation_key;
mod snowflake;

pub use conversation_key::ConversationKey;
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
