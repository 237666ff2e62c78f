//! # carechat-db
//!
//! PostgreSQL implementations of the conversation, message, reaction and
//! user-directory ports defined in `carechat-core`.
//!
//! - Connection pool management and embedded migrations
//! - Database models with SQLx `FromRow` derives
//! - Model -> entity mappers
//! - Repository implementations
//!
//! ```rust,ignore
//! use carechat_db::{create_pool, run_migrations, PgConversationRepository};
//!
//! let pool = create_pool(&config.database).await?;
//! run_migrations(&pool, None).await?;
//! let conversations = PgConversationRepository::new(pool.clone());
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, ping, run_migrations, PgPool, DEFAULT_MIGRATIONS_DIR};
pub use repositories::{
    PgConversationRepository, PgMessageRepository, PgReactionRepository, PgUserDirectory,
};
