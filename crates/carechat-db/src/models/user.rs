//! User directory database model

use sqlx::FromRow;

/// Database model for users table
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
}
