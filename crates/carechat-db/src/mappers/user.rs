//! User entity <-> model mapper

use carechat_core::{DomainError, Snowflake, User};

use crate::models::UserModel;

impl TryFrom<UserModel> for User {
    type Error = DomainError;

    fn try_from(model: UserModel) -> Result<Self, Self::Error> {
        Ok(User {
            id: Snowflake::new(model.id),
            display_name: model.display_name,
            email: model.email,
            role: model
                .role
                .parse()
                .map_err(|e: DomainError| DomainError::Storage(e.to_string()))?,
            avatar_url: model.avatar_url,
            specialty: model.specialty,
            is_active: model.is_active,
        })
    }
}
