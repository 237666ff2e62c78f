//! PostgreSQL implementation of UserDirectory
//!
//! The `users` table belongs to the platform's account service; this side only reads it.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use carechat_core::traits::{RepoResult, UserDirectory};
use carechat_core::{Snowflake, User, UserRole};

use crate::models::UserModel;

use super::error::map_db_error;

/// PostgreSQL implementation of UserDirectory
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Build an ILIKE pattern that matches `query` literally anywhere in the column
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT id, display_name, email, role, avatar_url, specialty, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(User::try_from).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[Snowflake]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = ids.iter().map(|id| id.into_inner()).collect();
        let results = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT id, display_name, email, role, avatar_url, specialty, is_active
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        role: Option<UserRole>,
        exclude: Snowflake,
        limit: i64,
    ) -> RepoResult<Vec<User>> {
        let results = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT id, display_name, email, role, avatar_url, specialty, is_active
            FROM users
            WHERE is_active
              AND id <> $2
              AND ($3::text IS NULL OR role = $3)
              AND (display_name ILIKE $1 OR email ILIKE $1 OR specialty ILIKE $1)
            ORDER BY display_name ASC
            LIMIT $4
            "#,
        )
        .bind(contains_pattern(query))
        .bind(exclude.into_inner())
        .bind(role.map(|r| r.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_roles(&self, roles: &[UserRole], exclude: Snowflake) -> RepoResult<Vec<User>> {
        let roles: Vec<&str> = roles.iter().map(UserRole::as_str).collect();
        let results = sqlx::query_as::<_, UserModel>(
            r#"
            SELECT id, display_name, email, role, avatar_url, specialty, is_active
            FROM users
            WHERE is_active AND id <> $2 AND role = ANY($1)
            ORDER BY display_name ASC
            "#,
        )
        .bind(&roles)
        .bind(exclude.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(User::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("amara"), "%amara%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
