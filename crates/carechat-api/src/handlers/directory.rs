//! Directory handlers
//!
//! Finding users to start a conversation with.

use axum::extract::State;
use carechat_service::dto::{ProvidersQuery, SearchQuery, UserPresence, UserSearchResult};
use carechat_service::DirectoryService;

use crate::extractors::{AuthUser, ValidatedQuery};
use crate::response::{ApiJson, ApiResult};
use crate::state::AppState;

/// GET /search?query=&role=
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<SearchQuery>,
) -> ApiResult<ApiJson<Vec<UserSearchResult>>> {
    let results = DirectoryService::new(state.services())
        .search(auth.user_id, &query.query, query.role.as_deref())
        .await?;
    Ok(ApiJson(results))
}

/// GET /providers?role=
pub async fn list_providers(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedQuery(query): ValidatedQuery<ProvidersQuery>,
) -> ApiResult<ApiJson<Vec<UserPresence>>> {
    let providers = DirectoryService::new(state.services())
        .list_providers(auth.user_id, query.role.as_deref())
        .await?;
    Ok(ApiJson(providers))
}
