//! Application state
//!
//! Holds the shared state for the Axum application: the service context
//! shared with the gateway, the token validator and the backends probed by
//! the readiness check.

use std::sync::Arc;

use carechat_cache::RedisPool;
use carechat_common::{AppConfig, JwtService};
use carechat_db::PgPool;
use carechat_gateway::{Backends, GatewayState};
use carechat_service::ServiceContext;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    services: Arc<ServiceContext>,
    jwt: Arc<JwtService>,
    config: Arc<AppConfig>,
    /// None when the stores are in-memory
    db: Option<PgPool>,
    redis: Option<RedisPool>,
}

impl AppState {
    pub fn new(services: Arc<ServiceContext>, jwt: Arc<JwtService>, config: AppConfig) -> Self {
        Self {
            services,
            jwt,
            config: Arc::new(config),
            db: None,
            redis: None,
        }
    }

    /// Share the gateway's services so REST-triggered events reach its sockets
    pub fn from_gateway(gateway: &GatewayState, config: AppConfig) -> Self {
        Self::new(gateway.services_handle(), gateway.jwt_handle(), config)
    }

    #[must_use]
    pub fn with_backends(mut self, backends: &Backends) -> Self {
        self.db = Some(backends.db.clone());
        self.redis.clone_from(&backends.redis);
        self
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt
    }

    pub fn db(&self) -> Option<&PgPool> {
        self.db.as_ref()
    }

    pub fn redis(&self) -> Option<&RedisPool> {
        self.redis.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("services", &"ServiceContext")
            .field("db", &self.db.is_some())
            .field("redis", &self.redis.is_some())
            .finish_non_exhaustive()
    }
}
