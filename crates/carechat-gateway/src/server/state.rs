//! Gateway state

use crate::broadcast::EventDispatcher;
use crate::connection::ConnectionManager;
use carechat_common::{GatewayConfig, JwtService};
use carechat_service::ServiceContext;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct GatewayState {
    services: Arc<ServiceContext>,
    connections: Arc<ConnectionManager>,
    jwt: Arc<JwtService>,
    config: Arc<GatewayConfig>,
    /// Present when events arrive over Redis
    dispatcher: Option<Arc<EventDispatcher>>,
}

impl GatewayState {
    pub fn new(
        services: ServiceContext,
        connections: Arc<ConnectionManager>,
        jwt: Arc<JwtService>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            services: Arc::new(services),
            connections,
            jwt,
            config: Arc::new(config),
            dispatcher: None,
        }
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    /// Shared handle for a REST app mounted next to the gateway
    pub fn services_handle(&self) -> Arc<ServiceContext> {
        Arc::clone(&self.services)
    }

    pub fn jwt_handle(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt)
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Option<&EventDispatcher> {
        self.dispatcher.as_deref()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.config.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.config.heartbeat_timeout_ms)
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connections", &self.connections)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
