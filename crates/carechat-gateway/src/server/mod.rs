//! Gateway server setup
//!
//! Backend connections, service wiring and the `/gateway` route. The REST
//! binary reuses all of it to mount the gateway in-process.

mod handler;
mod state;

pub use handler::{gateway_handler, ConnectQuery};
pub use state::GatewayState;

use crate::broadcast::{EventDispatcher, LocalNotifier};
use crate::connection::ConnectionManager;
use axum::{routing::get, Router};
use carechat_cache::{
    InMemoryPresenceRegistry, RedisNotifier, RedisPool, RedisPresenceRegistry, SubscriberConfig,
};
use carechat_common::{AppConfig, AppError, FanoutMode, JwtService};
use carechat_core::{EventNotifier, PresenceRegistry, SnowflakeGenerator};
use carechat_db::PgPool;
use carechat_service::ServiceContext;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Stateless router serving `/gateway`, ready to merge into another app
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .with_state(state)
}

/// Connections to PostgreSQL and, if configured, Redis
#[derive(Debug, Clone)]
pub struct Backends {
    pub db: PgPool,
    pub redis: Option<RedisPool>,
}

pub async fn connect_backends(config: &AppConfig) -> Result<Backends, AppError> {
    tracing::info!("Connecting to PostgreSQL...");
    let db = carechat_db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if config.database.run_migrations {
        carechat_db::run_migrations(&db, config.database.migrations_dir.as_deref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
    }

    let redis = match &config.redis {
        Some(redis_config) => {
            tracing::info!("Connecting to Redis...");
            let pool =
                RedisPool::from_config(redis_config).map_err(|e| AppError::Cache(e.to_string()))?;
            pool.health_check()
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;
            Some(pool)
        }
        None => None,
    };

    Ok(Backends { db, redis })
}

/// Build the service context and gateway state over the given backends.
///
/// Presence lives in Redis when it is configured. Events are delivered
/// in-process for [`FanoutMode::Local`] or published on Redis and picked up
/// by every instance's [`EventDispatcher`] for [`FanoutMode::Redis`].
pub fn create_gateway_state(config: &AppConfig, backends: &Backends) -> Result<GatewayState, AppError> {
    let connections = ConnectionManager::new_shared();

    let presence: Arc<dyn PresenceRegistry> = match &backends.redis {
        Some(pool) => Arc::new(RedisPresenceRegistry::new(pool.clone())),
        None => Arc::new(InMemoryPresenceRegistry::new()),
    };

    let (notifier, dispatcher): (Arc<dyn EventNotifier>, Option<Arc<EventDispatcher>>) =
        match config.gateway.fanout {
            FanoutMode::Local => (Arc::new(LocalNotifier::new(connections.clone())), None),
            FanoutMode::Redis => {
                let pool = backends.redis.clone().ok_or_else(|| {
                    AppError::Config("GATEWAY_FANOUT=redis requires REDIS_URL".to_string())
                })?;
                let subscriber_config = SubscriberConfig {
                    redis_url: pool.url().to_string(),
                    ..SubscriberConfig::default()
                };
                let dispatcher = Arc::new(EventDispatcher::new(subscriber_config, connections.clone()));
                dispatcher.clone().start();
                (Arc::new(RedisNotifier::new(pool)), Some(dispatcher))
            }
        };

    let db = &backends.db;
    let services = ServiceContext::builder()
        .conversation_repo(Arc::new(carechat_db::PgConversationRepository::new(db.clone())))
        .message_repo(Arc::new(carechat_db::PgMessageRepository::new(db.clone())))
        .reaction_repo(Arc::new(carechat_db::PgReactionRepository::new(db.clone())))
        .user_directory(Arc::new(carechat_db::PgUserDirectory::new(db.clone())))
        .presence(presence)
        .notifier(notifier)
        .snowflake_generator(Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id)))
        .chat_config(config.chat.clone())
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    let jwt = Arc::new(JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry));
    let state = GatewayState::new(services, connections, jwt, config.gateway.clone());

    Ok(match dispatcher {
        Some(dispatcher) => state.with_dispatcher(dispatcher),
        None => state,
    })
}

/// Run the standalone gateway. Events raised by other instances (the REST
/// API included) only arrive through Redis, so redis fan-out is required.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    if config.gateway.fanout != FanoutMode::Redis {
        return Err(AppError::Config(
            "the standalone gateway needs GATEWAY_FANOUT=redis".to_string(),
        ));
    }

    let backends = connect_backends(&config).await?;
    let state = create_gateway_state(&config, &backends)?;
    let app = gateway_router(state).layer(TraceLayer::new_for_http());

    let addr = config.gateway.server.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}
