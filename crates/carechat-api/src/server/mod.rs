//! Server setup and initialization
//!
//! Builds the REST app, mounts the gateway next to it and serves both on one
//! listener.

use std::net::SocketAddr;

use axum::Router;
use carechat_common::{AppConfig, AppError};
use carechat_gateway::{connect_backends, create_gateway_state, gateway_router, GatewayState};
use tokio::net::TcpListener;
use tracing::info;

use crate::middleware::{apply_middleware, apply_probe_middleware};
use crate::routes::{create_router, health_routes};
use crate::state::AppState;

/// Build the complete application: `/api/v1`, the health probes and
/// `/gateway`
pub fn create_app(state: AppState, gateway: GatewayState) -> Result<Router, AppError> {
    let api = apply_middleware(create_router(), state.config())?;
    let probes = apply_probe_middleware(health_routes());

    Ok(api
        .merge(probes)
        .with_state(state)
        .merge(gateway_router(gateway)))
}

/// Serve with peer addresses attached, which the rate limiter keys on
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), AppError> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Config(format!("Server error: {e}")))
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let backends = connect_backends(&config).await?;
    let gateway = create_gateway_state(&config, &backends)?;

    let addr = config.api.address();
    let state = AppState::from_gateway(&gateway, config).with_backends(&backends);
    let app = create_app(state, gateway)?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    info!("Server listening on http://{}", addr);
    info!("Gateway available at ws://{}/gateway", addr);

    serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use carechat_common::JwtService;
    use carechat_gateway::connection::ConnectionManager;
    use carechat_service::testing::TestContext;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://unused".to_string()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        });
        match config {
            Ok(config) => config,
            Err(e) => panic!("test config: {e}"),
        }
    }

    fn test_app() -> (Router, Arc<JwtService>) {
        let config = test_config();
        let env = TestContext::new();
        let jwt = Arc::new(JwtService::new(&config.jwt.secret, 3600));
        let gateway = GatewayState::new(
            env.ctx.clone(),
            ConnectionManager::new_shared(),
            jwt.clone(),
            config.gateway.clone(),
        );
        let state = AppState::from_gateway(&gateway, config);
        (create_app(state, gateway).unwrap(), jwt)
    }

    fn with_peer(mut request: Request<Body>) -> Request<Body> {
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        request
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_without_backends() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let (app, _) = test_app();
        let response = app
            .oneshot(with_peer(
                Request::get("/api/v1/conversations").body(Body::empty()).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_authenticated_request_gets_data_envelope() {
        let (app, jwt) = test_app();
        let token = jwt
            .issue_access_token(carechat_core::Snowflake::new(42), Some("mom"))
            .unwrap();
        let response = app
            .oneshot(with_peer(
                Request::get("/api/v1/unread-count")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"]["totalUnread"], 0);
    }

    #[tokio::test]
    async fn test_bad_path_id_is_rejected() {
        let (app, jwt) = test_app();
        let token = jwt
            .issue_access_token(carechat_core::Snowflake::new(42), None)
            .unwrap();
        let response = app
            .oneshot(with_peer(
                Request::get("/api/v1/conversations/not-an-id/stats")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
