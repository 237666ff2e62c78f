//! Test helpers for integration tests
//!
//! Spawns the full axum app (REST and gateway) on an ephemeral port over the
//! in-memory stores, and wraps reqwest and tokio-tungstenite clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use carechat_api::{create_app, serve, AppState};
use carechat_common::{AppConfig, JwtService};
use carechat_core::{User, UserRole};
use carechat_gateway::broadcast::LocalNotifier;
use carechat_gateway::connection::ConnectionManager;
use carechat_gateway::GatewayState;
use carechat_service::testing::TestContext;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// How long a test waits for a gateway frame before failing
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// In-memory stores, directory and clock behind the server
    pub env: TestContext,
    jwt: Arc<JwtService>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with(&[]).await
    }

    /// Start a test server with extra environment settings layered on top
    pub async fn start_with(overrides: &[(&str, &str)]) -> Result<Self> {
        let config = test_config_with(overrides)?;

        let env = TestContext::new();
        let connections = ConnectionManager::new_shared();
        let services = env.context_with(Arc::new(LocalNotifier::new(connections.clone())));
        let jwt = Arc::new(JwtService::new(
            &config.jwt.secret,
            config.jwt.access_token_expiry,
        ));
        let gateway = GatewayState::new(services, connections, jwt.clone(), config.gateway.clone());
        let state = AppState::from_gateway(&gateway, config);
        let app = create_app(state, gateway)?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            serve(listener, app).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            env,
            jwt,
            _handle: handle,
        })
    }

    /// Seed a directory user and mint a token for them
    pub fn user(&self, name: &str, role: UserRole) -> Result<(User, String)> {
        let user = self.env.add_user(name, role);
        let token = self.token_for(&user)?;
        Ok((user, token))
    }

    pub fn token_for(&self, user: &User) -> Result<String> {
        Ok(self
            .jwt
            .issue_access_token(user.id, Some(&user.role.to_string()))?)
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url(), path)
    }

    /// Make a GET request outside `/api/v1`
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make an unauthenticated API GET request
    pub async fn get_anonymous(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(self.api_url(path)).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self
            .client
            .get(self.api_url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Make a POST request with auth token
    pub async fn post_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        Ok(self
            .client
            .post(self.api_url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    /// Make a PATCH request with auth token and an optional JSON body
    pub async fn patch_auth(&self, path: &str, token: &str, body: Option<&Value>) -> Result<Response> {
        let request = self.client.patch(self.api_url(path)).bearer_auth(token);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        Ok(request.send().await?)
    }

    /// Make a DELETE request with auth token
    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self
            .client
            .delete(self.api_url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Gateway URL authenticating through the query string
    pub fn gateway_url(&self, token: &str) -> String {
        format!("ws://{}/gateway?token={token}", self.addr)
    }

    /// Open a gateway connection and consume its Hello
    pub async fn connect_gateway(&self, token: &str) -> Result<GatewayClient> {
        let (ws, _) = tokio_tungstenite::connect_async(self.gateway_url(token)).await?;
        let mut client = GatewayClient {
            ws,
            session_id: String::new(),
        };

        let hello = client.next_frame().await?;
        if hello["op"] != 10 {
            bail!("expected Hello, got {hello}");
        }
        client.session_id = hello["d"]["session_id"]
            .as_str()
            .context("Hello without session_id")?
            .to_string();
        Ok(client)
    }
}

/// A connected gateway client speaking the JSON frame protocol
pub struct GatewayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub session_id: String,
}

impl GatewayClient {
    /// Next text frame as JSON, skipping control frames
    pub async fn next_frame(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for a gateway frame")?
                .context("gateway stream ended")??;

            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => bail!("gateway closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Skip frames until a dispatch named `name` arrives and return its data
    pub async fn expect_dispatch(&mut self, name: &str) -> Result<Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["op"] == 0 && frame["t"] == name {
                return Ok(frame["d"].clone());
            }
        }
    }

    /// Send a client event (op 2)
    pub async fn send_event(&mut self, name: &str, data: Value) -> Result<()> {
        self.send_raw(json!({ "op": 2, "t": name, "d": data })).await
    }

    pub async fn heartbeat(&mut self) -> Result<()> {
        self.send_raw(json!({ "op": 1 })).await
    }

    pub async fn send_raw(&mut self, frame: Value) -> Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Wait for the server's close frame and return its code
    pub async fn expect_close(&mut self) -> Result<u16> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for close")?
                .context("gateway stream ended without a close frame")??;
            if let Message::Close(frame) = message {
                return Ok(frame.map_or(1005, |f| u16::from(f.code)));
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Configuration for the in-memory test server. The database URL is never
/// dialed; rate limits are high enough not to interfere.
pub fn test_config() -> Result<AppConfig> {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Result<AppConfig> {
    AppConfig::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some((*value).to_string());
        }
        let value = match key {
            "DATABASE_URL" => "postgres://unused@localhost/carechat",
            "JWT_SECRET" => "integration-test-secret",
            "RATE_LIMIT_REQUESTS_PER_SECOND" => "1000",
            "RATE_LIMIT_BURST" => "1000",
            _ => return None,
        };
        Some(value.to_string())
    })
    .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// Assert response status and parse the `data` field of the body
pub async fn assert_data<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let body: Value = assert_json(response, expected_status).await?;
    Ok(serde_json::from_value(body["data"].clone())?)
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status and return the error code of the body
pub async fn assert_error(response: Response, expected_status: StatusCode) -> Result<String> {
    let body: Value = assert_json(response, expected_status).await?;
    Ok(body["error"]["code"]
        .as_str()
        .context("error body without code")?
        .to_string())
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}
