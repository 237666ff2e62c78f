//! WebSocket handler
//!
//! Authenticates the upgrade request, then runs one connection: a reader
//! feeding the dispatcher, a single writer draining the outbound queue and a
//! heartbeat watchdog.

use crate::connection::{Connection, Outbound, Session};
use crate::handlers::MessageDispatcher;
use crate::protocol::{CloseCode, GatewayMessage, HelloPayload};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use carechat_common::{AppError, ErrorResponse};
use carechat_core::Snowflake;
use carechat_service::PresenceService;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

/// How long the writer gets to flush a close frame
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Browsers cannot set headers on a WebSocket, so the token may come in the query
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(query): Query<ConnectQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .or(query.token);

    let user_id = match authenticate(&state, token.as_deref()) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected gateway handshake");
            let body = json!({ "error": ErrorResponse::from(&e) });
            return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, socket, user_id))
}

fn authenticate(state: &GatewayState, token: Option<&str>) -> Result<Snowflake, AppError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::MissingToken)?;
    state.jwt().validate_access_token(token)?.user_id()
}

async fn handle_socket(state: GatewayState, socket: WebSocket, user_id: Snowflake) {
    let session_id = Session::generate_id();
    let (tx, mut rx) = mpsc::channel::<Outbound>(state.config().send_buffer.max(1));

    let (connection, first_local) =
        state
            .connections()
            .add_connection(session_id.clone(), user_id, tx);

    tracing::info!(session_id = %session_id, user_id = %user_id, "WebSocket connection established");

    if first_local {
        if let Some(dispatcher) = state.dispatcher() {
            if let Err(e) = dispatcher.subscribe_user(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to subscribe user channel");
            }
        }
    }

    if let Err(e) = PresenceService::new(state.services())
        .connect(user_id, &session_id)
        .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to record presence");
    }

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Hello is queued first so it precedes every dispatch
    let hello = GatewayMessage::hello(&HelloPayload {
        heartbeat_interval: state.config().heartbeat_interval_ms,
        session_id: session_id.clone(),
        user_id,
    });
    if connection.send(hello).is_err() {
        tracing::warn!(session_id = %session_id, "Failed to queue Hello");
    }

    let connection_send = connection.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(mut frame) => {
                    connection_send.stamp(&mut frame);
                    let json = match frame.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode frame");
                            continue;
                        }
                    };
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!(
                            session_id = %connection_send.session_id(),
                            "Failed to write to WebSocket"
                        );
                        break;
                    }
                }
                Outbound::Close(code) => {
                    let frame = CloseFrame {
                        code: code.as_u16(),
                        reason: code.description().into(),
                    };
                    let _ = ws_sink.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(code) = handle_text_message(&state_recv, &connection_recv, &text).await {
                        return Some(code);
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        session_id = %connection_recv.session_id(),
                        "Binary frames not supported"
                    );
                    return Some(CloseCode::DecodeError);
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::info!(session_id = %connection_recv.session_id(), "Client closed connection");
                    return None;
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = %connection_recv.session_id(),
                        error = %e,
                        "WebSocket error"
                    );
                    return None;
                }
            }
        }
        None
    });

    let connection_hb = connection.clone();
    let check_every = state.heartbeat_interval() / 2;
    let heartbeat_timeout = state.heartbeat_timeout();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut check_interval = interval(check_every.max(Duration::from_millis(10)));
        loop {
            check_interval.tick().await;
            let time_since = connection_hb.time_since_heartbeat().await;
            if time_since > heartbeat_timeout {
                tracing::info!(
                    session_id = %connection_hb.session_id(),
                    time_since_ms = time_since.as_millis(),
                    "Connection timed out (no heartbeat)"
                );
                return CloseCode::SessionTimeout;
            }
        }
    });

    let close_code = tokio::select! {
        result = &mut recv_task => result.ok().flatten(),
        result = &mut heartbeat_task => result.ok(),
        _ = &mut send_task => None,
    };
    recv_task.abort();
    heartbeat_task.abort();

    if let Some(code) = close_code {
        tracing::debug!(session_id = %session_id, close_code = %code, "Closing connection");
        if connection.close(code, CLOSE_GRACE).await {
            let _ = timeout(CLOSE_GRACE, &mut send_task).await;
        }
    }
    send_task.abort();

    cleanup_connection(&state, &connection).await;
}

/// Returns a close code when the frame must end the connection
async fn handle_text_message(
    state: &GatewayState,
    connection: &Arc<Connection>,
    text: &str,
) -> Option<CloseCode> {
    let message = match GatewayMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(
                session_id = %connection.session_id(),
                error = %e,
                "Failed to parse frame"
            );
            return Some(e.close_code());
        }
    };

    tracing::trace!(session_id = %connection.session_id(), op = %message.op, "Received frame");
    MessageDispatcher::dispatch(state, connection, message).await
}

async fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let session_id = connection.session_id();
    let user_id = connection.user_id();
    tracing::info!(session_id = %session_id, user_id = %user_id, "Cleaning up connection");

    let last_local = state
        .connections()
        .remove_connection(session_id)
        .is_some_and(|(_, last)| last);

    if last_local {
        if let Some(dispatcher) = state.dispatcher() {
            if let Err(e) = dispatcher.unsubscribe_user(user_id).await {
                tracing::debug!(user_id = %user_id, error = %e, "Failed to unsubscribe user channel");
            }
        }
    }

    if let Err(e) = PresenceService::new(state.services())
        .disconnect(user_id, session_id)
        .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to clear presence");
    }
}
