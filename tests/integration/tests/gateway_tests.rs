//! WebSocket gateway integration tests
//!
//! The gateway is mounted on the API listener, so REST calls and socket
//! events meet in one process.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use integration_tests::{assert_data, Cast, SendMessageBody, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_handshake_requires_token() {
    let server = TestServer::start().await.unwrap();

    let anonymous = format!("ws://{}/gateway", server.addr);
    assert!(tokio_tungstenite::connect_async(anonymous).await.is_err());

    assert!(tokio_tungstenite::connect_async(server.gateway_url("garbage"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_hello_and_heartbeat() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut mom = server.connect_gateway(&cast.mom_token).await.unwrap();
    assert!(!mom.session_id.is_empty());

    mom.heartbeat().await.unwrap();
    let ack = mom.next_frame().await.unwrap();
    assert_eq!(ack["op"], 11);
}

#[tokio::test]
async fn test_socket_send_reaches_recipient() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut mom = server.connect_gateway(&cast.mom_token).await.unwrap();
    let mut doctor = server.connect_gateway(&cast.doctor_token).await.unwrap();

    mom.send_event(
        "send_message",
        json!({ "recipientId": cast.doctor.id.to_string(), "content": "Hello" }),
    )
    .await
    .unwrap();

    let sent = mom.expect_dispatch("message_sent").await.unwrap();
    assert_eq!(sent["conversationCreated"], true);

    let incoming = doctor.expect_dispatch("new_message").await.unwrap();
    assert_eq!(incoming["content"], "Hello");
    assert_eq!(incoming["conversationId"], sent["conversationId"]);

    // The recipient's read receipt flows back to the sender
    doctor
        .send_event(
            "message_read",
            json!({ "conversationId": sent["conversationId"] }),
        )
        .await
        .unwrap();
    let receipt = mom.expect_dispatch("message_status_update").await.unwrap();
    assert_eq!(receipt["conversationId"], sent["conversationId"]);
    assert_eq!(receipt["status"], "read");
}

#[tokio::test]
async fn test_rest_send_reaches_socket() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut doctor = server.connect_gateway(&cast.doctor_token).await.unwrap();

    let response = server
        .post_auth(
            "/messages",
            &cast.mom_token,
            &SendMessageBody::text(cast.doctor.id, "sent over REST"),
        )
        .await
        .unwrap();
    let sent: Value = assert_data(response, StatusCode::CREATED).await.unwrap();

    let incoming = doctor.expect_dispatch("new_message").await.unwrap();
    assert_eq!(incoming["content"], "sent over REST");
    assert_eq!(incoming["id"], sent["message"]["id"]);
}

#[tokio::test]
async fn test_presence_follows_connections() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut mom = server.connect_gateway(&cast.mom_token).await.unwrap();
    let doctor = server.connect_gateway(&cast.doctor_token).await.unwrap();

    let online = mom.expect_dispatch("user_status_change").await.unwrap();
    assert_eq!(online["userId"], cast.doctor.id.to_string());
    assert_eq!(online["status"], "online");

    let response = server.get_auth("/providers", &cast.mom_token).await.unwrap();
    let providers: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    let doctor_entry = providers
        .iter()
        .find(|p| p["id"] == cast.doctor.id.to_string())
        .unwrap();
    assert_eq!(doctor_entry["status"], "online");

    doctor.close().await.unwrap();
    let offline = mom.expect_dispatch("user_status_change").await.unwrap();
    assert_eq!(offline["userId"], cast.doctor.id.to_string());
    assert_eq!(offline["status"], "offline");
}

#[tokio::test]
async fn test_typing_is_scoped_to_joined_conversations() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let response = server
        .post_auth(
            "/messages",
            &cast.mom_token,
            &SendMessageBody::text(cast.doctor.id, "are you there?"),
        )
        .await
        .unwrap();
    let sent: Value = assert_data(response, StatusCode::CREATED).await.unwrap();
    let conversation_id = sent["conversationId"].clone();

    let mut mom = server.connect_gateway(&cast.mom_token).await.unwrap();
    let mut doctor = server.connect_gateway(&cast.doctor_token).await.unwrap();

    doctor
        .send_event("join_conversation", json!({ "conversationId": conversation_id }))
        .await
        .unwrap();
    doctor.expect_dispatch("conversation_joined").await.unwrap();

    mom.send_event("typing_start", json!({ "conversationId": conversation_id }))
        .await
        .unwrap();
    let typing = doctor.expect_dispatch("typing_indicator").await.unwrap();
    assert_eq!(typing["isTyping"], true);
    assert_eq!(typing["userId"], cast.mom.id.to_string());
}

#[tokio::test]
async fn test_bad_events_become_error_dispatches() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();
    let mut mom = server.connect_gateway(&cast.mom_token).await.unwrap();

    mom.send_event("teleport", json!({})).await.unwrap();
    let error = mom.expect_dispatch("error").await.unwrap();
    assert_eq!(error["event"], "teleport");

    // Not a participant of a made-up conversation
    mom.send_event("toggle_mute", json!({ "conversationId": "12345" }))
        .await
        .unwrap();
    let error = mom.expect_dispatch("error").await.unwrap();
    assert_eq!(error["code"], "NOT_FOUND");

    // The connection survives both
    mom.heartbeat().await.unwrap();
    let ack = mom.next_frame().await.unwrap();
    assert_eq!(ack["op"], 11);
}

#[tokio::test]
async fn test_protocol_violations_close_the_socket() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut client = server.connect_gateway(&cast.mom_token).await.unwrap();
    client.send_raw(json!({ "op": 10 })).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), 4001);

    let mut client = server.connect_gateway(&cast.mom_token).await.unwrap();
    client.send_raw(json!({ "op": 99 })).await.unwrap();
    assert_eq!(client.expect_close().await.unwrap(), 4001);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let server = TestServer::start_with(&[
        ("GATEWAY_HEARTBEAT_INTERVAL_MS", "100"),
        ("GATEWAY_HEARTBEAT_TIMEOUT_MS", "300"),
    ])
    .await
    .unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut doctor = server.connect_gateway(&cast.doctor_token).await.unwrap();
    assert_eq!(doctor.expect_close().await.unwrap(), 4009);

    // The session is cleaned up, so the provider is offline again
    let mut status = Value::Null;
    for _ in 0..40 {
        let response = server.get_auth("/providers", &cast.mom_token).await.unwrap();
        let providers: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
        status = providers
            .iter()
            .find(|p| p["id"] == cast.doctor.id.to_string())
            .map(|p| p["status"].clone())
            .unwrap_or_default();
        if status == "offline" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(status, "offline");
}
