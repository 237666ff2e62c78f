//! REST API integration tests
//!
//! Each test starts the full app on an ephemeral port over in-memory stores,
//! so no PostgreSQL or Redis is needed.
//!
//! Run with: cargo test -p integration-tests --test api_tests

use chrono::Duration;
use integration_tests::{
    assert_data, assert_error, assert_json, assert_status, edit_body, reaction_body, status_body,
    Cast, SendMessageBody, TestServer,
};
use reqwest::StatusCode;
use serde_json::Value;

async fn send(server: &TestServer, token: &str, body: &SendMessageBody) -> Value {
    let response = server.post_auth("/messages", token, body).await.unwrap();
    assert_data(response, StatusCode::CREATED).await.unwrap()
}

fn id_of(value: &Value) -> String {
    value.as_str().expect("ids are strings").to_string()
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.unwrap();
    let body: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_ready() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.unwrap();
    let body: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_and_bad_tokens_are_rejected() {
    let server = TestServer::start().await.unwrap();

    let response = server.get_anonymous("/conversations").await.unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "MISSING_TOKEN");

    let response = server.get_auth("/conversations", "not-a-jwt").await.unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "INVALID_TOKEN");
}

// ============================================================================
// First contact and reading
// ============================================================================

#[tokio::test]
async fn test_first_message_creates_conversation() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(
        &server,
        &cast.mom_token,
        &SendMessageBody::text(cast.doctor.id, "Hello"),
    )
    .await;
    assert_eq!(sent["conversationCreated"], true);
    let conversation_id = id_of(&sent["conversationId"]);

    // The doctor sees it with one unread message
    let response = server.get_auth("/conversations", &cast.doctor_token).await.unwrap();
    let conversations: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(id_of(&conversations[0]["id"]), conversation_id);
    assert_eq!(conversations[0]["unreadCount"], 1);
    assert_eq!(conversations[0]["lastMessage"]["content"], "Hello");
    assert_eq!(conversations[0]["participant"]["displayName"], "Ada Mom");

    // The sender's own counter is untouched
    let response = server.get_auth("/conversations", &cast.mom_token).await.unwrap();
    let conversations: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(conversations[0]["unreadCount"], 0);

    // A reply reuses the conversation from the other direction
    let reply = send(
        &server,
        &cast.doctor_token,
        &SendMessageBody::text(cast.mom.id, "Hi, how are you feeling?"),
    )
    .await;
    assert_eq!(reply["conversationCreated"], false);
    assert_eq!(id_of(&reply["conversationId"]), conversation_id);
}

#[tokio::test]
async fn test_reading_history_marks_read() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(
        &server,
        &cast.mom_token,
        &SendMessageBody::text(cast.doctor.id, "Hello"),
    )
    .await;
    let conversation_id = id_of(&sent["conversationId"]);

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages"),
            &cast.doctor_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["hasMore"], false);
    assert_eq!(page["messages"][0]["content"], "Hello");
    assert_eq!(page["messages"][0]["isRead"], true);
    assert_eq!(page["messages"][0]["status"], "read");

    let response = server.get_auth("/unread-count", &cast.doctor_token).await.unwrap();
    let unread: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(unread["totalUnread"], 0);
}

#[tokio::test]
async fn test_explicit_mark_read_and_unread_summary() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    for text in ["one", "two", "three"] {
        send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, text)).await;
    }
    let sent = send(
        &server,
        &cast.midwife_token,
        &SendMessageBody::text(cast.doctor.id, "hello from the midwife"),
    )
    .await;
    let midwife_conversation = id_of(&sent["conversationId"]);

    let response = server.get_auth("/unread-count", &cast.doctor_token).await.unwrap();
    let unread: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(unread["totalUnread"], 4);
    assert_eq!(unread["byConversation"][&midwife_conversation], 1);

    let response = server
        .patch_auth(
            &format!("/conversations/{midwife_conversation}/read"),
            &cast.doctor_token,
            None,
        )
        .await
        .unwrap();
    let receipt: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(receipt["markedCount"], 1);

    let response = server.get_auth("/unread-count", &cast.doctor_token).await.unwrap();
    let unread: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(unread["totalUnread"], 3);
    assert!(unread["byConversation"].get(&midwife_conversation).is_none());
}

#[tokio::test]
async fn test_history_pagination() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let mut conversation_id = String::new();
    for i in 0..5 {
        let sent = send(
            &server,
            &cast.mom_token,
            &SendMessageBody::text(cast.doctor.id, &format!("message {i}")),
        )
        .await;
        conversation_id = id_of(&sent["conversationId"]);
    }

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages?limit=2"),
            &cast.mom_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(page["hasMore"], true);
    assert_eq!(page["total"], 5);
    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "message 3");
    assert_eq!(messages[1]["content"], "message 4");

    let oldest = id_of(&messages[0]["id"]);
    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages?limit=10&before={oldest}"),
            &cast.mom_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(page["hasMore"], false);
    assert_eq!(page["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_outsiders_cannot_read_a_conversation() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(
        &server,
        &cast.mom_token,
        &SendMessageBody::text(cast.doctor.id, "private"),
    )
    .await;
    let conversation_id = id_of(&sent["conversationId"]);

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages"),
            &cast.midwife_token,
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(code, "FORBIDDEN");

    let response = server
        .get_auth("/conversations/12345/stats", &cast.mom_token)
        .await
        .unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();
}

// ============================================================================
// Sending rules
// ============================================================================

#[tokio::test]
async fn test_send_validation() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let response = server
        .post_auth(
            "/messages",
            &cast.mom_token,
            &SendMessageBody::text(cast.doctor.id, "   "),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::BAD_REQUEST).await.unwrap();
    assert_eq!(code, "VALIDATION_ERROR");

    // Talking to yourself is not a conversation
    let response = server
        .post_auth(
            "/messages",
            &cast.mom_token,
            &SendMessageBody::text(cast.mom.id, "note to self"),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let response = server
        .post_auth(
            "/messages",
            &cast.mom_token,
            &serde_json::json!({ "content": "no recipient" }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

#[tokio::test]
async fn test_reply_must_stay_in_conversation() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let first = send(
        &server,
        &cast.mom_token,
        &SendMessageBody::text(cast.doctor.id, "question"),
    )
    .await;
    let first_id = id_of(&first["message"]["id"]);

    let reply = send(
        &server,
        &cast.doctor_token,
        &SendMessageBody::text(cast.mom.id, "answer").replying_to(&first_id),
    )
    .await;
    assert_eq!(id_of(&reply["message"]["replyTo"]), first_id);

    // The same parent cannot be quoted from another conversation
    let response = server
        .post_auth(
            "/messages",
            &cast.midwife_token,
            &SendMessageBody::text(cast.doctor.id, "sneaky").replying_to(&first_id),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();
}

// ============================================================================
// Status, edit, reactions, delete
// ============================================================================

#[tokio::test]
async fn test_status_is_recipient_only() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "hi")).await;
    let message_id = id_of(&sent["message"]["id"]);
    let path = format!("/messages/{message_id}/status");

    let response = server
        .patch_auth(&path, &cast.mom_token, Some(&status_body("read")))
        .await
        .unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    let response = server
        .patch_auth(&path, &cast.doctor_token, Some(&status_body("delivered")))
        .await
        .unwrap();
    let message: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(message["status"], "delivered");

    let response = server
        .patch_auth(&path, &cast.doctor_token, Some(&status_body("read")))
        .await
        .unwrap();
    let message: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(message["status"], "read");
    assert_eq!(message["isRead"], true);

    let response = server
        .patch_auth(&path, &cast.doctor_token, Some(&status_body("bogus")))
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

#[tokio::test]
async fn test_edit_within_window() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "Hello")).await;
    let conversation_id = id_of(&sent["conversationId"]);
    let message_id = id_of(&sent["message"]["id"]);
    let path = format!("/messages/{message_id}/edit");

    // Only the sender may edit
    let response = server
        .patch_auth(&path, &cast.doctor_token, Some(&edit_body("hijacked")))
        .await
        .unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    let response = server
        .patch_auth(&path, &cast.mom_token, Some(&edit_body("Hello there")))
        .await
        .unwrap();
    let edited: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(edited["isEdited"], true);

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages"),
            &cast.mom_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    let message = &page["messages"][0];
    assert_eq!(message["content"], "Hello there");
    assert_eq!(message["originalContent"], "Hello");
    assert_eq!(message["isEdited"], true);

    // The conversation snapshot keeps the original text
    let response = server.get_auth("/conversations", &cast.mom_token).await.unwrap();
    let conversations: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(conversations[0]["lastMessage"]["content"], "Hello");
}

#[tokio::test]
async fn test_edit_after_window_is_rejected() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "Hello")).await;
    let conversation_id = id_of(&sent["conversationId"]);
    let message_id = id_of(&sent["message"]["id"]);

    server.env.clock.advance(Duration::minutes(16));

    let response = server
        .patch_auth(
            &format!("/messages/{message_id}/edit"),
            &cast.mom_token,
            Some(&edit_body("Too late")),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(code, "EDIT_WINDOW_EXPIRED");

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages"),
            &cast.mom_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(page["messages"][0]["content"], "Hello");
    assert_eq!(page["messages"][0]["isEdited"], false);
}

#[tokio::test]
async fn test_one_reaction_per_user() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "news")).await;
    let message_id = id_of(&sent["message"]["id"]);
    let path = format!("/messages/{message_id}/reactions");

    server
        .post_auth(&path, &cast.doctor_token, &reaction_body("👍"))
        .await
        .unwrap();
    let response = server
        .post_auth(&path, &cast.doctor_token, &reaction_body("❤️"))
        .await
        .unwrap();
    let update: Value = assert_data(response, StatusCode::OK).await.unwrap();
    let reactions = update["reactions"].as_array().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0]["emoji"], "❤️");

    // Outsiders cannot react
    let response = server
        .post_auth(&path, &cast.midwife_token, &reaction_body("👀"))
        .await
        .unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    let response = server.delete_auth(&path, &cast.doctor_token).await.unwrap();
    let update: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert!(update["reactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_sender_only_and_permanent() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "oops")).await;
    let conversation_id = id_of(&sent["conversationId"]);
    let message_id = id_of(&sent["message"]["id"]);
    let path = format!("/messages/{message_id}");

    let response = server.delete_auth(&path, &cast.doctor_token).await.unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    let response = server.delete_auth(&path, &cast.mom_token).await.unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    let response = server.delete_auth(&path, &cast.mom_token).await.unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/messages"),
            &cast.doctor_token,
        )
        .await
        .unwrap();
    let page: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(page["total"], 0);
    assert!(page["messages"].as_array().unwrap().is_empty());
}

// ============================================================================
// Conversation flags, stats and participants
// ============================================================================

#[tokio::test]
async fn test_mute_and_pin_toggle_per_user() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    let sent = send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "hi")).await;
    let conversation_id = id_of(&sent["conversationId"]);

    let response = server
        .patch_auth(&format!("/conversations/{conversation_id}/mute"), &cast.mom_token, None)
        .await
        .unwrap();
    let muted: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(muted["isMuted"], true);

    let response = server
        .patch_auth(&format!("/conversations/{conversation_id}/pin"), &cast.mom_token, None)
        .await
        .unwrap();
    let pinned: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(pinned["isPinned"], true);

    let response = server.get_auth("/conversations", &cast.doctor_token).await.unwrap();
    let conversations: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(conversations[0]["isMuted"], false);
    assert_eq!(conversations[0]["isPinned"], false);

    let response = server
        .patch_auth(&format!("/conversations/{conversation_id}/mute"), &cast.mom_token, None)
        .await
        .unwrap();
    let muted: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(muted["isMuted"], false);
}

#[tokio::test]
async fn test_stats_and_participants() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();

    send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "one")).await;
    let mut image = SendMessageBody::text(cast.doctor.id, "scan.png");
    image.message_type = "image".to_string();
    let sent = send(&server, &cast.mom_token, &image).await;
    let conversation_id = id_of(&sent["conversationId"]);

    let response = server
        .get_auth(&format!("/conversations/{conversation_id}/stats"), &cast.doctor_token)
        .await
        .unwrap();
    let stats: Value = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(stats["totalMessages"], 2);
    assert_eq!(stats["byType"]["text"], 1);
    assert_eq!(stats["byType"]["image"], 1);

    let response = server
        .get_auth(
            &format!("/conversations/{conversation_id}/participants"),
            &cast.doctor_token,
        )
        .await
        .unwrap();
    let participants: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(participants.len(), 2);
    assert!(participants.iter().all(|p| p["status"] == "offline"));
}

// ============================================================================
// Directory
// ============================================================================

#[tokio::test]
async fn test_search_and_providers() {
    let server = TestServer::start().await.unwrap();
    let cast = Cast::seed(&server).unwrap();
    send(&server, &cast.mom_token, &SendMessageBody::text(cast.doctor.id, "hi")).await;

    let response = server.get_auth("/search?query=bea", &cast.mom_token).await.unwrap();
    let results: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["hasExistingChat"], true);

    let response = server
        .get_auth("/search?query=cleo&role=midwife", &cast.mom_token)
        .await
        .unwrap();
    let results: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["hasExistingChat"], false);

    let response = server.get_auth("/search?query=", &cast.mom_token).await.unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let response = server.get_auth("/providers", &cast.mom_token).await.unwrap();
    let providers: Vec<Value> = assert_data(response, StatusCode::OK).await.unwrap();
    let names: Vec<&str> = providers
        .iter()
        .filter_map(|p| p["displayName"].as_str())
        .collect();
    assert_eq!(names, ["Cleo Midwife", "Dr Bea"]);

    let response = server.get_auth("/providers?role=mom", &cast.mom_token).await.unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}
