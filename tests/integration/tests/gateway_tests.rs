//! Gateway integration tests
//!
//! Raw WebSocket clients against a live API + gateway pair. Skipped
//! without `DATABASE_URL` / `REDIS_URL`.

use std::time::Duration;

use integration_tests::*;
use reqwest::StatusCode;
use serde_json::json;

const QUIET: Duration = Duration::from_millis(750);

#[tokio::test]
async fn test_identify_receives_ready() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();

    let (client, ready) = GatewayClient::identified(&server.gateway_url(), &amina.token)
        .await
        .unwrap();
    assert!(client.heartbeat_interval > 0);
    assert_eq!(ready["v"], 1);
    assert_eq!(ready["user"]["id"], amina.id.as_str());
    assert!(ready["session_id"].as_str().is_some_and(|s| !s.is_empty()));
    let conversations = ready["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"], direct["id"]);
}

#[tokio::test]
async fn test_event_before_identify_closes_with_4003() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = GatewayClient::connect(&server.gateway_url()).await.unwrap();
    client
        .send_event("send_message", json!({ "conversation_id": "1", "content": "hi" }))
        .await
        .unwrap();
    assert_eq!(client.close_code().await.unwrap(), 4003);
}

#[tokio::test]
async fn test_bad_token_closes_with_4004() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = GatewayClient::connect(&server.gateway_url()).await.unwrap();
    client
        .send_raw(json!({ "op": 2, "d": { "token": "not-a-jwt" } }))
        .await
        .unwrap();
    assert_eq!(client.close_code().await.unwrap(), 4004);
}

#[tokio::test]
async fn test_message_reaches_the_other_participant() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = direct["id"].as_str().unwrap();

    let (mut a, _) = GatewayClient::identified(&server.gateway_url(), &amina.token)
        .await
        .unwrap();
    let (mut b, _) = GatewayClient::identified(&server.gateway_url(), &bilal.token)
        .await
        .unwrap();
    a.join_synced(conversation_id).await.unwrap();
    b.join_synced(conversation_id).await.unwrap();

    b.send_event(
        "send_message",
        json!({ "conversation_id": conversation_id, "content": "hello", "nonce": "b-1" }),
    )
    .await
    .unwrap();

    let ack = b.wait_for("message_sent").await.unwrap();
    assert_eq!(ack["nonce"], "b-1");
    assert_eq!(ack["message"]["content"], "hello");

    let received = a.wait_for("receive_message").await.unwrap();
    assert_eq!(received["content"], "hello");
    assert_eq!(received["sender_id"], bilal.id.as_str());
    assert_eq!(received["conversation_id"], conversation_id);
    assert_eq!(received["id"], ack["message"]["id"]);

    // The sending session only gets the ack
    assert!(!b.receives_within("receive_message", QUIET).await);

    // Resending the same nonce does not store a second copy
    b.send_event(
        "send_message",
        json!({ "conversation_id": conversation_id, "content": "hello", "nonce": "b-1" }),
    )
    .await
    .unwrap();
    let again = b.wait_for("message_sent").await.unwrap();
    assert_eq!(again["message"]["id"], ack["message"]["id"]);

    let page: serde_json::Value = assert_json(
        server
            .get_auth(
                &format!("/api/v1/messaging/conversations/{conversation_id}/messages"),
                &amina.token,
            )
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rest_send_is_broadcast_to_the_room() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = direct["id"].as_str().unwrap();

    let (mut a, _) = GatewayClient::identified(&server.gateway_url(), &amina.token)
        .await
        .unwrap();
    a.join_synced(conversation_id).await.unwrap();

    send_message(&server, &bilal, conversation_id, "from the web form", None)
        .await
        .unwrap();
    let received = a.wait_for("receive_message").await.unwrap();
    assert_eq!(received["content"], "from the web form");
}

#[tokio::test]
async fn test_refused_events_are_answered_with_message_error() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let eve = register_user(&server, "eve").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = direct["id"].as_str().unwrap();

    let (mut intruder, _) = GatewayClient::identified(&server.gateway_url(), &eve.token)
        .await
        .unwrap();
    intruder.join(conversation_id).await.unwrap();
    let error = intruder.wait_for("message_error").await.unwrap();
    assert_eq!(error["event"], "join_conversation");
    assert_eq!(error["code"], "NOT_PARTICIPANT");

    intruder
        .send_event(
            "send_message",
            json!({ "conversation_id": conversation_id, "content": "let me in", "nonce": "e-1" }),
        )
        .await
        .unwrap();
    let error = intruder.wait_for("message_error").await.unwrap();
    assert_eq!(error["event"], "send_message");
    assert_eq!(error["nonce"], "e-1");

    // The connection survives a refused event
    intruder.sync().await.unwrap();
}

#[tokio::test]
async fn test_typing_indicator_clears_itself() {
    if !check_test_env().await {
        return;
    }

    let mut config = test_config().unwrap();
    config.chat.typing_timeout_ms = 300;
    let server = TestServer::start_with_config(config)
        .await
        .expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = direct["id"].as_str().unwrap();

    let (mut a, _) = GatewayClient::identified(&server.gateway_url(), &amina.token)
        .await
        .unwrap();
    let (mut b, _) = GatewayClient::identified(&server.gateway_url(), &bilal.token)
        .await
        .unwrap();
    a.join_synced(conversation_id).await.unwrap();
    b.join_synced(conversation_id).await.unwrap();

    b.send_event(
        "typing",
        json!({ "conversation_id": conversation_id, "is_typing": true }),
    )
    .await
    .unwrap();

    let started = a.wait_for("user_typing").await.unwrap();
    assert_eq!(started["user_id"], bilal.id.as_str());
    assert_eq!(started["is_typing"], true);

    // No explicit stop: the gateway clears it after the timeout
    let stopped = a.wait_for("user_typing").await.unwrap();
    assert_eq!(stopped["user_id"], bilal.id.as_str());
    assert_eq!(stopped["is_typing"], false);
}

#[tokio::test]
async fn test_removed_member_stops_receiving_the_group() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let chidi = register_user(&server, "chidi").await.unwrap();
    let group = create_group(&server, &amina, "Reading Club", &[&bilal, &chidi])
        .await
        .unwrap();
    let group_id = group["id"].as_str().unwrap();

    let (mut b, _) = GatewayClient::identified(&server.gateway_url(), &bilal.token)
        .await
        .unwrap();
    b.join_synced(group_id).await.unwrap();

    let response = server
        .post_auth(
            &format!("/api/v1/messaging/conversations/{group_id}/remove-participant"),
            &amina.token,
            &json!({ "user_id": bilal.id }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let removed = b.wait_for("member_removed").await.unwrap();
    assert_eq!(removed["conversation_id"], group_id);
    assert_eq!(removed["user_id"], bilal.id.as_str());
    assert_eq!(removed["removed_by"], amina.id.as_str());

    send_message(&server, &chidi, group_id, "after you left", None)
        .await
        .unwrap();
    assert!(!b.receives_within("receive_message", Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_resume_rejoins_rooms() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = direct["id"].as_str().unwrap();

    let (mut a, _) = GatewayClient::identified(&server.gateway_url(), &amina.token)
        .await
        .unwrap();
    a.join_synced(conversation_id).await.unwrap();
    let session_id = a.session_id.clone().unwrap();
    let seq = a.last_seq.unwrap_or(0);
    a.close().await.unwrap();

    // Give the gateway time to park the session
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut resumed = GatewayClient::connect(&server.gateway_url()).await.unwrap();
    resumed
        .send_raw(json!({
            "op": 6,
            "d": { "token": amina.token, "session_id": session_id, "seq": seq }
        }))
        .await
        .unwrap();
    let payload = resumed.wait_for("resumed").await.unwrap();
    assert_ne!(payload["session_id"], session_id.as_str());

    send_message(&server, &bilal, conversation_id, "welcome back", None)
        .await
        .unwrap();
    let received = resumed.wait_for("receive_message").await.unwrap();
    assert_eq!(received["content"], "welcome back");
}

#[tokio::test]
async fn test_resume_of_unknown_session_is_invalid() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();

    let mut client = GatewayClient::connect(&server.gateway_url()).await.unwrap();
    client
        .send_raw(json!({
            "op": 6,
            "d": { "token": amina.token, "session_id": "no-such-session", "seq": 0 }
        }))
        .await
        .unwrap();
    let frame = client.recv().await.unwrap();
    assert_eq!(frame["op"], 9);
    assert_eq!(frame["d"], false);
}
