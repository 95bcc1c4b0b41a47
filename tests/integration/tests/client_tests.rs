//! `huddle-client` against live servers
//!
//! Skipped without `DATABASE_URL` / `REDIS_URL`.

use std::time::Duration;

use huddle_client::rest::HistoryQuery;
use huddle_client::{
    ClientConfig, ClientError, Connection, ConversationFilter, ConversationState, RestClient, ServerEvent,
};
use huddle_core::Snowflake;
use integration_tests::*;
use tokio::sync::broadcast;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn config_for(server: &TestServer, token: &str) -> ClientConfig {
    ClientConfig::builder()
        .gateway_url(server.gateway_url())
        .api_url(server.base_url())
        .token(token)
        .build()
        .expect("valid client config")
}

async fn next_matching<F>(events: &mut broadcast::Receiver<ServerEvent>, mut pred: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event within timeout")
}

fn snowflake(id: &str) -> Snowflake {
    Snowflake::new(id.parse().expect("numeric id"))
}

#[tokio::test]
async fn test_rest_client_round_trip() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let bilal = register_user(&server, "bilal").await.unwrap();

    let rest = RestClient::anonymous(&server.base_url(), Duration::from_secs(10)).unwrap();
    let req = RegisterRequest::named("amina");
    let tokens = rest
        .register(&req.username, &req.email, &req.password, Some("Amina"))
        .await
        .unwrap();
    assert_eq!(tokens.user.username, req.username);
    assert_eq!(rest.token().as_deref(), Some(tokens.access_token.as_str()));

    let created = rest.create_direct(snowflake(&bilal.id)).await.unwrap();
    assert!(created.created);
    let again = rest.create_direct(snowflake(&bilal.id)).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.conversation.id, created.conversation.id);

    let conversation_id = created.conversation.id;
    let sent = rest
        .send_message(conversation_id, "bismillah", Some("rest-1"))
        .await
        .unwrap();
    assert_eq!(sent.nonce.as_deref(), Some("rest-1"));

    let reactions = rest.add_reaction(conversation_id, sent.id, "👍").await.unwrap();
    assert_eq!(reactions.len(), 1);
    let pinned = rest.set_pinned(conversation_id, sent.id, true).await.unwrap();
    assert!(pinned.pinned);

    let page = rest.messages(conversation_id, HistoryQuery::default()).await.unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].reactions.len(), 1);

    let list = rest.conversations(ConversationFilter::All, None).await.unwrap();
    assert_eq!(list.len(), 1);
    let found = rest
        .conversations(ConversationFilter::All, Some(&bilal.username))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let groups = rest.conversations(ConversationFilter::Groups, None).await.unwrap();
    assert!(groups.is_empty());

    let err = rest.leave_conversation(conversation_id).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
    assert_eq!(err.code(), "CANNOT_LEAVE_DIRECT");
}

#[tokio::test]
async fn test_connection_delivers_and_acknowledges() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = snowflake(direct["id"].as_str().unwrap());

    let a = Connection::connect(config_for(&server, &amina.token));
    let b = Connection::connect(config_for(&server, &bilal.token));
    a.wait_until_connected().await.unwrap();
    b.wait_until_connected().await.unwrap();
    assert_eq!(a.user().map(|u| u.username), Some(amina.username.clone()));

    let mut a_events = a.subscribe();
    let _a_room = a.join(conversation_id);
    let _b_room = b.join(conversation_id);
    // Joins travel ahead of the send on the same socket, but A's join
    // races B's send across sockets
    tokio::time::sleep(Duration::from_millis(300)).await;

    let pending = b.send_message(conversation_id, "hello");
    let nonce = pending.nonce().to_string();
    let stored = tokio::time::timeout(EVENT_TIMEOUT, pending.delivered())
        .await
        .expect("ack within timeout")
        .unwrap();
    assert_eq!(stored.content, "hello");
    assert_eq!(stored.nonce.as_deref(), Some(nonce.as_str()));
    assert_eq!(b.pending_sends(), 0);

    let event = next_matching(&mut a_events, |e| matches!(e, ServerEvent::ReceiveMessage(_))).await;
    let ServerEvent::ReceiveMessage(message) = event else {
        unreachable!()
    };
    assert_eq!(message.id, stored.id);
    assert_eq!(message.sender_id, snowflake(&bilal.id));

    // Reducer over the live stream
    let mut state = ConversationState::new(conversation_id, snowflake(&amina.id));
    assert!(state.apply(&ServerEvent::ReceiveMessage(message)));
    assert_eq!(state.messages().count(), 1);

    b.add_reaction(stored.id, "❤️").unwrap();
    let event = next_matching(&mut a_events, |e| matches!(e, ServerEvent::ReactionUpdated(_))).await;
    assert!(state.apply(&event));
    assert_eq!(state.messages().next().map(|m| m.reactions.len()), Some(1));

    a.close();
    b.close();
}

#[tokio::test]
async fn test_refused_send_settles_with_the_server_code() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let amina = register_user(&server, "amina").await.unwrap();
    let bilal = register_user(&server, "bilal").await.unwrap();
    let eve = register_user(&server, "eve").await.unwrap();
    let direct = create_direct(&server, &amina, &bilal).await.unwrap();
    let conversation_id = snowflake(direct["id"].as_str().unwrap());

    let intruder = Connection::connect(config_for(&server, &eve.token));
    intruder.wait_until_connected().await.unwrap();

    let pending = intruder.send_message(conversation_id, "let me in");
    let nonce = pending.nonce().to_string();
    let err = tokio::time::timeout(EVENT_TIMEOUT, pending.delivered())
        .await
        .expect("rejection within timeout")
        .unwrap_err();
    assert_eq!(err.code(), "NOT_PARTICIPANT");

    // Kept for retry until discarded
    assert_eq!(intruder.failed_sends(), vec![nonce.clone()]);
    assert!(intruder.discard_send(&nonce));
    assert!(intruder.failed_sends().is_empty());
}

#[tokio::test]
async fn test_bad_token_is_rejected_without_retry() {
    if !check_test_env().await {
        return;
    }

    let server = TestServer::start().await.expect("Failed to start server");
    let connection = Connection::connect(config_for(&server, "not-a-jwt"));

    let err = tokio::time::timeout(EVENT_TIMEOUT, connection.wait_until_connected())
        .await
        .expect("verdict within timeout")
        .unwrap_err();
    assert!(matches!(err, ClientError::Closed { code: 4004, .. }));
    assert!(connection.status().is_terminal());
}
