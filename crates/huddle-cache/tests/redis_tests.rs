//! Store tests against a real Redis
//!
//! Skipped unless `REDIS_URL` is set:
//!
//! ```bash
//! export REDIS_URL="redis://127.0.0.1:6379"
//! cargo test -p huddle-cache --test redis_tests
//! ```

use std::sync::LazyLock;

use huddle_cache::{
    GatewaySessionData, GatewaySessionStore, PresenceStore, RedisPool, RedisPoolConfig,
    RefreshTokenData, RefreshTokenStore, SessionEvent,
};
use huddle_core::{PresenceStatus, Snowflake, SnowflakeGenerator};

static IDS: LazyLock<SnowflakeGenerator> = LazyLock::new(|| SnowflakeGenerator::new(1022));

async fn get_test_pool() -> Option<RedisPool> {
    let url = std::env::var("REDIS_URL").ok()?;
    let pool = RedisPool::new(RedisPoolConfig {
        url,
        max_connections: 4,
    })
    .ok()?;
    pool.health_check().await.ok()?;
    Some(pool)
}

fn id() -> Snowflake {
    IDS.generate()
}

#[tokio::test]
async fn test_presence_follows_sessions() {
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: REDIS_URL not set");
        return;
    };
    let store = PresenceStore::new(pool);
    let user = id();

    let first = store.connect(user, "s1").await.unwrap();
    assert!(first.changed);
    assert_eq!(first.presence.status, PresenceStatus::Online);

    let second = store.connect(user, "s2").await.unwrap();
    assert!(!second.changed);
    assert_eq!(store.session_count(user).await.unwrap(), 2);

    let partial = store.disconnect(user, "s1").await.unwrap();
    assert!(!partial.changed);
    assert_eq!(store.status_of(user).await.unwrap(), PresenceStatus::Online);

    let last = store.disconnect(user, "s2").await.unwrap();
    assert!(last.changed);
    assert_eq!(last.presence.status, PresenceStatus::Offline);
    assert!(last.presence.last_seen.is_some());
}

#[tokio::test]
async fn test_explicit_status_and_bulk_lookup() {
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: REDIS_URL not set");
        return;
    };
    let store = PresenceStore::new(pool);
    let (away, unknown) = (id(), id());

    store.connect(away, "s").await.unwrap();
    let presence = store
        .set_status(away, PresenceStatus::Away, Some("praying".to_string()))
        .await
        .unwrap();
    assert_eq!(presence.custom_status.as_deref(), Some("praying"));

    // another session does not override an explicit away
    let again = store.connect(away, "s-other").await.unwrap();
    assert_eq!(again.presence.status, PresenceStatus::Away);

    let all = store.get_many(&[away, unknown]).await.unwrap();
    assert_eq!(all[0].status, PresenceStatus::Away);
    assert_eq!(all[1].user_id, unknown);
    assert_eq!(all[1].status, PresenceStatus::Offline);
}

#[tokio::test]
async fn test_typing_keys_expire() {
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: REDIS_URL not set");
        return;
    };
    let chat = huddle_common::ChatConfig {
        typing_timeout_ms: 200,
        ..Default::default()
    };
    let store = PresenceStore::from_config(pool, &chat);
    let (conversation, user) = (id(), id());

    store.set_typing(conversation, user).await.unwrap();
    assert!(store.is_typing(conversation, user).await.unwrap());
    assert_eq!(store.typing_in(conversation).await.unwrap().len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert!(!store.is_typing(conversation, user).await.unwrap());
}

#[tokio::test]
async fn test_gateway_session_resume_flow() {
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: REDIS_URL not set");
        return;
    };
    let store = GatewaySessionStore::new(pool);
    let user = id();
    let session_id = format!("test-{}", id());

    let mut session = GatewaySessionData::new(session_id.clone(), user);
    session.join(Snowflake::new(77));
    store.create(&session).await.unwrap();

    for seq in 1..=5 {
        store
            .queue_event(&session_id, &SessionEvent::new(seq, "receive_message", serde_json::json!({ "n": seq })))
            .await
            .unwrap();
    }
    session.sequence = 5;

    // still connected: not resumable
    assert!(store.validate_for_resume(&session_id, user).await.unwrap().is_none());

    store.mark_disconnected(&mut session).await.unwrap();
    assert!(store.validate_for_resume(&session_id, id()).await.unwrap().is_none());

    let resumable = store
        .validate_for_resume(&session_id, user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumable.conversations, vec![Snowflake::new(77)]);

    let replay = store.replay_since(&resumable, 3).await.unwrap().unwrap();
    assert_eq!(replay.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![4, 5]);

    assert!(store.delete(&session_id).await.unwrap());
    assert!(store.get(&session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: REDIS_URL not set");
        return;
    };
    let store = RefreshTokenStore::new(pool);
    let user = id();
    let jti = format!("jti-{}", id());

    store.store(&jti, &RefreshTokenData::new(user)).await.unwrap();
    assert_eq!(store.consume(&jti).await.unwrap().unwrap().user_id, user);
    assert!(store.consume(&jti).await.unwrap().is_none());

    let (a, b) = (format!("jti-{}", id()), format!("jti-{}", id()));
    store.store(&a, &RefreshTokenData::new(user)).await.unwrap();
    store.store(&b, &RefreshTokenData::new(user)).await.unwrap();
    assert_eq!(store.revoke_all_for_user(user).await.unwrap(), 2);
    assert!(store.get(&a).await.unwrap().is_none());
}
