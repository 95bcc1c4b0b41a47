//! Conversation list: local filtering and periodic refresh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::value_objects::matches_search;
use huddle_core::Snowflake;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::model::Conversation;
use crate::rest::RestClient;

pub use huddle_core::ConversationFilter;

/// Same rules the server applies to `GET /conversations`: filter first,
/// then a case-insensitive substring on the name. A 1:1 has no name and
/// matches on the other participant instead.
pub fn filter_conversations<'a>(
    conversations: &'a [Conversation],
    filter: ConversationFilter,
    search: &str,
    me: Snowflake,
) -> Vec<&'a Conversation> {
    conversations
        .iter()
        .filter(|c| filter.accepts(c.is_group, c.unread_count))
        .filter(|c| search_matches(c, search, me))
        .collect()
}

fn search_matches(conversation: &Conversation, search: &str, me: Snowflake) -> bool {
    if search.trim().is_empty() {
        return true;
    }
    if let Some(name) = conversation.name.as_deref() {
        if matches_search(name, search) {
            return true;
        }
    }
    conversation.other_participant(me).is_some_and(|user| {
        matches_search(&user.username, search)
            || user
                .display_name
                .as_deref()
                .is_some_and(|d| matches_search(d, search))
    })
}

/// Where the poller gets its list from
#[async_trait]
pub trait ConversationSource: Send + Sync + 'static {
    async fn fetch_conversations(&self) -> ClientResult<Vec<Conversation>>;
}

#[async_trait]
impl ConversationSource for RestClient {
    async fn fetch_conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.conversations(ConversationFilter::All, None).await
    }
}

/// Re-fetches the conversation list on an interval and on demand.
/// A failed fetch keeps the previous snapshot.
#[derive(Debug)]
pub struct ConversationPoller {
    refresh: Arc<Notify>,
    snapshot: watch::Receiver<Arc<Vec<Conversation>>>,
    task: JoinHandle<()>,
}

impl ConversationPoller {
    pub fn spawn<S: ConversationSource>(source: S, interval: Duration) -> Self {
        let refresh = Arc::new(Notify::new());
        let (tx, snapshot) = watch::channel(Arc::new(Vec::new()));
        let trigger = Arc::clone(&refresh);

        let task = tokio::spawn(async move {
            loop {
                match source.fetch_conversations().await {
                    Ok(list) => {
                        debug!(count = list.len(), "Conversation list refreshed");
                        tx.send_replace(Arc::new(list));
                    }
                    Err(e) => warn!(error = %e, "Conversation refresh failed"),
                }
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = trigger.notified() => {}
                }
            }
        });

        Self {
            refresh,
            snapshot,
            task,
        }
    }

    /// Fetch now instead of waiting for the next tick
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn snapshot(&self) -> Arc<Vec<Conversation>> {
        Arc::clone(&self.snapshot.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Conversation>>> {
        self.snapshot.clone()
    }
}

impl Drop for ConversationPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::ClientError;
    use serde_json::json;
    use tokio::time::Instant;

    fn conversation(id: i64, name: Option<&str>, is_group: bool, unread: i32, others: &[(i64, &str, Option<&str>)]) -> Conversation {
        let mut participants = vec![json!({
            "user": {"id": "1", "username": "me"},
            "joined_at": "2026-01-01T00:00:00Z",
            "is_admin": is_group
        })];
        for (uid, username, display) in others {
            participants.push(json!({
                "user": {"id": uid.to_string(), "username": username, "display_name": display},
                "joined_at": "2026-01-01T00:00:00Z",
                "is_admin": false
            }));
        }
        let admin_id = if is_group { Some("1") } else { None };
        serde_json::from_value(json!({
            "id": id.to_string(),
            "name": name,
            "is_group": is_group,
            "admin_id": admin_id,
            "description": null,
            "participants": participants,
            "last_message": null,
            "unread_count": unread,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn sample() -> Vec<Conversation> {
        vec![
            conversation(10, Some("Outreach Team"), true, 0, &[(2, "bilal", None)]),
            conversation(11, None, false, 3, &[(3, "chidi", Some("Chidi Okafor"))]),
            conversation(12, Some("Finance"), true, 1, &[(2, "bilal", None)]),
        ]
    }

    fn ids(list: &[&Conversation]) -> Vec<i64> {
        list.iter().map(|c| c.id.into_inner()).collect()
    }

    #[test]
    fn test_filters() {
        let me = Snowflake::new(1);
        let all = sample();
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::All, "", me)), vec![10, 11, 12]);
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::Groups, "", me)), vec![10, 12]);
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::Unread, "", me)), vec![11, 12]);
    }

    #[test]
    fn test_search_matches_names_and_the_other_participant() {
        let me = Snowflake::new(1);
        let all = sample();
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::All, "REACH", me)), vec![10]);
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::All, "okafor", me)), vec![11]);
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::All, "chidi", me)), vec![11]);
        // Group members do not make a group match
        assert!(filter_conversations(&all, ConversationFilter::All, "bilal", me).is_empty());
        assert_eq!(ids(&filter_conversations(&all, ConversationFilter::Unread, "fin", me)), vec![12]);
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConversationSource for Counting {
        async fn fetch_conversations(&self) -> ClientResult<Vec<Conversation>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 2 {
                return Err(ClientError::NotConnected);
            }
            Ok(sample().into_iter().take(n.min(3)).collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_fetches_on_interval_and_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = ConversationPoller::spawn(
            Counting {
                calls: Arc::clone(&calls),
            },
            Duration::from_secs(30),
        );
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(poller.snapshot().len(), 1);

        // Second fetch fails at 30s and keeps the old snapshot; third lands at 60s
        let start = Instant::now();
        rx.changed().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.snapshot().len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(60));

        // Manual refresh does not wait for the interval
        let before = Instant::now();
        poller.refresh();
        rx.changed().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(before.elapsed() < Duration::from_secs(1));
    }
}
