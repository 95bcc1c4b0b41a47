//! Shared presence cache
//!
//! One map for the whole client. Each `user_status` or
//! `user_status_changed` event updates it once and bumps a version
//! counter that watchers observe through a `watch` channel.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::{PresenceStatus, Snowflake};
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::Presence;
use crate::protocol::ServerEvent;

#[derive(Debug, Clone)]
pub struct PresenceCache {
    entries: Arc<RwLock<HashMap<Snowflake, Presence>>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for PresenceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(version),
        }
    }

    /// Store a presence; returns whether anything changed
    pub fn upsert(&self, presence: Presence) -> bool {
        let changed = {
            let mut entries = self.entries.write();
            if entries.get(&presence.user_id) == Some(&presence) {
                false
            } else {
                entries.insert(presence.user_id, presence);
                true
            }
        };
        if changed {
            self.version.send_modify(|v| *v += 1);
        }
        changed
    }

    /// Seed from a REST listing; one version bump for the batch
    pub fn seed(&self, presences: impl IntoIterator<Item = Presence>) {
        {
            let mut entries = self.entries.write();
            for presence in presences {
                entries.insert(presence.user_id, presence);
            }
        }
        self.version.send_modify(|v| *v += 1);
    }

    pub fn apply(&self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::UserStatus(presence) | ServerEvent::UserStatusChanged(presence) => {
                self.upsert(presence.clone())
            }
            _ => false,
        }
    }

    pub fn get(&self, user_id: Snowflake) -> Option<Presence> {
        self.entries.read().get(&user_id).cloned()
    }

    /// Unknown users count as offline
    pub fn status(&self, user_id: Snowflake) -> PresenceStatus {
        self.entries
            .read()
            .get(&user_id)
            .map_or(PresenceStatus::Offline, |p| p.status)
    }

    pub fn online_users(&self) -> Vec<Snowflake> {
        let mut users: Vec<Snowflake> = self
            .entries
            .read()
            .values()
            .filter(|p| p.status != PresenceStatus::Offline)
            .map(|p| p.user_id)
            .collect();
        users.sort_unstable();
        users
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Apply every presence event from a connection's event stream
    pub fn follow(&self, mut events: broadcast::Receiver<ServerEvent>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        cache.apply(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Presence follower lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(user: i64, status: PresenceStatus) -> Presence {
        Presence {
            user_id: Snowflake::new(user),
            status,
            custom_status: None,
            last_seen: None,
        }
    }

    #[test]
    fn test_one_update_per_event_shared_by_all_clones() {
        let cache = PresenceCache::new();
        let view = cache.clone();
        let watcher = cache.watch();

        assert!(cache.apply(&ServerEvent::UserStatus(presence(2, PresenceStatus::Online))));
        assert_eq!(view.status(Snowflake::new(2)), PresenceStatus::Online);
        assert_eq!(*watcher.borrow(), 1);

        // Same state again is not a change
        assert!(!cache.apply(&ServerEvent::UserStatus(presence(2, PresenceStatus::Online))));
        assert_eq!(view.version(), 1);

        let mut away = presence(2, PresenceStatus::Away);
        away.custom_status = Some("In a halaqa".to_string());
        assert!(cache.apply(&ServerEvent::UserStatusChanged(away)));
        assert_eq!(
            view.get(Snowflake::new(2)).unwrap().custom_status.as_deref(),
            Some("In a halaqa")
        );
        assert_eq!(view.version(), 2);
    }

    #[test]
    fn test_unknown_user_is_offline() {
        let cache = PresenceCache::new();
        assert_eq!(cache.status(Snowflake::new(9)), PresenceStatus::Offline);
        cache.seed([
            presence(1, PresenceStatus::Online),
            presence(2, PresenceStatus::Offline),
            presence(3, PresenceStatus::Away),
        ]);
        assert_eq!(cache.online_users(), vec![Snowflake::new(1), Snowflake::new(3)]);
    }

    #[tokio::test]
    async fn test_follow_applies_stream_events() {
        let cache = PresenceCache::new();
        let (tx, rx) = broadcast::channel(8);
        let mut watcher = cache.watch();
        let task = cache.follow(rx);

        tx.send(ServerEvent::UserStatus(presence(4, PresenceStatus::Online)))
            .unwrap();
        watcher.changed().await.unwrap();
        assert_eq!(cache.status(Snowflake::new(4)), PresenceStatus::Online);

        drop(tx);
        task.await.unwrap();
    }
}
