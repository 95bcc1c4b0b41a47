//! Typing auto-clear
//!
//! Each `typing {is_typing: true}` (re)arms a timer for its
//! (conversation, user) pair. A timer only fires if no newer keystroke
//! or explicit stop superseded it.

use huddle_core::Snowflake;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type TypingKey = (Snowflake, Snowflake);

#[derive(Debug)]
pub struct TypingTracker {
    timeout: Duration,
    generation: AtomicU64,
    timers: Mutex<HashMap<TypingKey, u64>>,
}

impl TypingTracker {
    #[must_use]
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            generation: AtomicU64::new(0),
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Arm or re-arm the timer; `on_expire` runs once it lapses unrefreshed
    pub fn touch<F, Fut>(self: &Arc<Self>, conversation_id: Snowflake, user_id: Snowflake, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = (conversation_id, user_id);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.timers.lock().insert(key, generation);

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(tracker.timeout).await;
            if tracker.expire(key, generation) {
                tracing::trace!(
                    conversation_id = %conversation_id,
                    user_id = %user_id,
                    "Typing indicator expired"
                );
                on_expire().await;
            }
        });
    }

    /// Disarm the timer; returns whether one was pending
    pub fn cancel(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.timers.lock().remove(&(conversation_id, user_id)).is_some()
    }

    #[must_use]
    pub fn is_pending(&self, conversation_id: Snowflake, user_id: Snowflake) -> bool {
        self.timers.lock().contains_key(&(conversation_id, user_id))
    }

    fn expire(&self, key: TypingKey, generation: u64) -> bool {
        let mut timers = self.timers.lock();
        if timers.get(&key) == Some(&generation) {
            timers.remove(&key);
            true
        } else {
            false
        }
    }
}
