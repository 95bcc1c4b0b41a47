//! Sequential bulk operations with progress reporting

use std::future::Future;

use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl BulkProgress {
    pub fn is_done(&self) -> bool {
        self.completed + self.failed >= self.total
    }
}

/// Run `op` for each item, one at a time, publishing progress after each.
/// A failure does not stop the rest; every outcome is returned in order.
pub async fn run_sequential<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    progress: &watch::Sender<BulkProgress>,
    mut op: F,
) -> Vec<ClientResult<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ClientResult<R>>,
{
    let items: Vec<T> = items.into_iter().collect();
    let mut state = BulkProgress {
        total: items.len(),
        ..BulkProgress::default()
    };
    progress.send_replace(state);

    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
        let outcome = op(item).await;
        match &outcome {
            Ok(_) => state.completed += 1,
            Err(e) => {
                debug!(error = %e, "Bulk item failed");
                state.failed += 1;
            }
        }
        progress.send_replace(state);
        outcomes.push(outcome);
    }
    outcomes
}
