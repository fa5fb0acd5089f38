use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::locks::SessionLocks;
use super::store::SessionStore;

/// Periodically evict idle sessions and prune unused lock entries.
///
/// The task exits when `cancel_token` is cancelled.
pub fn spawn_eviction_task(
    store: Arc<dyn SessionStore>,
    locks: Arc<SessionLocks>,
    every: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Session eviction task stopped");
                    break;
                }

                _ = ticker.tick() => {
                    let evicted = store.evict_idle().await;
                    let pruned = locks.prune();
                    if evicted > 0 {
                        info!(evicted, pruned, remaining = store.len(), "Evicted idle sessions");
                    } else {
                        debug!(pruned, remaining = store.len(), "Eviction sweep found no idle sessions");
                    }
                }
            }
        }
    })
}
