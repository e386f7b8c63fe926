//! Periodic removal of expired tokens.

use std::time::Duration;

use tokenauth_storage::DynTokenStore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Background task calling [`delete_expired`] on a fixed interval.
///
/// [`delete_expired`]: tokenauth_storage::TokenStore::delete_expired
pub struct Sweeper;

impl Sweeper {
    /// Starts sweeping `store` every `period` on the current tokio runtime.
    ///
    /// Returns `None` when `period` is zero.
    pub fn spawn(store: DynTokenStore, period: Duration) -> Option<SweeperHandle> {
        if period.is_zero() {
            tracing::debug!("Expired token sweeper disabled");
            return None;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(store, period, cancel.clone()));
        tracing::info!(interval = ?period, "Expired token sweeper started");
        Some(SweeperHandle { cancel, task })
    }
}

async fn run(store: DynTokenStore, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match store.delete_expired().await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::debug!(removed, backend = store.backend_name(), "Swept expired tokens");
            }
            Err(e) => {
                tracing::warn!(error = %e, backend = store.backend_name(), "Expired token sweep failed");
            }
        }
    }

    tracing::debug!("Expired token sweeper stopped");
}

/// Stops the sweeper when asked to, or when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop and waits for the in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Expired token sweeper task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
