//! Periodic removal of services that stopped reporting.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::registry::store::RegistryStore;

pub struct StaleSweeper {
    registry: Arc<RegistryStore>,
    interval: Duration,
    max_age: Duration,
}

impl StaleSweeper {
    pub fn new(registry: Arc<RegistryStore>, interval: Duration, max_age: Duration) -> Self {
        Self {
            registry,
            interval,
            max_age,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Stale sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        // The first tick fires immediately; a fresh process should give
        // services one full interval to check in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.registry.sweep_stale(self.max_age);
                    if !removed.is_empty() {
                        tracing::info!(removed = ?removed, "Stale sweep finished");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Stale sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
