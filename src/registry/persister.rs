//! Background writer for the registry file.
//!
//! Mutations on the request path only flag the store as changed. This task
//! waits for that flag and writes a snapshot on the blocking pool, so bursts
//! of breaker updates cost one write and no request waits on the disk.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::registry::store::RegistryStore;

pub struct RegistryPersister {
    registry: Arc<RegistryStore>,
}

impl RegistryPersister {
    pub fn new(registry: Arc<RegistryStore>) -> Self {
        Self { registry }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.registry.is_durable() {
            return;
        }
        tracing::info!("Registry persister starting");

        loop {
            tokio::select! {
                _ = self.registry.changed() => self.flush().await,
                _ = shutdown.recv() => {
                    self.flush().await;
                    tracing::info!("Registry persister flushed on shutdown, exiting loop");
                    break;
                }
            }
        }
    }

    /// Write the current snapshot without blocking the runtime.
    pub async fn flush(&self) {
        let registry = self.registry.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || registry.persist()).await {
            tracing::error!(error = %e, "Registry write task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::clock::SystemClock;
    use crate::registry::record::ServiceRecord;
    use crate::resilience::circuit_breaker::BreakerPolicy;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("persister-{}", uuid::Uuid::new_v4()))
            .join("registry.json")
    }

    fn saved(path: &Path) -> BTreeMap<String, ServiceRecord> {
        std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_changes_reach_disk_in_background() {
        let path = temp_path();
        let store = Arc::new(RegistryStore::open(&path, BreakerPolicy::default(), Arc::new(SystemClock)).unwrap());
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(RegistryPersister::new(store.clone()).run(rx));

        store.register("item-service", "http://h:3002");
        for _ in 0..5 {
            store.mark_failure("item-service");
        }

        let mut written = false;
        for _ in 0..100 {
            if saved(&path).get("item-service").is_some_and(|r| r.consecutive_failures == 5) {
                written = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(written);

        tx.send(()).unwrap();
        task.await.unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_last_state() {
        let path = temp_path();
        let store = Arc::new(RegistryStore::open(&path, BreakerPolicy::default(), Arc::new(SystemClock)).unwrap());
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(RegistryPersister::new(store.clone()).run(rx));

        store.register("user-service", "http://h:3001");
        store.register("list-service", "http://h:3003");
        store.unregister("user-service");
        tx.send(()).unwrap();
        task.await.unwrap();

        let names: Vec<_> = saved(&path).into_keys().collect();
        assert_eq!(names, ["list-service"]);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_store_exits_immediately() {
        let store = Arc::new(RegistryStore::with_defaults());
        let (_tx, rx) = broadcast::channel(1);
        tokio::time::timeout(Duration::from_secs(1), RegistryPersister::new(store).run(rx))
            .await
            .unwrap();
    }
}
