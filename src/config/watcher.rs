//! Route table hot reload.
//!
//! The directory holding the config file is watched, not the file itself, so
//! a config replaced by rename keeps being picked up. Events for any other
//! file in that directory are dropped. Each change is loaded, validated and
//! compiled into a `RouteTable` here; the server only swaps it in.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::routing::RouteTable;

/// Watches one config file and emits a fresh `RouteTable` per valid change.
pub struct RouteWatcher {
    config_path: PathBuf,
    file_name: OsString,
    tables: mpsc::UnboundedSender<RouteTable>,
}

impl RouteWatcher {
    /// Returns the watcher and the receiving end of compiled route tables.
    pub fn new(config_path: &Path) -> (Self, mpsc::UnboundedReceiver<RouteTable>) {
        let (tables, rx) = mpsc::unbounded_channel();
        let file_name = config_path.file_name().map(OsString::from).unwrap_or_default();
        let watcher = Self {
            config_path: config_path.to_path_buf(),
            file_name,
            tables,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn start(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.config_path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => self.handle(&event),
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "Route watcher started");
        Ok(watcher)
    }

    fn handle(&self, event: &Event) {
        if !self.concerns_config(event) {
            return;
        }
        if let Some(table) = self.reload() {
            // The receiver is gone once the server has stopped.
            let _ = self.tables.send(table);
        }
    }

    fn concerns_config(&self, event: &Event) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    fn reload(&self) -> Option<RouteTable> {
        match load_config(&self.config_path) {
            Ok(config) => {
                let table = RouteTable::from_config(&config.routes);
                tracing::info!(path = ?self.config_path, routes = table.len(), "Config change compiled");
                Some(table)
            }
            Err(e) => {
                tracing::error!(path = ?self.config_path, error = %e, "Config change rejected, keeping current routes");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, EventKind, ModifyKind};
    use std::fs;

    const TWO_ROUTES: &str = r#"
[[routes]]
prefix = "/api/items"
service = "item-service"
rewrite = "/items"

[[routes]]
prefix = "/api/lists"
service = "list-service"
rewrite = "/lists"
"#;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("route-watch-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn modified(path: &Path) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any))).add_path(path.to_path_buf())
    }

    #[test]
    fn test_change_to_config_emits_table() {
        let dir = temp_dir();
        let path = dir.join("gateway.toml");
        fs::write(&path, TWO_ROUTES).unwrap();
        let (watcher, mut rx) = RouteWatcher::new(&path);

        watcher.handle(&modified(&path));
        assert_eq!(rx.try_recv().unwrap().len(), 2);

        watcher.handle(&Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone()));
        assert_eq!(rx.try_recv().unwrap().len(), 2);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_other_files_in_directory_are_ignored() {
        let dir = temp_dir();
        let path = dir.join("gateway.toml");
        fs::write(&path, TWO_ROUTES).unwrap();
        let (watcher, mut rx) = RouteWatcher::new(&path);

        watcher.handle(&modified(&dir.join("gateway.toml.swp")));
        watcher.handle(&modified(&dir.join("registry.json")));
        assert!(rx.try_recv().is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_config_is_not_sent() {
        let dir = temp_dir();
        let path = dir.join("gateway.toml");
        fs::write(&path, "[registry]\ntrip_threshold = 0\n").unwrap();
        let (watcher, mut rx) = RouteWatcher::new(&path);

        watcher.handle(&modified(&path));
        assert!(rx.try_recv().is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let dir = temp_dir();
        let path = dir.join("gateway.toml");
        fs::write(&path, TWO_ROUTES).unwrap();
        let (watcher, mut rx) = RouteWatcher::new(&path);

        watcher.handle(&Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(path.clone()));
        assert!(rx.try_recv().is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_rewritten_config_reaches_receiver() {
        let dir = temp_dir();
        let path = dir.join("gateway.toml");
        fs::write(&path, "").unwrap();
        let (watcher, mut rx) = RouteWatcher::new(&path);
        let _handle = watcher.start().unwrap();

        fs::write(dir.join("unrelated.txt"), "noise").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());

        fs::write(&path, TWO_ROUTES).unwrap();
        let table = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(table.len(), 2);

        let _ = fs::remove_dir_all(dir);
    }
}
