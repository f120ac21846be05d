//! Durable service registry.
//!
//! # Responsibilities
//! - Map service name → `ServiceRecord`
//! - Apply breaker updates atomically per name
//! - Flag every mutation so `RegistryPersister` writes the record set to disk
//!
//! # Design Decisions
//! - `DashMap` gives per-key locking; a shard guard is always dropped before
//!   signalling, since persisting iterates the whole map
//! - Mutations never touch the filesystem; a burst of them leaves a single
//!   pending `Notify` permit and therefore a single write
//! - Snapshot + write happen under one file lock so the last write carries
//!   every mutation that finished before it
//! - Persistence failures are logged, never surfaced to the caller

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

use crate::registry::clock::{Clock, SystemClock};
use crate::registry::record::ServiceRecord;
use crate::resilience::circuit_breaker::{BreakerPolicy, BreakerTransition};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode registry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
struct RegistryFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RegistryFile {
    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write(&self, records: &BTreeMap<String, ServiceRecord>) -> Result<(), RegistryError> {
        let data = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

/// Single-owner store of registered services and their breaker state.
#[derive(Debug)]
pub struct RegistryStore {
    services: DashMap<String, ServiceRecord>,
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    file: Option<RegistryFile>,
    dirty: Notify,
}

impl RegistryStore {
    /// A store that lives only as long as the process.
    pub fn in_memory(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            services: DashMap::new(),
            policy,
            clock,
            file: None,
            dirty: Notify::new(),
        }
    }

    /// Open (or create) a store backed by the JSON file at `path`.
    ///
    /// A file that exists but cannot be decoded is logged and replaced on the
    /// next write.
    pub fn open(path: impl AsRef<Path>, policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Result<Self, RegistryError> {
        let file = RegistryFile {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };

        let records: BTreeMap<String, ServiceRecord> = match fs::read(&file.path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::error!(path = ?file.path, error = %e, "Registry file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = file.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| file.io_error(e))?;
                }
                let empty = BTreeMap::new();
                file.write(&empty)?;
                empty
            }
            Err(e) => return Err(file.io_error(e)),
        };

        tracing::info!(path = ?file.path, services = records.len(), "Registry loaded");

        let services = DashMap::new();
        for (name, mut record) in records {
            // The map key wins if a hand-edited file disagrees with itself.
            record.name = name.clone();
            services.insert(name, record);
        }

        Ok(Self {
            services,
            policy,
            clock,
            file: Some(file),
            dirty: Notify::new(),
        })
    }

    /// Default policy, wall clock, in memory.
    pub fn with_defaults() -> Self {
        Self::in_memory(BreakerPolicy::default(), Arc::new(SystemClock))
    }

    pub fn policy(&self) -> BreakerPolicy {
        self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Upsert a service, resetting its breaker and timestamps.
    pub fn register(&self, name: &str, base_url: &str) -> ServiceRecord {
        let record = ServiceRecord::new(name, base_url, self.clock.now());
        self.services.insert(name.to_string(), record.clone());
        tracing::info!(service = %name, url = %base_url, "Service registered");
        self.mark_dirty();
        record
    }

    /// Remove a service. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.services.remove(name).is_some();
        if removed {
            tracing::info!(service = %name, "Service unregistered");
            self.mark_dirty();
        }
        removed
    }

    /// Endpoint for `name`, regardless of health.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.services.get(name).map(|r| r.base_url.clone())
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.services.get(name).map(|r| r.value().clone())
    }

    /// Snapshot of every record, ordered by name.
    pub fn list(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<ServiceRecord> = self.services.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Record a successful call, probe or heartbeat. Returns false for unknown names.
    pub fn mark_success(&self, name: &str) -> bool {
        let transition = {
            let Some(mut record) = self.services.get_mut(name) else {
                return false;
            };
            self.policy.record_success(&mut record, self.clock.now())
        };

        if transition == BreakerTransition::Healed {
            tracing::info!(service = %name, "Circuit closed");
        }
        self.mark_dirty();
        true
    }

    /// Record a failed call or probe. Returns `None` for unknown names.
    pub fn mark_failure(&self, name: &str) -> Option<BreakerTransition> {
        let (transition, failures) = {
            let mut record = self.services.get_mut(name)?;
            let transition = self.policy.record_failure(&mut record, self.clock.now());
            (transition, record.consecutive_failures)
        };

        if transition == BreakerTransition::Tripped {
            tracing::warn!(service = %name, failures, "Circuit opened");
        } else {
            tracing::debug!(service = %name, failures, "Failure recorded");
        }
        self.mark_dirty();
        Some(transition)
    }

    /// Whether calls to `name` must short-circuit. Unknown names are closed.
    pub fn is_open(&self, name: &str) -> bool {
        let (open, transition) = {
            let Some(mut record) = self.services.get_mut(name) else {
                return false;
            };
            self.policy.check(&mut record, self.clock.now())
        };

        if transition == BreakerTransition::CooledDown {
            tracing::info!(service = %name, "Circuit cool-down elapsed, allowing trial call");
            self.mark_dirty();
        }
        open
    }

    /// Remove every record whose `last_seen` is older than `max_age`.
    pub fn sweep_stale(&self, max_age: Duration) -> Vec<String> {
        let now = self.clock.now();
        let mut removed = Vec::new();
        self.services.retain(|name, record| {
            if record.is_stale(now, max_age) {
                removed.push(name.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            removed.sort();
            for name in &removed {
                tracing::info!(service = %name, "Stale service removed");
            }
            self.mark_dirty();
        }
        removed
    }

    /// Whether the store is backed by a file.
    pub fn is_durable(&self) -> bool {
        self.file.is_some()
    }

    fn mark_dirty(&self) {
        if self.file.is_some() {
            self.dirty.notify_one();
        }
    }

    /// Resolves once a mutation happened since the previous call returned.
    pub async fn changed(&self) {
        self.dirty.notified().await;
    }

    /// Write the current record set to disk, blocking the calling thread.
    ///
    /// Runs on the blocking pool when driven by `RegistryPersister`.
    pub fn persist(&self) {
        let Some(file) = &self.file else {
            return;
        };

        let _guard = file.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot: BTreeMap<String, ServiceRecord> = self
            .services
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        if let Err(e) = file.write(&snapshot) {
            tracing::error!(error = %e, "Failed to persist registry");
        }
    }
}
