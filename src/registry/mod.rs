//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! POST /registry (service startup)       → store.rs register()
//! health/active.rs probe outcome         → store.rs mark_success / mark_failure
//! routing outcome (proxy, composite)     → store.rs mark_success / mark_failure
//! sweeper.rs (timer)                     → store.rs sweep_stale()
//!
//! store.rs mutation → dirty flag → persister.rs → JSON file (blocking pool)
//! ```
//!
//! # Design Decisions
//! - One record per service name; at most one live endpoint per name
//! - Breaker state lives on the record (see resilience::circuit_breaker)
//! - Time is read through `Clock` so tests control it

pub mod clock;
pub mod persister;
pub mod record;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use persister::RegistryPersister;
pub use record::ServiceRecord;
pub use store::{RegistryError, RegistryStore};
pub use sweeper::StaleSweeper;
