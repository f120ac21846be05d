//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every registered service concurrently, each with its own timeout
//!     → registry mark_success / mark_failure
//!
//! Passive health (routing::dispatch):
//!     Request outcome observed
//!     → same registry counters
//! ```
//!
//! # Design Decisions
//! - Active and passive signals feed one counter per service
//! - A stalled probe never delays the others

pub mod active;

pub use active::{HealthMonitor, ProbeReport};
