//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a downstream service:
//!     → circuit_breaker.rs (is the service's breaker open? fail fast)
//!     → timeouts.rs (bound the call)
//!     → outcome fed back into circuit_breaker.rs via the registry
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only network failures and timeouts count against a breaker
//! - Nothing retries; failures are absorbed or surfaced immediately

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerPolicy, BreakerTransition};
pub use timeouts::call_with_timeout;
