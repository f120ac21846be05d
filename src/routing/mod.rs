//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (prefix table lookup)
//!     → matcher.rs (segment-aware prefix match + rewrite)
//!     → Return: RouteTarget { service, path_and_query } or no match
//!
//! RouteTarget
//!     → dispatch.rs (breaker check → registry resolve → send with deadline)
//!     → outcome recorded on the service's breaker
//! ```
//!
//! # Design Decisions
//! - Declarative ordered table instead of ad hoc string substitution
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod dispatch;
pub mod matcher;
pub mod router;

pub use dispatch::Dispatcher;
pub use matcher::PrefixRule;
pub use router::{RouteTable, RouteTarget};
