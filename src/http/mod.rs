//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, background tasks)
//!     → request.rs (request ID)
//!     → registry API / composites / proxy.rs fallback
//!     → headers.rs (strip hop-by-hop headers both ways)
//!     → Send to client
//! ```

pub mod headers;
pub mod proxy;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
