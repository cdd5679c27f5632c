//! Core building blocks for Courier.
//!
//! This crate provides the pieces the HTTP layer is assembled from:
//!
//! - [`Signal`]: ordered, thread-safe callback fan-out used for request
//!   lifecycle events and progress notifications
//! - [`CancellationSource`] / [`CancellationToken`]: cooperative cancellation
//!   with one-shot forwarding between sources
//! - [`logging`]: `tracing` target names for log filtering

pub mod cancel;
pub mod logging;
pub mod signal;

pub use cancel::{CancellationRegistration, CancellationSource, CancellationToken};
pub use signal::{ConnectionId, Signal};
