//! Logging facilities for Courier.
//!
//! Courier uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("courier_net::builder=debug,courier_net::progress=trace")
//!         .init();
//! }
//! ```

/// Span names used throughout Courier for tracing.
pub mod span_names {
    /// A single request execution, from `starting` to `finished`.
    pub const REQUEST: &str = "courier::request";
    /// The progress reporting loop.
    pub const PROGRESS_LOOP: &str = "courier::progress_loop";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "courier_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "courier_core::signal";
    /// Cancellation target.
    pub const CANCEL: &str = "courier_core::cancel";
    /// Request builder target.
    pub const BUILDER: &str = "courier_net::builder";
    /// Transport client and factory target.
    pub const CLIENT: &str = "courier_net::client";
    /// JSON codec target.
    pub const JSON: &str = "courier_net::json";
    /// Progress tracking target.
    pub const PROGRESS: &str = "courier_net::progress";
    /// Convenience verb layer target.
    pub const API: &str = "courier_net::api";
}
