//! Upload and download progress tracking.
//!
//! [`ProgressHandler`] is a transport decorator that counts bytes as they
//! are sent and received. [`ProgressTracker`] installs one on a request
//! builder and turns its high-frequency notifications into two channels per
//! direction: an immediate one and a throttled, timer-driven one.

mod handler;
mod tracker;

pub use handler::ProgressHandler;
pub use tracker::{ProgressReport, ProgressTracker};
