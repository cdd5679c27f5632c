//! Courier - a fluent HTTP request builder.
//!
//! This is the umbrella crate that re-exports all public APIs.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use courier::prelude::*;
//!
//! # async fn run() -> courier::Result<()> {
//! let api = ApiService::new(Arc::new(DefaultClientFactory::new()?));
//! let names: Option<Vec<String>> = api.get("https://example.com/api/names", None).await?;
//! println!("{names:?}");
//! # Ok(())
//! # }
//! ```

pub use courier_core::*;
pub use courier_net::*;

pub mod prelude;
