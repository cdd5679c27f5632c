//! HTTP layer for Courier.
//!
//! This crate provides:
//!
//! - **Request builder**: [`HttpBuilder`], a fluent single-shot builder with
//!   lifecycle events and optional graceful-fail
//! - **Status results**: [`HttpStatusResult`], a success or failure payload
//!   chosen by the response status
//! - **JSON**: the pluggable [`JsonCodec`] and its `serde_json` default
//! - **Progress**: [`ProgressTracker`], upload/download progress reports for
//!   a builder
//! - **Verbs**: [`ApiService`], one-call GET/POST/PUT/DELETE helpers
//!
//! # Request Builder
//!
//! ```ignore
//! use courier_net::{DefaultClientFactory, HttpBuilder};
//!
//! let factory = Arc::new(DefaultClientFactory::new()?);
//!
//! let created: Option<UserAccountResult> = HttpBuilder::new(factory.clone())
//!     .method(Method::POST)
//!     .uri("https://example.com/api/test")?
//!     .body_json(&account)?
//!     .result_as()
//!     .await?;
//! ```
//!
//! ## Success or Failure Payloads
//!
//! ```ignore
//! let result = HttpBuilder::new(factory)
//!     .uri("https://example.com/api/test?count=0")?
//!     .result_status::<Vec<UserAccount>, FailedResult>()
//!     .await?;
//!
//! match result {
//!     HttpStatusResult::Success { payload, .. } => println!("{payload:?}"),
//!     HttpStatusResult::Failure { payload, code, .. } => println!("{code}: {payload:?}"),
//! }
//! ```
//!
//! ## Progress
//!
//! ```ignore
//! let body = HttpBuilder::new(factory)
//!     .uri("https://example.com/large-file")?
//!     .progress_tracking(|tracker| {
//!         tracker
//!             .report_increment(Duration::from_millis(500))
//!             .on_download_timer(|report| println!("{}% after {:?}", report.percentage, report.elapsed));
//!     })
//!     .result()
//!     .await?;
//! ```

mod api;
mod builder;
mod error;
pub mod http;
pub mod json;
pub mod progress;
mod status;

pub use api::{ApiService, RequestOptions};
pub use builder::{HttpBuilder, HttpEvents, Parsed, ResponseParsed, ResponseReceived};
pub use error::{HttpError, Result};
pub use status::HttpStatusResult;

pub use json::{JsonCodec, SerdeJsonCodec};
pub use progress::{ProgressHandler, ProgressReport, ProgressTracker};

// Re-export commonly used transport types at the crate root
pub use http::{
    DefaultClientFactory, HttpClient, HttpClientBuilder, HttpClientFactory, HttpContent, HttpHandler,
    HttpRequest, HttpResponse, ReqwestHandler, RequestBody, RequestHead, ResponseBody, ResponseHead,
    TransferProgress,
};

pub use courier_core::{CancellationSource, CancellationToken};
