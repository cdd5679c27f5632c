//! HTTP transport for Courier.
//!
//! The types here are what a request builder executes against:
//!
//! - [`HttpClientFactory`] hands out an [`HttpClient`] per execution
//! - [`HttpClient`] resolves the URI, applies default headers, timeout and
//!   cancellation, then calls its [`HttpHandler`]
//! - [`HttpHandler`] performs the exchange; [`ReqwestHandler`] is the
//!   default, backed by `reqwest`
//!
//! # Example
//!
//! ```ignore
//! use courier_net::http::{HttpClient, HttpRequest, RequestUri};
//! use courier_core::CancellationToken;
//!
//! let client = HttpClient::builder()
//!     .base_url("https://api.example.com/")?
//!     .timeout(std::time::Duration::from_secs(30))
//!     .build()?;
//!
//! let mut request = HttpRequest::new();
//! request.uri = Some(RequestUri::parse("users")?);
//! let response = client.send(request, &CancellationToken::none()).await?;
//! println!("Status: {}", response.status());
//! ```

mod client;
mod factory;
mod handler;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use factory::{DefaultClientFactory, HttpClientFactory};
pub use handler::{HttpHandler, ReqwestHandler};
pub use request::{HttpContent, HttpRequest, RequestBody, RequestHead, RequestUri, append_query, join_parts};
pub use response::{HttpResponse, ResponseBody, ResponseHead, TransferProgress};
