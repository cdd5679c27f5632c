//! The transport seam: anything that can turn a request into a response.

use std::sync::Arc;

use courier_core::logging::targets;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::redirect::Policy;

use super::client::HttpClientConfig;
use super::request::{HttpRequest, RequestBody};
use super::response::HttpResponse;
use crate::error::{HttpError, Result};

/// Sends a fully resolved request and returns the response head with a
/// streaming body.
///
/// [`HttpClient`](super::HttpClient) resolves URIs, applies default headers,
/// timeouts and cancellation before a request reaches the handler, so the
/// request's URI is always absolute here. Handlers can be stacked: the
/// progress tracker wraps the default handler in a byte-counting one.
pub trait HttpHandler: Send + Sync {
    /// Send the request.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>>;
}

impl<H: HttpHandler + ?Sized> HttpHandler for Arc<H> {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        (**self).send(request)
    }
}

/// The default handler, backed by a pooled `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestHandler {
    client: reqwest::Client,
}

impl ReqwestHandler {
    /// Create a handler with default configuration.
    pub fn new() -> Result<Self> {
        Self::from_config(&HttpClientConfig::default())
    }

    /// Create a handler from a client configuration.
    ///
    /// The request timeout is enforced by [`HttpClient`](super::HttpClient),
    /// not here.
    pub fn from_config(config: &HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if config.follow_redirects {
            builder = builder.redirect(Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if config.cookies_enabled {
            builder = builder.cookie_store(true);
        }

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::invalid_argument("proxy", e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        if config.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying reqwest client.
    pub fn reqwest_client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let head = request.head()?;
        let HttpRequest {
            method,
            mut headers,
            body,
            ..
        } = request;

        let body = match body {
            RequestBody::Empty => None,
            RequestBody::Full(content) => {
                let (bytes, content_type) = content.into_parts();
                if let Some(content_type) = content_type {
                    headers.entry(CONTENT_TYPE).or_insert(content_type);
                }
                Some(reqwest::Body::from(bytes))
            }
            RequestBody::Stream {
                stream,
                length,
                content_type,
            } => {
                if let Some(content_type) = content_type {
                    headers.entry(CONTENT_TYPE).or_insert(content_type);
                }
                if let Some(length) = length {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
                }
                Some(reqwest::Body::wrap_stream(stream))
            }
        };

        let mut builder = self
            .client
            .request(head.method.clone(), head.url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        tracing::debug!(target: targets::CLIENT, %method, url = %head.url, "dispatching request");
        let response = builder.send().await?;
        tracing::debug!(
            target: targets::CLIENT,
            status = response.status().as_u16(),
            url = %head.url,
            "response headers received"
        );

        Ok(HttpResponse::from_reqwest(response, head))
    }
}

impl HttpHandler for ReqwestHandler {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        self.execute(request).boxed()
    }
}
