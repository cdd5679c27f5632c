//! The per-request transport client and its configuration.

use std::sync::Arc;
use std::time::Duration;

use courier_core::CancellationToken;
use courier_core::logging::targets;
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::handler::{HttpHandler, ReqwestHandler};
use super::request::{HttpRequest, RequestUri};
use super::response::HttpResponse;
use crate::error::{HttpError, Result};

/// Configuration for a reqwest-backed client.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Request timeout, measured until the response headers arrive.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Whether to enable cookie storage.
    pub cookies_enabled: bool,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Base URL that relative request URIs are resolved against.
    pub base_url: Option<Url>,
    /// Accept invalid TLS certificates.
    pub danger_accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(100)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            cookies_enabled: true,
            user_agent: Some(format!("Courier/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            proxy: None,
            base_url: None,
            danger_accept_invalid_certs: false,
        }
    }
}

/// Builder for creating an [`HttpClient`] with custom configuration.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    default_headers: HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            default_headers: HeaderMap::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Disable cookie storage.
    pub fn no_cookies(mut self) -> Self {
        self.config.cookies_enabled = false;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set a proxy URL.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Set the base URL for relative request URIs.
    pub fn base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        self.config.base_url = Some(Url::parse(base_url.as_ref())?);
        Ok(self)
    }

    /// Accept invalid TLS certificates.
    ///
    /// # Warning
    ///
    /// This is insecure and should only be used for testing.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.config.danger_accept_invalid_certs = true;
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(
        mut self,
        name: impl TryInto<HeaderName>,
        value: impl TryInto<HeaderValue>,
    ) -> Result<Self> {
        let name = name
            .try_into()
            .map_err(|_| HttpError::InvalidHeader("Invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| HttpError::InvalidHeader("Invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Build the client with a reqwest-backed handler.
    pub fn build(self) -> Result<HttpClient> {
        let handler = ReqwestHandler::from_config(&self.config)?;
        Ok(self.build_with_handler(Arc::new(handler)))
    }

    /// Build the client around a custom handler.
    ///
    /// Only the settings [`HttpClient`] enforces itself (timeout, base URL,
    /// default headers) apply; transport settings belong to the handler.
    pub fn build_with_handler(self, handler: Arc<dyn HttpHandler>) -> HttpClient {
        HttpClient {
            handler,
            timeout: self.config.timeout,
            base_url: self.config.base_url,
            default_headers: self.default_headers,
        }
    }
}

/// The client a request is sent through.
///
/// A client is a cheap, cloneable view over a shared [`HttpHandler`] plus
/// per-client settings. Builders obtain one per execution from an
/// [`HttpClientFactory`](super::HttpClientFactory) and may mutate it (for
/// example to change the timeout) without affecting other requests.
#[derive(Clone)]
pub struct HttpClient {
    handler: Arc<dyn HttpHandler>,
    timeout: Option<Duration>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Create a client around a handler, with the default timeout and no
    /// base URL.
    pub fn new(handler: Arc<dyn HttpHandler>) -> Self {
        HttpClientBuilder::new().build_with_handler(handler)
    }

    /// Create a builder for configuring a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// The handler requests are sent through.
    pub fn handler(&self) -> &Arc<dyn HttpHandler> {
        &self.handler
    }

    /// A copy of this client that sends through a different handler.
    pub fn with_handler(&self, handler: Arc<dyn HttpHandler>) -> Self {
        Self {
            handler,
            ..self.clone()
        }
    }

    /// The request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the request timeout. `None` disables it.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The base URL for relative request URIs.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Set the base URL for relative request URIs.
    pub fn set_base_url(&mut self, base_url: Option<Url>) {
        self.base_url = base_url;
    }

    /// Headers added to every request that does not set them itself.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Mutable access to the default headers.
    pub fn default_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.default_headers
    }

    /// Send a request.
    ///
    /// Resolves a relative URI against the base URL, fills in default
    /// headers, then sends through the handler. Fails with
    /// [`HttpError::Timeout`] if the response head does not arrive in time,
    /// or [`HttpError::Cancelled`] if `cancel` fires first.
    pub async fn send(&self, mut request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse> {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }

        let uri = request
            .uri
            .as_ref()
            .ok_or_else(|| HttpError::invalid_argument("uri", "request URI is not set"))?;
        let url = uri.resolve(self.base_url.as_ref())?;
        request.uri = Some(RequestUri::Absolute(url));

        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        let send = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.handler.send(request))
                    .await
                    .map_err(|_| HttpError::Timeout)?,
                None => self.handler.send(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: targets::CLIENT, "request cancelled before response");
                Err(HttpError::Cancelled)
            }
            result = send => result,
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("default_headers", &self.default_headers.len())
            .finish_non_exhaustive()
    }
}
