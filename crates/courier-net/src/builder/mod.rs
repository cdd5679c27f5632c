//! The fluent request builder.
//!
//! An [`HttpBuilder`] accumulates configuration (see the methods in
//! `config.rs`) and is then consumed by exactly one execution method:
//!
//! - [`result`](HttpBuilder::result): the raw [`HttpResponse`]
//! - [`result_as`](HttpBuilder::result_as): the body decoded as one type
//! - [`result_status`](HttpBuilder::result_status): the body decoded as a
//!   success or failure type depending on the status code
//!
//! Every execution fires the [`HttpEvents`] in order and fires `finished`
//! exactly once. With graceful-fail enabled, execution errors are reported
//! through `finished` and swallowed; the caller gets an empty value instead.
//!
//! # Example
//!
//! ```ignore
//! use courier_net::{HttpBuilder, DefaultClientFactory};
//!
//! let factory = Arc::new(DefaultClientFactory::new()?);
//! let user: Option<User> = HttpBuilder::new(factory)
//!     .uri("https://api.example.com/users/1")?
//!     .bearer("token")
//!     .on_finished(|error| if let Some(error) = error {
//!         eprintln!("request failed: {error}");
//!     })
//!     .result_as()
//!     .await?;
//! ```

mod config;
mod events;

pub use events::{HttpEvents, Parsed, ResponseParsed, ResponseReceived};

use std::sync::Arc;

use courier_core::logging::{span_names, targets};
use courier_core::{CancellationRegistration, CancellationSource, CancellationToken};
use http::StatusCode;
use http::header::{ACCEPT, HeaderValue};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::error::{HttpError, Result};
use crate::http::{HttpClient, HttpClientFactory, HttpRequest, HttpResponse, ResponseHead};
use crate::json::{JsonCodec, SerdeJsonCodec};
use crate::status::HttpStatusResult;

pub(crate) type MessageEdit = Box<dyn Fn(&mut HttpRequest) + Send + Sync>;
pub(crate) type ClientEdit = Box<dyn Fn(&mut HttpClient) + Send + Sync>;
pub(crate) type ClientFactoryFn = Arc<dyn Fn(&dyn HttpClientFactory) -> HttpClient + Send + Sync>;

/// Configuration accumulated by the fluent methods.
#[derive(Default)]
pub(crate) struct RequestConfig {
    pub(crate) message_edits: Vec<MessageEdit>,
    pub(crate) client_edits: Vec<ClientEdit>,
    pub(crate) client_factory: Option<ClientFactoryFn>,
    pub(crate) fail_gracefully: bool,
    pub(crate) cancel_links: Vec<CancellationRegistration>,
}

/// State shared between a builder and the decorators attached to it.
pub(crate) struct BuilderCore {
    pub(crate) factory: Arc<dyn HttpClientFactory>,
    pub(crate) config: Mutex<RequestConfig>,
    pub(crate) cancel: CancellationSource,
    pub(crate) events: HttpEvents,
}

impl BuilderCore {
    /// Make every execution use `client` instead of asking the factory.
    pub(crate) fn set_client(&self, client: HttpClient) {
        self.config.lock().client_factory = Some(Arc::new(move |_| client.clone()));
    }

    fn create_client(&self, config: &RequestConfig) -> HttpClient {
        let mut client = match &config.client_factory {
            Some(factory) => factory(self.factory.as_ref()),
            None => self.factory.create_client(),
        };
        for edit in &config.client_edits {
            edit(&mut client);
        }
        client
    }
}

/// A fluent, single-shot HTTP request builder.
///
/// `J` is the [`JsonCodec`] used for JSON bodies and typed results.
pub struct HttpBuilder<J: JsonCodec = SerdeJsonCodec> {
    pub(crate) core: Arc<BuilderCore>,
    json: Arc<J>,
}

impl HttpBuilder<SerdeJsonCodec> {
    /// Create a builder that uses `serde_json` for JSON.
    pub fn new(factory: Arc<dyn HttpClientFactory>) -> Self {
        Self::with_codec(factory, Arc::new(SerdeJsonCodec::new()))
    }
}

impl<J: JsonCodec> HttpBuilder<J> {
    /// Create a builder with a custom JSON codec.
    pub fn with_codec(factory: Arc<dyn HttpClientFactory>, json: Arc<J>) -> Self {
        Self {
            core: Arc::new(BuilderCore {
                factory,
                config: Mutex::new(RequestConfig::default()),
                cancel: CancellationSource::new(),
                events: HttpEvents::default(),
            }),
            json,
        }
    }

    /// The lifecycle events of this builder.
    pub fn events(&self) -> &HttpEvents {
        &self.core.events
    }

    /// The JSON codec.
    pub fn codec(&self) -> &Arc<J> {
        &self.json
    }

    /// The client factory.
    pub fn factory(&self) -> &Arc<dyn HttpClientFactory> {
        &self.core.factory
    }

    /// The token the request is sent with.
    ///
    /// It is cancelled when any token passed to
    /// [`cancel_with`](Self::cancel_with) is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.core.cancel.token()
    }

    /// Whether execution errors will be swallowed.
    pub fn is_fail_gracefully(&self) -> bool {
        self.core.config.lock().fail_gracefully
    }

    /// Execute the request and return the raw response.
    ///
    /// The caller owns the response body. Under graceful-fail an execution
    /// error yields `Ok(None)`; otherwise the response is always `Some`.
    pub async fn result(self) -> Result<Option<HttpResponse>> {
        let span = self.span("raw");
        async move {
            let config = self.begin();
            let outcome = self.send(&config, false).await.map(Some);
            self.complete(outcome, config.fail_gracefully, |_| None)
        }
        .instrument(span)
        .await
    }

    /// Execute the request and decode the body as `T`.
    ///
    /// Sends `Accept: application/json` unless an Accept header was
    /// configured. A non-success status fails with
    /// [`HttpError::InvalidStatusCode`] carrying the body text, unless
    /// graceful-fail is set, in which case the body is decoded like any
    /// other. An empty or `null` body decodes to `None`, as does any error
    /// under graceful-fail.
    pub async fn result_as<T>(self) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let span = self.span("single");
        async move {
            let config = self.begin();
            let outcome = self.execute_as::<T>(&config).await;
            self.complete(outcome, config.fail_gracefully, |_| None)
        }
        .instrument(span)
        .await
    }

    /// Execute the request and decode the body as `S` on a success status or
    /// `F` otherwise.
    ///
    /// HTTP-level failures always come back as
    /// [`HttpStatusResult::Failure`]. Under graceful-fail, execution errors
    /// also do, with status 500 and the error attached.
    pub async fn result_status<S, F>(self) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        let span = self.span("dual");
        async move {
            let config = self.begin();
            let outcome = self.execute_status::<S, F>(&config).await;
            self.complete(outcome, config.fail_gracefully, |error| {
                HttpStatusResult::from_error(error, StatusCode::INTERNAL_SERVER_ERROR)
            })
        }
        .instrument(span)
        .await
    }

    fn span(&self, shape: &'static str) -> tracing::Span {
        tracing::debug_span!(target: targets::BUILDER, span_names::REQUEST, shape)
    }

    /// Fire `starting` and take the configuration for this execution.
    fn begin(&self) -> RequestConfig {
        tracing::debug!(target: targets::BUILDER, "request starting");
        self.core.events.starting.emit(());
        std::mem::take(&mut *self.core.config.lock())
    }

    /// Fire `finished` and apply graceful-fail.
    fn complete<T>(
        &self,
        outcome: Result<T>,
        fail_gracefully: bool,
        fallback: impl FnOnce(HttpError) -> T,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                tracing::debug!(target: targets::BUILDER, "request finished");
                self.core.events.finished.emit(None);
                Ok(value)
            }
            Err(error) => {
                self.core.events.finished.emit(Some(error.clone()));
                if fail_gracefully {
                    tracing::warn!(target: targets::BUILDER, %error, "request failed, returning empty result");
                    Ok(fallback(error))
                } else {
                    tracing::debug!(target: targets::BUILDER, %error, "request failed");
                    Err(error)
                }
            }
        }
    }

    /// Build the client and request, send it and fire `response_received`.
    async fn send(&self, config: &RequestConfig, ensure_accept: bool) -> Result<HttpResponse> {
        let client = self.core.create_client(config);

        let mut request = HttpRequest::new();
        for edit in &config.message_edits {
            edit(&mut request);
        }
        if request.uri.is_none() {
            return Err(HttpError::invalid_argument("uri", "request URI is not set"));
        }
        if ensure_accept && !request.headers.contains_key(ACCEPT) {
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        tracing::debug!(
            target: targets::BUILDER,
            method = %request.method,
            uri = ?request.uri.as_ref().map(|uri| uri.as_str()),
            "sending request"
        );
        let response = client.send(request, &self.core.cancel.token()).await?;

        self.core.events.response_received.emit(ResponseReceived {
            response: response.head().clone(),
            request: response.request().clone(),
        });
        Ok(response)
    }

    async fn execute_as<T>(&self, config: &RequestConfig) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self.send(config, true).await?;
        let token = self.core.cancel.token();
        let (head, _, body) = response.into_parts();

        if !config.fail_gracefully && !head.is_success() {
            let bytes = body.bytes_until(&token).await?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            self.core.events.response_parsed.emit(ResponseParsed {
                response: head.clone(),
                parsed: Parsed::Text(text.clone()),
            });
            return Err(HttpError::InvalidStatusCode {
                code: head.status.as_u16(),
                reason: head.reason().to_string(),
                body: text,
            });
        }

        let value = self.json.deserialize_from::<T, _>(body.into_stream(), &token).await?;
        Ok(self.parsed(head, value))
    }

    async fn execute_status<S, F>(&self, config: &RequestConfig) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        let response = self.send(config, true).await?;
        let token = self.core.cancel.token();
        let (head, _, body) = response.into_parts();
        let code = head.status;

        if head.is_success() {
            let value = self.json.deserialize_from::<S, _>(body.into_stream(), &token).await?;
            Ok(HttpStatusResult::from_success(self.parsed(head, value), code))
        } else {
            let value = self.json.deserialize_from::<F, _>(body.into_stream(), &token).await?;
            Ok(HttpStatusResult::from_failure(self.parsed(head, value), code))
        }
    }

    /// Fire `response_parsed` with a decoded value and hand the value back.
    fn parsed<T: Send + 'static>(&self, response: ResponseHead, value: Option<T>) -> Option<T> {
        let event = ResponseParsed {
            response,
            parsed: Parsed::from_option(value),
        };
        self.core.events.response_parsed.emit_ref(&event);
        event.parsed.into_option()
    }
}

impl<J: JsonCodec> std::fmt::Debug for HttpBuilder<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.core.config.lock();
        f.debug_struct("HttpBuilder")
            .field("message_edits", &config.message_edits.len())
            .field("client_edits", &config.client_edits.len())
            .field("custom_client", &config.client_factory.is_some())
            .field("fail_gracefully", &config.fail_gracefully)
            .field("cancelled", &self.core.cancel.is_cancelled())
            .finish()
    }
}
