//! Fluent configuration methods.
//!
//! Request and client edits are recorded as callbacks and replayed in
//! registration order on every execution. Methods that parse input (URIs,
//! methods, JSON bodies) validate it immediately and return an error, so a
//! bad configuration never reaches the network.

use std::sync::Arc;
use std::time::Duration;

use courier_core::CancellationToken;
use courier_core::logging::targets;
use http::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;

use super::{HttpBuilder, ResponseParsed, ResponseReceived};
use crate::error::{HttpError, Result};
use crate::http::{
    HttpClient, HttpClientFactory, HttpContent, HttpRequest, RequestBody, RequestUri, append_query,
    join_parts,
};
use crate::json::JsonCodec;

impl<J: JsonCodec> HttpBuilder<J> {
    /// Register a callback that edits the outbound request.
    pub fn message<F>(self, edit: F) -> Self
    where
        F: Fn(&mut HttpRequest) + Send + Sync + 'static,
    {
        self.core.config.lock().message_edits.push(Box::new(edit));
        self
    }

    /// Register a callback that edits the transport client.
    pub fn client_config<F>(self, edit: F) -> Self
    where
        F: Fn(&mut HttpClient) + Send + Sync + 'static,
    {
        self.core.config.lock().client_edits.push(Box::new(edit));
        self
    }

    /// Create the client with `factory` instead of the builder's factory
    /// default.
    pub fn client_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&dyn HttpClientFactory) -> HttpClient + Send + Sync + 'static,
    {
        self.core.config.lock().client_factory = Some(Arc::new(factory));
        self
    }

    /// Send through a specific client.
    pub fn client(self, client: HttpClient) -> Self {
        self.core.set_client(client);
        self
    }

    /// Choose whether execution errors propagate (`true`) or are swallowed
    /// (`false`).
    pub fn throw_on_null(self, throw_on_null: bool) -> Self {
        self.core.config.lock().fail_gracefully = !throw_on_null;
        self
    }

    /// Swallow execution errors and return an empty result instead.
    pub fn fail_gracefully(self) -> Self {
        self.throw_on_null(false)
    }

    /// Propagate execution errors. This is the default.
    pub fn fail_with_throw(self) -> Self {
        self.throw_on_null(true)
    }

    /// Cancel the request when `token` is cancelled.
    ///
    /// May be called several times; the request is cancelled once, by
    /// whichever token fires first.
    pub fn cancel_with(self, token: &CancellationToken) -> Self {
        let link = self.core.cancel.link(token);
        self.core.config.lock().cancel_links.push(link);
        self
    }

    /// Apply a reusable configuration function.
    pub fn with(self, configure: impl FnOnce(Self) -> Self) -> Self {
        configure(self)
    }

    /// Set the HTTP method.
    pub fn method(self, method: Method) -> Self {
        self.message(move |request| request.method = method.clone())
    }

    /// Set the HTTP method from a string such as `"post"`.
    pub fn method_str(self, method: &str) -> Result<Self> {
        let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())?;
        Ok(self.method(method))
    }

    /// Set an absolute URL.
    pub fn url(self, url: Url) -> Self {
        let uri = RequestUri::Absolute(url);
        self.message(move |request| request.uri = Some(uri.clone()))
    }

    /// Set the URI. Relative URIs are resolved against the client's base URL.
    pub fn uri(self, uri: &str) -> Result<Self> {
        self.uri_with_query(uri, std::iter::empty::<(&str, &str)>())
    }

    /// Set the URI, appending query parameters.
    pub fn uri_with_query<K, V>(self, uri: &str, parameters: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if uri.is_empty() {
            return Err(HttpError::invalid_argument("uri", "URI cannot be empty"));
        }
        let uri = RequestUri::parse(&append_query(uri, parameters))?;
        Ok(self.message(move |request| request.uri = Some(uri.clone())))
    }

    /// Set the URI from segments joined with `/`, appending query parameters.
    pub fn uri_parts<S, K, V>(
        self,
        parts: impl IntoIterator<Item = S>,
        parameters: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.uri_with_query(&join_parts(parts), parameters)
    }

    /// Set a request header.
    ///
    /// An invalid name or value is logged and ignored.
    pub fn header(self, name: impl TryInto<HeaderName>, value: impl TryInto<HeaderValue>) -> Self {
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => self.set_header(name, value),
            _ => {
                tracing::warn!(target: targets::BUILDER, "ignoring invalid header");
                self
            }
        }
    }

    fn set_header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.message(move |request| {
            request.headers.insert(name.clone(), value.clone());
        })
    }

    fn set_header_str(self, name: HeaderName, value: String) -> Self {
        match HeaderValue::try_from(value) {
            Ok(value) => self.set_header(name, value),
            Err(e) => {
                tracing::warn!(target: targets::BUILDER, header = %name, "ignoring invalid header value: {}", e);
                self
            }
        }
    }

    /// Set the `Accept` header.
    pub fn accept(self, accept: &str) -> Self {
        self.set_header_str(ACCEPT, accept.to_string())
    }

    /// Set the `Authorization` header to `{scheme} {token}`.
    pub fn authorization(self, token: &str, scheme: &str) -> Self {
        self.set_header_str(AUTHORIZATION, format!("{scheme} {token}"))
    }

    /// Set a bearer token.
    pub fn bearer(self, token: &str) -> Self {
        self.authorization(token, "Bearer")
    }

    /// Set the `User-Agent` header.
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.set_header_str(USER_AGENT, user_agent.to_string())
    }

    /// Set a JSON body, serialized with the builder's codec.
    pub fn body_json<T>(self, value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let json = self.codec().serialize(value)?;
        Ok(self.body_content(HttpContent::json(json)))
    }

    /// Set a URL-encoded form body.
    pub fn body_form<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.body_content(HttpContent::form(pairs))
    }

    /// Set a raw body.
    pub fn body_content(self, content: HttpContent) -> Self {
        self.message(move |request| request.body = RequestBody::Full(content.clone()))
    }

    /// Set the client timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.client_config(move |client| client.set_timeout(Some(timeout)))
    }

    /// Set the client timeout in seconds.
    ///
    /// A negative or non-finite value is logged and ignored.
    pub fn timeout_secs(self, seconds: f64) -> Self {
        match Duration::try_from_secs_f64(seconds) {
            Ok(timeout) => self.timeout(timeout),
            Err(e) => {
                tracing::error!(target: targets::BUILDER, seconds, "invalid timeout: {}", e);
                self
            }
        }
    }

    /// Subscribe to `starting`.
    pub fn on_starting(self, slot: impl Fn() + Send + Sync + 'static) -> Self {
        self.core.events.starting.connect(move |_| slot());
        self
    }

    /// Subscribe to `response_received`.
    pub fn on_response_received(self, slot: impl Fn(&ResponseReceived) + Send + Sync + 'static) -> Self {
        self.core.events.response_received.connect(slot);
        self
    }

    /// Subscribe to `response_parsed`.
    pub fn on_response_parsed(self, slot: impl Fn(&ResponseParsed) + Send + Sync + 'static) -> Self {
        self.core.events.response_parsed.connect(slot);
        self
    }

    /// Subscribe to `finished`.
    pub fn on_finished(self, slot: impl Fn(Option<&HttpError>) + Send + Sync + 'static) -> Self {
        self.core.events.finished.connect(move |error| slot(error.as_ref()));
        self
    }
}
