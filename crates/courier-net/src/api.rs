//! One-call helpers for the common verbs.
//!
//! [`ApiService`] creates [`HttpBuilder`]s with the method and URL set and
//! runs them. Each verb comes in a single-typed form returning
//! `Result<Option<T>>` and a `_status` form returning an
//! [`HttpStatusResult`]. The `_status` forms enable graceful-fail, so any
//! failure after configuration comes back as a
//! [`HttpStatusResult::Failure`].
//!
//! ```ignore
//! let api = ApiService::new(Arc::new(DefaultClientFactory::new()?));
//!
//! let created: Option<UserAccountResult> = api
//!     .post("https://example.com/api/test", &account, None)
//!     .await?;
//!
//! let status = api
//!     .get_status::<Vec<UserAccount>, FailedResult>("https://example.com/api/test?count=0", None)
//!     .await?;
//! if let Some(failure) = status.failure() {
//!     eprintln!("{}", failure.message);
//! }
//! ```

use std::sync::Arc;

use courier_core::CancellationToken;
use courier_core::logging::targets;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::builder::HttpBuilder;
use crate::error::Result;
use crate::http::{HttpClientFactory, HttpContent};
use crate::json::{JsonCodec, SerdeJsonCodec};
use crate::status::HttpStatusResult;

type Configure<J> = Box<dyn FnOnce(HttpBuilder<J>) -> HttpBuilder<J> + Send>;

/// Per-call options for [`ApiService`] requests.
pub struct RequestOptions<J: JsonCodec = SerdeJsonCodec> {
    configure: Option<Configure<J>>,
    cancel: Option<CancellationToken>,
}

impl<J: JsonCodec> Default for RequestOptions<J> {
    fn default() -> Self {
        Self {
            configure: None,
            cancel: None,
        }
    }
}

impl<J: JsonCodec> RequestOptions<J> {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Further configure the builder before the body is set.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(HttpBuilder<J>) -> HttpBuilder<J> + Send + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    /// Cancel the request when `token` is cancelled.
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<J: JsonCodec> std::fmt::Debug for RequestOptions<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("configure", &self.configure.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Creates and runs request builders sharing one client factory and codec.
pub struct ApiService<J: JsonCodec = SerdeJsonCodec> {
    factory: Arc<dyn HttpClientFactory>,
    json: Arc<J>,
}

impl<J: JsonCodec> Clone for ApiService<J> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            json: self.json.clone(),
        }
    }
}

impl ApiService<SerdeJsonCodec> {
    /// Create a service that uses `serde_json` for JSON.
    pub fn new(factory: Arc<dyn HttpClientFactory>) -> Self {
        Self::with_codec(factory, Arc::new(SerdeJsonCodec::new()))
    }
}

impl<J: JsonCodec> ApiService<J> {
    /// Create a service with a custom JSON codec.
    pub fn with_codec(factory: Arc<dyn HttpClientFactory>, json: Arc<J>) -> Self {
        Self { factory, json }
    }

    /// Create a builder with `method` and `url` set.
    pub fn create(&self, url: &str, method: Method) -> Result<HttpBuilder<J>> {
        HttpBuilder::with_codec(self.factory.clone(), self.json.clone())
            .method(method)
            .uri(url)
    }

    /// Create a builder with `method` and `url` set, then apply `options`.
    pub fn create_with(
        &self,
        url: &str,
        method: Method,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpBuilder<J>> {
        let options = options.into().unwrap_or_default();
        tracing::trace!(target: targets::API, %method, url, "creating request");

        let mut builder = self.create(url, method)?;
        if let Some(token) = &options.cancel {
            builder = builder.cancel_with(token);
        }
        if let Some(configure) = options.configure {
            builder = builder.with(configure);
        }
        Ok(builder)
    }

    async fn single<T>(&self, builder: HttpBuilder<J>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        builder.result_as().await
    }

    async fn dual<S, F>(&self, builder: HttpBuilder<J>) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        builder.fail_gracefully().result_status().await
    }

    /// `GET` and decode the body.
    pub async fn get<T>(&self, url: &str, options: impl Into<Option<RequestOptions<J>>>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.single(self.create_with(url, Method::GET, options)?).await
    }

    /// `GET` and decode the body as `S` or `F` depending on the status.
    pub async fn get_status<S, F>(
        &self,
        url: &str,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        self.dual(self.create_with(url, Method::GET, options)?).await
    }

    /// `POST` a JSON body and decode the response.
    pub async fn post<T, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_json(data)?;
        self.single(builder).await
    }

    /// `POST` a JSON body and decode the response as `S` or `F`.
    pub async fn post_status<S, F, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_json(data)?;
        self.dual(builder).await
    }

    /// `POST` a form body and decode the response.
    pub async fn post_form<T, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_form(form);
        self.single(builder).await
    }

    /// `POST` a form body and decode the response as `S` or `F`.
    pub async fn post_form_status<S, F, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_form(form);
        self.dual(builder).await
    }

    /// `POST` raw content and decode the response.
    pub async fn post_content<T>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_content(content);
        self.single(builder).await
    }

    /// `POST` raw content and decode the response as `S` or `F`.
    pub async fn post_content_status<S, F>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::POST, options)?.body_content(content);
        self.dual(builder).await
    }

    /// `PUT` a JSON body and decode the response.
    pub async fn put<T, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_json(data)?;
        self.single(builder).await
    }

    /// `PUT` a JSON body and decode the response as `S` or `F`.
    pub async fn put_status<S, F, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_json(data)?;
        self.dual(builder).await
    }

    /// `PUT` a form body and decode the response.
    pub async fn put_form<T, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_form(form);
        self.single(builder).await
    }

    /// `PUT` a form body and decode the response as `S` or `F`.
    pub async fn put_form_status<S, F, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_form(form);
        self.dual(builder).await
    }

    /// `PUT` raw content and decode the response.
    pub async fn put_content<T>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_content(content);
        self.single(builder).await
    }

    /// `PUT` raw content and decode the response as `S` or `F`.
    pub async fn put_content_status<S, F>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::PUT, options)?.body_content(content);
        self.dual(builder).await
    }

    /// `DELETE` and decode the response.
    pub async fn delete<T>(&self, url: &str, options: impl Into<Option<RequestOptions<J>>>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.single(self.create_with(url, Method::DELETE, options)?).await
    }

    /// `DELETE` and decode the response as `S` or `F`.
    pub async fn delete_status<S, F>(
        &self,
        url: &str,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        self.dual(self.create_with(url, Method::DELETE, options)?).await
    }

    /// `DELETE` with a JSON body and decode the response.
    pub async fn delete_json<T, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_json(data)?;
        self.single(builder).await
    }

    /// `DELETE` with a JSON body and decode the response as `S` or `F`.
    pub async fn delete_json_status<S, F, D>(
        &self,
        url: &str,
        data: &D,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        D: Serialize + ?Sized,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_json(data)?;
        self.dual(builder).await
    }

    /// `DELETE` with a form body and decode the response.
    pub async fn delete_form<T, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_form(form);
        self.single(builder).await
    }

    /// `DELETE` with a form body and decode the response as `S` or `F`.
    pub async fn delete_form_status<S, F, K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_form(form);
        self.dual(builder).await
    }

    /// `DELETE` with raw content and decode the response.
    pub async fn delete_content<T>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_content(content);
        self.single(builder).await
    }

    /// `DELETE` with raw content and decode the response as `S` or `F`.
    pub async fn delete_content_status<S, F>(
        &self,
        url: &str,
        content: HttpContent,
        options: impl Into<Option<RequestOptions<J>>>,
    ) -> Result<HttpStatusResult<S, F>>
    where
        S: DeserializeOwned + Send + 'static,
        F: DeserializeOwned + Send + 'static,
    {
        let builder = self.create_with(url, Method::DELETE, options)?.body_content(content);
        self.dual(builder).await
    }
}

impl<J: JsonCodec> std::fmt::Debug for ApiService<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService").finish_non_exhaustive()
    }
}
