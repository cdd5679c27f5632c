//! HTTP response types.

use bytes::Bytes;
use courier_core::CancellationToken;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

use super::request::RequestHead;
use crate::error::{HttpError, Result};
use crate::json::collect_stream;

/// The status line, headers and URL of a response.
///
/// This is what lifecycle events carry; the body itself stays with the
/// [`HttpResponse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The HTTP version.
    pub version: Version,
    /// The response headers.
    pub headers: HeaderMap,
    /// The final URL after redirects.
    pub url: Url,
}

impl ResponseHead {
    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The canonical reason phrase for the status code.
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }
}

/// An HTTP response from a request.
pub struct HttpResponse {
    head: ResponseHead,
    request: RequestHead,
    body: ResponseBody,
}

impl HttpResponse {
    /// Create a response to `request`.
    ///
    /// Mostly useful for custom [`HttpHandler`](super::HttpHandler)s.
    pub fn new(status: StatusCode, request: RequestHead, body: ResponseBody) -> Self {
        Self {
            head: ResponseHead {
                status,
                version: Version::HTTP_11,
                headers: HeaderMap::new(),
                url: request.url.clone(),
            },
            request,
            body,
        }
    }

    /// Create from a reqwest response.
    pub(crate) fn from_reqwest(response: reqwest::Response, request: RequestHead) -> Self {
        let head = ResponseHead {
            status: response.status(),
            version: response.version(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        };
        let length = response.content_length();
        let stream = response.bytes_stream().map_err(HttpError::from).boxed();
        Self {
            head,
            request,
            body: ResponseBody::from_stream(stream, length),
        }
    }

    /// Add a response header.
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.head.headers.insert(name, value);
        self
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Get the canonical reason phrase for the status.
    pub fn reason(&self) -> &'static str {
        self.head.reason()
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        self.head.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.head
            .headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the final URL after redirects.
    pub fn url(&self) -> &Url {
        &self.head.url
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// The status line, headers and URL.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// The request this response answers.
    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    /// Get the Content-Length of the body, if known.
    pub fn content_length(&self) -> Option<u64> {
        self.body.content_length()
    }

    /// Replace the body with a transformed one.
    pub fn map_body(mut self, f: impl FnOnce(ResponseBody) -> ResponseBody) -> Self {
        self.body = f(self.body);
        self
    }

    /// Take the body, dropping the head.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Split into head, request and body.
    pub fn into_parts(self) -> (ResponseHead, RequestHead, ResponseBody) {
        (self.head, self.request, self.body)
    }

    /// Get the response body as text.
    pub async fn text(self) -> Result<String> {
        self.body.text().await
    }

    /// Get the response body as raw bytes.
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Parse the response body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        self.body.json().await
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.head.status)
            .field("url", &self.head.url.as_str())
            .field("method", &self.request.method)
            .finish()
    }
}

/// A streaming response body.
pub struct ResponseBody {
    stream: BoxStream<'static, Result<Bytes>>,
    content_length: Option<u64>,
}

impl ResponseBody {
    /// Wrap a chunk stream.
    pub fn from_stream(stream: BoxStream<'static, Result<Bytes>>, content_length: Option<u64>) -> Self {
        Self {
            stream,
            content_length,
        }
    }

    /// A body holding `bytes` as a single chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len() as u64;
        Self::from_stream(futures_util::stream::once(async move { Ok(bytes) }).boxed(), Some(length))
    }

    /// An empty body.
    pub fn empty() -> Self {
        Self::from_stream(futures_util::stream::empty().boxed(), Some(0))
    }

    /// Get the total size of the body, if known.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the next chunk of data.
    ///
    /// Returns `None` when the stream is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.stream.next().await.transpose()
    }

    /// Collect the whole body into one buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        self.bytes_until(&CancellationToken::none()).await
    }

    /// Collect the whole body, failing with [`HttpError::Cancelled`] if
    /// `cancel` fires first.
    pub async fn bytes_until(self, cancel: &CancellationToken) -> Result<Bytes> {
        collect_stream(self.stream, cancel).await
    }

    /// Read the body as UTF-8 text, replacing invalid sequences.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Parse the body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The underlying chunk stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        self.stream
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Progress information for downloads/uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                self.bytes_transferred as f64 / total as f64
            }
        })
    }

    /// Get the progress as a percentage (0 to 100), if total is known.
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).min(100.0) as u8)
    }
}
