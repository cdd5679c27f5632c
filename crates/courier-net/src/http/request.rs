//! Outbound request types.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;
use url::form_urlencoded;

use crate::error::{HttpError, Result};

/// The URI of a request, as configured.
///
/// Relative URIs are resolved against the client's base URL when the
/// request is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestUri {
    /// A complete URL.
    Absolute(Url),
    /// A reference to resolve against [`HttpClient::base_url`](super::HttpClient::base_url).
    Relative(String),
}

impl RequestUri {
    /// Parse an absolute or relative URI.
    ///
    /// Fails with [`HttpError::InvalidArgument`] if the input is empty or
    /// malformed.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(HttpError::invalid_argument("uri", "URI cannot be empty"));
        }

        match Url::parse(input) {
            Ok(url) => Ok(Self::Absolute(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                // Resolve against a placeholder to reject malformed references early.
                Url::parse("http://localhost/")?
                    .join(input)
                    .map_err(|e| HttpError::invalid_argument("uri", format!("Invalid URI: {e}")))?;
                Ok(Self::Relative(input.to_string()))
            }
            Err(e) => Err(HttpError::invalid_argument("uri", format!("Invalid URI: {e}"))),
        }
    }

    /// Resolve to an absolute URL, using `base` for relative references.
    pub fn resolve(&self, base: Option<&Url>) -> Result<Url> {
        match (self, base) {
            (Self::Absolute(url), _) => Ok(url.clone()),
            (Self::Relative(reference), Some(base)) => Ok(base.join(reference)?),
            (Self::Relative(reference), None) => Err(HttpError::invalid_argument(
                "uri",
                format!(
                    "relative URI `{reference}` requires the client to have a base URL"
                ),
            )),
        }
    }

    /// The URI as text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Absolute(url) => url.as_str(),
            Self::Relative(reference) => reference,
        }
    }
}

impl std::fmt::Display for RequestUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append `key=value` query parameters to a URI string.
///
/// Keys and values are form-url-encoded. A `?` or `&` separator is chosen
/// depending on whether the URI already has a query.
pub fn append_query<K, V>(uri: &str, parameters: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut result = uri.to_string();
    for (key, value) in parameters {
        let pair = form_urlencoded::Serializer::new(String::new())
            .append_pair(key.as_ref(), value.as_ref())
            .finish();
        let separator = if result.contains('?') { '&' } else { '?' };
        result.push(separator);
        result.push_str(&pair);
    }
    result
}

/// Join URI segments with `/`, trimming slashes from each segment.
pub fn join_parts<S: AsRef<str>>(parts: impl IntoIterator<Item = S>) -> String {
    parts
        .into_iter()
        .map(|part| part.as_ref().trim_matches('/').to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// A fully buffered request body with its content type.
#[derive(Clone, Debug, Default)]
pub struct HttpContent {
    bytes: Bytes,
    content_type: Option<HeaderValue>,
}

impl HttpContent {
    /// JSON content (`application/json; charset=utf-8`).
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            bytes: Bytes::from(body.into()),
            content_type: Some(HeaderValue::from_static("application/json; charset=utf-8")),
        }
    }

    /// URL-encoded form content from key/value pairs.
    pub fn form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
        Self {
            bytes: Bytes::from(serializer.finish()),
            content_type: Some(HeaderValue::from_static("application/x-www-form-urlencoded")),
        }
    }

    /// Plain text content (`text/plain; charset=utf-8`).
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            bytes: Bytes::from(body.into()),
            content_type: Some(HeaderValue::from_static("text/plain; charset=utf-8")),
        }
    }

    /// Raw bytes with no content type.
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self {
            bytes: body.into(),
            content_type: None,
        }
    }

    /// Override the content type.
    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// The body bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The content type, if any.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// Length of the body in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Split into bytes and content type.
    pub fn into_parts(self) -> (Bytes, Option<HeaderValue>) {
        (self.bytes, self.content_type)
    }
}

/// The body of an outbound request.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A buffered body.
    Full(HttpContent),
    /// A streamed body.
    Stream {
        /// The body chunks.
        stream: BoxStream<'static, Result<Bytes>>,
        /// Total length, if known. Sent as `Content-Length`.
        length: Option<u64>,
        /// Content type of the body.
        content_type: Option<HeaderValue>,
    },
}

impl RequestBody {
    /// Whether there is no body.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(content) => content.is_empty(),
            Self::Stream { length, .. } => *length == Some(0),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(content) => f.debug_tuple("Full").field(content).finish(),
            Self::Stream {
                length,
                content_type,
                ..
            } => f
                .debug_struct("Stream")
                .field("length", length)
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

/// An outbound HTTP request.
///
/// A fresh request is built for every execution and passed through the
/// builder's request-mutation callbacks before it is sent.
#[derive(Debug, Default)]
pub struct HttpRequest {
    /// The HTTP method. Defaults to `GET`.
    pub method: Method,
    /// The request URI, if configured.
    pub uri: Option<RequestUri>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create an empty `GET` request with no URI.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a request for the given method and absolute URL.
    pub fn with_url(method: Method, url: Url) -> Self {
        Self {
            method,
            uri: Some(RequestUri::Absolute(url)),
            ..Self::default()
        }
    }

    /// The absolute URL of the request.
    ///
    /// Fails if no URI is set or the URI is still relative.
    pub fn url(&self) -> Result<&Url> {
        match &self.uri {
            Some(RequestUri::Absolute(url)) => Ok(url),
            Some(RequestUri::Relative(reference)) => Err(HttpError::invalid_argument(
                "uri",
                format!("relative URI `{reference}` was not resolved before sending"),
            )),
            None => Err(HttpError::invalid_argument("uri", "request URI is not set")),
        }
    }

    /// Snapshot the parts of the request that outlive sending it.
    pub fn head(&self) -> Result<RequestHead> {
        Ok(RequestHead {
            method: self.method.clone(),
            url: self.url()?.clone(),
            headers: self.headers.clone(),
        })
    }

    /// The `Content-Type` of the body, preferring an explicit header.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(CONTENT_TYPE).or(match &self.body {
            RequestBody::Empty => None,
            RequestBody::Full(content) => content.content_type(),
            RequestBody::Stream { content_type, .. } => content_type.as_ref(),
        })
    }
}

/// The method, URL and headers of a request that has been sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestHead {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL the request was sent to.
    pub url: Url,
    /// The request headers.
    pub headers: HeaderMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_and_relative() {
        let absolute = RequestUri::parse("https://example.com/api/test").unwrap();
        assert!(matches!(absolute, RequestUri::Absolute(_)));

        let relative = RequestUri::parse("api/test?count=2").unwrap();
        assert_eq!(relative, RequestUri::Relative("api/test?count=2".to_string()));
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(
            RequestUri::parse(""),
            Err(HttpError::InvalidArgument { argument: "uri", .. })
        ));
        assert!(matches!(
            RequestUri::parse("http://[::1"),
            Err(HttpError::InvalidArgument { argument: "uri", .. })
        ));
    }

    #[test]
    fn test_relative_resolution() {
        let base = Url::parse("http://localhost:5000/").unwrap();
        let uri = RequestUri::parse("api/test").unwrap();
        assert_eq!(
            uri.resolve(Some(&base)).unwrap().as_str(),
            "http://localhost:5000/api/test"
        );
        assert!(uri.resolve(None).is_err());
    }

    #[test]
    fn test_append_query_picks_separator() {
        let uri = append_query("https://example.com/api", [("count", "2"), ("q", "a b&c")]);
        assert_eq!(uri, "https://example.com/api?count=2&q=a+b%26c");

        let uri = append_query("https://example.com/api?x=1", [("y", "2")]);
        assert_eq!(uri, "https://example.com/api?x=1&y=2");
    }

    #[test]
    fn test_join_parts_trims_slashes() {
        assert_eq!(
            join_parts(["https://example.com/", "/api/", "test"]),
            "https://example.com/api/test"
        );
    }

    #[test]
    fn test_form_content() {
        let content = HttpContent::form([("name", "John Doe"), ("age", "30")]);
        assert_eq!(content.as_bytes().as_ref(), b"name=John+Doe&age=30");
        assert_eq!(
            content.content_type().unwrap(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn test_request_url_requires_absolute() {
        let mut request = HttpRequest::new();
        assert!(request.url().is_err());

        request.uri = Some(RequestUri::Relative("api".into()));
        assert!(request.url().is_err());

        request.uri = Some(RequestUri::parse("http://localhost/api").unwrap());
        assert_eq!(request.url().unwrap().as_str(), "http://localhost/api");
        assert_eq!(request.method, Method::GET);
    }
}
