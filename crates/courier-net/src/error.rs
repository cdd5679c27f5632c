//! Error types for the HTTP layer.

use thiserror::Error;

/// Errors produced while configuring or executing an HTTP request.
///
/// The type is `Clone` so the same error can be handed to
/// [`HttpEvents::finished`](crate::HttpEvents) subscribers and returned to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// A configuration value was missing or malformed.
    #[error("invalid argument `{argument}`: {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The server answered with a non-success status code.
    #[error("HTTP Status Code Invalid: {code} - {reason}")]
    InvalidStatusCode {
        /// The HTTP status code.
        code: u16,
        /// The reason phrase for the status code.
        reason: String,
        /// The response body, read as text.
        body: String,
    },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled.
    #[error("request was cancelled")]
    Cancelled,

    /// Connection refused or failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other transport failure.
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// Invalid header name or value.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Codec(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl HttpError {
    pub(crate) fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    /// Check whether this error came from the transport (timeout, connection,
    /// cancellation or I/O) rather than from configuration, status or codec.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Cancelled | Self::Connection(_) | Self::Transport(_) | Self::Io(_)
        )
    }

    /// The HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::InvalidStatusCode { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Codec(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_argument("uri", err.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for HttpError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for HttpError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::method::InvalidMethod> for HttpError {
    fn from(err: http::method::InvalidMethod) -> Self {
        Self::invalid_argument("method", err.to_string())
    }
}

/// A specialized Result type for HTTP operations.
pub type Result<T> = std::result::Result<T, HttpError>;
