//! Request lifecycle events.

use std::any::Any;

use courier_core::Signal;

use crate::error::HttpError;
use crate::http::{RequestHead, ResponseHead};

/// Payload of [`HttpEvents::response_received`].
#[derive(Clone, Debug)]
pub struct ResponseReceived {
    /// The response status line and headers. The body has not been read.
    pub response: ResponseHead,
    /// The request that was sent.
    pub request: RequestHead,
}

/// What the response body was parsed into.
pub enum Parsed {
    /// The body as text, on the non-success path of a single-typed request.
    Text(String),
    /// The decoded value.
    Value(Box<dyn Any + Send>),
    /// The body decoded to nothing (empty or `null`).
    Empty,
}

impl Parsed {
    pub(crate) fn from_option<T: Send + 'static>(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Value(Box::new(value)),
            None => Self::Empty,
        }
    }

    pub(crate) fn into_option<T: 'static>(self) -> Option<T> {
        match self {
            Self::Value(value) => value.downcast::<T>().ok().map(|value| *value),
            Self::Text(_) | Self::Empty => None,
        }
    }
}

impl std::fmt::Debug for Parsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// Payload of [`HttpEvents::response_parsed`].
#[derive(Debug)]
pub struct ResponseParsed {
    /// The response status line and headers.
    pub response: ResponseHead,
    /// The parsed body.
    pub parsed: Parsed,
}

impl ResponseParsed {
    /// The decoded value, if it is a `T`.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        match &self.parsed {
            Parsed::Value(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The body text, on the non-success path.
    pub fn text(&self) -> Option<&str> {
        match &self.parsed {
            Parsed::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// The four lifecycle events of a request builder.
///
/// For one execution they fire in order: `starting`, `response_received`,
/// `response_parsed`, `finished`. `finished` always fires exactly once; when
/// an error occurs the events between `starting` and `finished` that were
/// not reached are skipped.
#[derive(Debug, Default)]
pub struct HttpEvents {
    /// Fired before the transport client is created.
    pub starting: Signal<()>,
    /// Fired once the response head arrives, before the body is read.
    pub response_received: Signal<ResponseReceived>,
    /// Fired after the body has been decoded.
    pub response_parsed: Signal<ResponseParsed>,
    /// Fired last, with the error if the execution failed.
    pub finished: Signal<Option<HttpError>>,
}
