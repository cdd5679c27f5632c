//! Success/failure outcome of a dual-typed request.

use http::StatusCode;

use crate::error::HttpError;

/// The outcome of [`HttpBuilder::result_status`](crate::HttpBuilder::result_status).
///
/// A 2xx response decodes into the success payload, anything else into the
/// failure payload. The status code is kept either way. Payloads are
/// `Option`s because an empty or `null` body decodes to `None`.
///
/// When the request itself failed under graceful-fail, the result is a
/// failure with status 500 that carries the [`HttpError`] instead of a
/// payload.
#[derive(Clone, Debug, PartialEq)]
pub enum HttpStatusResult<S, F> {
    /// The server answered with a success status.
    Success {
        /// The decoded success payload.
        payload: Option<S>,
        /// The response status code.
        code: StatusCode,
    },
    /// The server answered with a non-success status, or the request failed.
    Failure {
        /// The decoded failure payload.
        payload: Option<F>,
        /// The response status code, or 500 for a failed request.
        code: StatusCode,
        /// The error that made the request fail, if it never got a response.
        error: Option<HttpError>,
    },
}

impl<S, F> HttpStatusResult<S, F> {
    /// A success outcome.
    pub fn from_success(payload: Option<S>, code: StatusCode) -> Self {
        Self::Success { payload, code }
    }

    /// A failure outcome decoded from the response.
    pub fn from_failure(payload: Option<F>, code: StatusCode) -> Self {
        Self::Failure {
            payload,
            code,
            error: None,
        }
    }

    /// A failure outcome for a request that produced an error.
    pub(crate) fn from_error(error: HttpError, code: StatusCode) -> Self {
        Self::Failure {
            payload: None,
            code,
            error: Some(error),
        }
    }

    /// Whether the server answered with a success status.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The status code.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Success { code, .. } | Self::Failure { code, .. } => *code,
        }
    }

    /// The success payload, if this is a success.
    pub fn success(&self) -> Option<&S> {
        match self {
            Self::Success { payload, .. } => payload.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    /// The failure payload, if this is a failure with a decoded body.
    pub fn failure(&self) -> Option<&F> {
        match self {
            Self::Failure { payload, .. } => payload.as_ref(),
            Self::Success { .. } => None,
        }
    }

    /// The error, if the request failed without a usable response.
    pub fn error(&self) -> Option<&HttpError> {
        match self {
            Self::Failure { error, .. } => error.as_ref(),
            Self::Success { .. } => None,
        }
    }

    /// Convert into a `Result`, keeping the status code on both sides.
    pub fn into_result(self) -> Result<(Option<S>, StatusCode), (Option<F>, StatusCode)> {
        match self {
            Self::Success { payload, code } => Ok((payload, code)),
            Self::Failure { payload, code, .. } => Err((payload, code)),
        }
    }
}
