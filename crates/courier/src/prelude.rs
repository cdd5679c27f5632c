//! Prelude module for Courier.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

// ============================================================================
// Requests
// ============================================================================

pub use crate::{ApiService, HttpBuilder, RequestOptions};
pub use crate::{HttpError, HttpStatusResult, Result};

// ============================================================================
// Events and Cancellation
// ============================================================================

pub use crate::{CancellationSource, CancellationToken, Signal};
pub use crate::{HttpEvents, ResponseParsed, ResponseReceived};

// ============================================================================
// Transport
// ============================================================================

pub use crate::{DefaultClientFactory, HttpClient, HttpClientBuilder, HttpClientFactory, HttpContent};

// ============================================================================
// JSON and Progress
// ============================================================================

pub use crate::{JsonCodec, SerdeJsonCodec};
pub use crate::{ProgressReport, ProgressTracker};
