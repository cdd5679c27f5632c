//! Pluggable JSON (de)serialization.
//!
//! Every typed request goes through a [`JsonCodec`]. The default,
//! [`SerdeJsonCodec`], is backed by `serde_json`; a builder can be given any
//! other implementation through [`HttpBuilder::with_codec`](crate::HttpBuilder::with_codec).
//!
//! Decoding returns `Ok(None)` for an empty body or a JSON `null`, which is
//! how "no value" is represented throughout the crate.

pub mod epoch;

use std::future::Future;

use bytes::{Bytes, BytesMut};
use courier_core::CancellationToken;
use courier_core::logging::targets;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{HttpError, Result};

/// Serializes values to JSON and deserializes them back.
///
/// Implementors only need [`serialize`](Self::serialize) and
/// [`deserialize`](Self::deserialize); the streaming methods have default
/// implementations that buffer through them.
pub trait JsonCodec: Send + Sync + 'static {
    /// Serialize a value to a JSON string.
    fn serialize<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + ?Sized;

    /// Deserialize a value from a JSON string.
    ///
    /// Returns `Ok(None)` for empty input or `null`.
    fn deserialize<T>(&self, input: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned;

    /// Deserialize a value from raw bytes.
    fn deserialize_bytes<T>(&self, input: &[u8]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let text = std::str::from_utf8(input).map_err(|e| HttpError::Codec(e.to_string()))?;
        self.deserialize(text)
    }

    /// Serialize a value into an async writer.
    ///
    /// Fails with [`HttpError::Cancelled`] if `cancel` fires before the write
    /// completes.
    fn serialize_to<'a, T, W>(
        &'a self,
        value: &'a T,
        writer: &'a mut W,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send + 'a
    where
        T: Serialize + Sync + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        async move {
            let text = self.serialize(value)?;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HttpError::Cancelled),
                written = async {
                    writer.write_all(text.as_bytes()).await?;
                    writer.flush().await
                } => written.map_err(HttpError::from),
            }
        }
    }

    /// Deserialize a value from a stream of body chunks.
    ///
    /// The stream is read to the end before decoding. Fails with
    /// [`HttpError::Cancelled`] if `cancel` fires while reading.
    fn deserialize_from<'a, T, S>(
        &'a self,
        stream: S,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<Option<T>>> + Send + 'a
    where
        T: DeserializeOwned + Send,
        S: Stream<Item = Result<Bytes>> + Unpin + Send + 'a,
    {
        async move {
            let buffer = collect_stream(stream, cancel).await?;
            self.deserialize_bytes(&buffer)
        }
    }
}

/// Read every chunk of `stream` into one buffer, honouring `cancel`.
pub(crate) async fn collect_stream<S>(mut stream: S, cancel: &CancellationToken) -> Result<Bytes>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut buffer = BytesMut::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(chunk) => buffer.extend_from_slice(&chunk?),
            None => return Ok(buffer.freeze()),
        }
    }
}

/// [`JsonCodec`] backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeJsonCodec {
    pretty: bool,
}

impl SerdeJsonCodec {
    /// A codec producing compact output.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec producing indented output.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Whether output is indented.
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl JsonCodec for SerdeJsonCodec {
    fn serialize<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    fn deserialize<T>(&self, input: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.deserialize_bytes(input.as_bytes())
    }

    fn deserialize_bytes<T>(&self, input: &[u8]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        if input.iter().all(u8::is_ascii_whitespace) {
            tracing::trace!(target: targets::JSON, "empty JSON input, decoding as none");
            return Ok(None);
        }
        Ok(serde_json::from_slice::<Option<T>>(input)?)
    }
}
