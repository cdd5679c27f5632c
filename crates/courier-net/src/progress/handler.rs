//! Byte-counting transport handler.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use courier_core::Signal;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use pin_project_lite::pin_project;

use crate::error::Result;
use crate::http::{HttpHandler, HttpRequest, HttpResponse, RequestBody, TransferProgress};

/// Upload bodies are streamed in chunks of this size so progress can be
/// reported while sending.
const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// An [`HttpHandler`] that reports how many bytes have been sent and
/// received.
///
/// Wraps another handler. Request bodies are re-streamed through a counter
/// and response bodies are wrapped in one, so
/// [`receive_progress`](Self::receive_progress) fires as the caller reads the
/// body.
///
/// Each signal fires once per chunk. When the total length is unknown, one
/// extra notification at 100% is fired when the stream ends.
pub struct ProgressHandler {
    inner: Arc<dyn HttpHandler>,
    send_progress: Arc<Signal<TransferProgress>>,
    receive_progress: Arc<Signal<TransferProgress>>,
}

impl ProgressHandler {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn HttpHandler>) -> Self {
        Self {
            inner,
            send_progress: Arc::new(Signal::new()),
            receive_progress: Arc::new(Signal::new()),
        }
    }

    /// Fired as the request body is sent.
    pub fn send_progress(&self) -> &Signal<TransferProgress> {
        &self.send_progress
    }

    /// Fired as the response body is read.
    pub fn receive_progress(&self) -> &Signal<TransferProgress> {
        &self.receive_progress
    }

    /// The wrapped handler.
    pub fn inner(&self) -> &Arc<dyn HttpHandler> {
        &self.inner
    }

    fn count_upload(&self, body: RequestBody) -> RequestBody {
        match body {
            RequestBody::Full(content) if !content.is_empty() => {
                let (bytes, content_type) = content.into_parts();
                let length = bytes.len() as u64;
                let chunks: Vec<Result<Bytes>> = (0..bytes.len())
                    .step_by(UPLOAD_CHUNK_SIZE)
                    .map(|start| Ok(bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(bytes.len()))))
                    .collect();
                RequestBody::Stream {
                    stream: ProgressStream::new(
                        futures_util::stream::iter(chunks),
                        Some(length),
                        self.send_progress.clone(),
                    )
                    .boxed(),
                    length: Some(length),
                    content_type,
                }
            }
            RequestBody::Stream {
                stream,
                length,
                content_type,
            } => RequestBody::Stream {
                stream: ProgressStream::new(stream, length, self.send_progress.clone()).boxed(),
                length,
                content_type,
            },
            other => other,
        }
    }
}

impl HttpHandler for ProgressHandler {
    fn send(&self, mut request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        request.body = self.count_upload(std::mem::take(&mut request.body));
        let receive_progress = self.receive_progress.clone();

        async move {
            let response = self.inner.send(request).await?;
            Ok(response.map_body(|body| {
                let length = body.content_length();
                let counted = ProgressStream::new(body.into_stream(), length, receive_progress).boxed();
                crate::http::ResponseBody::from_stream(counted, length)
            }))
        }
        .boxed()
    }
}

impl std::fmt::Debug for ProgressHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHandler")
            .field("send_progress", &self.send_progress)
            .field("receive_progress", &self.receive_progress)
            .finish_non_exhaustive()
    }
}

pin_project! {
    /// Passes chunks through while reporting the running byte count.
    struct ProgressStream<S> {
        #[pin]
        inner: S,
        signal: Arc<Signal<TransferProgress>>,
        transferred: u64,
        total: Option<u64>,
        completed: bool,
    }
}

impl<S> ProgressStream<S> {
    fn new(inner: S, total: Option<u64>, signal: Arc<Signal<TransferProgress>>) -> Self {
        Self {
            inner,
            signal,
            transferred: 0,
            total,
            completed: false,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                if !chunk.is_empty() {
                    *this.transferred += chunk.len() as u64;
                    let progress = TransferProgress {
                        bytes_transferred: *this.transferred,
                        total_bytes: *this.total,
                    };
                    if progress.percent() == Some(100) {
                        *this.completed = true;
                    }
                    this.signal.emit(progress);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            None => {
                if !*this.completed && *this.transferred > 0 {
                    *this.completed = true;
                    this.signal.emit(TransferProgress {
                        bytes_transferred: *this.transferred,
                        total_bytes: Some(*this.transferred),
                    });
                }
                Poll::Ready(None)
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpContent, RequestHead, ResponseBody};
    use http::{Method, StatusCode};
    use parking_lot::Mutex;
    use url::Url;

    /// Drains the request body, then answers with `response` split in chunks.
    struct ChunkedHandler {
        chunks: Vec<&'static [u8]>,
        content_length: Option<u64>,
        uploaded: Mutex<Vec<u8>>,
    }

    impl HttpHandler for ChunkedHandler {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
            async move {
                let head = request.head()?;
                if let RequestBody::Stream { mut stream, .. } = request.body {
                    while let Some(chunk) = stream.next().await {
                        self.uploaded.lock().extend_from_slice(&chunk?);
                    }
                }
                let chunks: Vec<Result<Bytes>> =
                    self.chunks.iter().map(|c| Ok(Bytes::from_static(*c))).collect();
                let body = ResponseBody::from_stream(futures_util::stream::iter(chunks).boxed(), self.content_length);
                Ok(HttpResponse::new(StatusCode::OK, head, body))
            }
            .boxed()
        }
    }

    fn request(body: RequestBody) -> HttpRequest {
        let mut request = HttpRequest::with_url(Method::POST, Url::parse("http://localhost/upload").unwrap());
        request.body = body;
        request
    }

    fn record(signal: &Signal<TransferProgress>) -> Arc<Mutex<Vec<TransferProgress>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        signal.connect({
            let seen = seen.clone();
            move |progress| seen.lock().push(*progress)
        });
        seen
    }

    #[tokio::test]
    async fn test_download_with_known_length() {
        let handler = ProgressHandler::new(Arc::new(ChunkedHandler {
            chunks: vec![&b"aaaa"[..], &b"bbbb"[..], &b"cc"[..]],
            content_length: Some(10),
            uploaded: Mutex::default(),
        }));
        let seen = record(handler.receive_progress());

        let response = handler.send(request(RequestBody::Empty)).await.unwrap();
        assert_eq!(response.bytes().await.unwrap().as_ref(), b"aaaabbbbcc");

        let percents: Vec<_> = seen.lock().iter().map(|p| p.percent()).collect();
        assert_eq!(percents, vec![Some(40), Some(80), Some(100)]);
    }

    #[tokio::test]
    async fn test_download_with_unknown_length_completes_at_end() {
        let handler = ProgressHandler::new(Arc::new(ChunkedHandler {
            chunks: vec![&b"aaaa"[..], &b"bb"[..]],
            content_length: None,
            uploaded: Mutex::default(),
        }));
        let seen = record(handler.receive_progress());

        handler.send(request(RequestBody::Empty)).await.unwrap().bytes().await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].percent(), None);
        assert_eq!(seen[2].bytes_transferred, 6);
        assert_eq!(seen[2].percent(), Some(100));
    }

    #[tokio::test]
    async fn test_upload_is_chunked_and_counted() {
        let inner = Arc::new(ChunkedHandler {
            chunks: vec![],
            content_length: Some(0),
            uploaded: Mutex::default(),
        });
        let handler = ProgressHandler::new(inner.clone());
        let seen = record(handler.send_progress());

        let payload = vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 100];
        handler
            .send(request(RequestBody::Full(HttpContent::bytes(payload.clone()))))
            .await
            .unwrap();

        assert_eq!(*inner.uploaded.lock(), payload);
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().unwrap().bytes_transferred, payload.len() as u64);
        assert_eq!(seen.last().unwrap().percent(), Some(100));
    }

    #[tokio::test]
    async fn test_empty_body_reports_nothing() {
        let handler = ProgressHandler::new(Arc::new(ChunkedHandler {
            chunks: vec![],
            content_length: Some(0),
            uploaded: Mutex::default(),
        }));
        let sent = record(handler.send_progress());
        let received = record(handler.receive_progress());

        handler.send(request(RequestBody::Empty)).await.unwrap().bytes().await.unwrap();
        assert!(sent.lock().is_empty());
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_request_head_helper() {
        let head: RequestHead = request(RequestBody::Empty).head().unwrap();
        assert_eq!(head.method, Method::POST);
    }
}
