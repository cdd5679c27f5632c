//! Throttled upload/download progress for a request builder.

use std::sync::{Arc, Weak};
use std::time::Duration;

use courier_core::logging::{span_names, targets};
use courier_core::{CancellationSource, CancellationToken, ConnectionId, Signal};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::Instrument;

use super::handler::ProgressHandler;
use crate::builder::{BuilderCore, HttpBuilder};
use crate::http::{HttpHandler, TransferProgress};
use crate::json::JsonCodec;

const DEFAULT_REPORT_INCREMENT: Duration = Duration::from_secs(1);

type HandlerFactory = Arc<dyn Fn() -> Arc<dyn HttpHandler> + Send + Sync>;

/// One progress notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressReport {
    /// Percentage complete, 0 to 100. Zero while the total size is unknown.
    pub percentage: u8,
    /// Bytes transferred so far.
    pub bytes: u64,
    /// Time since the first byte in this direction.
    pub elapsed: Duration,
}

/// Accumulates elapsed time between `start` and `stop`.
#[derive(Clone, Copy, Debug, Default)]
struct Stopwatch {
    started: Option<Instant>,
    accumulated: Duration,
}

impl Stopwatch {
    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started.map_or(Duration::ZERO, |started| started.elapsed())
    }
}

/// Progress of one direction. `bytes`/`percentage` are `None` until the
/// first notification and again once a 100% report has been ticked out.
#[derive(Debug, Default)]
struct DirectionState {
    bytes: Option<u64>,
    percentage: Option<u8>,
    clock: Stopwatch,
    active: bool,
    ticked: bool,
}

impl DirectionState {
    fn record(&mut self, progress: TransferProgress) -> ProgressReport {
        if self.bytes.is_none() {
            self.clock.start();
        }
        self.active = true;

        let percentage = progress.percent().unwrap_or(0);
        self.bytes = Some(progress.bytes_transferred);
        self.percentage = Some(percentage);

        ProgressReport {
            percentage,
            bytes: progress.bytes_transferred,
            elapsed: self.clock.elapsed(),
        }
    }

    fn tick(&mut self) -> Option<ProgressReport> {
        let (Some(bytes), Some(percentage)) = (self.bytes, self.percentage) else {
            return None;
        };
        self.ticked = true;

        let report = ProgressReport {
            percentage,
            bytes,
            elapsed: self.clock.elapsed(),
        };
        if percentage >= 100 {
            self.bytes = None;
            self.percentage = None;
            self.clock.stop();
        }
        Some(report)
    }

    fn is_clear(&self) -> bool {
        self.bytes.is_none() && self.percentage.is_none()
    }

    /// Nothing left to report: either idle or already ticked out.
    fn is_drained(&self) -> bool {
        self.is_clear() && (!self.active || self.ticked)
    }
}

#[derive(Debug, Default)]
struct ProgressSnapshot {
    download: DirectionState,
    upload: DirectionState,
}

impl ProgressSnapshot {
    fn is_finished(&self) -> bool {
        (self.download.active || self.upload.active)
            && self.download.is_drained()
            && self.upload.is_drained()
    }
}

struct Settings {
    handler_factory: Option<HandlerFactory>,
    report_increment: Duration,
}

/// Resources that live from `starting` to `finished`.
struct Session {
    loop_cancel: CancellationSource,
    handler: Arc<ProgressHandler>,
    finished_slot: ConnectionId,
}

struct TrackerInner {
    builder: Weak<BuilderCore>,
    settings: Mutex<Settings>,
    snapshot: Mutex<ProgressSnapshot>,
    session: Mutex<Option<Session>>,
    download: Signal<ProgressReport>,
    download_timer: Signal<ProgressReport>,
    upload: Signal<ProgressReport>,
    upload_timer: Signal<ProgressReport>,
}

/// Reports upload and download progress of the request a builder executes.
///
/// Attach one with [`HttpBuilder::progress_tracking`]. When the request
/// starts, the tracker swaps in a client whose handler counts bytes, and
/// starts a background loop:
///
/// - `download` / `upload` fire on every chunk
/// - `download_timer` / `upload_timer` fire once per report increment
///   (default one second) with the latest figures, until a 100% report has
///   gone out
///
/// Everything is torn down when the request finishes.
///
/// ```ignore
/// let file: Option<Bytes> = HttpBuilder::new(factory)
///     .uri("https://example.com/large.bin")?
///     .progress_tracking(|tracker| {
///         tracker
///             .report_increment(Duration::from_millis(250))
///             .on_download_timer(|report| println!("{}% ({} bytes)", report.percentage, report.bytes));
///     })
///     .result_as()
///     .await?;
/// ```
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
}

impl ProgressTracker {
    /// Attach a tracker to `builder`.
    ///
    /// The tracker only hooks the builder's `starting` event; nothing else
    /// changes until the request executes. The builder keeps the tracker
    /// alive, so the returned handle may be dropped.
    pub fn attach<J: JsonCodec>(builder: &HttpBuilder<J>) -> Self {
        let inner = Arc::new(TrackerInner {
            builder: Arc::downgrade(&builder.core),
            settings: Mutex::new(Settings {
                handler_factory: None,
                report_increment: DEFAULT_REPORT_INCREMENT,
            }),
            snapshot: Mutex::new(ProgressSnapshot::default()),
            session: Mutex::new(None),
            download: Signal::new(),
            download_timer: Signal::new(),
            upload: Signal::new(),
            upload_timer: Signal::new(),
        });

        // The builder owns the tracker from here on; `inner` only holds a
        // weak reference back to the builder.
        let owned = inner.clone();
        builder.core.events.starting.connect(move |_| owned.start());

        Self { inner }
    }

    /// Use handlers from `factory` as the base transport instead of the
    /// builder factory's default client handler.
    pub fn handler_factory<F>(&self, factory: F) -> &Self
    where
        F: Fn() -> Arc<dyn HttpHandler> + Send + Sync + 'static,
    {
        self.inner.settings.lock().handler_factory = Some(Arc::new(factory));
        self
    }

    /// Set how often the timer events fire.
    pub fn report_increment(&self, increment: Duration) -> &Self {
        self.inner.settings.lock().report_increment = increment;
        self
    }

    /// Set how often the timer events fire, in whole seconds.
    pub fn report_increment_secs(&self, seconds: u64) -> &Self {
        self.report_increment(Duration::from_secs(seconds))
    }

    /// Subscribe to per-chunk download progress.
    pub fn on_download(&self, slot: impl Fn(&ProgressReport) + Send + Sync + 'static) -> &Self {
        self.inner.download.connect(slot);
        self
    }

    /// Subscribe to throttled download progress.
    pub fn on_download_timer(&self, slot: impl Fn(&ProgressReport) + Send + Sync + 'static) -> &Self {
        self.inner.download_timer.connect(slot);
        self
    }

    /// Subscribe to per-chunk upload progress.
    pub fn on_upload(&self, slot: impl Fn(&ProgressReport) + Send + Sync + 'static) -> &Self {
        self.inner.upload.connect(slot);
        self
    }

    /// Subscribe to throttled upload progress.
    pub fn on_upload_timer(&self, slot: impl Fn(&ProgressReport) + Send + Sync + 'static) -> &Self {
        self.inner.upload_timer.connect(slot);
        self
    }

    /// Per-chunk download progress.
    pub fn download(&self) -> &Signal<ProgressReport> {
        &self.inner.download
    }

    /// Throttled download progress.
    pub fn download_timer(&self) -> &Signal<ProgressReport> {
        &self.inner.download_timer
    }

    /// Per-chunk upload progress.
    pub fn upload(&self) -> &Signal<ProgressReport> {
        &self.inner.upload
    }

    /// Throttled upload progress.
    pub fn upload_timer(&self) -> &Signal<ProgressReport> {
        &self.inner.upload_timer
    }

    /// The reporting interval.
    pub fn increment(&self) -> Duration {
        self.inner.settings.lock().report_increment
    }

    /// Whether a request is currently being tracked.
    pub fn is_active(&self) -> bool {
        self.inner.session.lock().is_some()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("increment", &self.increment())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl TrackerInner {
    /// Idle to active, on the builder's `starting` event.
    fn start(self: &Arc<Self>) {
        let Some(core) = self.builder.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(target: targets::PROGRESS, "no tokio runtime, progress tracking disabled");
            return;
        };

        // A session left over from an execution that never finished.
        self.teardown();
        *self.snapshot.lock() = ProgressSnapshot::default();

        let (handler_factory, increment) = {
            let settings = self.settings.lock();
            (settings.handler_factory.clone(), settings.report_increment)
        };

        let base_client = core.factory.create_client();
        let base_handler = match handler_factory {
            Some(factory) => factory(),
            None => base_client.handler().clone(),
        };
        let handler = Arc::new(ProgressHandler::new(base_handler));

        let weak = Arc::downgrade(self);
        handler.receive_progress().connect(move |progress| {
            if let Some(inner) = weak.upgrade() {
                inner.on_receive(*progress);
            }
        });
        let weak = Arc::downgrade(self);
        handler.send_progress().connect(move |progress| {
            if let Some(inner) = weak.upgrade() {
                inner.on_send(*progress);
            }
        });

        core.set_client(base_client.with_handler(handler.clone()));

        let loop_cancel = CancellationSource::new();
        runtime.spawn(
            report_loop(Arc::downgrade(self), loop_cancel.token(), increment)
                .instrument(tracing::debug_span!(target: targets::PROGRESS, span_names::PROGRESS_LOOP)),
        );

        let weak = Arc::downgrade(self);
        let finished_slot = core.events.finished.connect(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.teardown();
            }
        });

        *self.session.lock() = Some(Session {
            loop_cancel,
            handler,
            finished_slot,
        });
        tracing::debug!(target: targets::PROGRESS, ?increment, "progress tracking started");
    }

    /// Active to idle. A second call is a no-op.
    fn teardown(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        session.loop_cancel.cancel();
        if let Some(core) = self.builder.upgrade() {
            core.events.finished.disconnect(session.finished_slot);
        }
        session.handler.receive_progress().disconnect_all();
        session.handler.send_progress().disconnect_all();
        tracing::debug!(target: targets::PROGRESS, "progress tracking stopped");
    }

    fn on_receive(&self, progress: TransferProgress) {
        let report = self.snapshot.lock().download.record(progress);
        self.download.emit(report);
    }

    fn on_send(&self, progress: TransferProgress) {
        let report = self.snapshot.lock().upload.record(progress);
        self.upload.emit(report);
    }

    /// Emit the timer events for one tick. Returns `true` once everything
    /// that was observed has been reported.
    fn tick(&self) -> bool {
        let (download, upload, finished) = {
            let mut snapshot = self.snapshot.lock();
            let download = snapshot.download.tick();
            let upload = snapshot.upload.tick();
            (download, upload, snapshot.is_finished())
        };

        if let Some(report) = download {
            self.download_timer.emit(report);
        }
        if let Some(report) = upload {
            self.upload_timer.emit(report);
        }
        finished
    }
}

async fn report_loop(inner: Weak<TrackerInner>, cancel: CancellationToken, increment: Duration) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(increment) => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.tick() {
            tracing::trace!(target: targets::PROGRESS, "all progress reported");
            break;
        }
    }
}

impl<J: JsonCodec> HttpBuilder<J> {
    /// Track upload and download progress of this request.
    ///
    /// `configure` receives the tracker to set the interval, base handler and
    /// subscribe to its events.
    pub fn progress_tracking(self, configure: impl FnOnce(&ProgressTracker)) -> Self {
        let tracker = ProgressTracker::attach(&self);
        configure(&tracker);
        self
    }
}
