//! Stream viewport: per-epoch load/error/timeout race for the video feed.

use std::{
    future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    channel::DashboardChannels,
    types::{DashboardEvent, StreamEpoch, StreamOutcome},
};

/// Image consumer for the continuous frame stream.
///
/// The viewport never inspects stream content; it only observes the signals
/// returned by [`FrameSink::open`].
pub trait FrameSink: Send + Sync {
    /// Start consuming `url` for attempt `epoch`, replacing any previous feed.
    fn open(&self, url: &str, epoch: StreamEpoch) -> FrameSignals;

    /// Stop consuming the current feed, if any.
    fn close(&self);
}

/// Observer half of one stream attempt's signals.
#[derive(Debug)]
pub struct FrameSignals {
    loaded: oneshot::Receiver<()>,
    errored: oneshot::Receiver<String>,
}

/// Producer half handed to the frame sink. Each signal fires at most once.
#[derive(Debug)]
pub struct FrameSignalSender {
    loaded: Option<oneshot::Sender<()>>,
    errored: Option<oneshot::Sender<String>>,
}

impl FrameSignalSender {
    pub fn loaded(&mut self) {
        if let Some(tx) = self.loaded.take() {
            let _ = tx.send(());
        }
    }

    pub fn errored(&mut self, message: impl Into<String>) {
        if let Some(tx) = self.errored.take() {
            let _ = tx.send(message.into());
        }
    }
}

/// Create a linked signal pair for one stream attempt.
pub fn frame_signals() -> (FrameSignalSender, FrameSignals) {
    let (loaded_tx, loaded_rx) = oneshot::channel();
    let (errored_tx, errored_rx) = oneshot::channel();
    (
        FrameSignalSender {
            loaded: Some(loaded_tx),
            errored: Some(errored_tx),
        },
        FrameSignals {
            loaded: loaded_rx,
            errored: errored_rx,
        },
    )
}

#[derive(Debug, Default)]
struct ViewportInner {
    epoch: Option<StreamEpoch>,
    loading: bool,
    outcome: Option<StreamOutcome>,
    race: Option<CancellationToken>,
}

/// Loading-state owner for the current stream attempt.
#[derive(Debug, Clone)]
pub struct StreamViewport {
    inner: Arc<Mutex<ViewportInner>>,
    load_timeout: Duration,
    channels: DashboardChannels,
}

impl StreamViewport {
    pub fn new(load_timeout: Duration, channels: DashboardChannels) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewportInner::default())),
            load_timeout,
            channels,
        }
    }

    /// Arm the race for a new epoch: loaded, errored or the load timer, first wins.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self, epoch: StreamEpoch, signals: FrameSignals) {
        let race = CancellationToken::new();
        {
            let mut inner = lock(&self.inner);
            if let Some(previous) = inner.race.take() {
                previous.cancel();
            }
            inner.epoch = Some(epoch);
            inner.loading = true;
            inner.outcome = None;
            inner.race = Some(race.clone());
            self.channels.emit(DashboardEvent::StreamLoadingChanged {
                epoch,
                loading: true,
            });
        }
        debug!(%epoch, timeout_ms = self.load_timeout.as_millis() as u64, "stream load race armed");

        let inner = Arc::clone(&self.inner);
        let channels = self.channels.clone();
        let load_timeout = self.load_timeout;
        tokio::spawn(async move {
            let FrameSignals { loaded, errored } = signals;
            let outcome = tokio::select! {
                biased;
                _ = race.cancelled() => {
                    debug!(%epoch, "stream load race cancelled");
                    return;
                }
                () = first_signal(loaded) => StreamOutcome::Loaded,
                message = first_signal(errored) => StreamOutcome::Errored(message),
                _ = tokio::time::sleep(load_timeout) => StreamOutcome::TimedOut,
            };
            resolve(&inner, &channels, epoch, outcome);
        });
    }

    /// Force loading off and cancel the pending race, whatever its state.
    pub fn halt(&self) {
        let mut inner = lock(&self.inner);
        if let Some(race) = inner.race.take() {
            race.cancel();
        }
        let was_loading = std::mem::replace(&mut inner.loading, false);
        if let Some(epoch) = inner.epoch.take()
            && was_loading
        {
            debug!(%epoch, "stream halted while loading");
            self.channels.emit(DashboardEvent::StreamLoadingChanged {
                epoch,
                loading: false,
            });
        }
    }

    /// Halt and forget the last outcome.
    pub fn reset(&self) {
        self.halt();
        lock(&self.inner).outcome = None;
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).loading
    }

    pub fn current_epoch(&self) -> Option<StreamEpoch> {
        lock(&self.inner).epoch
    }

    pub fn outcome(&self) -> Option<StreamOutcome> {
        lock(&self.inner).outcome.clone()
    }
}

async fn first_signal<T>(rx: oneshot::Receiver<T>) -> T {
    match rx.await {
        Ok(value) => value,
        // Sender dropped without firing: this observer never fires.
        Err(_) => future::pending().await,
    }
}

fn resolve(
    inner: &Mutex<ViewportInner>,
    channels: &DashboardChannels,
    epoch: StreamEpoch,
    outcome: StreamOutcome,
) {
    let mut inner = lock(inner);
    if inner.epoch != Some(epoch) || inner.outcome.is_some() || !inner.loading {
        debug!(%epoch, ?outcome, "ignoring stale stream resolution");
        return;
    }

    match &outcome {
        StreamOutcome::Loaded => info!(%epoch, "video stream loaded"),
        StreamOutcome::Errored(message) => warn!(%epoch, error = %message, "video stream error"),
        StreamOutcome::TimedOut => info!(%epoch, "stream load timeout reached; clearing loading"),
    }

    inner.loading = false;
    inner.race = None;
    inner.outcome = Some(outcome.clone());
    channels.emit(DashboardEvent::StreamLoadingChanged {
        epoch,
        loading: false,
    });
    channels.emit(DashboardEvent::StreamResolved { epoch, outcome });
}

fn lock(inner: &Mutex<ViewportInner>) -> MutexGuard<'_, ViewportInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
