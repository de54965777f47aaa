//! HTTP adapter for the BlinkRise detection backend.
//!
//! Implements [`DashboardBackend`] (camera control and status polling) and
//! [`FrameSink`] (MJPEG feed consumer) on top of `reqwest`.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use blinkrise_core::{
    CameraAction, ControlOutcome, DashboardBackend, DashboardError, DashboardErrorKind,
    DrowsinessSnapshot, FrameSignalSender, FrameSignals, FrameSink, StreamEpoch, frame_signals,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const STATUS_PATH: &str = "drowsiness_status";
const CONTROL_PATH: &str = "camera_control";
const VIDEO_FEED_PATH: &str = "video_feed";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const UNKNOWN_BACKEND_ERROR: &str = "Unknown error from backend";

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self::new(
            "http://127.0.0.1:5000",
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }
}

#[derive(Debug, Serialize)]
struct ControlRequest {
    action: CameraAction,
}

#[derive(Debug, Deserialize)]
struct ControlResponse {
    message: Option<String>,
}

/// `reqwest` client for the detection backend's JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpDashboardBackend {
    client: Client,
    status_url: Url,
    control_url: Url,
    video_feed_url: Url,
}

impl HttpDashboardBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, DashboardError> {
        let base = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| DashboardError::transport("client_build_failed", err.to_string()))?;

        info!(base_url = %base, timeout_ms = config.request_timeout.as_millis() as u64, "http backend configured");
        Ok(Self {
            client,
            status_url: endpoint(&base, STATUS_PATH)?,
            control_url: endpoint(&base, CONTROL_PATH)?,
            video_feed_url: endpoint(&base, VIDEO_FEED_PATH)?,
        })
    }
}

impl DashboardBackend for HttpDashboardBackend {
    async fn camera_control(&self, action: CameraAction) -> ControlOutcome {
        debug!(action = action.as_str(), url = %self.control_url, "sending camera control");
        let response = match self
            .client
            .post(self.control_url.clone())
            .json(&ControlRequest { action })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let mapped = map_reqwest_error(err);
                warn!(action = action.as_str(), error = %mapped, "camera control request failed");
                return ControlOutcome::Error {
                    message: mapped.message,
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return ControlOutcome::Error {
                    message: map_reqwest_error(err).message,
                };
            }
        };

        let outcome = control_outcome(status, &body);
        match &outcome {
            ControlOutcome::Success { message } => {
                info!(action = action.as_str(), %message, "camera control succeeded")
            }
            other => warn!(action = action.as_str(), status = status.as_u16(), outcome = ?other, "camera control rejected"),
        }
        outcome
    }

    async fn fetch_status(&self) -> Result<DrowsinessSnapshot, DashboardError> {
        let response = self
            .client
            .get(self.status_url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::http_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice::<DrowsinessSnapshot>(&bytes).map_err(|err| {
            DashboardError::transport("decode_failed", format!("invalid status payload: {err}"))
        })
    }

    fn video_feed_url(&self, epoch: StreamEpoch) -> String {
        let mut url = self.video_feed_url.clone();
        url.query_pairs_mut()
            .append_pair("key", &epoch.value().to_string());
        url.into()
    }
}

#[derive(Debug)]
struct ActiveFeed {
    epoch: StreamEpoch,
    stop: CancellationToken,
}

/// Consumes the multipart JPEG feed and reports load/error signals.
///
/// Loaded fires on the first body chunk; stream content is never parsed.
#[derive(Debug)]
pub struct HttpFrameSink {
    client: Client,
    active: Mutex<Option<ActiveFeed>>,
    received_bytes: Arc<AtomicU64>,
}

impl HttpFrameSink {
    /// The feed is unbounded, so only connecting is subject to a timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, DashboardError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| DashboardError::transport("client_build_failed", err.to_string()))?;
        Ok(Self {
            client,
            active: Mutex::new(None),
            received_bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Total feed bytes received across all attempts.
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveFeed>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSink for HttpFrameSink {
    /// Must be called from within a tokio runtime.
    fn open(&self, url: &str, epoch: StreamEpoch) -> FrameSignals {
        let (mut sender, signals) = frame_signals();
        let stop = CancellationToken::new();
        if let Some(previous) = self.active().replace(ActiveFeed {
            epoch,
            stop: stop.clone(),
        }) {
            debug!(epoch = %previous.epoch, "replacing video feed");
            previous.stop.cancel();
        }

        let request = self.client.get(url);
        let received_bytes = Arc::clone(&self.received_bytes);
        debug!(%epoch, %url, "opening video feed");
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stop.cancelled() => debug!(%epoch, "video feed closed"),
                () = consume_feed(request, &mut sender, &received_bytes, epoch) => {}
            }
        });
        signals
    }

    fn close(&self) {
        if let Some(active) = self.active().take() {
            active.stop.cancel();
        }
    }
}

async fn consume_feed(
    request: RequestBuilder,
    signals: &mut FrameSignalSender,
    received_bytes: &AtomicU64,
    epoch: StreamEpoch,
) {
    let mut response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            signals.errored(map_reqwest_error(err).message);
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        signals.errored(format!("video feed returned {status}"));
        return;
    }

    let mut first_chunk = true;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                received_bytes.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                if first_chunk {
                    first_chunk = false;
                    signals.loaded();
                }
            }
            Ok(None) => {
                if first_chunk {
                    signals.errored("video feed ended before the first frame");
                } else {
                    debug!(%epoch, "video feed ended");
                }
                return;
            }
            Err(err) => {
                signals.errored(map_reqwest_error(err).message);
                return;
            }
        }
    }
}

fn control_outcome(status: StatusCode, body: &str) -> ControlOutcome {
    let parsed = serde_json::from_str::<ControlResponse>(body);
    if status.is_success() {
        match parsed {
            Ok(response) => ControlOutcome::Success {
                message: response.message.unwrap_or_default(),
            },
            Err(err) => ControlOutcome::Error {
                message: format!("invalid camera control response: {err}"),
            },
        }
    } else {
        ControlOutcome::Failed {
            message: parsed
                .ok()
                .and_then(|response| response.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_BACKEND_ERROR.to_owned()),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, DashboardError> {
    let mut url = Url::parse(raw.trim()).map_err(|err| {
        DashboardError::new(
            DashboardErrorKind::Internal,
            "invalid_base_url",
            format!("invalid backend base url '{raw}': {err}"),
        )
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(base: &Url, path: &str) -> Result<Url, DashboardError> {
    base.join(path).map_err(|err| {
        DashboardError::new(
            DashboardErrorKind::Internal,
            "invalid_base_url",
            format!("cannot build '{path}' endpoint from {base}: {err}"),
        )
    })
}

fn map_reqwest_error(err: reqwest::Error) -> DashboardError {
    let code = if err.is_timeout() {
        "request_timeout"
    } else if err.is_connect() {
        "connect_failed"
    } else if err.is_decode() {
        "decode_failed"
    } else {
        "request_failed"
    };
    DashboardError::transport(code, err.to_string())
}
