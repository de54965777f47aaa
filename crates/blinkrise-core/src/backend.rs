use std::future::Future;

use crate::{
    error::DashboardError,
    types::{CameraAction, ControlOutcome, DrowsinessSnapshot, StreamEpoch},
};

/// Remote detection backend as seen by the session controller.
///
/// Implementations map every failure into the returned value; nothing here
/// panics or retries.
pub trait DashboardBackend: Send + Sync + 'static {
    /// Send `{action}` to the camera control endpoint.
    fn camera_control(&self, action: CameraAction)
    -> impl Future<Output = ControlOutcome> + Send;

    /// Fetch the current remote drowsiness state.
    fn fetch_status(
        &self,
    ) -> impl Future<Output = Result<DrowsinessSnapshot, DashboardError>> + Send;

    /// Feed URL for a stream attempt; the epoch busts intermediary caches.
    fn video_feed_url(&self, epoch: StreamEpoch) -> String;
}
