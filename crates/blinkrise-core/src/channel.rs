use tokio::sync::broadcast;

use crate::types::DashboardEvent;

/// Broadcast event stream type used by dashboard subscribers.
pub type EventStream = broadcast::Receiver<DashboardEvent>;

/// Event fan-out shared by the controller, the viewport and their observers.
#[derive(Clone, Debug)]
pub struct DashboardChannels {
    event_tx: broadcast::Sender<DashboardEvent>,
}

impl DashboardChannels {
    /// Create a new channel with the given subscriber buffer.
    pub fn new(event_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        Self { event_tx }
    }

    /// Subscribe to emitted dashboard events.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: DashboardEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for DashboardChannels {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receive the next event, skipping over lag gaps.
///
/// Returns `None` once every sender is gone.
pub async fn recv_event(events: &mut EventStream) -> Option<DashboardEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionState;

    #[tokio::test]
    async fn fans_out_events_to_subscribers() {
        let channels = DashboardChannels::new(16);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels.emit(DashboardEvent::StateChanged {
            state: SessionState::Starting,
        });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        assert_eq!(event_a, event_b);
    }

    #[tokio::test]
    async fn recv_event_skips_lagged_gap() {
        let channels = DashboardChannels::new(1);
        let mut events = channels.subscribe();

        channels.emit(DashboardEvent::BackendErrorChanged { message: None });
        channels.emit(DashboardEvent::BackendErrorChanged {
            message: Some("latest".to_owned()),
        });

        let event = recv_event(&mut events).await.expect("latest event survives lag");
        assert_eq!(
            event,
            DashboardEvent::BackendErrorChanged {
                message: Some("latest".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn recv_event_ends_when_senders_drop() {
        let channels = DashboardChannels::new(4);
        let mut events = channels.subscribe();
        drop(channels);
        assert!(recv_event(&mut events).await.is_none());
    }
}
