//! Broadcast bus carrying `PostingEvent`s from the advance loop and the
//! session guardian to any number of observers (progress bar, WebSocket
//! clients).
//!
//! Observers that fall more than the channel capacity behind receive
//! `RecvError::Lagged` and should keep reading; the next progress tick
//! carries the full counters again.

use threadcast_types::event::PostingEvent;
use tokio::sync::broadcast;

/// Progress ticks arrive about once per second, so 256 slots leave slow
/// observers several minutes of slack.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PostingEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PostingEvent> {
        self.sender.subscribe()
    }

    /// Fan `event` out to current observers; returns how many received it.
    ///
    /// Nobody listening is not an error: a headless `serve` may run with no
    /// WebSocket clients attached.
    pub fn publish(&self, event: PostingEvent) -> usize {
        if let PostingEvent::Completed(summary) = &event {
            tracing::debug!(
                run_id = %summary.run_id,
                observers = self.sender.receiver_count(),
                "broadcasting run completion"
            );
        }
        self.sender.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::testing::sample_summary;

    fn tick(run_id: Uuid, posted: usize) -> PostingEvent {
        PostingEvent::Progress {
            run_id,
            posted,
            failed: 0,
            remaining: 10 - posted,
            total: 10,
            next_post_in: 1,
            message: "Waiting to post next thread…".to_string(),
        }
    }

    #[tokio::test]
    async fn every_observer_sees_events_in_publish_order() {
        let bus = EventBus::new(16);
        let mut progress_bar = bus.subscribe();
        let mut websocket = bus.subscribe();
        let run_id = Uuid::now_v7();

        assert_eq!(bus.publish(tick(run_id, 1)), 2);
        assert_eq!(bus.publish(tick(run_id, 2)), 2);

        for rx in [&mut progress_bar, &mut websocket] {
            for expected in [1, 2] {
                match rx.recv().await.unwrap() {
                    PostingEvent::Progress { posted, .. } => assert_eq!(posted, expected),
                    other => panic!("unexpected event: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn publishing_without_observers_reports_zero() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(tick(Uuid::now_v7(), 0)), 0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(16);
        let run_id = Uuid::now_v7();
        bus.publish(tick(run_id, 1));

        let mut rx = bus.subscribe();
        bus.publish(PostingEvent::completed(sample_summary()));

        assert!(matches!(rx.recv().await.unwrap(), PostingEvent::Completed(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_observer_lags_then_catches_up() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let run_id = Uuid::now_v7();

        for posted in 0..10 {
            bus.publish(tick(run_id, posted));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        match rx.recv().await.unwrap() {
            PostingEvent::Progress { posted, .. } => assert_eq!(posted, 6),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn clones_share_one_channel() {
        let bus = EventBus::new(16);
        let guardian_side = bus.clone();
        let mut rx = bus.subscribe();

        guardian_side.publish(PostingEvent::AuthorizationLost {
            run_id: None,
            reason: "expired".into(),
        });

        assert!(rx.try_recv().is_ok());
        assert_eq!(guardian_side.receiver_count(), 1);
    }
}
