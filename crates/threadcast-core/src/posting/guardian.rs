//! Session guardian: periodic authorization and target checks.
//!
//! Runs as a background task next to the orchestrator. Every license tick
//! it re-validates authorization (independently of whether a run exists)
//! and force-stops an active run if the license is no longer valid. Every
//! target tick it probes the active run's target and aborts the run if the
//! surface is gone.

use std::time::Duration;

use threadcast_types::config::GuardianConfig;
use threadcast_types::event::PostingEvent;
use threadcast_types::license::LicenseStatus;
use threadcast_types::run::StopReason;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::orchestrator::PostingOrchestrator;
use super::target::TargetAdapter;
use crate::license::Authorizer;
use crate::storage::kv_store::KvStore;

/// Check intervals.
#[derive(Debug, Clone, Copy)]
pub struct GuardianSettings {
    pub license_interval: Duration,
    pub target_interval: Duration,
}

impl Default for GuardianSettings {
    fn default() -> Self {
        Self::from(&GuardianConfig::default())
    }
}

impl From<&GuardianConfig> for GuardianSettings {
    fn from(config: &GuardianConfig) -> Self {
        Self {
            license_interval: Duration::from_secs(config.license_check_interval_secs.max(1)),
            target_interval: Duration::from_secs(config.target_probe_interval_secs.max(1)),
        }
    }
}

pub struct SessionGuardian<K: KvStore, A: TargetAdapter, Z: Authorizer> {
    orchestrator: PostingOrchestrator<K, A, Z>,
    settings: GuardianSettings,
}

impl<K, A, Z> SessionGuardian<K, A, Z>
where
    K: KvStore + 'static,
    A: TargetAdapter + 'static,
    Z: Authorizer + 'static,
{
    pub fn new(orchestrator: PostingOrchestrator<K, A, Z>, settings: GuardianSettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    /// Run both checks on their intervals until `shutdown` fires.
    ///
    /// The first license check happens one full interval after spawn;
    /// callers validate up front when they need an immediate answer.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Instant::now();
            let mut license_tick =
                tokio::time::interval_at(now + self.settings.license_interval, self.settings.license_interval);
            let mut target_tick =
                tokio::time::interval_at(now + self.settings.target_interval, self.settings.target_interval);
            license_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            target_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                license_interval_secs = self.settings.license_interval.as_secs(),
                target_interval_secs = self.settings.target_interval.as_secs(),
                "session guardian started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = license_tick.tick() => {
                        self.check_authorization().await;
                    }
                    _ = target_tick.tick() => {
                        self.check_target().await;
                    }
                }
            }

            tracing::info!("session guardian stopped");
        })
    }

    /// Re-validate the license; stop the active run if it is not valid.
    pub async fn check_authorization(&self) -> LicenseStatus {
        let status = self.orchestrator.authorizer().validate().await;
        let LicenseStatus::Invalid { reason } = &status else {
            tracing::debug!(?status, "periodic license check passed");
            return status;
        };

        tracing::warn!(%reason, "license no longer valid");
        let stopped = self
            .orchestrator
            .stop_with_reason(StopReason::AuthorizationLost)
            .await
            .ok();
        self.orchestrator
            .events()
            .publish(PostingEvent::AuthorizationLost {
                run_id: stopped.map(|accepted| accepted.run_id),
                reason: reason.clone(),
            });
        status
    }

    /// Probe the active run's target. Returns whether an abort was issued.
    pub async fn check_target(&self) -> bool {
        self.orchestrator.verify_target().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use threadcast_types::run::{DelayWindow, RunSummary, TargetHandle};
    use tokio::sync::broadcast;

    use super::*;
    use crate::event::bus::EventBus;
    use crate::posting::orchestrator::OrchestratorSettings;
    use crate::storage::memory::MemoryKvStore;
    use crate::testing::{FixedDelay, MockAdapter, StaticAuthorizer, payloads};

    type TestGuardian = SessionGuardian<MemoryKvStore, MockAdapter, StaticAuthorizer>;

    fn setup(delay: Duration) -> (TestGuardian, MockAdapter, Arc<StaticAuthorizer>, EventBus) {
        let adapter = MockAdapter::new();
        let authorizer = Arc::new(StaticAuthorizer::valid());
        let bus = EventBus::new(1024);
        let orchestrator = PostingOrchestrator::new(
            MemoryKvStore::new(),
            adapter.clone(),
            Arc::clone(&authorizer),
            Arc::new(FixedDelay(delay)),
            bus.clone(),
            OrchestratorSettings::default(),
        );
        let guardian = SessionGuardian::new(orchestrator, GuardianSettings::default());
        (guardian, adapter, authorizer, bus)
    }

    async fn next_summary(events: &mut broadcast::Receiver<PostingEvent>) -> RunSummary {
        loop {
            match events.recv().await {
                Ok(PostingEvent::Completed(summary)) => return summary,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    }

    async fn start(guardian: &TestGuardian) {
        guardian
            .orchestrator
            .start(
                payloads(&["a", "b", "c"]),
                DelayWindow::new(1_000, 2_000),
                TargetHandle::new("tab-1"),
            )
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_license_stops_active_run() {
        let (guardian, adapter, authorizer, bus) = setup(Duration::from_secs(600));
        let mut events = bus.subscribe();
        start(&guardian).await;

        authorizer.set_status(LicenseStatus::invalid("expired"));
        let status = guardian.check_authorization().await;
        assert!(!status.is_valid());

        let mut seen = Vec::new();
        let summary = loop {
            match events.recv().await.unwrap() {
                PostingEvent::Completed(summary) => break summary,
                event => seen.push(event),
            }
        };
        seen.extend(std::iter::from_fn(|| events.try_recv().ok()));
        let notice = seen
            .into_iter()
            .find(|event| matches!(event, PostingEvent::AuthorizationLost { .. }));
        match notice {
            Some(PostingEvent::AuthorizationLost { run_id, reason }) => {
                assert_eq!(run_id, Some(summary.run_id));
                assert_eq!(reason, "expired");
            }
            other => panic!("expected authorization notice, got {other:?}"),
        }
        assert_eq!(summary.reason, Some(StopReason::AuthorizationLost));
        assert!(adapter.submitted_ids().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_license_without_run_only_notifies() {
        let (guardian, _adapter, authorizer, bus) = setup(Duration::from_secs(1));
        let mut events = bus.subscribe();

        authorizer.set_status(LicenseStatus::invalid("revoked"));
        guardian.check_authorization().await;

        match events.try_recv().unwrap() {
            PostingEvent::AuthorizationLost { run_id, .. } => assert!(run_id.is_none()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_license_is_quiet() {
        let (guardian, _adapter, _authorizer, bus) = setup(Duration::from_secs(1));
        let mut events = bus.subscribe();
        assert!(guardian.check_authorization().await.is_valid());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_target_aborts_run() {
        let (guardian, adapter, _authorizer, bus) = setup(Duration::from_secs(600));
        let mut events = bus.subscribe();
        start(&guardian).await;

        assert!(!guardian.check_target().await);
        adapter.kill_target();
        assert!(guardian.check_target().await);

        let summary = next_summary(&mut events).await;
        assert_eq!(summary.reason, Some(StopReason::TargetLost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_guardian_checks_on_interval() {
        let (guardian, _adapter, authorizer, bus) = setup(Duration::from_secs(7_200));
        let mut events = bus.subscribe();
        start(&guardian).await;
        let validations_before = authorizer.validations();

        let shutdown = CancellationToken::new();
        let handle = guardian.spawn(shutdown.clone());

        authorizer.set_status(LicenseStatus::invalid("expired"));
        tokio::time::sleep(Duration::from_secs(3_601)).await;

        let summary = next_summary(&mut events).await;
        assert_eq!(summary.reason, Some(StopReason::AuthorizationLost));
        assert!(authorizer.validations() > validations_before);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
