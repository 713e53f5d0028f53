//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The orchestrator and license service are generic over their ports; AppState
//! pins them to the SQLite store, the HTTP bridge and the HTTP license server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use threadcast_core::event::bus::EventBus;
use threadcast_core::license::service::{LicensePolicy, LicenseService};
use threadcast_core::posting::checkpoint::RunCheckpoint;
use threadcast_core::posting::delay::JitteredDelay;
use threadcast_core::posting::guardian::{GuardianSettings, SessionGuardian};
use threadcast_core::posting::orchestrator::{OrchestratorSettings, PostingOrchestrator};
use threadcast_infra::config::{load_global_config, validate_config};
use threadcast_infra::crypto::hash::Sha256ContentHasher;
use threadcast_infra::filesystem::{database_path, ensure_data_dir, resolve_data_dir};
use threadcast_infra::license::http::HttpLicenseVerifier;
use threadcast_infra::sqlite::kv::SqliteKvStore;
use threadcast_infra::sqlite::pool::DatabasePool;
use threadcast_infra::target::bridge::BridgeTargetAdapter;
use threadcast_types::config::GlobalConfig;
use threadcast_types::run::{DelayWindow, PostingRun};

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteStore = Arc<SqliteKvStore>;

pub type ConcreteLicenseService = LicenseService<ConcreteStore, HttpLicenseVerifier>;

pub type ConcreteOrchestrator =
    PostingOrchestrator<ConcreteStore, BridgeTargetAdapter, ConcreteLicenseService>;

pub type ConcreteGuardian =
    SessionGuardian<ConcreteStore, BridgeTargetAdapter, ConcreteLicenseService>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ConcreteOrchestrator,
    pub license_service: Arc<ConcreteLicenseService>,
    pub store: ConcreteStore,
    pub config: Arc<GlobalConfig>,
    pub hasher: Sha256ContentHasher,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: resolve the data dir, load config,
    /// connect to the DB and wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        Self::build(data_dir, config).await
    }

    /// Wire services for an explicit data dir and config.
    pub async fn build(data_dir: PathBuf, config: GlobalConfig) -> anyhow::Result<Self> {
        validate_config(&config).context("invalid configuration")?;

        let db_path = database_path(&data_dir);
        let db_pool = DatabasePool::open(&db_path)
            .await
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        let store = Arc::new(SqliteKvStore::new(db_pool.clone()));

        let verifier = HttpLicenseVerifier::from_config(&config.license)?;
        let license_service = Arc::new(LicenseService::new(
            Arc::clone(&store),
            verifier,
            LicensePolicy::from(&config.license),
        ));

        let adapter = BridgeTargetAdapter::from_config(&config.bridge, config.posting.attempt_timeout())?;
        let orchestrator = PostingOrchestrator::new(
            Arc::clone(&store),
            adapter,
            Arc::clone(&license_service),
            Arc::new(JitteredDelay::default()),
            EventBus::default(),
            OrchestratorSettings::from(&config.posting),
        );

        tracing::debug!(data_dir = %data_dir.display(), bridge = %config.bridge.base_url, "application state ready");

        Ok(Self {
            orchestrator,
            license_service,
            store,
            config: Arc::new(config),
            hasher: Sha256ContentHasher::new(),
            data_dir,
            db_pool,
        })
    }

    /// A session guardian watching this state's orchestrator.
    pub fn guardian(&self) -> ConcreteGuardian {
        SessionGuardian::new(
            self.orchestrator.clone(),
            GuardianSettings::from(&self.config.guardian),
        )
    }

    /// Delay window from optional overrides, falling back to config defaults.
    pub fn delay_window(&self, min_ms: Option<u64>, max_ms: Option<u64>) -> DelayWindow {
        DelayWindow::new(
            min_ms.unwrap_or(self.config.posting.min_delay_ms),
            max_ms.unwrap_or(self.config.posting.max_delay_ms),
        )
    }

    /// The run persisted by a previous process, if any.
    pub async fn persisted_run(&self) -> anyhow::Result<Option<PostingRun>> {
        RunCheckpoint::new(Arc::clone(&self.store))
            .load()
            .await
            .context("failed to read run checkpoint")
    }
}
