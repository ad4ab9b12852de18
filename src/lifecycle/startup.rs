//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, lock client and collaborators from configuration
//! - Start supervised background tasks (signals, health, metrics)
//! - Run leader election until the root token is cancelled
//! - Wait for every supervised task before reporting how the run ended
//!
//! # Design Decisions
//! - Fail fast: any setup error is fatal
//! - Fatal errors inside an episode are recorded on [`Shutdown`] and turn
//!   into exit code 1 once everything has stopped
//! - Listeners bind before election starts, so a bad address never costs a
//!   leadership episode

use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{OperatorConfig, StoreKind};
use crate::controller::{ControlLoop, Controller, ControllerManager, DefaultsDriftController};
use crate::coordination::{CoordinationStore, FileStore, InMemoryStore, LeaseLock, LockKey, StoreError};
use crate::defaults::{DefaultsPopulator, DirectoryDefaults};
use crate::http::{health, HttpServer};
use crate::leader::{LeaderCallbacks, LeaderElector, LeaderTiming, TimingError};
use crate::lifecycle::identity::{Identity, IdentityError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::supervisor::TaskSupervisor;
use crate::net::{load_tls_config, TlsError};
use crate::observability::metrics;
use crate::sequencer::{EpisodeOutcome, SubsystemSequencer};
use crate::status::{
    ClusterStatusReporter, FileStatusSink, NoOpReporter, RelatedObject, StatusReporter,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("invalid leader election timing: {0}")]
    Timing(#[from] TimingError),

    #[error("failed to open coordination store: {0}")]
    Store(#[from] StoreError),

    #[error("file store selected but no lock directory configured")]
    MissingLockDir,

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Leadership episodes started during the run.
    pub episodes: u64,
    /// First fatal error recorded, if any.
    pub fatal: Option<String>,
}

impl RunSummary {
    pub fn exit_code(&self) -> u8 {
        u8::from(self.fatal.is_some())
    }
}

/// The subsystems a leadership episode starts.
#[derive(Clone)]
pub struct Collaborators {
    pub reporter: Arc<dyn StatusReporter>,
    pub defaults: Arc<dyn DefaultsPopulator>,
    pub control_loop: Arc<dyn ControlLoop>,
}

impl Collaborators {
    pub fn from_config(config: &OperatorConfig, identity: &Identity) -> Self {
        let reporter: Arc<dyn StatusReporter> = if config.status.cluster_operator_name.is_empty() {
            tracing::info!("No cluster operator name configured, status reporting disabled");
            Arc::new(NoOpReporter)
        } else {
            let sink = Arc::new(FileStatusSink::new(config.status.dir.clone()));
            let namespace = RelatedObject {
                resource: "namespaces".to_string(),
                name: config.leader_election.namespace.clone(),
                ..RelatedObject::default()
            };
            Arc::new(
                ClusterStatusReporter::new(
                    config.status.cluster_operator_name.clone(),
                    config.status.release_version.clone(),
                    identity.as_str(),
                    sink,
                )
                .with_related_objects(
                    std::iter::once(namespace)
                        .chain(config.status.related_objects.iter().cloned())
                        .collect(),
                )
                .with_interval(Duration::from_secs(config.status.report_interval_secs)),
            )
        };

        let defaults: Arc<dyn DefaultsPopulator> = Arc::new(DirectoryDefaults::new(config.defaults.dir.clone()));

        let source = defaults.clone();
        let resync = Duration::from_secs(config.controller.resync_secs);
        let control_loop = ControllerManager::new().with_controller(move |applied| {
            Ok(Arc::new(DefaultsDriftController::new(applied, source.clone(), resync)) as Arc<dyn Controller>)
        });

        Self {
            reporter,
            defaults,
            control_loop: Arc::new(control_loop),
        }
    }
}

/// Leadership callbacks that run the subsystem sequencer.
pub struct OperatorCallbacks {
    identity: Identity,
    sequencer: SubsystemSequencer,
    shutdown: Shutdown,
    rejoin_after_loss: bool,
}

impl OperatorCallbacks {
    pub fn new(identity: Identity, sequencer: SubsystemSequencer, shutdown: Shutdown, rejoin_after_loss: bool) -> Self {
        Self {
            identity,
            sequencer,
            shutdown,
            rejoin_after_loss,
        }
    }
}

#[async_trait]
impl LeaderCallbacks for OperatorCallbacks {
    async fn on_started_leading(&self, token: CancellationToken) {
        tracing::info!(identity = %self.identity, "Became leader");
        match self.sequencer.run_episode(token).await {
            Ok(EpisodeOutcome::Cancelled) => {}
            Ok(EpisodeOutcome::ControlLoopFailed(reason)) => {
                tracing::warn!(reason = %reason, "Giving up leadership after control loop failure");
            }
            Err(e) => {
                tracing::error!(error = %e, "Fatal error while leading");
                self.shutdown.fail(e.to_string());
            }
        }
    }

    fn on_stopped_leading(&self) {
        if self.shutdown.is_triggered() {
            tracing::info!(identity = %self.identity, "Stopped leading");
            return;
        }
        if self.rejoin_after_loss {
            tracing::warn!(identity = %self.identity, "Leadership lost, rejoining as candidate");
        } else {
            tracing::warn!(identity = %self.identity, "Leadership lost, shutting down");
            self.shutdown.trigger();
        }
    }

    fn on_new_leader(&self, identity: &str) {
        if identity != self.identity.as_str() {
            tracing::info!(leader = %identity, "New leader elected");
        }
    }
}

/// Everything needed to run leader election for one process.
pub struct Bootstrap {
    config: OperatorConfig,
    identity: Identity,
    timing: LeaderTiming,
    store: Arc<dyn CoordinationStore>,
    collaborators: Collaborators,
}

impl Bootstrap {
    pub fn new(
        config: OperatorConfig,
        identity: Identity,
        store: Arc<dyn CoordinationStore>,
        collaborators: Collaborators,
    ) -> Result<Self, StartupError> {
        let election = &config.leader_election;
        let timing = LeaderTiming::new(
            election.lease_duration(),
            election.renew_deadline(),
            election.retry_period(),
        )?;
        Ok(Self {
            config,
            identity,
            timing,
            store,
            collaborators,
        })
    }

    /// Run leader election until `shutdown` fires, then wait for `supervisor`.
    pub async fn run(self, shutdown: Shutdown, supervisor: TaskSupervisor) -> RunSummary {
        let election = &self.config.leader_election;
        let key = LockKey::new(election.namespace.clone(), election.lock_name.clone());
        let lock = LeaseLock::new(self.store, key, self.identity.as_str(), self.timing.lease_duration());

        let sequencer = SubsystemSequencer::new(
            self.collaborators.reporter,
            self.collaborators.defaults,
            self.collaborators.control_loop,
        );
        let callbacks = Arc::new(OperatorCallbacks::new(
            self.identity.clone(),
            sequencer,
            shutdown.clone(),
            election.rejoin_after_loss,
        ));

        let elector = LeaderElector::new(lock, self.timing, election.release_on_cancel, callbacks);
        let status = elector.status();

        if let Err(e) = elector.run(shutdown.token()).await {
            tracing::error!(error = %e, "Leader election failed");
            shutdown.fail(e.to_string());
        }
        // the elector only returns once the root is cancelled or it failed
        shutdown.trigger();

        tracing::debug!(tasks = supervisor.len(), "Waiting for supervised tasks");
        supervisor.wait().await;

        RunSummary {
            episodes: status.episodes(),
            fatal: shutdown.fatal_reason().map(str::to_string),
        }
    }
}

/// Open the configured coordination store.
pub fn open_store(config: &OperatorConfig) -> Result<Arc<dyn CoordinationStore>, StartupError> {
    match config.store.kind {
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store, leadership is not shared with other processes");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::File => {
            let dir: &PathBuf = config.store.lock_dir.as_ref().ok_or(StartupError::MissingLockDir)?;
            let store = FileStore::open(dir)?;
            tracing::info!(dir = %store.root().display(), "Opened file coordination store");
            Ok(Arc::new(store))
        }
    }
}

fn parse_addr(address: &str) -> Result<SocketAddr, StartupError> {
    address
        .parse()
        .map_err(|_| StartupError::InvalidAddress(address.to_string()))
}

async fn bind(address: SocketAddr) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

/// Start the signal listener and the health and metrics servers.
async fn start_background(config: &OperatorConfig, shutdown: &Shutdown) -> Result<TaskSupervisor, StartupError> {
    let observability = &config.observability;
    let mut supervisor = TaskSupervisor::new(shutdown.clone());

    supervisor.spawn("signals", signals::listen(shutdown.clone()));

    let health_listener = bind(parse_addr(&observability.health_address)?).await?;
    supervisor.spawn(
        "health",
        HttpServer::new("health", health::router()).run(health_listener, shutdown.token()),
    );

    if observability.metrics_enabled {
        let address = parse_addr(&observability.metrics_address)?;
        let handle = metrics::install_recorder().map_err(|e| StartupError::Metrics(e.to_string()))?;
        let server = HttpServer::new("metrics", metrics::router(handle));

        match &observability.tls {
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                supervisor.spawn("metrics", server.run_tls(address, rustls, shutdown.token()));
            }
            None => {
                let listener = bind(address).await?;
                supervisor.spawn("metrics", server.run(listener, shutdown.token()));
            }
        }
    }

    Ok(supervisor)
}

/// Build everything from `config` and run until shutdown.
pub async fn run(config: OperatorConfig, identity: Identity, shutdown: Shutdown) -> Result<RunSummary, StartupError> {
    let store = open_store(&config)?;
    let collaborators = Collaborators::from_config(&config, &identity);
    let bootstrap = Bootstrap::new(config.clone(), identity, store, collaborators)?;

    let supervisor = match start_background(&config, &shutdown).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            // stop whatever already started before reporting the error
            shutdown.trigger();
            return Err(e);
        }
    };

    Ok(bootstrap.run(shutdown, supervisor).await)
}
