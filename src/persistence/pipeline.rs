//! Asynchronous session persistence.
//!
//! ```text
//! ┌───────────────┐ persist ┌──────────────┐ publish ┌────────────────┐ receive ┌────────────┐
//! │ protocol side │───────▶│ bounded mpsc │───────▶│ QueueTransport │───────▶│ Dispatcher │
//! └───────────────┘         └──────────────┘         └────────────────┘         └─────┬──────┘
//!                                                                  one task per record │
//!                                                     decode ▶ resolve client ▶ upsert ▼
//! ```
//!
//! The producer side never touches the database. Records can be consumed by any
//! process sharing the transport channel, so the client id is resolved on the
//! consuming side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::configuration::config::Config;
use crate::configuration::types::ErrorPolicy;
use crate::error_handling::types::{PersistenceError, PipelineError, SessionError};
use crate::persistence::record::{self, SessionRecord};
use crate::persistence::transport::QueueTransport;
use crate::persistence::worker_pool::WorkerPool;
use crate::session_management::Session;
use crate::storage::client_registry::ClientRegistry;
use crate::storage::storage_trait::SessionStore;
use crate::SessionStatus;

/// Counters shared by the producer and consumer sides.
#[derive(Debug, Default)]
pub struct PipelineStats {
    enqueued: AtomicU64,
    persisted: AtomicU64,
    dropped: AtomicU64,
    queries: AtomicU64,
}

impl PipelineStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Relational queries issued by the consumer: session upserts plus client
    /// upserts on registry misses, failed ones included.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

/// Producer side: encodes sessions and places them on the bounded dispatch queue.
#[derive(Clone)]
pub struct PersistencePipeline {
    instance_id: u64,
    outbound: mpsc::Sender<Vec<u8>>,
    stats: Arc<PipelineStats>,
}

impl PersistencePipeline {
    /// Returns the producer and the receiving end of its dispatch queue, which is
    /// meant to be handed to [`spawn_forwarder`].
    pub fn new(
        instance_id: u64,
        capacity: usize,
        stats: Arc<PipelineStats>,
    ) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                instance_id,
                outbound,
                stats,
            },
            rx,
        )
    }

    /// Queues a snapshot of `session` for persistence.
    ///
    /// On an open session this sends a record with the disconnect time unset and the
    /// session stays open. On a closed session it sends the final record and moves the
    /// session to `Persisted`; any later call fails with `AlreadyPersisted`.
    ///
    /// Waits while the dispatch queue is full.
    pub async fn persist(&self, session: &mut Session) -> Result<(), PipelineError> {
        if session.is_persisted() {
            return Err(SessionError::AlreadyPersisted.into());
        }
        let bytes = record::encode(session, self.instance_id)?;
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        if session.status() == SessionStatus::Closed {
            session.mark_persisted();
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        debug!("[{}] session queued for persistence", session.id());
        Ok(())
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}

/// Moves encoded records from the local dispatch queue onto the shared transport.
/// A record the transport refuses is lost and counted as dropped.
pub fn spawn_forwarder(
    mut rx: mpsc::Receiver<Vec<u8>>,
    transport: Arc<dyn QueueTransport>,
    channel: String,
    stats: Arc<PipelineStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = transport.publish(&channel, bytes).await {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!("Unable to publish session record on {}: {}", channel, e);
            }
        }
        debug!("dispatch queue for {} closed", channel);
    })
}

/// Work done for a single received record.
pub struct PersistTask {
    store: Arc<dyn SessionStore>,
    registry: Arc<ClientRegistry>,
    upsert_timeout: Option<Duration>,
    stats: Arc<PipelineStats>,
}

impl PersistTask {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: Arc<ClientRegistry>,
        upsert_timeout: Option<Duration>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            registry,
            upsert_timeout,
            stats,
        }
    }

    /// Decodes `bytes`, resolves the reporting node and upserts the session row.
    pub async fn persist_record(&self, bytes: &[u8]) -> Result<Uuid, PipelineError> {
        let mut record = SessionRecord::decode(bytes)?;
        let resolved = self
            .registry
            .resolve_tracked(&record.mta_hostname, &record.mta_daemon_name)
            .await;
        if resolved.as_ref().map_or(true, |client| client.queried) {
            self.stats.queries.fetch_add(1, Ordering::Relaxed);
        }
        record.client_id = Some(resolved?.id);

        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        match self.upsert_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.upsert_session(&record))
                .await
                .map_err(|_| PersistenceError::Timeout)??,
            None => self.store.upsert_session(&record).await?,
        }
        Ok(record.id)
    }
}

/// Consumer side: reads records off the transport and fans each one out to its own task.
pub struct Dispatcher {
    transport: Arc<dyn QueueTransport>,
    channel: String,
    task: Arc<PersistTask>,
    pool: WorkerPool,
    policy: ErrorPolicy,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        channel: String,
        task: PersistTask,
        pool: WorkerPool,
        policy: ErrorPolicy,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            transport,
            channel,
            task: Arc::new(task),
            pool,
            policy,
            stats,
        }
    }

    /// Runs until the transport shuts down (`Ok`), the transport fails, or, under
    /// [`ErrorPolicy::Abort`], a record fails to persist. Tasks already spawned are not
    /// cancelled when this returns.
    pub async fn run(self) -> Result<(), PipelineError> {
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<PipelineError>();
        info!("Session persistence consumer listening on {}", self.channel);

        loop {
            let bytes = tokio::select! {
                Some(e) = fatal_rx.recv() => {
                    error!("Aborting session persistence consumer: {}", e);
                    return Err(e);
                }
                received = self.transport.receive(&self.channel) => match received? {
                    Some(bytes) => bytes,
                    None => {
                        info!("Session persistence consumer on {} stopped", self.channel);
                        return Ok(());
                    }
                },
            };

            let task = Arc::clone(&self.task);
            let stats = Arc::clone(&self.stats);
            let fatal_tx = fatal_tx.clone();
            let policy = self.policy;
            self.pool
                .spawn(async move {
                    match task.persist_record(&bytes).await {
                        Ok(id) => {
                            stats.persisted.fetch_add(1, Ordering::Relaxed);
                            debug!("[{}] session persisted", id);
                        }
                        Err(e) => {
                            stats.dropped.fetch_add(1, Ordering::Relaxed);
                            handle_failure(e, policy, &fatal_tx);
                        }
                    }
                })
                .await;
        }
    }
}

fn handle_failure(
    e: PipelineError,
    policy: ErrorPolicy,
    fatal_tx: &mpsc::UnboundedSender<PipelineError>,
) {
    // a malformed record only ever costs that one record
    let recoverable =
        matches!(e, PipelineError::Decode(_)) || policy == ErrorPolicy::Recover;
    if recoverable {
        error!("Dropping session record: {}", e);
    } else if let Err(unsent) = fatal_tx.send(e) {
        warn!("Consumer already stopped, dropping failure: {}", unsent.0);
    }
}

/// Handles to the background halves of a running pipeline.
pub struct PipelineHandle {
    pub forwarder: JoinHandle<()>,
    pub dispatcher: JoinHandle<Result<(), PipelineError>>,
}

/// Wires producer, forwarder and consumer together from the configuration.
pub fn start(
    config: &Config,
    transport: Arc<dyn QueueTransport>,
    store: Arc<dyn SessionStore>,
    registry: Arc<ClientRegistry>,
) -> (PersistencePipeline, PipelineHandle) {
    let stats = Arc::new(PipelineStats::default());
    let channel = config.persist_channel();
    let (pipeline, rx) = PersistencePipeline::new(
        config.instance_id,
        config.persistence.queue_capacity,
        Arc::clone(&stats),
    );
    let forwarder = spawn_forwarder(
        rx,
        Arc::clone(&transport),
        channel.clone(),
        Arc::clone(&stats),
    );

    let dispatcher = Dispatcher::new(
        transport,
        channel,
        PersistTask::new(store, registry, config.upsert_timeout(), Arc::clone(&stats)),
        WorkerPool::new(config.max_tasks()),
        config.error_policy(),
        stats,
    );
    let dispatcher = tokio::spawn(dispatcher.run());

    info!("Session persistence started");
    (
        pipeline,
        PipelineHandle {
            forwarder,
            dispatcher,
        },
    )
}
