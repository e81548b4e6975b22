//! Trigger queue and worker pool for ingestion runs
//!
//! Triggers go onto a bounded queue consumed by a fixed number of workers.
//! Whether a trigger is accepted while another run is pending is decided by
//! the configured [`OverlapPolicy`].

use crate::jobs::context::IngestContext;
use crate::jobs::handlers::run_ingestion;
use crate::jobs::types::IngestionJob;
use crate::models::{IngestionRequest, LookbackPeriod, RunSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, info, warn};

/// What to do with a trigger that arrives while a run is queued or executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Queue it while the queue has room.
    #[default]
    Queue,
    /// Refuse it. At most one run is pending at any time.
    Reject,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(OverlapPolicy::Queue),
            "reject" => Ok(OverlapPolicy::Reject),
            other => Err(format!(
                "unknown overlap policy '{}' (expected queue or reject)",
                other
            )),
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapPolicy::Queue => f.write_str("queue"),
            OverlapPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Configuration for the job runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    pub overlap_policy: OverlapPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 1,
            queue_capacity: 4,
            overlap_policy: OverlapPolicy::Queue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("an ingestion run is already queued or running")]
    Busy,
    #[error("trigger queue is full ({0} runs waiting)")]
    QueueFull(usize),
    #[error("ingestion workers have shut down")]
    Closed,
    #[error("no symbols to ingest")]
    NoSymbols,
}

/// Acknowledgement handed back to the caller of an accepted trigger.
#[derive(Debug, Clone, Serialize)]
pub struct RunTicket {
    pub run_id: u64,
    pub symbols: Vec<String>,
    pub period: LookbackPeriod,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub active_runs: Vec<u64>,
    pub queued: usize,
    pub completed: u64,
    pub rejected: u64,
    pub overlap_policy: String,
    pub last_run: Option<RunSummary>,
}

#[derive(Default)]
struct StatusBoard {
    running: Vec<u64>,
    last_run: Option<RunSummary>,
}

/// Counters and the status board, shared between the trigger path and workers.
#[derive(Default)]
struct Shared {
    board: RwLock<StatusBoard>,
    /// Accepted runs not yet finished (queued + executing).
    pending: AtomicUsize,
    completed: AtomicU64,
    rejected: AtomicU64,
}

/// Bounded ingestion queue plus the worker pool that drains it
pub struct IngestRuntime {
    config: RuntimeConfig,
    job_context: Arc<IngestContext>,
    sender: mpsc::Sender<IngestionJob>,
    receiver: Arc<Mutex<mpsc::Receiver<IngestionJob>>>,
    next_run_id: AtomicU64,
    shared: Arc<Shared>,
}

impl IngestRuntime {
    pub fn new(config: RuntimeConfig, job_context: Arc<IngestContext>) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            config,
            job_context,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            next_run_id: AtomicU64::new(0),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Start all workers and return handles for shutdown
    pub fn start_workers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let workers = self.config.worker_concurrency.max(1);
        info!(
            workers = workers,
            queue_capacity = self.config.queue_capacity,
            overlap_policy = %self.config.overlap_policy,
            "IngestRuntime: starting {} workers",
            workers
        );

        (1..=workers)
            .map(|worker_id| {
                let receiver = self.receiver.clone();
                let ctx = self.job_context.clone();
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, receiver, ctx, shared).await;
                })
            })
            .collect()
    }

    /// Accept a run without waiting for it. Never blocks on the queue.
    pub fn trigger(&self, request: IngestionRequest) -> Result<RunTicket, TriggerError> {
        if request.symbols.is_empty() {
            return Err(TriggerError::NoSymbols);
        }

        match self.config.overlap_policy {
            OverlapPolicy::Reject => {
                if self
                    .shared
                    .pending
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Err(self.reject(TriggerError::Busy));
                }
            }
            OverlapPolicy::Queue => {
                self.shared.pending.fetch_add(1, Ordering::SeqCst);
            }
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst) + 1;
        let job = IngestionJob::new(run_id, request);
        let ticket = RunTicket {
            run_id,
            symbols: job.request.symbols.clone(),
            period: job.request.period,
            enqueued_at: job.enqueued_at,
        };

        match self.sender.try_send(job) {
            Ok(()) => {
                self.update_pending_gauge();
                info!(
                    run_id = run_id,
                    symbols = ?ticket.symbols,
                    period = %ticket.period,
                    "Ingestion run {} scheduled",
                    run_id
                );
                Ok(ticket)
            }
            Err(TrySendError::Full(_)) => {
                self.shared.pending.fetch_sub(1, Ordering::SeqCst);
                Err(self.reject(TriggerError::QueueFull(self.config.queue_capacity)))
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.pending.fetch_sub(1, Ordering::SeqCst);
                error!("Ingestion trigger refused: workers have shut down");
                Err(TriggerError::Closed)
            }
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let board = self.shared.board.read().await;
        StatusSnapshot {
            active_runs: board.running.clone(),
            queued: self.sender.max_capacity() - self.sender.capacity(),
            completed: self.shared.completed.load(Ordering::SeqCst),
            rejected: self.shared.rejected.load(Ordering::SeqCst),
            overlap_policy: self.config.overlap_policy.to_string(),
            last_run: board.last_run.clone(),
        }
    }

    /// Runs accepted and not yet finished.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    fn reject(&self, reason: TriggerError) -> TriggerError {
        self.shared.rejected.fetch_add(1, Ordering::SeqCst);
        if let Some(ref metrics) = self.job_context.metrics {
            metrics.ingestion_runs_rejected_total.inc();
        }
        warn!(reason = %reason, "Ingestion trigger rejected: {}", reason);
        reason
    }

    fn update_pending_gauge(&self) {
        update_pending_gauge(&self.job_context, &self.shared);
    }
}

fn update_pending_gauge(ctx: &IngestContext, shared: &Shared) {
    if let Some(ref metrics) = ctx.metrics {
        metrics
            .ingestion_runs_pending
            .set(shared.pending.load(Ordering::SeqCst) as i64);
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<IngestionJob>>>,
    ctx: Arc<IngestContext>,
    shared: Arc<Shared>,
) {
    info!(worker_id = worker_id, "IngestRuntime: worker {} started", worker_id);
    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            info!(worker_id = worker_id, "IngestRuntime: queue closed, worker {} stopping", worker_id);
            break;
        };

        let run_id = job.run_id;
        let period = job.request.period;
        shared.board.write().await.running.push(run_id);

        // A panicking run must not take the worker (or the pending count) with it.
        let run_ctx = ctx.clone();
        let started_at = Utc::now();
        let summary = match tokio::spawn(async move { run_ingestion(job, &run_ctx).await }).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(worker_id = worker_id, run_id = run_id, error = %e, "Ingestion run {} aborted", run_id);
                let summary = RunSummary {
                    run_id,
                    period,
                    started_at,
                    finished_at: Utc::now(),
                    skipped: Some(format!("run aborted: {}", e)),
                    symbols: Vec::new(),
                };
                if let Some(ref metrics) = ctx.metrics {
                    metrics.record_run(&summary);
                }
                summary
            }
        };

        {
            let mut board = shared.board.write().await;
            board.running.retain(|id| *id != run_id);
            board.last_run = Some(summary);
        }
        shared.completed.fetch_add(1, Ordering::SeqCst);
        shared.pending.fetch_sub(1, Ordering::SeqCst);
        update_pending_gauge(&ctx, &shared);
    }
}
