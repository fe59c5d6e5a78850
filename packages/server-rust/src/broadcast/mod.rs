//! Task fan-out to the active operator set.
//!
//! - [`OperatorSnapshot`]: immutable, generation-stamped operator set
//! - [`Broadcaster`]: `ArcSwap<OperatorSnapshot>` plus bounded concurrent delivery
//! - [`BroadcastMetrics`]: default [`MetricsSink`](avs_core::MetricsSink)

pub mod metrics;
pub mod snapshot;

use std::collections::HashSet;
use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use avs_core::{
    validate_task, DeliveryOutcome, DeliveryRecord, MetricsSink, OperatorInfo, Policy,
    PolicyDecision, Task, Transport, TransportError,
};

use crate::config::BroadcastConfig;

pub use metrics::BroadcastMetrics;
pub use snapshot::OperatorSnapshot;

/// Fans tasks out to a caller-installed snapshot of operators.
///
/// The snapshot lives behind an `ArcSwap`: `set_active_operators` installs a
/// new `Arc` and never touches the old one, so a broadcast that loaded
/// generation N keeps delivering to generation N even if N+1 is installed
/// mid-flight.
pub struct Broadcaster {
    snapshot: ArcSwap<OperatorSnapshot>,
    transport: Arc<dyn Transport>,
    config: BroadcastConfig,
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("Broadcaster")
            .field("generation", &snapshot.generation())
            .field("operators", &snapshot.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: BroadcastConfig) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(OperatorSnapshot::empty()),
            transport,
            config,
        }
    }

    /// Atomically replaces the snapshot used by later broadcasts.
    ///
    /// Duplicate addresses collapse to the last entry. Returns the new
    /// generation.
    pub fn set_active_operators(&self, operators: Vec<OperatorInfo>) -> u64 {
        let next = OperatorSnapshot::new(0, operators);
        let count = next.len();
        let previous = self
            .snapshot
            .rcu(|current| next.with_generation(current.generation() + 1));
        let generation = previous.generation() + 1;
        info!(generation, operators = count, "installed operator snapshot");
        generation
    }

    /// Returns the operators of the current snapshot.
    #[must_use]
    pub fn get_active_operators(&self) -> Vec<OperatorInfo> {
        self.snapshot.load().operators().to_vec()
    }

    /// Returns the current snapshot itself.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OperatorSnapshot> {
        self.snapshot.load_full()
    }

    /// Delivers `task` to every operator in the current snapshot that
    /// `policy` permits.
    ///
    /// Exactly one attempt is made per eligible operator, at most
    /// `max_concurrent_sends` at a time, each bounded by `send_timeout`.
    /// Failures are isolated per operator and surface only in `metrics`.
    /// All records are written before this returns.
    ///
    /// Cancelling `cancel` stops new sends and aborts in-flight ones; every
    /// eligible operator without a result is then recorded as `Cancelled`.
    pub async fn broadcast(
        &self,
        cancel: &CancellationToken,
        task: &Task,
        policy: &dyn Policy,
        metrics: &dyn MetricsSink,
    ) {
        if let Err(err) = validate_task(task) {
            warn!(error = %err, "refusing to broadcast invalid task");
            return;
        }

        let snapshot = self.snapshot.load_full();
        let generation = snapshot.generation();

        let (eligible, denied): (Vec<&OperatorInfo>, Vec<&OperatorInfo>) = snapshot
            .operators()
            .iter()
            .partition(|op| policy.evaluate(op, task) == PolicyDecision::Permit);

        metrics.broadcast_started(&task.id, generation, eligible.len());
        for op in &denied {
            debug!(task_id = %task.id, operator = %op.address, "operator denied by policy");
            metrics.policy_skipped(&task.id, &op.address);
        }

        let mut pending: HashSet<&str> = eligible.iter().map(|op| op.address.as_str()).collect();
        {
            // Dropping the stream at the end of this block aborts unfinished sends.
            let mut sends = pin!(stream::iter(eligible.iter().copied())
                .map(|op| self.attempt(op, task))
                .buffer_unordered(self.config.max_concurrent_sends.max(1)));

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        warn!(task_id = %task.id, outstanding = pending.len(), "broadcast cancelled");
                        break;
                    }
                    next = sends.next() => match next {
                        Some((operator, outcome, latency)) => {
                            pending.remove(operator);
                            metrics.record_delivery(DeliveryRecord {
                                task_id: task.id.clone(),
                                operator: operator.to_string(),
                                outcome,
                                latency,
                                generation,
                            });
                        }
                        None => break,
                    },
                }
            }
        }

        for operator in pending {
            metrics.record_delivery(DeliveryRecord {
                task_id: task.id.clone(),
                operator: operator.to_string(),
                outcome: DeliveryOutcome::Cancelled,
                latency: Duration::ZERO,
                generation,
            });
        }

        info!(
            task_id = %task.id,
            generation,
            eligible = eligible.len(),
            denied = denied.len(),
            "broadcast complete"
        );
    }

    /// One delivery attempt to one endpoint, bounded by `send_timeout`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or [`TransportError::Timeout`].
    pub async fn send(&self, endpoint: &str, task: &Task) -> Result<(), TransportError> {
        match tokio::time::timeout(self.config.send_timeout, self.transport.send(endpoint, task))
            .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(TransportError::Timeout {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    async fn attempt<'a>(
        &self,
        operator: &'a OperatorInfo,
        task: &Task,
    ) -> (&'a str, DeliveryOutcome, Duration) {
        let started = Instant::now();
        let result = self.send(&operator.endpoint, task).await;
        let latency = started.elapsed();
        if let Err(err) = &result {
            warn!(
                task_id = %task.id,
                operator = %operator.address,
                error = %err,
                "delivery failed"
            );
        }
        (operator.address.as_str(), result.into(), latency)
    }
}
