//! Node composition: one registry, one broadcaster, explicit wiring.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use avs_core::{ClockSource, OperatorStore, Policy, RegistryError, Task, TaskSummary, Transport};

use crate::broadcast::{BroadcastMetrics, Broadcaster};
use crate::config::NodeConfig;
use crate::directory::reconciler::Reconciled;
use crate::directory::{DirectoryEvent, MembershipReconciler};
use crate::registry::OperatorRegistry;
use crate::worker::{BackgroundWorker, MaintenanceRunnable};

/// Point-in-time health of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub store_reachable: bool,
    /// `None` when the store could not be read.
    pub registered_operators: Option<usize>,
    pub snapshot_generation: u64,
    pub snapshot_size: usize,
}

/// An AVS node: registry, broadcaster and the glue between them.
#[derive(Debug)]
pub struct AvsNode {
    config: NodeConfig,
    registry: Arc<OperatorRegistry>,
    broadcaster: Arc<Broadcaster>,
    metrics: Arc<BroadcastMetrics>,
}

impl AvsNode {
    #[must_use]
    pub fn new(
        config: NodeConfig,
        store: Arc<dyn OperatorStore>,
        clock: Arc<dyn ClockSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(OperatorRegistry::new(
            store,
            clock,
            config.operator_ttl_ms(),
        ));
        let broadcaster = Arc::new(Broadcaster::new(transport, config.broadcast.clone()));
        Self {
            config,
            registry,
            broadcaster,
            metrics: Arc::new(BroadcastMetrics::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<BroadcastMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn reconciler(&self) -> MembershipReconciler {
        MembershipReconciler::new(self.registry.clone())
    }

    /// Installs the registry's active operators as the broadcast snapshot.
    ///
    /// # Errors
    ///
    /// Store failures from the registry; the snapshot is unchanged.
    pub async fn refresh_snapshot(&self) -> Result<u64, RegistryError> {
        let active = self.registry.active_operators().await?;
        Ok(self.broadcaster.set_active_operators(active))
    }

    /// Broadcasts `task` against the current snapshot and returns its summary.
    pub async fn broadcast(
        &self,
        cancel: &CancellationToken,
        task: &Task,
        policy: &dyn Policy,
    ) -> TaskSummary {
        self.broadcaster
            .broadcast(cancel, task, policy, self.metrics.as_ref())
            .await;
        self.metrics.summary(&task.id).unwrap_or_default()
    }

    /// Applies a confirmed directory event to the registry.
    ///
    /// # Errors
    ///
    /// See [`MembershipReconciler::apply`].
    pub async fn apply_event(&self, event: DirectoryEvent) -> Result<Reconciled, RegistryError> {
        self.reconciler().apply(event).await
    }

    /// Starts the periodic expiry and snapshot refresh.
    #[must_use]
    pub fn start_maintenance(&self) -> BackgroundWorker<MaintenanceRunnable> {
        BackgroundWorker::start(
            MaintenanceRunnable::new(self.registry.clone(), self.broadcaster.clone()),
            self.config.sweep_interval,
        )
    }

    pub async fn health(&self) -> NodeHealth {
        let store_reachable = match self.registry.test_connection().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "store unreachable");
                false
            }
        };
        let registered_operators = if store_reachable {
            self.registry
                .get_operator_addresses()
                .await
                .ok()
                .map(|addresses| addresses.len())
        } else {
            None
        };
        let snapshot = self.broadcaster.snapshot();
        NodeHealth {
            store_reachable,
            registered_operators,
            snapshot_generation: snapshot.generation(),
            snapshot_size: snapshot.len(),
        }
    }
}
