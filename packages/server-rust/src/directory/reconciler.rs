//! Applies confirmed directory events to the operator registry.

use std::sync::Arc;

use avs_core::{InsertOutcome, RegistryError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::DirectoryEvent;
use crate::registry::OperatorRegistry;

/// What a single event did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Added,
    /// Re-registration of a known operator; only its last-seen time moved.
    Refreshed,
    Removed,
    /// Deregistration of an operator the registry never had (or already expired).
    AlreadyAbsent,
}

/// Keeps the registry in step with on-chain membership.
#[derive(Debug, Clone)]
pub struct MembershipReconciler {
    registry: Arc<OperatorRegistry>,
}

impl MembershipReconciler {
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    /// Applies one confirmed event.
    ///
    /// Registrations are stamped with the registry clock and applied as one
    /// atomic insert-or-refresh, so a concurrent expiry sweep cannot drop a
    /// confirmed registration.
    ///
    /// # Errors
    ///
    /// Validation or store failures from the registry. `NotFound` on
    /// deregistration is absorbed.
    pub async fn apply(&self, event: DirectoryEvent) -> Result<Reconciled, RegistryError> {
        match event {
            DirectoryEvent::Registered { mut operator, .. } => {
                operator.last_seen_ms = self.registry.now_ms();
                match self.registry.register_or_refresh(operator).await? {
                    InsertOutcome::Inserted => Ok(Reconciled::Added),
                    InsertOutcome::AlreadyExists => Ok(Reconciled::Refreshed),
                }
            }
            DirectoryEvent::Deregistered { address, .. } => {
                match self.registry.remove_operator(&address).await {
                    Ok(()) => Ok(Reconciled::Removed),
                    Err(RegistryError::NotFound(_)) => Ok(Reconciled::AlreadyAbsent),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Consumes events until the sender side closes.
    ///
    /// A failed event is logged and skipped; later events are still applied.
    pub fn spawn(self, mut events: mpsc::Receiver<DirectoryEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let address = event.address().to_string();
                match self.apply(event).await {
                    Ok(outcome) => debug!(operator = %address, ?outcome, "event reconciled"),
                    Err(err) => warn!(operator = %address, error = %err, "event not reconciled"),
                }
            }
            info!("directory event stream closed");
        })
    }
}
