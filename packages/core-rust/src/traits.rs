use async_trait::async_trait;

use crate::chain::{SignatureWithSaltAndExpiry, TransactOpts, TransactionHandle, TransactionReceipt};
use crate::error::{ChainError, StoreError, TransportError};
use crate::metrics::DeliveryRecord;
use crate::types::{OperatorInfo, Task};

/// Result of an atomic insert into an [`OperatorStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Durable keyed persistence for operator records.
///
/// Every method is atomic per record: a concurrent reader sees either the
/// old or the new record, never a mix.
#[async_trait]
pub trait OperatorStore: Send + Sync {
    /// Load one record. `Ok(None)` means not found.
    async fn get(&self, address: &str) -> Result<Option<OperatorInfo>, StoreError>;

    /// Load every record.
    async fn get_all(&self) -> Result<Vec<OperatorInfo>, StoreError>;

    /// List stored addresses without decoding records.
    async fn addresses(&self) -> Result<Vec<String>, StoreError>;

    /// Insert unless a record with the same address exists.
    async fn insert_if_absent(&self, info: &OperatorInfo) -> Result<InsertOutcome, StoreError>;

    /// Insert `info`, or if the address exists, set its `last_seen_ms` to
    /// `info.last_seen_ms` and keep the rest of the stored record. One atomic
    /// step, so a concurrent expiry cannot fall between the check and the write.
    async fn refresh_or_insert(&self, info: &OperatorInfo) -> Result<InsertOutcome, StoreError>;

    /// Set `last_seen_ms` on an existing record. Returns `false` if absent.
    async fn touch(&self, address: &str, seen_at_ms: u64) -> Result<bool, StoreError>;

    /// Delete a record. Returns `false` if absent.
    async fn remove(&self, address: &str) -> Result<bool, StoreError>;

    /// Delete every record with `last_seen_ms < cutoff_ms` and return their addresses.
    async fn expire_older_than(&self, cutoff_ms: u64) -> Result<Vec<String>, StoreError>;

    /// Liveness check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Single-attempt delivery of a task to one operator endpoint.
///
/// Any retry or backoff lives inside the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &str, task: &Task) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Permit,
    Deny,
}

/// Per-task, per-operator eligibility rule.
///
/// Implemented for any `Fn(&OperatorInfo, &Task) -> bool`, so a closure
/// returning `true` permits.
pub trait Policy: Send + Sync {
    fn evaluate(&self, operator: &OperatorInfo, task: &Task) -> PolicyDecision;
}

impl<F> Policy for F
where
    F: Fn(&OperatorInfo, &Task) -> bool + Send + Sync,
{
    fn evaluate(&self, operator: &OperatorInfo, task: &Task) -> PolicyDecision {
        if self(operator, task) {
            PolicyDecision::Permit
        } else {
            PolicyDecision::Deny
        }
    }
}

/// Receives per-operator broadcast outcomes.
pub trait MetricsSink: Send + Sync {
    /// Called once per broadcast, before any send is issued.
    ///
    /// A repeated task id starts that task's records over.
    fn broadcast_started(&self, task_id: &str, generation: u64, eligible: usize);

    /// Called for every operator the policy denied.
    fn policy_skipped(&self, task_id: &str, operator: &str);

    /// Called exactly once per eligible operator.
    fn record_delivery(&self, record: DeliveryRecord);
}

/// Transaction-submitting surface of the on-chain AVS directory.
///
/// A returned handle means "submitted", not "included".
#[async_trait]
pub trait AvsDirectory: Send + Sync {
    async fn register_operator_to_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
        signature: &SignatureWithSaltAndExpiry,
    ) -> Result<TransactionHandle, ChainError>;

    async fn deregister_operator_from_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
    ) -> Result<TransactionHandle, ChainError>;

    async fn update_avs_metadata_uri(
        &self,
        opts: &TransactOpts,
        metadata_uri: &str,
    ) -> Result<TransactionHandle, ChainError>;
}

/// Waits for a submitted transaction to be included.
#[async_trait]
pub trait ReceiptWatcher: Send + Sync {
    async fn wait_for_receipt(
        &self,
        handle: &TransactionHandle,
    ) -> Result<TransactionReceipt, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_policy_maps_bool_to_decision() {
        let only_b = |op: &OperatorInfo, _task: &Task| op.endpoint == "10.0.0.2";
        let task = Task::new(vec![]);
        let a = OperatorInfo::new("0xa", "10.0.0.1", 1);
        let b = OperatorInfo::new("0xb", "10.0.0.2", 1);
        assert_eq!(only_b.evaluate(&a, &task), PolicyDecision::Deny);
        assert_eq!(only_b.evaluate(&b, &task), PolicyDecision::Permit);
    }

    #[test]
    fn policy_is_object_safe() {
        let permit_all: Box<dyn Policy> = Box::new(|_: &OperatorInfo, _: &Task| true);
        let op = OperatorInfo::new("0xa", "10.0.0.1", 1);
        assert_eq!(
            permit_all.evaluate(&op, &Task::new(vec![])),
            PolicyDecision::Permit
        );
    }
}
