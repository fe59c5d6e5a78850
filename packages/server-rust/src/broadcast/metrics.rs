//! In-memory [`MetricsSink`] keyed by task id and operator address.
//!
//! Every record is also forwarded to the global `metrics` recorder, so an
//! installed exporter sees delivery counts and send latency without the
//! caller reading this structure.

use std::collections::HashMap;

use dashmap::DashMap;

use avs_core::{DeliveryRecord, MetricsSink, TaskSummary};

#[derive(Debug, Default)]
struct TaskEntry {
    summary: TaskSummary,
    deliveries: HashMap<String, DeliveryRecord>,
}

/// Per-task delivery records plus aggregate counters.
///
/// Outlives the broadcast call; callers inspect it after `broadcast` returns.
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    tasks: DashMap<String, TaskEntry>,
}

impl BroadcastMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for one (task, operator) pair.
    #[must_use]
    pub fn delivery(&self, task_id: &str, operator: &str) -> Option<DeliveryRecord> {
        self.tasks
            .get(task_id)
            .and_then(|entry| entry.deliveries.get(operator).cloned())
    }

    /// All records for a task, in no particular order.
    #[must_use]
    pub fn deliveries(&self, task_id: &str) -> Vec<DeliveryRecord> {
        self.tasks
            .get(task_id)
            .map(|entry| entry.deliveries.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn summary(&self, task_id: &str) -> Option<TaskSummary> {
        self.tasks.get(task_id).map(|entry| entry.summary.clone())
    }

    #[must_use]
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops everything recorded for a task.
    pub fn forget(&self, task_id: &str) -> bool {
        self.tasks.remove(task_id).is_some()
    }
}

impl MetricsSink for BroadcastMetrics {
    fn broadcast_started(&self, task_id: &str, generation: u64, eligible: usize) {
        // A repeated task id replaces whatever an earlier broadcast recorded.
        let mut entry = TaskEntry::default();
        entry.summary.generation = generation;
        entry.summary.eligible = eligible;
        self.tasks.insert(task_id.to_string(), entry);
        metrics::counter!("avs_broadcasts_total").increment(1);
    }

    fn policy_skipped(&self, task_id: &str, _operator: &str) {
        self.tasks
            .entry(task_id.to_string())
            .or_default()
            .summary
            .skipped_by_policy += 1;
        metrics::counter!("avs_broadcast_policy_skips_total").increment(1);
    }

    fn record_delivery(&self, record: DeliveryRecord) {
        metrics::counter!("avs_broadcast_deliveries_total", "outcome" => record.outcome.label())
            .increment(1);
        metrics::histogram!("avs_broadcast_send_latency_seconds")
            .record(record.latency.as_secs_f64());

        let mut entry = self.tasks.entry(record.task_id.clone()).or_default();
        entry.summary.apply(&record);
        entry.deliveries.insert(record.operator.clone(), record);
    }
}
