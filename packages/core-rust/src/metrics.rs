//! Broadcast outcome data model.
//!
//! One [`DeliveryRecord`] per (task id, operator address) pair, plus a
//! per-task [`TaskSummary`] of aggregate counters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportErrorKind};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed {
        kind: TransportErrorKind,
        message: String,
    },
    /// The per-send timeout elapsed before the transport returned.
    TimedOut,
    /// The broadcast was cancelled before this send completed.
    Cancelled,
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Metrics label for this outcome.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<Result<(), TransportError>> for DeliveryOutcome {
    fn from(result: Result<(), TransportError>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(TransportError::Timeout { .. }) => Self::TimedOut,
            Err(err) => Self::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub task_id: String,
    pub operator: String,
    pub outcome: DeliveryOutcome,
    pub latency: Duration,
    /// Snapshot generation the broadcast ran against.
    pub generation: u64,
}

/// Aggregate counters for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub generation: u64,
    pub eligible: usize,
    pub skipped_by_policy: usize,
    pub delivered: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    pub total_latency_ms: u64,
}

impl TaskSummary {
    /// Number of eligible operators with a recorded outcome.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.delivered + self.failed + self.timed_out + self.cancelled
    }

    /// Folds one record into the counters.
    pub fn apply(&mut self, record: &DeliveryRecord) {
        match record.outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Failed { .. } => self.failed += 1,
            DeliveryOutcome::TimedOut => self.timed_out += 1,
            DeliveryOutcome::Cancelled => self.cancelled += 1,
        }
        #[allow(clippy::cast_possible_truncation)]
        let latency_ms = record.latency.as_millis() as u64;
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
    }
}
