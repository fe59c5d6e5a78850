use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A registered operator as tracked by the registry and broadcaster.
///
/// `address` is the operator's canonical chain address and its identity;
/// `endpoint` is where the transport reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInfo {
    /// Canonical chain address (`0x` + 40 lowercase hex digits).
    pub address: String,
    /// Network endpoint handed to the transport.
    pub endpoint: String,
    /// Last heartbeat or registration time, millis since Unix epoch.
    pub last_seen_ms: u64,
}

impl OperatorInfo {
    #[must_use]
    pub fn new(address: impl Into<String>, endpoint: impl Into<String>, last_seen_ms: u64) -> Self {
        Self {
            address: address.into(),
            endpoint: endpoint.into(),
            last_seen_ms,
        }
    }

    /// Returns `true` if `now_ms - last_seen_ms <= ttl_ms`.
    ///
    /// A `last_seen_ms` in the future counts as active.
    #[must_use]
    pub fn is_active(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) <= ttl_ms
    }
}

/// Policy-relevant request metadata carried with a task.
///
/// Mirrors the transaction-shaped request a policy is evaluated against.
/// Every field is optional so policies only see what the caller supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Hex-encoded calldata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Value in wei, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Requested expiry, millis since Unix epoch. Carried for policies;
    /// the broadcaster does not enforce it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_by_ms: Option<u64>,
    /// Free-form attributes for custom policies.
    /// `BTreeMap` keeps serialization order deterministic.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// A unit of work fanned out to eligible operators.
///
/// `id` is the metrics aggregation key for one broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Opaque payload; the core never inspects it.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl Task {
    /// Creates a task with a fresh UUID v4 id and empty metadata.
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            metadata: TaskMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_window_is_inclusive() {
        let op = OperatorInfo::new("0xaa", "10.0.0.1", 1_000);
        assert!(op.is_active(61_000, 60_000));
        assert!(!op.is_active(61_001, 60_000));
        // Clock behind the record: still active.
        assert!(op.is_active(500, 60_000));
    }

    #[test]
    fn task_new_assigns_unique_ids() {
        let a = Task::new(vec![1]);
        let b = Task::new(vec![1]);
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn operator_info_uses_camel_case_json() {
        let op = OperatorInfo::new("0xaa", "10.0.0.1:9000", 42);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["lastSeenMs"], 42);
        assert_eq!(json["endpoint"], "10.0.0.1:9000");
    }

    #[test]
    fn task_json_omits_empty_metadata_fields() {
        let task = Task::new(b"hi".to_vec()).with_id("t-1");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "t-1");
        assert_eq!(json["metadata"], serde_json::json!({}));

        let decoded: Task = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn task_metadata_defaults_when_missing() {
        let task: Task = serde_json::from_str(r#"{"id":"t","payload":[1,2]}"#).unwrap();
        assert_eq!(task.metadata, TaskMetadata::default());
        assert_eq!(task.payload, vec![1, 2]);
    }
}
