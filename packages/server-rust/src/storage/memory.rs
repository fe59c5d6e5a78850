//! In-memory [`OperatorStore`] backed by [`DashMap`].
//!
//! Each operation touches a single shard entry, so writes to one operator
//! never block reads of another and no record is ever observed half-written.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use avs_core::{InsertOutcome, OperatorInfo, OperatorStore, StoreError};

use super::record::StoredRecord;

/// In-memory operator store keyed by canonical address.
#[derive(Debug, Default)]
pub struct MemoryOperatorStore {
    entries: DashMap<String, StoredRecord>,
}

impl MemoryOperatorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl OperatorStore for MemoryOperatorStore {
    async fn get(&self, address: &str) -> Result<Option<OperatorInfo>, StoreError> {
        self.entries
            .get(address)
            .map(|r| r.value().decode(address))
            .transpose()
    }

    async fn get_all(&self) -> Result<Vec<OperatorInfo>, StoreError> {
        self.entries
            .iter()
            .map(|entry| entry.value().decode(entry.key()))
            .collect()
    }

    async fn addresses(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn insert_if_absent(&self, info: &OperatorInfo) -> Result<InsertOutcome, StoreError> {
        match self.entries.entry(info.address.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(StoredRecord::encode(info)?);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn refresh_or_insert(&self, info: &OperatorInfo) -> Result<InsertOutcome, StoreError> {
        match self.entries.entry(info.address.clone()) {
            Entry::Occupied(mut slot) => {
                let updated = slot.get().touched(&info.address, info.last_seen_ms)?;
                slot.insert(updated);
                Ok(InsertOutcome::AlreadyExists)
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredRecord::encode(info)?);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn touch(&self, address: &str, seen_at_ms: u64) -> Result<bool, StoreError> {
        let Some(mut entry) = self.entries.get_mut(address) else {
            return Ok(false);
        };
        let updated = entry.value().touched(address, seen_at_ms)?;
        *entry.value_mut() = updated;
        Ok(true)
    }

    async fn remove(&self, address: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(address).is_some())
    }

    async fn expire_older_than(&self, cutoff_ms: u64) -> Result<Vec<String>, StoreError> {
        let mut expired = Vec::new();
        self.entries.retain(|address, record| {
            let keep = record.last_seen_ms >= cutoff_ms;
            if !keep {
                expired.push(address.clone());
            }
            keep
        });
        Ok(expired)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
