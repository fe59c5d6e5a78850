//! Stored representation of an operator record.

use avs_core::{OperatorInfo, StoreError};

/// An operator record as held by [`MemoryOperatorStore`](super::MemoryOperatorStore).
///
/// The record body is `MsgPack`-encoded (`rmp_serde::to_vec_named`). The
/// last-seen stamp is duplicated outside the body so expiry sweeps and
/// address projections never decode records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub last_seen_ms: u64,
    pub data: Vec<u8>,
}

impl StoredRecord {
    /// Encodes an operator record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the record cannot be serialized.
    pub fn encode(info: &OperatorInfo) -> Result<Self, StoreError> {
        let data = rmp_serde::to_vec_named(info).map_err(|e| StoreError::Corrupt {
            address: info.address.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            last_seen_ms: info.last_seen_ms,
            data,
        })
    }

    /// Decodes the record body.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the body is not a valid record.
    pub fn decode(&self, address: &str) -> Result<OperatorInfo, StoreError> {
        rmp_serde::from_slice(&self.data).map_err(|e| StoreError::Corrupt {
            address: address.to_string(),
            reason: e.to_string(),
        })
    }

    /// Re-encodes the record with a new last-seen stamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the existing body cannot be decoded.
    pub fn touched(&self, address: &str, seen_at_ms: u64) -> Result<Self, StoreError> {
        let mut info = self.decode(address)?;
        info.last_seen_ms = seen_at_ms;
        Self::encode(&info)
    }
}
