//! Call types for the on-chain AVS directory boundary.
//!
//! These describe what is submitted and what comes back; signing, gas
//! estimation and broadcasting belong to the [`AvsDirectory`] implementation.
//!
//! [`AvsDirectory`]: crate::traits::AvsDirectory

use serde::{Deserialize, Serialize};

/// Transaction options: who signs and how the transaction is priced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactOpts {
    /// Signer address.
    pub from: String,
    /// Explicit nonce; `None` lets the implementation pick the pending nonce.
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price_wei: Option<u128>,
}

impl TransactOpts {
    #[must_use]
    pub fn from_signer(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }
}

/// Operator's registration signature, salted and time-limited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureWithSaltAndExpiry {
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub salt: [u8; 32],
    /// Unix seconds after which the signature is rejected on-chain.
    pub expiry: u64,
}

/// Handle to a submitted, not-yet-confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHandle {
    pub hash: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Inclusion result for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub hash: String,
    pub block_number: u64,
    pub status: ReceiptStatus,
}

impl TransactionReceipt {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}
