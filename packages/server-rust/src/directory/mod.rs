//! On-chain registration boundary.
//!
//! [`DirectoryBridge`] submits AVS directory transactions and waits for their
//! receipts. Only a confirmed, successful transaction yields a
//! [`DirectoryEvent`]; the [`MembershipReconciler`] turns those events into
//! registry mutations. The bridge shares no lock with the registry or the
//! broadcaster.

pub mod reconciler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use avs_core::{
    canonical_address, validate_endpoint, AvsDirectory, ChainError, OperatorInfo, ReceiptWatcher,
    SignatureWithSaltAndExpiry, TransactOpts, TransactionHandle, TransactionReceipt,
};
use tracing::{info, warn};

use crate::config::duration_ms;

pub use reconciler::MembershipReconciler;

/// A confirmed membership change observed on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    Registered {
        operator: OperatorInfo,
        receipt: TransactionReceipt,
    },
    Deregistered {
        address: String,
        receipt: TransactionReceipt,
    },
}

impl DirectoryEvent {
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Registered { operator, .. } => &operator.address,
            Self::Deregistered { address, .. } => address,
        }
    }
}

/// Submits directory transactions and awaits their confirmation.
pub struct DirectoryBridge {
    directory: Arc<dyn AvsDirectory>,
    watcher: Arc<dyn ReceiptWatcher>,
    confirmation_timeout: Duration,
}

impl fmt::Debug for DirectoryBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryBridge")
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

impl DirectoryBridge {
    #[must_use]
    pub fn new(
        directory: Arc<dyn AvsDirectory>,
        watcher: Arc<dyn ReceiptWatcher>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            watcher,
            confirmation_timeout,
        }
    }

    /// Submits a registration. The handle does not imply inclusion.
    ///
    /// # Errors
    ///
    /// [`ChainError::InvalidAddress`] for a malformed operator address (nothing
    /// is submitted), otherwise whatever the directory reports.
    pub async fn register_operator_to_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
        signature: &SignatureWithSaltAndExpiry,
    ) -> Result<TransactionHandle, ChainError> {
        let operator = checked_address(operator)?;
        let handle = self
            .directory
            .register_operator_to_avs(opts, &operator, signature)
            .await
            .inspect_err(|err| warn!(%operator, error = %err, "registration submission failed"))?;
        info!(%operator, tx = %handle.hash, nonce = handle.nonce, "registration submitted");
        Ok(handle)
    }

    /// Submits a deregistration. The handle does not imply inclusion.
    ///
    /// # Errors
    ///
    /// [`ChainError::InvalidAddress`] for a malformed operator address (nothing
    /// is submitted), otherwise whatever the directory reports.
    pub async fn deregister_operator_from_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
    ) -> Result<TransactionHandle, ChainError> {
        let operator = checked_address(operator)?;
        let handle = self
            .directory
            .deregister_operator_from_avs(opts, &operator)
            .await
            .inspect_err(|err| warn!(%operator, error = %err, "deregistration submission failed"))?;
        info!(%operator, tx = %handle.hash, nonce = handle.nonce, "deregistration submitted");
        Ok(handle)
    }

    /// Submits a metadata URI update.
    ///
    /// # Errors
    ///
    /// Whatever the directory reports.
    pub async fn update_avs_metadata_uri(
        &self,
        opts: &TransactOpts,
        metadata_uri: &str,
    ) -> Result<TransactionHandle, ChainError> {
        let handle = self
            .directory
            .update_avs_metadata_uri(opts, metadata_uri)
            .await
            .inspect_err(|err| warn!(metadata_uri, error = %err, "metadata update failed"))?;
        info!(metadata_uri, tx = %handle.hash, "metadata update submitted");
        Ok(handle)
    }

    /// Waits for a receipt and rejects reverted transactions.
    ///
    /// # Errors
    ///
    /// - [`ChainError::ConfirmationTimeout`] if no receipt arrives in time
    /// - [`ChainError::Reverted`] if the transaction reverted
    /// - any error from the receipt watcher
    pub async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
    ) -> Result<TransactionReceipt, ChainError> {
        let receipt =
            tokio::time::timeout(self.confirmation_timeout, self.watcher.wait_for_receipt(handle))
                .await
                .map_err(|_elapsed| ChainError::ConfirmationTimeout {
                    hash: handle.hash.clone(),
                    timeout_ms: duration_ms(self.confirmation_timeout),
                })??;

        if !receipt.succeeded() {
            warn!(tx = %receipt.hash, block = receipt.block_number, "transaction reverted");
            return Err(ChainError::Reverted {
                hash: receipt.hash,
                reason: "receipt status reverted".to_string(),
            });
        }
        info!(tx = %receipt.hash, block = receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }

    /// Registers an operator on-chain and waits for confirmation.
    ///
    /// The record is checked against the registry's rules before anything is
    /// submitted, so a confirmed registration is always one the registry
    /// accepts. `last_seen_ms` is not checked; the reconciler stamps it. The
    /// returned event carries `operator` with its address canonicalized.
    ///
    /// # Errors
    ///
    /// - [`ChainError::InvalidAddress`] or [`ChainError::InvalidOperator`]
    ///   before submission
    /// - any submission or confirmation [`ChainError`]; no event is produced
    pub async fn register_operator(
        &self,
        opts: &TransactOpts,
        mut operator: OperatorInfo,
        signature: &SignatureWithSaltAndExpiry,
    ) -> Result<DirectoryEvent, ChainError> {
        operator.address = checked_address(&operator.address)?;
        validate_endpoint(&operator.address, &operator.endpoint).map_err(|err| {
            warn!(operator = %operator.address, error = %err, "registration refused before submission");
            ChainError::InvalidOperator(err)
        })?;

        let handle = self
            .register_operator_to_avs(opts, &operator.address, signature)
            .await?;
        let receipt = self.await_confirmation(&handle).await?;
        Ok(DirectoryEvent::Registered { operator, receipt })
    }

    /// Deregisters an operator on-chain and waits for confirmation.
    ///
    /// # Errors
    ///
    /// Any submission or confirmation [`ChainError`]; no event is produced.
    pub async fn deregister_operator(
        &self,
        opts: &TransactOpts,
        address: &str,
    ) -> Result<DirectoryEvent, ChainError> {
        let handle = self.deregister_operator_from_avs(opts, address).await?;
        let receipt = self.await_confirmation(&handle).await?;
        Ok(DirectoryEvent::Deregistered {
            address: checked_address(address)?,
            receipt,
        })
    }
}

fn checked_address(raw: &str) -> Result<String, ChainError> {
    canonical_address(raw).map_err(|_| ChainError::InvalidAddress(raw.to_string()))
}
