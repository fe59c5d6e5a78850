//! Hand-written fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use avs_core::{
    AvsDirectory, ChainError, InsertOutcome, OperatorInfo, OperatorStore, ReceiptStatus,
    ReceiptWatcher, SignatureWithSaltAndExpiry, StoreError, Task, TransactOpts,
    TransactionHandle, TransactionReceipt, Transport, TransportError,
};

/// Canonical address whose last byte is `n`.
pub(crate) fn addr(n: u8) -> String {
    format!("0x{n:040x}")
}

/// Store whose every call fails with `Unavailable`.
pub(crate) struct UnavailableStore;

impl UnavailableStore {
    fn err() -> StoreError {
        StoreError::Unavailable("store down".to_string())
    }
}

#[async_trait]
impl OperatorStore for UnavailableStore {
    async fn get(&self, _address: &str) -> Result<Option<OperatorInfo>, StoreError> {
        Err(Self::err())
    }
    async fn get_all(&self) -> Result<Vec<OperatorInfo>, StoreError> {
        Err(Self::err())
    }
    async fn addresses(&self) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }
    async fn insert_if_absent(&self, _info: &OperatorInfo) -> Result<InsertOutcome, StoreError> {
        Err(Self::err())
    }
    async fn refresh_or_insert(&self, _info: &OperatorInfo) -> Result<InsertOutcome, StoreError> {
        Err(Self::err())
    }
    async fn touch(&self, _address: &str, _seen_at_ms: u64) -> Result<bool, StoreError> {
        Err(Self::err())
    }
    async fn remove(&self, _address: &str) -> Result<bool, StoreError> {
        Err(Self::err())
    }
    async fn expire_older_than(&self, _cutoff_ms: u64) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(Self::err())
    }
}

/// Transport that records every endpoint it is asked to reach.
///
/// Endpoints can be scripted to fail or to sleep; a gated transport parks
/// every send until [`RecordingTransport::open`] is called.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    gate: Option<Semaphore>,
    waiting: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub(crate) fn fail(&self, endpoint: &str) {
        self.failing.lock().insert(endpoint.to_string());
    }

    pub(crate) fn delay(&self, endpoint: &str, by: Duration) {
        self.delays.lock().insert(endpoint.to_string(), by);
    }

    pub(crate) fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Number of sends that have started.
    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn sent_to(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, endpoint: &str, _task: &Task) -> Result<(), TransportError> {
        self.sent.lock().push(endpoint.to_string());
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        let delay = self.delays.lock().get(endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().contains(endpoint) {
            return Err(TransportError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Scripted on-chain directory.
///
/// Submissions signed by anyone other than `authorized_signer` fail with
/// `InvalidSigner`. Every accepted submission is remembered.
pub(crate) struct ScriptedDirectory {
    pub(crate) authorized_signer: String,
    pub(crate) submitted: Mutex<Vec<String>>,
    nonce: AtomicU64,
}

impl ScriptedDirectory {
    pub(crate) fn new(authorized_signer: impl Into<String>) -> Self {
        Self {
            authorized_signer: authorized_signer.into(),
            submitted: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
        }
    }

    fn submit(&self, opts: &TransactOpts, call: String) -> Result<TransactionHandle, ChainError> {
        if opts.from != self.authorized_signer {
            return Err(ChainError::InvalidSigner(opts.from.clone()));
        }
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().push(call);
        Ok(TransactionHandle {
            hash: format!("0x{nonce:064x}"),
            nonce,
        })
    }
}

#[async_trait]
impl AvsDirectory for ScriptedDirectory {
    async fn register_operator_to_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
        signature: &SignatureWithSaltAndExpiry,
    ) -> Result<TransactionHandle, ChainError> {
        if signature.signature.is_empty() {
            return Err(ChainError::InvalidSignature("empty signature".to_string()));
        }
        self.submit(opts, format!("register:{operator}"))
    }

    async fn deregister_operator_from_avs(
        &self,
        opts: &TransactOpts,
        operator: &str,
    ) -> Result<TransactionHandle, ChainError> {
        self.submit(opts, format!("deregister:{operator}"))
    }

    async fn update_avs_metadata_uri(
        &self,
        opts: &TransactOpts,
        metadata_uri: &str,
    ) -> Result<TransactionHandle, ChainError> {
        self.submit(opts, format!("metadata:{metadata_uri}"))
    }
}

/// Receipt source that confirms everything except scripted hashes.
#[derive(Default)]
pub(crate) struct ScriptedWatcher {
    reverted: Mutex<HashSet<String>>,
    hang: bool,
}

impl ScriptedWatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A watcher that never produces a receipt.
    pub(crate) fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub(crate) fn revert(&self, hash: &str) {
        self.reverted.lock().insert(hash.to_string());
    }
}

#[async_trait]
impl ReceiptWatcher for ScriptedWatcher {
    async fn wait_for_receipt(
        &self,
        handle: &TransactionHandle,
    ) -> Result<TransactionReceipt, ChainError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        let status = if self.reverted.lock().contains(&handle.hash) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        Ok(TransactionReceipt {
            hash: handle.hash.clone(),
            block_number: 100 + handle.nonce,
            status,
        })
    }
}
