//! AVS core: operator and task types, error taxonomy, and the collaborator
//! contracts (store, transport, policy, metrics sink, AVS directory).

pub mod chain;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;
pub mod validation;

pub use chain::{
    ReceiptStatus, SignatureWithSaltAndExpiry, TransactOpts, TransactionHandle,
    TransactionReceipt,
};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{
    ChainError, RegistryError, StoreError, TransportError, TransportErrorKind, ValidationError,
};
pub use metrics::{DeliveryOutcome, DeliveryRecord, TaskSummary};
pub use traits::{
    AvsDirectory, InsertOutcome, MetricsSink, OperatorStore, Policy, PolicyDecision,
    ReceiptWatcher, Transport,
};
pub use types::{OperatorInfo, Task, TaskMetadata};
pub use validation::{
    canonical_address, validate_address, validate_endpoint, validate_operator, validate_task,
};
