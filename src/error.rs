use crate::domain::payment::{PaymentStatus, PaymentView};
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a [`PaymentStore`](crate::domain::ports::PaymentStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("reference `{0}` already exists")]
    DuplicateReference(String),
    #[error("payment {0} not found")]
    NotFound(Uuid),
    #[error("payment {id} already processed: current status is {status}")]
    AlreadyProcessed { id: Uuid, status: PaymentStatus },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the trigger channel, on either the publishing or consuming side.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("no queue bound to exchange `{exchange}` with routing key `{routing_key}`")]
    Unroutable {
        exchange: String,
        routing_key: String,
    },
    #[error("queue `{0}` is not declared")]
    UnknownQueue(String),
    #[error("failed to encode trigger notice: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed trigger notice: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The decision procedure could not reach a verdict right now.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("decision unavailable: {0}")]
    Transient(String),
}

#[derive(Error, Diagnostic, Debug)]
pub enum PaymentError {
    #[error("amount must be greater than zero")]
    #[diagnostic(code(payflow::invalid_amount))]
    InvalidAmount,

    #[error("currency `{0}` is not supported, expected ETB or USD")]
    #[diagnostic(code(payflow::invalid_currency))]
    InvalidCurrency(String),

    #[error("reference is required")]
    #[diagnostic(code(payflow::invalid_reference))]
    InvalidReference,

    #[error("reference `{0}` already exists")]
    #[diagnostic(code(payflow::reference_conflict))]
    ReferenceConflict(String),

    #[error("payment {0} not found")]
    #[diagnostic(code(payflow::not_found))]
    NotFound(Uuid),

    #[error(transparent)]
    #[diagnostic(code(payflow::storage_unavailable))]
    StorageUnavailable(StoreError),

    /// The record is durably `PENDING` but no trigger notice was queued for it.
    #[error("payment {} created but failed to publish trigger notice: {source}", payment.id)]
    #[diagnostic(
        code(payflow::created_but_not_queued),
        help("the payment stays PENDING until it is re-queued")
    )]
    CreatedButNotQueued {
        payment: Box<PaymentView>,
        #[source]
        source: ChannelError,
    },

    #[error("CSV error: {0}")]
    #[diagnostic(code(payflow::csv))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(payflow::io))]
    IoError(#[from] std::io::Error),
}

impl PaymentError {
    /// Validation and conflict errors are the caller's to fix and are never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidAmount
                | PaymentError::InvalidCurrency(_)
                | PaymentError::InvalidReference
                | PaymentError::ReferenceConflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
