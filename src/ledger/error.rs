//! Error types for the transaction ledger.

use std::time::Duration;
use thiserror::Error;

use crate::Amount;
use crate::model::{PaymentMethod, TxId, TxStatus};
use crate::ports::StoreError;

/// A purchase request outside policy. Never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("amount {amount} is below the minimum purchase of {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    #[error("unrecognized payment method {0:?}")]
    UnknownPaymentMethod(String),

    #[error("meter number is required")]
    EmptyMeterNumber,

    #[error("unknown utility {0:?}")]
    UnknownUtility(String),

    #[error("{0} cannot be used to top up a wallet")]
    UnsupportedTopUpMethod(PaymentMethod),
}

/// Failure to resolve a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("transaction {id} is already {status}")]
    AlreadySettled { id: TxId, status: TxStatus },

    #[error("transaction {0} is already being settled")]
    InFlight(TxId),

    #[error("transaction {0} not found")]
    NotFound(TxId),

    #[error("settlement details do not match transaction {0}")]
    Mismatch(TxId),

    #[error("payment timed out after {limit:?}")]
    PaymentTimeout { limit: Duration },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to record a new pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("invalid purchase: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
