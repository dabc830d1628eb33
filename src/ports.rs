//! Collaborator contracts consumed by the ledgers.
//!
//! Concrete transports live outside this crate; [`crate::memory`] provides
//! in-process implementations.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::Amount;
use crate::complaint::Complaint;
use crate::model::{
    PaymentMethod, Transaction, TransactionPatch, TxId, UserId, UserProfile, Utility,
};

/// Failures of an external store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("transaction {0} not found")]
    NotFound(TxId),

    #[error("duplicate submission for idempotency key {0:?}")]
    DuplicateKey(String),

    #[error("transaction {0} is already settled")]
    Frozen(TxId),

    #[error("complaint {0} not found")]
    ComplaintNotFound(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for transaction records.
///
/// Implementations keep insertion order for records with equal timestamps and
/// reject a second insert carrying an idempotency key already seen.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, record: Transaction) -> StoreResult<Transaction>;

    /// Apply a settlement patch. Updating a terminal record is rejected with
    /// [`StoreError::Frozen`].
    async fn update(&self, id: TxId, patch: TransactionPatch) -> StoreResult<Transaction>;

    async fn get(&self, id: TxId) -> StoreResult<Option<Transaction>>;

    /// Newest-first.
    async fn list_by_user(&self, user: &UserId) -> StoreResult<Vec<Transaction>>;

    /// Newest-first, filtered by [`Transaction::matches`].
    async fn search_by_user(&self, user: &UserId, term: &str) -> StoreResult<Vec<Transaction>>;

    /// Every user's records, newest-first.
    async fn list_all(&self) -> StoreResult<Vec<Transaction>>;
}

/// Persistence for customer complaints.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn insert(&self, complaint: Complaint) -> StoreResult<Complaint>;

    /// Replace the stored complaint with the same id.
    async fn save(&self, complaint: Complaint) -> StoreResult<Complaint>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Complaint>>;

    /// Newest-first.
    async fn list_by_user(&self, user: &UserId) -> StoreResult<Vec<Complaint>>;

    /// Newest-first.
    async fn list_all(&self) -> StoreResult<Vec<Complaint>>;
}

/// Profile lookup for notice delivery.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user: &UserId) -> StoreResult<Option<UserProfile>>;
}

/// Read-only list of utilities that tokens can be bought for.
#[async_trait]
pub trait UtilityDirectory: Send + Sync {
    async fn list_all(&self) -> StoreResult<Vec<Utility>>;
}

/// Result of asking a payment gateway to collect an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

/// Gateway that collects payment. Transport failures surface as `Declined`.
#[async_trait]
pub trait PaymentResolver: Send + Sync {
    async fn resolve(&self, amount: Amount, method: PaymentMethod) -> PaymentOutcome;
}

/// Best-effort customer notices. Callers log failures and carry on.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_transaction_notice(
        &self,
        user: &UserProfile,
        transaction: &Transaction,
    ) -> Result<(), String>;

    async fn send_low_balance_notice(&self, user: &UserProfile, balance: Amount)
    -> Result<(), String>;
}

/// Run a store call with an upper bound on its duration.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout { operation, limit })?
}
