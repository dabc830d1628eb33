//! Transaction ledger.
//!
//! A purchase is recorded as `pending`, then settled exactly once to `success`
//! or `failed` through the payment resolver. The token is minted only on the
//! success branch, so a failed payment never exposes one.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::Amount;
use crate::model::{
    PaymentMethod, PurchaseRequest, Transaction, TransactionPatch, TransactionStats, TxId,
    UserId,
};
use crate::ports::{
    NotificationSender, PaymentOutcome, PaymentResolver, ProfileStore, StoreError,
    TransactionStore, bounded,
};
use crate::token::Token;

mod error;
pub use error::{CreateError, SettlementError, ValidationError};

/// Purchase rules and collaborator time limits.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub minimum: Amount,
    pub store_timeout: Duration,
    pub payment_timeout: Duration,
    pub notify_timeout: Duration,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            minimum: Amount::from_naira(500),
            store_timeout: Duration::from_secs(5),
            payment_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(3),
        }
    }
}

/// Collaborators the ledger is built from.
#[derive(Clone)]
pub struct LedgerDeps {
    pub store: Arc<dyn TransactionStore>,
    pub resolver: Arc<dyn PaymentResolver>,
    pub profiles: Arc<dyn ProfileStore>,
    pub notifier: Arc<dyn NotificationSender>,
}

pub struct TransactionLedger {
    deps: LedgerDeps,
    policy: LedgerPolicy,
    /// Transactions with a settle or fail call currently running.
    in_flight: Mutex<HashSet<TxId>>,
}

/// Removes its id from the in-flight set when dropped, including when the
/// owning future is abandoned mid-call.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TxId>>,
    id: TxId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<TxId>>, id: TxId) -> Result<Self, SettlementError> {
        if !set.lock().insert(id) {
            return Err(SettlementError::InFlight(id));
        }
        Ok(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Public API
impl TransactionLedger {
    pub fn new(deps: LedgerDeps, policy: LedgerPolicy) -> Self {
        Self {
            deps,
            policy,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Check a request against purchase policy without touching the store.
    pub fn validate(&self, request: &PurchaseRequest) -> Result<(), ValidationError> {
        if !request.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(request.amount));
        }
        if request.amount < self.policy.minimum {
            return Err(ValidationError::BelowMinimum {
                amount: request.amount,
                minimum: self.policy.minimum,
            });
        }
        if request.meter_number.trim().is_empty() {
            return Err(ValidationError::EmptyMeterNumber);
        }
        Ok(())
    }

    /// Validate and persist a new `pending` record. No token is assigned yet.
    pub async fn create_pending(
        &self,
        request: PurchaseRequest,
    ) -> Result<Transaction, CreateError> {
        self.validate(&request)?;

        let record = Transaction::pending(request);
        let stored = bounded(
            "insert",
            self.policy.store_timeout,
            self.deps.store.insert(record),
        )
        .await?;

        info!(
            user = %stored.user_id,
            tx = %stored.id,
            amount = %stored.amount,
            method = %stored.payment_method,
            "transaction pending"
        );
        Ok(stored)
    }

    /// Resolve a pending transaction through the payment resolver.
    ///
    /// On approval a token is minted and the record moves to `success`; on decline
    /// it moves to `failed` and [`SettlementError::PaymentFailed`] is returned.
    /// Terminal records are never touched again. If the payment call times out or
    /// this future is dropped, the record stays `pending`.
    pub async fn settle(
        &self,
        id: TxId,
        amount: Amount,
        method: PaymentMethod,
    ) -> Result<Transaction, SettlementError> {
        let result = self.apply_settle(id, amount, method).await;
        Self::log_result("settle", id, amount, &result);
        result
    }

    /// Mark a pending transaction `failed` without contacting the gateway.
    pub async fn fail(&self, id: TxId, reason: &str) -> Result<Transaction, SettlementError> {
        let _guard = InFlight::acquire(&self.in_flight, id)?;
        let record = self.pending_record(id).await?;

        let updated = self.write(record.id, TransactionPatch::failed()).await?;
        warn!(tx = %id, reason, "transaction failed");
        Ok(updated)
    }

    /// Status check, used to reconcile abandoned settlements.
    pub async fn get(&self, id: TxId) -> Result<Option<Transaction>, StoreError> {
        bounded("get", self.policy.store_timeout, self.deps.store.get(id)).await
    }

    /// All transactions of `user`, newest-first.
    pub async fn list_by_user(&self, user: &UserId) -> Result<Vec<Transaction>, StoreError> {
        bounded(
            "list",
            self.policy.store_timeout,
            self.deps.store.list_by_user(user),
        )
        .await
    }

    /// Transactions of `user` whose utility name, meter number or token contains
    /// `term`, ignoring case, newest-first. A blank or absent term lists all.
    pub async fn search(
        &self,
        user: &UserId,
        term: Option<&str>,
    ) -> Result<Vec<Transaction>, StoreError> {
        match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => {
                bounded(
                    "search",
                    self.policy.store_timeout,
                    self.deps.store.search_by_user(user, term),
                )
                .await
            }
            None => self.list_by_user(user).await,
        }
    }

    /// Status counts and money total for one user, or across all users.
    pub async fn stats(&self, user: Option<&UserId>) -> Result<TransactionStats, StoreError> {
        let records = match user {
            Some(user) => self.list_by_user(user).await?,
            None => {
                bounded(
                    "list",
                    self.policy.store_timeout,
                    self.deps.store.list_all(),
                )
                .await?
            }
        };
        Ok(TransactionStats::from_records(&records))
    }
}

/// Private API
impl TransactionLedger {
    fn log_result(
        op: &str,
        tx: TxId,
        amount: Amount,
        result: &Result<Transaction, SettlementError>,
    ) {
        match result {
            Ok(record) => info!(
                tx = %tx,
                amount = %amount,
                status = %record.status,
                "{op} applied"
            ),
            Err(e) => warn!(
                tx = %tx,
                amount = %amount,
                reason = %e,
                "{op} rejected"
            ),
        }
    }

    /// Settlement steps:
    /// - Ensure no other settlement of this id is running
    /// - Ensure the record exists, is pending and matches the request
    /// - Collect payment within the payment time limit
    /// - Write the terminal state, then notify on success
    async fn apply_settle(
        &self,
        id: TxId,
        amount: Amount,
        method: PaymentMethod,
    ) -> Result<Transaction, SettlementError> {
        let _guard = InFlight::acquire(&self.in_flight, id)?;
        let record = self.pending_record(id).await?;

        if record.amount != amount || record.payment_method != method {
            return Err(SettlementError::Mismatch(id));
        }

        let limit = self.policy.payment_timeout;
        let outcome = tokio::time::timeout(limit, self.deps.resolver.resolve(amount, method))
            .await
            .map_err(|_| SettlementError::PaymentTimeout { limit })?;

        match outcome {
            PaymentOutcome::Approved { reference } => {
                let patch = TransactionPatch::success(Token::generate(), reference);
                let updated = self.write(id, patch).await?;
                self.notify(&updated).await;
                Ok(updated)
            }
            PaymentOutcome::Declined { reason } => {
                self.write(id, TransactionPatch::failed()).await?;
                Err(SettlementError::PaymentFailed(reason))
            }
        }
    }

    async fn pending_record(&self, id: TxId) -> Result<Transaction, SettlementError> {
        let record = self.get(id).await?.ok_or(SettlementError::NotFound(id))?;
        if record.is_terminal() {
            return Err(SettlementError::AlreadySettled {
                id,
                status: record.status,
            });
        }
        Ok(record)
    }

    async fn write(&self, id: TxId, patch: TransactionPatch) -> Result<Transaction, StoreError> {
        bounded(
            "update",
            self.policy.store_timeout,
            self.deps.store.update(id, patch),
        )
        .await
    }

    /// Best-effort transaction notice to the owner.
    async fn notify(&self, record: &Transaction) {
        let profile = match bounded(
            "profile",
            self.policy.store_timeout,
            self.deps.profiles.profile(&record.user_id),
        )
        .await
        {
            Ok(Some(profile)) if profile.has_contact() => profile,
            Ok(_) => return,
            Err(e) => {
                warn!(tx = %record.id, reason = %e, "profile lookup failed, notice skipped");
                return;
            }
        };

        let send = self.deps.notifier.send_transaction_notice(&profile, record);
        match tokio::time::timeout(self.policy.notify_timeout, send).await {
            Ok(Ok(())) => info!(tx = %record.id, user = %profile.id, "transaction notice sent"),
            Ok(Err(reason)) => warn!(tx = %record.id, reason = %reason, "transaction notice failed"),
            Err(_) => warn!(tx = %record.id, "transaction notice timed out"),
        }
    }
}
