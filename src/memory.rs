//! In-process collaborators: a transaction store, static reference data, a
//! simulated payment gateway and a notifier that writes to the log.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::Amount;
use crate::complaint::Complaint;
use crate::model::{
    PaymentMethod, Transaction, TransactionPatch, TxId, UserId, UserProfile, Utility,
    newest_first,
};
use crate::ports::{
    ComplaintStore, NotificationSender, PaymentOutcome, PaymentResolver, ProfileStore, StoreError,
    StoreResult, TransactionStore, UtilityDirectory,
};

#[derive(Debug, Default)]
struct StoreState {
    /// Insertion order.
    records: Vec<Transaction>,
    keys: HashSet<String>,
}

/// Transaction store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    state: Mutex<StoreState>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record, in insertion order.
    pub fn all(&self) -> Vec<Transaction> {
        self.state.lock().records.clone()
    }

    fn select(&self, filter: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let records = self
            .state
            .lock()
            .records
            .iter()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        newest_first(records)
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, record: Transaction) -> StoreResult<Transaction> {
        let mut state = self.state.lock();
        if let Some(key) = &record.idempotency_key {
            if !state.keys.insert(key.clone()) {
                return Err(StoreError::DuplicateKey(key.clone()));
            }
        }
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: TxId, patch: TransactionPatch) -> StoreResult<Transaction> {
        let mut state = self.state.lock();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if record.is_terminal() {
            return Err(StoreError::Frozen(id));
        }
        record.apply(patch);
        Ok(record.clone())
    }

    async fn get(&self, id: TxId) -> StoreResult<Option<Transaction>> {
        Ok(self
            .state
            .lock()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_by_user(&self, user: &UserId) -> StoreResult<Vec<Transaction>> {
        Ok(self.select(|r| &r.user_id == user))
    }

    async fn search_by_user(&self, user: &UserId, term: &str) -> StoreResult<Vec<Transaction>> {
        Ok(self.select(|r| &r.user_id == user && r.matches(term)))
    }

    async fn list_all(&self) -> StoreResult<Vec<Transaction>> {
        Ok(self.select(|_| true))
    }
}

/// Complaint store held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryComplaintStore {
    complaints: Mutex<Vec<Complaint>>,
}

impl InMemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, filter: impl Fn(&Complaint) -> bool) -> Vec<Complaint> {
        let mut found: Vec<Complaint> = self
            .complaints
            .lock()
            .iter()
            .rev()
            .filter(|c| filter(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }
}

#[async_trait]
impl ComplaintStore for InMemoryComplaintStore {
    async fn insert(&self, complaint: Complaint) -> StoreResult<Complaint> {
        self.complaints.lock().push(complaint.clone());
        Ok(complaint)
    }

    async fn save(&self, complaint: Complaint) -> StoreResult<Complaint> {
        let mut complaints = self.complaints.lock();
        let slot = complaints
            .iter_mut()
            .find(|c| c.id == complaint.id)
            .ok_or(StoreError::ComplaintNotFound(complaint.id))?;
        *slot = complaint.clone();
        Ok(complaint)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Complaint>> {
        Ok(self.complaints.lock().iter().find(|c| c.id == id).cloned())
    }

    async fn list_by_user(&self, user: &UserId) -> StoreResult<Vec<Complaint>> {
        Ok(self.select(|c| &c.user_id == user))
    }

    async fn list_all(&self) -> StoreResult<Vec<Complaint>> {
        Ok(self.select(|_| true))
    }
}

/// Fixed set of user profiles.
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: Vec<UserProfile>,
}

impl StaticProfiles {
    pub fn new(profiles: Vec<UserProfile>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ProfileStore for StaticProfiles {
    async fn profile(&self, user: &UserId) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.iter().find(|p| &p.id == user).cloned())
    }
}

/// Fixed list of utilities, sorted by name.
#[derive(Debug)]
pub struct StaticDirectory {
    utilities: Vec<Utility>,
}

impl StaticDirectory {
    pub fn new(mut utilities: Vec<Utility>) -> Self {
        utilities.sort_by(|a, b| a.name.cmp(&b.name));
        Self { utilities }
    }
}

#[async_trait]
impl UtilityDirectory for StaticDirectory {
    async fn list_all(&self) -> StoreResult<Vec<Utility>> {
        Ok(self.utilities.clone())
    }
}

/// Gateway stand-in approving a configurable share of payments. Wallet payments
/// are collected in-app and always approved.
#[derive(Debug, Clone)]
pub struct SimulatedResolver {
    success_rate: f64,
}

impl SimulatedResolver {
    pub const DEFAULT_SUCCESS_RATE: f64 = 0.9;

    /// Rates outside `0..=1` are clamped; NaN falls back to the default.
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() {
            Self::DEFAULT_SUCCESS_RATE
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self { success_rate }
    }
}

/// `PV{unix-millis}{5 uppercase alphanumerics}`
pub fn payment_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("PV{}{suffix}", Utc::now().timestamp_millis())
}

#[async_trait]
impl PaymentResolver for SimulatedResolver {
    async fn resolve(&self, amount: Amount, method: PaymentMethod) -> PaymentOutcome {
        let approved =
            method == PaymentMethod::Wallet || rand::thread_rng().gen_bool(self.success_rate);
        if approved {
            PaymentOutcome::Approved {
                reference: payment_reference(),
            }
        } else {
            PaymentOutcome::Declined {
                reason: format!("{} payment of {amount} was declined", method.label()),
            }
        }
    }
}

/// Notifier that renders the customer message and logs it.
#[derive(Debug, Default)]
pub struct LogNotifier;

/// SMS/email body for a successful purchase.
pub fn transaction_message(transaction: &Transaction) -> String {
    let token = transaction
        .token
        .as_ref()
        .map(|t| t.formatted())
        .unwrap_or_default();
    format!(
        "PowerVend: Your electricity token purchase was successful!\n\n\
         Token: {token}\n\
         Amount: NGN {}\n\
         DISCO: {}\n\
         Meter: {}\n\
         Date: {}\n\n\
         Thank you for using PowerVend!",
        transaction.amount,
        transaction.utility_name,
        transaction.meter_number,
        transaction.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// SMS/email body for a low wallet balance.
pub fn low_balance_message(balance: Amount) -> String {
    format!(
        "PowerVend: Your wallet balance is low (NGN {balance}).\n\
         Please top up to continue purchasing electricity tokens."
    )
}

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_transaction_notice(
        &self,
        user: &UserProfile,
        transaction: &Transaction,
    ) -> Result<(), String> {
        let message = transaction_message(transaction);
        deliver(user, "PowerVend - Transaction Successful", &message);
        Ok(())
    }

    async fn send_low_balance_notice(
        &self,
        user: &UserProfile,
        balance: Amount,
    ) -> Result<(), String> {
        deliver(user, "PowerVend - Low Balance Alert", &low_balance_message(balance));
        Ok(())
    }
}

fn deliver(user: &UserProfile, subject: &str, message: &str) {
    if let Some(phone) = &user.phone {
        info!(user = %user.id, to = %phone, channel = "sms", "{message}");
    }
    if let Some(email) = &user.email {
        info!(user = %user.id, to = %email, channel = "email", subject, "{message}");
    }
}

/// Transaction store whose calls can be switched to fail or stall.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub(crate) inner: InMemoryTransactionStore,
    inserts_down: std::sync::atomic::AtomicBool,
    updates_down: std::sync::atomic::AtomicBool,
    stalled: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FaultyStore {
    pub(crate) fn inserts_down(self) -> Self {
        self.inserts_down.store(true, std::sync::atomic::Ordering::SeqCst);
        self
    }

    pub(crate) fn set_updates_down(&self, down: bool) {
        self.updates_down.store(down, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn stalled(self) -> Self {
        self.stalled.store(true, std::sync::atomic::Ordering::SeqCst);
        self
    }

    async fn check(&self, down: &std::sync::atomic::AtomicBool) -> StoreResult<()> {
        if self.stalled.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
        if down.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl TransactionStore for FaultyStore {
    async fn insert(&self, record: Transaction) -> StoreResult<Transaction> {
        self.check(&self.inserts_down).await?;
        self.inner.insert(record).await
    }

    async fn update(&self, id: TxId, patch: TransactionPatch) -> StoreResult<Transaction> {
        self.check(&self.updates_down).await?;
        self.inner.update(id, patch).await
    }

    async fn get(&self, id: TxId) -> StoreResult<Option<Transaction>> {
        self.inner.get(id).await
    }

    async fn list_by_user(&self, user: &UserId) -> StoreResult<Vec<Transaction>> {
        self.inner.list_by_user(user).await
    }

    async fn search_by_user(&self, user: &UserId, term: &str) -> StoreResult<Vec<Transaction>> {
        self.inner.search_by_user(user, term).await
    }

    async fn list_all(&self) -> StoreResult<Vec<Transaction>> {
        self.inner.list_all().await
    }
}
