//! Stored-value wallet.
//!
//! The balance and its log sit behind one lock, so every credit and debit is a
//! single read-modify-write: the balance never goes negative and always equals
//! credits minus debits.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::Amount;
use crate::model::UserId;

mod state;
pub use state::{Direction, WalletEntry, WalletState};

mod error;
pub use error::WalletError;

pub struct Wallet {
    owner: UserId,
    state: Mutex<WalletState>,
}

/// Public API
impl Wallet {
    pub fn new(owner: impl Into<UserId>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Wallet seeded with an opening credit, so the log still explains the balance.
    pub fn with_balance(owner: impl Into<UserId>, opening: Amount) -> Self {
        let wallet = Self::new(owner);
        if opening.is_positive() {
            let result = wallet.apply_credit(opening, "Opening balance".to_string(), None);
            wallet.log_result("opening", opening, &result);
        }
        wallet
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Add funds.
    pub fn credit(
        &self,
        amount: Amount,
        method: impl Into<String>,
    ) -> Result<WalletEntry, WalletError> {
        let result = self.apply_credit(amount, method.into(), None);
        self.log_result("credit", amount, &result);
        result
    }

    /// Remove funds; rejected whole if the balance cannot cover `amount`.
    pub fn debit(
        &self,
        amount: Amount,
        description: impl Into<String>,
    ) -> Result<WalletEntry, WalletError> {
        let result = self.apply_debit(amount, description.into());
        self.log_result("debit", amount, &result);
        result
    }

    /// Credit back a debit, linking the new entry to the one it compensates.
    pub fn refund(&self, debit: &WalletEntry) -> Result<WalletEntry, WalletError> {
        let result = self.apply_credit(
            debit.amount,
            format!("Refund of {}", debit.reference),
            Some(debit.reference.clone()),
        );
        self.log_result("refund", debit.amount, &result);
        result
    }

    pub fn balance(&self) -> Amount {
        self.state.lock().balance
    }

    /// Newest-first.
    pub fn history(&self) -> Vec<WalletEntry> {
        self.state.lock().entries.iter().rev().cloned().collect()
    }
}

/// Private API
impl Wallet {
    fn log_result(&self, op: &str, amount: Amount, result: &Result<WalletEntry, WalletError>) {
        match result {
            Ok(entry) => info!(
                user = %self.owner,
                amount = %amount,
                reference = %entry.reference,
                "wallet {op} applied"
            ),
            Err(e) => warn!(
                user = %self.owner,
                amount = %amount,
                reason = %e,
                "wallet {op} rejected"
            ),
        }
    }

    fn apply_credit(
        &self,
        amount: Amount,
        description: String,
        linked_reference: Option<String>,
    ) -> Result<WalletEntry, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut entry = WalletEntry::new(Direction::Credit, amount, description);
        entry.linked_reference = linked_reference;

        self.state.lock().push(entry.clone())?;
        Ok(entry)
    }

    fn apply_debit(&self, amount: Amount, description: String) -> Result<WalletEntry, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut state = self.state.lock();
        if state.balance < amount {
            return Err(WalletError::InsufficientBalance {
                available: state.balance,
                requested: amount,
            });
        }

        let entry = WalletEntry::new(Direction::Debit, amount, description);
        state.push(entry.clone())?;
        Ok(entry)
    }
}
