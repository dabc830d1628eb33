//! Core domain types for token vending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Amount;
use crate::ledger::ValidationError;
use crate::token::{self, Token};

/// Owning user identifier, as issued by the auth store.
pub type UserId = String;

/// Transaction identifier.
pub type TxId = Uuid;

/// How a purchase is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Ussd,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Ussd => "ussd",
            PaymentMethod::Wallet => "wallet",
        }
    }

    /// Human label used as wallet counterparty.
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card Payment",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Ussd => "USSD",
            PaymentMethod::Wallet => "Wallet",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    /// Accepts the canonical names and the labels shown in the purchase form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "card" | "cardpayment" => Ok(PaymentMethod::Card),
            "banktransfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            "ussd" => Ok(PaymentMethod::Ussd),
            "wallet" => Ok(PaymentMethod::Wallet),
            _ => Err(ValidationError::UnknownPaymentMethod(s.to_string())),
        }
    }
}

/// Lifecycle of a purchase: `Pending` then exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
        })
    }
}

/// An electricity distribution company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utility {
    pub id: String,
    pub name: String,
}

/// Contact details used for notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    pub fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// A validated-on-entry purchase request.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub utility: Utility,
    pub meter_number: String,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    /// Client-side key deduplicating double submissions.
    pub idempotency_key: Option<String>,
}

/// A stored token purchase attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub user_id: UserId,
    pub utility_id: String,
    pub utility_name: String,
    pub meter_number: String,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub status: TxStatus,
    /// Minted only when the purchase settles successfully.
    pub token: Option<Token>,
    pub payment_reference: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new record in the `Pending` state.
    pub fn pending(request: PurchaseRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            utility_id: request.utility.id,
            utility_name: request.utility.name,
            meter_number: request.meter_number,
            amount: request.amount,
            payment_method: request.payment_method,
            status: TxStatus::Pending,
            token: None,
            payment_reference: None,
            idempotency_key: request.idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Case-insensitive substring match over utility name, meter number and token.
    /// A blank term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        if self.utility_name.to_lowercase().contains(&term)
            || self.meter_number.to_lowercase().contains(&term)
        {
            return true;
        }
        let bare = token::normalize(&term);
        self.token.as_ref().is_some_and(|t| {
            t.formatted().contains(&term) || (!bare.is_empty() && t.digits().contains(&bare))
        })
    }

    pub fn apply(&mut self, patch: TransactionPatch) {
        self.status = patch.status;
        if patch.token.is_some() {
            self.token = patch.token;
        }
        if patch.payment_reference.is_some() {
            self.payment_reference = patch.payment_reference;
        }
        self.updated_at = patch.updated_at;
    }
}

/// Settlement outcome written back to the store.
#[derive(Debug, Clone)]
pub struct TransactionPatch {
    pub status: TxStatus,
    pub token: Option<Token>,
    pub payment_reference: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionPatch {
    pub fn success(token: Token, payment_reference: String) -> Self {
        Self {
            status: TxStatus::Success,
            token: Some(token),
            payment_reference: Some(payment_reference),
            updated_at: Utc::now(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TxStatus::Failed,
            token: None,
            payment_reference: None,
            updated_at: Utc::now(),
        }
    }
}

/// Sort newest-first, keeping insertion order among equal timestamps reversed.
pub fn newest_first(mut records: Vec<Transaction>) -> Vec<Transaction> {
    records.reverse();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

/// Status counts and money total over a set of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TransactionStats {
    pub total: usize,
    pub pending: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sum over every record, whatever its status.
    pub total_amount: Amount,
}

impl TransactionStats {
    pub fn from_records(records: &[Transaction]) -> Self {
        records.iter().fold(Self::default(), |mut stats, tx| {
            stats.total += 1;
            match tx.status {
                TxStatus::Pending => stats.pending += 1,
                TxStatus::Success => stats.successful += 1,
                TxStatus::Failed => stats.failed += 1,
            }
            stats.total_amount = stats.total_amount.saturating_add(tx.amount);
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(utility: &str, meter: &str) -> PurchaseRequest {
        PurchaseRequest {
            user_id: "user-1".to_string(),
            utility: Utility {
                id: utility.to_lowercase(),
                name: utility.to_string(),
            },
            meter_number: meter.to_string(),
            amount: Amount::from_naira(1000),
            payment_method: PaymentMethod::Card,
            idempotency_key: None,
        }
    }

    #[test]
    fn payment_method_parses_names_and_labels() {
        assert_eq!("card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!(
            "Card Payment".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Card
        );
        assert_eq!(
            "bank-transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert_eq!(
            "Bank Transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert_eq!("USSD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Ussd);
        assert_eq!(
            "Wallet".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Wallet
        );
    }

    #[test]
    fn payment_method_rejects_unknown() {
        assert!(matches!(
            "crypto".parse::<PaymentMethod>(),
            Err(ValidationError::UnknownPaymentMethod(m)) if m == "crypto"
        ));
    }

    #[test]
    fn pending_record_has_no_token() {
        let tx = Transaction::pending(request("Eko Electric", "45012345678"));
        assert_eq!(tx.status, TxStatus::Pending);
        assert!(tx.token.is_none());
        assert!(tx.payment_reference.is_none());
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn terminal_states() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(TxStatus::Success.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert_eq!(TxStatus::default(), TxStatus::Pending);
    }

    #[test]
    fn matches_utility_and_meter_case_insensitive() {
        let tx = Transaction::pending(request("Eko Electric", "45012345678"));
        assert!(tx.matches("eko"));
        assert!(tx.matches("ELECTRIC"));
        assert!(tx.matches("0123"));
        assert!(tx.matches("  "));
        assert!(!tx.matches("ikeja"));
    }

    #[test]
    fn matches_token_formatted_or_bare() {
        let mut tx = Transaction::pending(request("Ikeja Electric", "1"));
        let token: Token = "1234-5678-9012-3456-7890".parse().unwrap();
        tx.apply(TransactionPatch::success(token, "PV1".to_string()));

        assert!(tx.matches("5678-9012"));
        assert!(tx.matches("56789012"));
        assert!(!tx.matches("9999"));
    }

    #[test]
    fn apply_failed_patch_keeps_token_absent() {
        let mut tx = Transaction::pending(request("Eko Electric", "1"));
        tx.apply(TransactionPatch::failed());
        assert_eq!(tx.status, TxStatus::Failed);
        assert!(tx.token.is_none());
    }

    #[test]
    fn stats_count_each_status() {
        let pending = Transaction::pending(request("Eko Electric", "1"));
        let mut success = Transaction::pending(request("Eko Electric", "2"));
        success.apply(TransactionPatch::success(Token::generate(), "PV1".to_string()));
        let mut failed = Transaction::pending(request("Ikeja Electric", "3"));
        failed.apply(TransactionPatch::failed());

        let stats = TransactionStats::from_records(&[pending, success, failed]);
        assert_eq!(
            stats,
            TransactionStats {
                total: 3,
                pending: 1,
                successful: 1,
                failed: 1,
                total_amount: Amount::from_naira(3_000),
            }
        );
        assert_eq!(TransactionStats::from_records(&[]), TransactionStats::default());
    }
}
