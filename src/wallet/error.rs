//! Error types for wallet operations.

use thiserror::Error;

use crate::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("insufficient wallet balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Amount, requested: Amount },

    #[error("crediting {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: Amount, amount: Amount },
}
