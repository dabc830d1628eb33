use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::Amount;
use crate::model::TxStatus;

use super::WalletError;

/// Direction of a wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

/// An append-only wallet log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub direction: Direction,
    pub amount: Amount,
    /// Payment method for credits, purpose for debits.
    pub description: String,
    pub status: TxStatus,
    pub timestamp: DateTime<Utc>,
    pub reference: String,
    /// Reference of the entry this one compensates, for refunds.
    pub linked_reference: Option<String>,
}

impl WalletEntry {
    pub(super) fn new(direction: Direction, amount: Amount, description: String) -> Self {
        let timestamp = Utc::now();
        Self {
            id: Uuid::new_v4(),
            direction,
            amount,
            description,
            status: TxStatus::Success,
            timestamp,
            reference: entry_reference(timestamp),
            linked_reference: None,
        }
    }

    /// Signed effect on the balance.
    pub fn delta(&self) -> Amount {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => Amount::ZERO - self.amount,
        }
    }
}

/// `TXN{unix-millis}{4 digits}`
fn entry_reference(at: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("TXN{}{suffix:04}", at.timestamp_millis())
}

/// Balance plus the log that produced it. Only mutated under the wallet lock.
#[derive(Debug, Default)]
pub struct WalletState {
    pub balance: Amount,
    pub entries: Vec<WalletEntry>,
}

impl WalletState {
    /// Apply and log `entry`. Nothing changes if the balance would overflow.
    pub fn push(&mut self, entry: WalletEntry) -> Result<(), WalletError> {
        self.balance = self
            .balance
            .checked_add(entry.delta())
            .ok_or(WalletError::BalanceOverflow {
                balance: self.balance,
                amount: entry.amount,
            })?;
        self.entries.push(entry);
        Ok(())
    }
}
