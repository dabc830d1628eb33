pub mod amount;
pub mod complaint;
pub mod config;
pub mod csv;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod ports;
pub mod token;
pub mod vendor;
pub mod wallet;

pub use amount::Amount;
pub use ledger::TransactionLedger;
pub use model::{PaymentMethod, Transaction, TxId, TxStatus, UserId};
pub use token::Token;
pub use vendor::{PurchaseOrder, VendError, Vendor};
pub use wallet::Wallet;
