use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::Amount;
use crate::model::{PaymentMethod, Transaction, UserId};
use crate::vendor::PurchaseOrder;

/// Errors that can occur when reading purchase rows or writing records
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush csv: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    user: UserId,
    utility: String,
    meter: String,
    amount: f64,
    method: String,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    user: &'a str,
    utility: &'a str,
    meter: &'a str,
    amount: String,
    method: &'a str,
    status: String,
    token: String,
    reference: &'a str,
}

/// Read purchase orders from a csv file with header
/// `user,utility,meter,amount,method[,key]`
pub fn read_purchases(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<PurchaseOrder, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let payment_method: PaymentMethod =
                row.method.parse().map_err(|e: crate::ledger::ValidationError| {
                    CsvError::InvalidRow {
                        line,
                        reason: e.to_string(),
                    }
                })?;
            let amount = Amount::from_float(row.amount).ok_or_else(|| CsvError::InvalidRow {
                line,
                reason: format!("amount {} is not a representable amount", row.amount),
            })?;
            Ok(PurchaseOrder {
                user_id: row.user,
                utility: row.utility,
                meter_number: row.meter,
                amount,
                payment_method,
                idempotency_key: row.key.filter(|k| !k.is_empty()),
            })
        }))
}

/// Write transaction records in csv format
pub fn write_transactions<'a, W: io::Write>(
    writer: W,
    records: impl IntoIterator<Item = &'a Transaction>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for record in records {
        let row = OutputRow {
            user: &record.user_id,
            utility: &record.utility_name,
            meter: &record.meter_number,
            amount: record.amount.to_string(),
            method: record.payment_method.as_str(),
            status: record.status.to_string(),
            token: record
                .token
                .as_ref()
                .map(|t| t.formatted())
                .unwrap_or_default(),
            reference: record.payment_reference.as_deref().unwrap_or_default(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PurchaseRequest, TransactionPatch, Utility};
    use crate::token::Token;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read(content: &str) -> Vec<Result<PurchaseOrder, CsvError>> {
        let file = write_csv(content);
        read_purchases(file.path()).unwrap().collect()
    }

    #[test]
    fn read_purchase() {
        let results = read(
            "user,utility,meter,amount,method,key\n\
             user-1,ekedc,45012345678,5000,wallet,k-1\n",
        );
        assert_eq!(results.len(), 1);

        let order = results.into_iter().next().unwrap().unwrap();
        assert_eq!(order.user_id, "user-1");
        assert_eq!(order.utility, "ekedc");
        assert_eq!(order.meter_number, "45012345678");
        assert_eq!(order.amount, Amount::from_naira(5_000));
        assert_eq!(order.payment_method, PaymentMethod::Wallet);
        assert_eq!(order.idempotency_key.as_deref(), Some("k-1"));
    }

    #[test]
    fn read_without_key_column() {
        let results = read("user,utility,meter,amount,method\nu,Ikeja Electric,1,750.5,Card Payment\n");
        let order = results.into_iter().next().unwrap().unwrap();
        assert_eq!(order.amount, Amount::from_scaled(75_050));
        assert_eq!(order.payment_method, PaymentMethod::Card);
        assert_eq!(order.idempotency_key, None);
    }

    #[test]
    fn read_with_whitespace() {
        let results = read("user, utility, meter, amount, method\nu, ekedc, 1, 1000, ussd\n");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_method() {
        let results = read("user,utility,meter,amount,method\nu,ekedc,1,1000,crypto\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::InvalidRow { line: 2, .. }));
        assert!(err.to_string().contains("unrecognized payment method"));
    }

    #[test]
    fn read_returns_error_for_bad_amount() {
        let results = read("user,utility,meter,amount,method\nu,ekedc,1,lots,card\n");
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::Parse { line: 2, .. }
        ));
    }

    #[test]
    fn read_returns_error_for_unrepresentable_amount() {
        let results = read(
            "user,utility,meter,amount,method\n\
             u,ekedc,1,1e17,card\n\
             u,ekedc,1,inf,card\n\
             u,ekedc,1,1000,card\n",
        );
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::InvalidRow { line: 2, .. }
        ));
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CsvError::InvalidRow { line: 3, .. }
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn read_missing_file_is_open_error() {
        assert!(matches!(
            read_purchases("/no/such/purchases.csv"),
            Err(CsvError::Open { .. })
        ));
    }

    #[test]
    fn write_settled_and_pending_records() {
        let mut settled = Transaction::pending(PurchaseRequest {
            user_id: "u".to_string(),
            utility: Utility {
                id: "ekedc".to_string(),
                name: "Eko Electric".to_string(),
            },
            meter_number: "0101".to_string(),
            amount: Amount::from_naira(5_000),
            payment_method: PaymentMethod::BankTransfer,
            idempotency_key: None,
        });
        let pending = settled.clone();
        let token: Token = "1234-5678-9012-3456-7890".parse().unwrap();
        settled.apply(TransactionPatch::success(token, "PV42".to_string()));

        let mut out = Vec::new();
        write_transactions(&mut out, [&settled, &pending]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "user,utility,meter,amount,method,status,token,reference"
        );
        assert_eq!(
            lines[1],
            "u,Eko Electric,0101,5000.00,bank_transfer,success,1234-5678-9012-3456-7890,PV42"
        );
        assert_eq!(lines[2], "u,Eko Electric,0101,5000.00,bank_transfer,pending,,");
    }
}
