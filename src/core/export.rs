//! Spreadsheet export of transaction history.
//!
//! One row per transaction with the columns `Transaction ID, Date, Total, Payment Method,
//! Items`. The header is always written, so an empty export is still a valid sheet.

use crate::{core::transaction::Transaction, errors::Result};
use serde::Serialize;
use std::{fs::File, io::Write, path::Path};
use tracing::info;

/// Column headers, in output order.
pub const HEADERS: [&str; 5] = ["Transaction ID", "Date", "Total", "Payment Method", "Items"];

/// One exported transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    /// Transaction id
    pub id: String,
    /// `dd/MM/yyyy HH:mm`, or `-` when unknown
    pub date: String,
    /// Grand total with two decimals
    pub total: String,
    /// Payment method label
    pub payment_method: String,
    /// `"Name xQty"` entries joined by `", "`
    pub items: String,
}

impl From<&Transaction> for ExportRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id.clone(),
            date: transaction.date_label(),
            total: format!("{:.2}", transaction.grand_total),
            payment_method: transaction.payment_method.label().to_string(),
            items: transaction.items_summary(),
        }
    }
}

/// Converts transactions to export rows, keeping their order.
#[must_use]
pub fn export_rows(transactions: &[Transaction]) -> Vec<ExportRow> {
    transactions.iter().map(ExportRow::from).collect()
}

/// Writes the header and `rows` as CSV, returning the number of data rows written.
///
/// # Errors
/// Returns an error if serializing or flushing fails.
pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    Ok(rows.len())
}

/// Exports `transactions` to a CSV file at `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn export_to_path<P: AsRef<Path>>(path: P, transactions: &[Transaction]) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let written = write_csv(file, &export_rows(transactions))?;
    info!(path = %path.display(), rows = written, "Exported transactions");
    Ok(written)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::cart::PaymentMethod;
    use crate::test_utils::sample_transaction;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_columns() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        let transaction = sample_transaction(
            at,
            PaymentMethod::EWallet,
            &[("Coffee", dec!(5), 2), ("Yoga Mat", dec!(40), 1)],
        );

        let row = ExportRow::from(&transaction);
        assert_eq!(row.id, transaction.id);
        assert_eq!(row.date, transaction.date_label());
        assert_eq!(row.total, "55.00");
        assert_eq!(row.payment_method, "E-Wallet");
        assert_eq!(row.items, "Coffee x2, Yoga Mat x1");
    }

    #[test]
    fn test_write_csv_header_and_quoting() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        let transaction = sample_transaction(
            at,
            PaymentMethod::Cash,
            &[("Coffee", dec!(5), 2), ("Tea", dec!(4), 1)],
        );

        let mut out = Vec::new();
        let written = write_csv(&mut out, &export_rows(&[transaction])).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Transaction ID,Date,Total,Payment Method,Items"
        );
        // The items column contains a comma and must be quoted
        assert!(
            lines.next().unwrap().ends_with(",15.40,Cash,\"Coffee x2, Tea x1\"")
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &[]).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Transaction ID,Date,Total,Payment Method,Items\n"
        );
    }

    #[test]
    fn test_export_to_path_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        let transactions: Vec<Transaction> = (1..=3)
            .map(|i| sample_transaction(at, PaymentMethod::Card, &[("Coffee", dec!(5), i)]))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        assert_eq!(export_to_path(&path, &transactions).unwrap(), 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADERS.to_vec());

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), transactions.len());
        assert_eq!(&records[2][0], transactions[2].id.as_str());
        assert_eq!(&records[2][2], "16.50");
    }
}
