//! CSV statement import
//!
//! Bank CSV exports use localized, inconsistently capitalized header rows.
//! Headers are normalized through a case-insensitive lookup table into
//! canonical field names, then each data row is turned into a
//! [`Transaction`]. Rows missing a date, amount or merchant are dropped;
//! a file that yields zero valid rows is an error.

use csv::ReaderBuilder;
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionKind};
use crate::parse::{parse_flexible_amount, parse_flexible_date, REPORTING_CURRENCY};

/// Canonical field a CSV column maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Amount,
    Merchant,
    Description,
    Currency,
}

/// Localized header variants (Romanian and English) for each canonical field
const HEADER_ALIASES: &[(&str, Field)] = &[
    ("data", Field::Date),
    ("data tranzactiei", Field::Date),
    ("data tranzacției", Field::Date),
    ("date", Field::Date),
    ("transaction date", Field::Date),
    ("suma", Field::Amount),
    ("valoare", Field::Amount),
    ("amount", Field::Amount),
    ("debit", Field::Amount),
    ("beneficiar", Field::Merchant),
    ("comerciant", Field::Merchant),
    ("merchant", Field::Merchant),
    ("payee", Field::Merchant),
    ("nume beneficiar", Field::Merchant),
    ("descriere", Field::Description),
    ("detalii", Field::Description),
    ("description", Field::Description),
    ("details", Field::Description),
    ("moneda", Field::Currency),
    ("currency", Field::Currency),
];

fn canonical_field(header: &str) -> Option<Field> {
    let needle = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == needle)
        .map(|(_, field)| *field)
}

/// Parse an uploaded CSV statement into transactions.
///
/// The merchant column is required; when only a description column exists it
/// doubles as the merchant source. Returns [`Error::NoTransactions`] when no
/// row survives.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut columns: Vec<Option<Field>> = headers.iter().map(canonical_field).collect();

    if !columns.contains(&Some(Field::Date)) || !columns.contains(&Some(Field::Amount)) {
        return Err(Error::InvalidInput(format!(
            "unrecognized CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }
    // No dedicated merchant column: promote the description column
    if !columns.contains(&Some(Field::Merchant)) {
        for slot in columns.iter_mut() {
            if *slot == Some(Field::Description) {
                *slot = Some(Field::Merchant);
                break;
            }
        }
    }

    let mut transactions = Vec::new();
    let mut dropped = 0usize;

    for record in rdr.records() {
        let record = record?;

        let mut date = None;
        let mut amount = None;
        let mut merchant: Option<String> = None;
        let mut description: Option<String> = None;
        let mut currency: Option<String> = None;

        for (i, field) in columns.iter().enumerate() {
            let Some(value) = record.get(i).map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            match field {
                Some(Field::Date) => date = parse_flexible_date(value),
                Some(Field::Amount) => amount = parse_flexible_amount(value),
                Some(Field::Merchant) => merchant = Some(value.to_string()),
                Some(Field::Description) => description = Some(value.to_string()),
                Some(Field::Currency) => currency = Some(value.to_uppercase()),
                None => {}
            }
        }

        let (Some(date), Some((amount, sign)), Some(merchant)) = (date, amount, merchant) else {
            dropped += 1;
            continue;
        };

        transactions.push(Transaction {
            date,
            amount,
            currency: currency.unwrap_or_else(|| REPORTING_CURRENCY.to_string()),
            description: description.unwrap_or_else(|| merchant.clone()),
            beneficiary: merchant,
            kind: sign.unwrap_or(TransactionKind::Debit),
        });
    }

    debug!(
        imported = transactions.len(),
        dropped, "parsed CSV statement"
    );

    if transactions.is_empty() {
        return Err(Error::NoTransactions(
            "no row in the CSV produced a valid transaction".to_string(),
        ));
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_csv_english_headers() {
        let csv = "Date,Amount,Merchant,Description\n\
                   01.03.2024,45.00,NETFLIX.COM,subscription\n\
                   01.04.2024,45.00,NETFLIX.COM,subscription";
        let txs = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(txs[0].amount, 45.0);
        assert_eq!(txs[0].beneficiary, "NETFLIX.COM");
    }

    #[test]
    fn test_parse_csv_romanian_headers() {
        let csv = "Data,Suma,Beneficiar,Descriere\n\
                   15.03.2024,19.99,SPOTIFY AB,abonament muzica";
        let txs = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].beneficiary, "SPOTIFY AB");
        assert_eq!(txs[0].description, "abonament muzica");
    }

    #[test]
    fn test_parse_csv_description_doubles_as_merchant() {
        let csv = "Date,Amount,Description\n\
                   01.03.2024,45.00,NETFLIX.COM";
        let txs = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].beneficiary, "NETFLIX.COM");
    }

    #[test]
    fn test_parse_csv_negative_amount_is_debit() {
        let csv = "Date,Amount,Merchant\n\
                   01.03.2024,-45.00,NETFLIX.COM\n\
                   02.03.2024,+100.00,SALARY";
        let txs = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].kind, TransactionKind::Debit);
        assert_eq!(txs[1].kind, TransactionKind::Credit);
        assert_eq!(txs[0].amount, 45.0);
    }

    #[test]
    fn test_parse_csv_drops_incomplete_rows() {
        let csv = "Date,Amount,Merchant\n\
                   01.03.2024,45.00,NETFLIX.COM\n\
                   ,45.00,MISSING DATE\n\
                   01.04.2024,,MISSING AMOUNT";
        let txs = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[test]
    fn test_parse_csv_unknown_header_is_invalid_input() {
        let csv = "Foo,Bar,Baz\n1,2,3";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_parse_csv_zero_valid_rows_is_error() {
        let csv = "Date,Amount,Merchant\n\
                   not-a-date,nope,";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::NoTransactions(_)));
        assert_eq!(err.code(), "no_transactions");
    }
}
