//! Turns raw statement rows into typed transactions.
//!
//! Only the date can make a row fail. Amounts that cannot be read are
//! treated as absent and an empty description becomes "Unknown".

use crate::models::{Column, NormalizedTransaction, RawRow, RowError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use transactions::models::MAX_DESCRIPTION_LEN;

const DEFAULT_DESCRIPTION: &str = "Unknown";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

pub fn normalize(row: &RawRow) -> Result<NormalizedTransaction, RowError> {
    let raw_date = row.get(Column::TransactionDate).unwrap_or_default();
    let transaction_date = parse_date(raw_date)
        .ok_or_else(|| RowError::new(row.line, format!("Invalid transaction date '{}'", raw_date)))?;

    Ok(NormalizedTransaction {
        transaction_date,
        description: normalize_description(row.get(Column::Description)),
        debit: row.get(Column::Debits).and_then(parse_amount).map(|d| d.abs()),
        credit: row.get(Column::Credits).and_then(parse_amount).map(|c| c.abs()),
        balance: row.get(Column::Balance).and_then(parse_amount),
    })
}

/// Accepts the common statement date layouts. Any time of day is dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// `"$1,234.56"` is 1234.56, `"50.00-"` and `"(50.00)"` are -50.00.
/// Blank or unreadable text gives `None`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let mut s = cleaned.trim();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest.trim_end();
    } else if let Some(rest) = s.strip_suffix('+') {
        s = rest.trim_end();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.trim_start();
    }

    // a second sign means the text was malformed
    if s.is_empty() || s.starts_with(['-', '+']) {
        return None;
    }

    let value = Decimal::from_str(s).ok()?;
    Some(if negative { -value } else { value })
}

fn normalize_description(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(d) if !d.is_empty() => d.chars().take(MAX_DESCRIPTION_LEN).collect(),
        _ => DEFAULT_DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date: &str) -> RawRow {
        RawRow::new(2).with(Column::TransactionDate, date)
    }

    #[test]
    fn test_parse_amount_strips_currency_and_grouping() {
        assert_eq!(parse_amount("$1,234.56"), Some(money("1234.56")));
        assert_eq!(parse_amount(" 42 "), Some(money("42")));
    }

    #[test]
    fn test_parse_amount_signs() {
        assert_eq!(parse_amount("-50.00"), Some(money("-50.00")));
        assert_eq!(parse_amount("50.00-"), Some(money("-50.00")));
        assert_eq!(parse_amount("-$50.00"), Some(money("-50.00")));
        assert_eq!(parse_amount("(12.00)"), Some(money("-12.00")));
        assert_eq!(parse_amount("+7.5"), Some(money("7.5")));
    }

    #[test]
    fn test_parse_amount_unreadable_is_absent() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("--5"), None);
        assert_eq!(parse_amount("$"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("01/15/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024/01/15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("15 Jan 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("January 15, 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("01/15/2024 3:45 PM"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 23:59:59"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T10:00:00+02:00"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("02/30/2024"), None);
    }

    #[test]
    fn test_debit_and_credit_are_absolute_balance_keeps_sign() {
        let raw = row("2024-01-15")
            .with(Column::Debits, "-50.00")
            .with(Column::Credits, "-50.00")
            .with(Column::Balance, "-50.00");

        let t = normalize(&raw).unwrap();
        assert_eq!(t.debit, Some(money("50.00")));
        assert_eq!(t.credit, Some(money("50.00")));
        assert_eq!(t.balance, Some(money("-50.00")));
    }

    #[test]
    fn test_blank_amounts_are_absent() {
        let raw = row("2024-01-15").with(Column::Debits, "").with(Column::Credits, "n/a");
        let t = normalize(&raw).unwrap();
        assert_eq!(t.debit, None);
        assert_eq!(t.credit, None);
        assert_eq!(t.balance, None);
    }

    #[test]
    fn test_description_defaults_and_truncates() {
        assert_eq!(normalize(&row("2024-01-15")).unwrap().description, "Unknown");
        let blank = row("2024-01-15").with(Column::Description, "  ");
        assert_eq!(normalize(&blank).unwrap().description, "Unknown");

        let long = "x".repeat(MAX_DESCRIPTION_LEN + 20);
        let raw = row("2024-01-15").with(Column::Description, &long);
        assert_eq!(normalize(&raw).unwrap().description.chars().count(), MAX_DESCRIPTION_LEN);
    }

    #[test]
    fn test_bad_date_cites_line() {
        let raw = RawRow::new(7).with(Column::TransactionDate, "yesterday");
        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(err.to_string(), "Line 7: Invalid transaction date 'yesterday'");

        let missing = RawRow::new(3);
        assert_eq!(
            normalize(&missing).unwrap_err().to_string(),
            "Line 3: Invalid transaction date ''"
        );
    }
}
