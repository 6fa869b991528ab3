use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub debit: Option<Decimal>,   // money out, never negative
    pub credit: Option<Decimal>,  // money in, never negative
    pub balance: Option<Decimal>, // running balance, any sign
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub upload_batch_id: Uuid,
    pub created_date: DateTime<Utc>,
}

// Once built via new(), a NewTransaction is valid for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    transaction_date: NaiveDate,
    description: String,
    debit: Option<Decimal>,
    credit: Option<Decimal>,
    balance: Option<Decimal>,
    upload_batch_id: Uuid,
    created_date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(
        transaction_date: NaiveDate,
        description: String,
        debit: Option<Decimal>,
        credit: Option<Decimal>,
        balance: Option<Decimal>,
        upload_batch_id: Uuid,
        created_date: DateTime<Utc>,
    ) -> Result<Self, String> {
        if description.trim().is_empty() {
            return Err("Description cannot be empty".to_string());
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(format!("Description cannot exceed {} characters", MAX_DESCRIPTION_LEN));
        }
        if debit.is_some_and(|d| d.is_sign_negative() && !d.is_zero()) {
            return Err("Debit cannot be negative".to_string());
        }
        if credit.is_some_and(|c| c.is_sign_negative() && !c.is_zero()) {
            return Err("Credit cannot be negative".to_string());
        }

        Ok(Self {
            transaction_date,
            description,
            debit,
            credit,
            balance,
            upload_batch_id,
            created_date,
        })
    }

    pub fn transaction_date(&self) -> NaiveDate {
        self.transaction_date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn debit(&self) -> Option<Decimal> {
        self.debit
    }

    pub fn credit(&self) -> Option<Decimal> {
        self.credit
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn upload_batch_id(&self) -> Uuid {
        self.upload_batch_id
    }

    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCreateTransactionRequest {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub category_id: Option<i64>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub category_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub uncategorized: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCategoryRequest {
    pub category_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCategorizeRequest {
    #[serde(default)]
    pub transaction_ids: Vec<i64>,
    pub category_id: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkCategorizeResult {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_new_transaction_valid() {
        let t = NewTransaction::new(
            date(),
            "Coffee".into(),
            Some(Decimal::from_str("3.50").unwrap()),
            None,
            Some(Decimal::from_str("-12.00").unwrap()),
            Uuid::new_v4(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(t.description(), "Coffee");
        assert!(t.balance().unwrap().is_sign_negative());
    }

    #[test]
    fn test_new_transaction_rejects_blank_description() {
        assert!(NewTransaction::new(date(), "  ".into(), None, None, None, Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn test_new_transaction_rejects_negative_amounts() {
        let negative = Some(Decimal::from_str("-1").unwrap());
        assert!(NewTransaction::new(date(), "x".into(), negative, None, None, Uuid::new_v4(), Utc::now()).is_err());
        assert!(NewTransaction::new(date(), "x".into(), None, negative, None, Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn test_filter_defaults() {
        let filter: TransactionFilter = serde_json::from_str("{}").unwrap();
        assert!(!filter.uncategorized);
        assert!(filter.category_id.is_none());
    }
}
