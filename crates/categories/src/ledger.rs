//! Per-category spending figures.
//!
//! Nothing here is cached: every figure is recomputed from the transactions
//! currently assigned to the category, so reassignment or deletion can never
//! leave a stale total behind. Spending means money out, so only debits count.

use crate::models::{CategorySpending, MonthlySpending};
use crate::repository::CategoryRepository;
use crate::service::CategoryError;
use chrono::{Datelike, NaiveDate};
use database::{self, Database, RepositoryError};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::instrument;

/// The two columns of a transaction the ledger cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub category_id: i64,
    pub transaction_date: NaiveDate,
    pub debit: Option<Decimal>,
}

#[derive(FromRow)]
struct LedgerRecord {
    category_id: i64,
    transaction_date: NaiveDate,
    debit: Option<String>,
}

impl TryFrom<LedgerRecord> for LedgerEntry {
    type Error = RepositoryError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        let debit = record
            .debit
            .map(|d| Decimal::from_str(&d).map_err(|e| RepositoryError::Corrupt(format!("debit '{}': {}", d, e))))
            .transpose()?;

        Ok(LedgerEntry {
            category_id: record.category_id,
            transaction_date: record.transaction_date,
            debit,
        })
    }
}

pub(crate) struct LedgerRepository<'a> {
    conn: &'a mut database::Connection,
}

impl<'a> LedgerRepository<'a> {
    pub fn new(conn: &'a mut database::Connection) -> Self {
        Self { conn }
    }

    pub async fn entries_for_category(&mut self, category_id: i64) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let records = sqlx::query_as::<_, LedgerRecord>(
            "SELECT category_id, transaction_date, debit FROM transactions WHERE category_id = $1 ORDER BY transaction_date",
        )
        .bind(category_id)
        .fetch_all(&mut *self.conn)
        .await?;

        records.into_iter().map(LedgerEntry::try_from).collect()
    }

    pub async fn categorized_entries(&mut self) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let records = sqlx::query_as::<_, LedgerRecord>(
            "SELECT category_id, transaction_date, debit FROM transactions WHERE category_id IS NOT NULL",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        records.into_iter().map(LedgerEntry::try_from).collect()
    }
}

fn checked_sum(total: Decimal, amount: Decimal) -> Result<Decimal, CategoryError> {
    total.checked_add(amount).ok_or_else(|| {
        CategoryError::Infrastructure(format!("spending total overflowed adding {}", amount))
    })
}

pub fn total_spending(entries: &[LedgerEntry]) -> Result<Decimal, CategoryError> {
    entries
        .iter()
        .filter_map(|e| e.debit)
        .try_fold(Decimal::ZERO, checked_sum)
}

/// Month number (1-12) to spending within `year`. Months without a single
/// debit are absent rather than zero.
pub fn monthly_spending(entries: &[LedgerEntry], year: i32) -> Result<BTreeMap<u32, MonthlySpending>, CategoryError> {
    let mut months: BTreeMap<u32, MonthlySpending> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.transaction_date.year() == year) {
        let Some(debit) = entry.debit else { continue };
        let month = entry.transaction_date.month();

        let slot = months.entry(month).or_insert_with(|| MonthlySpending {
            year,
            month,
            month_name: month_name(month),
            total_spending: Decimal::ZERO,
            transaction_count: 0,
        });
        slot.total_spending = checked_sum(slot.total_spending, debit)?;
        slot.transaction_count += 1;
    }

    Ok(months)
}

/// (transaction count, debit total) per category id.
pub fn totals_by_category(entries: &[LedgerEntry]) -> Result<HashMap<i64, (i64, Decimal)>, CategoryError> {
    let mut totals: HashMap<i64, (i64, Decimal)> = HashMap::new();
    for entry in entries {
        let slot = totals.entry(entry.category_id).or_insert((0, Decimal::ZERO));
        slot.0 += 1;
        if let Some(debit) = entry.debit {
            slot.1 = checked_sum(slot.1, debit)?;
        }
    }
    Ok(totals)
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}

pub struct CategoryLedger;

impl CategoryLedger {
    #[instrument(skip(db))]
    pub async fn total_spending(db: &Database, category_id: i64) -> Result<Decimal, CategoryError> {
        let mut uow = db.begin().await?;
        let entries = Self::load_entries(&mut uow, category_id).await?;
        total_spending(&entries)
    }

    #[instrument(skip(db))]
    pub async fn monthly_spending(
        db: &Database,
        category_id: i64,
        year: i32,
    ) -> Result<BTreeMap<u32, MonthlySpending>, CategoryError> {
        let mut uow = db.begin().await?;
        let entries = Self::load_entries(&mut uow, category_id).await?;
        monthly_spending(&entries, year)
    }

    /// Total, count and month-by-month breakdown of one category for `year`.
    #[instrument(skip(db))]
    pub async fn spending_report(
        db: &Database,
        category_id: i64,
        year: i32,
    ) -> Result<CategorySpending, CategoryError> {
        let mut uow = db.begin().await?;

        let category = CategoryRepository::new(uow.connection())
            .find_by_id(category_id)
            .await?
            .ok_or(CategoryError::NotFound)?;

        let entries = LedgerRepository::new(uow.connection())
            .entries_for_category(category_id)
            .await?;

        Ok(CategorySpending {
            category_id: category.id,
            category_name: category.name,
            total_spending: total_spending(&entries)?,
            transaction_count: entries.len() as i64,
            monthly_breakdown: monthly_spending(&entries, year)?.into_values().collect(),
        })
    }

    async fn load_entries(
        uow: &mut database::UnitOfWork<'_>,
        category_id: i64,
    ) -> Result<Vec<LedgerEntry>, CategoryError> {
        let exists = CategoryRepository::new(uow.connection())
            .find_by_id(category_id)
            .await?
            .is_some();
        if !exists {
            return Err(CategoryError::NotFound);
        }

        let entries = LedgerRepository::new(uow.connection())
            .entries_for_category(category_id)
            .await?;
        Ok(entries)
    }
}
