use crate::models::{BulkCategorizeResult, NewTransaction, RawCreateTransactionRequest, Transaction, TransactionFilter};
use crate::repository::TransactionRepository;
use categories::service::{CategoryError, CategoryService};
use chrono::Utc;
use database::{Database, RepositoryError};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Infrastructure(String),
    #[error("{0}")]
    NotFound(String),
}

impl From<RepositoryError> for TransactionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => TransactionError::NotFound("Transaction not found".into()),
            RepositoryError::CheckViolation(msg) => TransactionError::InvalidInput(msg),
            RepositoryError::ForeignKeyViolation(msg) => TransactionError::InvalidInput(msg),
            RepositoryError::Infrastructure(e) => TransactionError::Infrastructure(e.to_string()),
            _ => TransactionError::Infrastructure(err.to_string()),
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    /// Persists one statement upload atomically. Either every row is stored or
    /// none is.
    #[instrument(skip(db, batch), fields(rows = batch.len()))]
    pub async fn add_batch(db: &Database, batch: &[NewTransaction]) -> Result<usize, TransactionError> {
        let mut uow = db.begin().await?;
        let ids = TransactionRepository::new(uow.connection()).add_range(batch).await?;
        uow.commit().await?;

        tracing::info!(stored = ids.len(), "Stored transaction batch");
        Ok(ids.len())
    }

    #[instrument(skip(db, raw))]
    pub async fn create_transaction(
        db: &Database,
        raw: RawCreateTransactionRequest,
    ) -> Result<Transaction, TransactionError> {
        if let Some(category_id) = raw.category_id {
            Self::ensure_category(db, category_id).await?;
        }

        let req = NewTransaction::new(
            raw.transaction_date,
            raw.description.trim().to_string(),
            raw.debit,
            raw.credit,
            raw.balance,
            Uuid::new_v4(),
            Utc::now(),
        )
        .map_err(TransactionError::InvalidInput)?;

        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let id = repo.create(&req, raw.category_id).await?;
        let transaction = repo.find_by_id(id).await?
            .ok_or_else(|| not_found(id))?;

        uow.commit().await?;
        Ok(transaction)
    }

    #[instrument(skip(db))]
    pub async fn get_transaction(db: &Database, id: i64) -> Result<Transaction, TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let transaction = repo.find_by_id(id).await?
            .ok_or_else(|| not_found(id))?;

        Ok(transaction)
    }

    /// A category filter wins over a date range; `uncategorized` narrows
    /// whichever listing was chosen.
    #[instrument(skip(db))]
    pub async fn list_transactions(
        db: &Database,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let mut transactions = match (filter.category_id, filter.start_date, filter.end_date) {
            (Some(category_id), _, _) => repo.list_by_category(category_id).await?,
            (None, Some(start), Some(end)) => {
                if start > end {
                    return Err(TransactionError::InvalidInput(
                        "startDate must not be after endDate".into(),
                    ));
                }
                repo.list_by_date_range(start, end).await?
            }
            _ => repo.list_all().await?,
        };

        if filter.uncategorized {
            transactions.retain(|t| t.category_id.is_none());
        }

        Ok(transactions)
    }

    #[instrument(skip(db))]
    pub async fn delete_transaction(db: &Database, id: i64) -> Result<(), TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        repo.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => not_found(id),
            other => other.into(),
        })?;

        uow.commit().await?;
        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn assign_category(
        db: &Database,
        id: i64,
        category_id: i64,
    ) -> Result<Transaction, TransactionError> {
        Self::ensure_category(db, category_id).await?;
        Self::set_category(db, id, Some(category_id)).await
    }

    #[instrument(skip(db))]
    pub async fn remove_category(db: &Database, id: i64) -> Result<Transaction, TransactionError> {
        Self::set_category(db, id, None).await
    }

    /// Assigns one category to many transactions in a single unit of work.
    /// Unknown ids are reported back rather than aborting the rest.
    #[instrument(skip(db, ids), fields(count = ids.len()))]
    pub async fn bulk_categorize(
        db: &Database,
        ids: &[i64],
        category_id: i64,
    ) -> Result<BulkCategorizeResult, TransactionError> {
        if ids.is_empty() {
            return Err(TransactionError::InvalidInput("No transaction IDs provided".into()));
        }
        Self::ensure_category(db, category_id).await?;

        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let mut result = BulkCategorizeResult { processed: 0, failed: 0, errors: Vec::new() };
        for &id in ids {
            match repo.set_category(id, Some(category_id)).await {
                Ok(()) => result.processed += 1,
                Err(RepositoryError::NotFound) => {
                    result.failed += 1;
                    result.errors.push(format!("Transaction ID {} not found", id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        uow.commit().await?;

        tracing::info!(processed = result.processed, failed = result.failed, "Bulk categorized");
        Ok(result)
    }

    #[instrument(skip(db))]
    pub async fn list_batch(db: &Database, upload_batch_id: Uuid) -> Result<Vec<Transaction>, TransactionError> {
        let mut uow = db.begin().await?;
        let transactions = TransactionRepository::new(uow.connection())
            .list_by_batch(upload_batch_id)
            .await?;
        Ok(transactions)
    }

    /// Removes everything one upload stored. Returns how many rows went.
    #[instrument(skip(db))]
    pub async fn rollback_batch(db: &Database, upload_batch_id: Uuid) -> Result<u64, TransactionError> {
        let mut uow = db.begin().await?;
        let removed = TransactionRepository::new(uow.connection())
            .delete_batch(upload_batch_id)
            .await?;

        if removed == 0 {
            return Err(TransactionError::NotFound(format!(
                "Upload batch {} not found",
                upload_batch_id
            )));
        }

        uow.commit().await?;

        tracing::info!(removed, "Rolled back upload batch");
        Ok(removed)
    }

    /// Debit totals keyed `"YYYY-MM - Category"` for one year.
    #[instrument(skip(db))]
    pub async fn monthly_summary(db: &Database, year: i32) -> Result<BTreeMap<String, Decimal>, TransactionError> {
        let mut uow = db.begin().await?;
        let transactions = TransactionRepository::new(uow.connection())
            .list_categorized_debits(year)
            .await?;

        summarize_by_month(&transactions)
    }

    async fn set_category(
        db: &Database,
        id: i64,
        category_id: Option<i64>,
    ) -> Result<Transaction, TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        repo.set_category(id, category_id).await.map_err(|e| match e {
            RepositoryError::NotFound => not_found(id),
            other => other.into(),
        })?;
        let transaction = repo.find_by_id(id).await?
            .ok_or_else(|| not_found(id))?;

        uow.commit().await?;
        Ok(transaction)
    }

    async fn ensure_category(db: &Database, category_id: i64) -> Result<(), TransactionError> {
        CategoryService::get_category(db, category_id)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                CategoryError::NotFound => {
                    TransactionError::NotFound(format!("Category with ID {} not found", category_id))
                }
                other => {
                    tracing::error!("Failed to look up category: {:?}", other);
                    TransactionError::Infrastructure(other.to_string())
                }
            })
    }
}

fn not_found(id: i64) -> TransactionError {
    TransactionError::NotFound(format!("Transaction with ID {} not found", id))
}

fn summarize_by_month(transactions: &[Transaction]) -> Result<BTreeMap<String, Decimal>, TransactionError> {
    let mut summary: BTreeMap<String, Decimal> = BTreeMap::new();
    for t in transactions {
        let (Some(debit), Some(name)) = (t.debit, t.category_name.as_deref()) else {
            continue;
        };
        let key = format!("{} - {}", t.transaction_date.format("%Y-%m"), name);
        let total = summary.entry(key).or_insert(Decimal::ZERO);
        *total = total.checked_add(debit).ok_or_else(|| {
            TransactionError::Infrastructure(format!("monthly total overflowed adding {}", debit))
        })?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use categories::ledger::CategoryLedger;
    use chrono::NaiveDate;
    use database::get_test_db;
    use std::str::FromStr;

    fn money(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn raw(date: &str, description: &str, debit: Option<&str>, category_id: Option<i64>) -> RawCreateTransactionRequest {
        RawCreateTransactionRequest {
            transaction_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: description.to_string(),
            debit: debit.map(money),
            credit: None,
            balance: None,
            category_id,
        }
    }

    fn statement_row(date: &str, description: &str, debit: &str, batch: Uuid) -> NewTransaction {
        NewTransaction::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description.to_string(),
            Some(money(debit)),
            None,
            None,
            batch,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_is_not_found() {
        let db = get_test_db().await;
        let err = TransactionService::create_transaction(&db, raw("2024-01-01", "Lunch", Some("9.00"), Some(5))).await;
        assert!(matches!(err, Err(TransactionError::NotFound(msg)) if msg == "Category with ID 5 not found"));
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Food".into(), None).await.unwrap();

        let created = TransactionService::create_transaction(&db, raw("2024-01-01", " Lunch ", Some("9.00"), Some(cat.id)))
            .await
            .unwrap();
        assert_eq!(created.description, "Lunch");
        assert_eq!(created.category_name, Some("Food".to_string()));

        let fetched = TransactionService::get_transaction(&db, created.id).await.unwrap();
        assert_eq!(fetched, created);

        let missing = TransactionService::get_transaction(&db, 999).await;
        assert!(matches!(missing, Err(TransactionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_batch_shares_batch_id() {
        let db = get_test_db().await;
        let batch = Uuid::new_v4();
        let stored = TransactionService::add_batch(
            &db,
            &[statement_row("2024-01-01", "A", "1.00", batch), statement_row("2024-01-02", "B", "2.00", batch)],
        )
        .await
        .unwrap();
        assert_eq!(stored, 2);

        let listed = TransactionService::list_batch(&db, batch).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|t| t.upload_batch_id == batch));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Travel".into(), None).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-01-10", "Train", Some("30"), Some(cat.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-02-10", "Bus", Some("3"), None)).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-03-10", "Cab", Some("12"), None)).await.unwrap();

        let by_category = TransactionFilter { category_id: Some(cat.id), ..Default::default() };
        let list = TransactionService::list_transactions(&db, &by_category).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].description, "Train");

        let by_range = TransactionFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 28),
            ..Default::default()
        };
        assert_eq!(TransactionService::list_transactions(&db, &by_range).await.unwrap().len(), 2);

        let uncategorized_in_range = TransactionFilter { uncategorized: true, ..by_range };
        let list = TransactionService::list_transactions(&db, &uncategorized_in_range).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].description, "Bus");

        let inverted = TransactionFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(matches!(
            TransactionService::list_transactions(&db, &inverted).await,
            Err(TransactionError::InvalidInput(_))
        ));

        let all = TransactionService::list_transactions(&db, &TransactionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "Cab");
    }

    #[tokio::test]
    async fn test_assign_and_remove_category() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Bills".into(), None).await.unwrap();
        let t = TransactionService::create_transaction(&db, raw("2024-01-01", "Power", Some("80"), None)).await.unwrap();

        let assigned = TransactionService::assign_category(&db, t.id, cat.id).await.unwrap();
        assert_eq!(assigned.category_id, Some(cat.id));
        assert_eq!(assigned.category_name, Some("Bills".to_string()));

        let missing_category = TransactionService::assign_category(&db, t.id, 777).await;
        assert!(matches!(missing_category, Err(TransactionError::NotFound(_))));

        let missing_tx = TransactionService::assign_category(&db, 555, cat.id).await;
        assert!(matches!(missing_tx, Err(TransactionError::NotFound(msg)) if msg == "Transaction with ID 555 not found"));

        let cleared = TransactionService::remove_category(&db, t.id).await.unwrap();
        assert_eq!(cleared.category_id, None);
        assert_eq!(cleared.category_name, None);
    }

    #[tokio::test]
    async fn test_bulk_categorize_reports_missing_ids() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Shopping".into(), None).await.unwrap();
        let a = TransactionService::create_transaction(&db, raw("2024-01-01", "A", Some("1"), None)).await.unwrap();
        let b = TransactionService::create_transaction(&db, raw("2024-01-02", "B", Some("2"), None)).await.unwrap();

        let result = TransactionService::bulk_categorize(&db, &[a.id, 404, b.id], cat.id).await.unwrap();
        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors, vec!["Transaction ID 404 not found".to_string()]);

        let list = TransactionService::list_transactions(
            &db,
            &TransactionFilter { category_id: Some(cat.id), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(list.len(), 2);

        let empty = TransactionService::bulk_categorize(&db, &[], cat.id).await;
        assert!(matches!(empty, Err(TransactionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_rollback_batch() {
        let db = get_test_db().await;
        let batch = Uuid::new_v4();
        let keep = Uuid::new_v4();
        TransactionService::add_batch(&db, &[statement_row("2024-01-01", "A", "1", batch), statement_row("2024-01-02", "B", "1", batch)])
            .await
            .unwrap();
        TransactionService::add_batch(&db, &[statement_row("2024-01-03", "C", "1", keep)]).await.unwrap();

        assert_eq!(TransactionService::rollback_batch(&db, batch).await.unwrap(), 2);
        assert!(TransactionService::list_batch(&db, batch).await.unwrap().is_empty());
        assert_eq!(TransactionService::list_batch(&db, keep).await.unwrap().len(), 1);

        let again = TransactionService::rollback_batch(&db, batch).await;
        assert!(matches!(again, Err(TransactionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_monthly_summary_keys() {
        let db = get_test_db().await;
        let food = CategoryService::create_category(&db, "Food".into(), None).await.unwrap();
        let fuel = CategoryService::create_category(&db, "Fuel".into(), None).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-01-03", "Deli", Some("10.50"), Some(food.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-01-20", "Cafe", Some("4.50"), Some(food.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-02-01", "Shell", Some("40"), Some(fuel.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2023-12-31", "Old", Some("99"), Some(food.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-01-05", "Loose", Some("7"), None)).await.unwrap();

        let summary = TransactionService::monthly_summary(&db, 2024).await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["2024-01 - Food"], money("15.00"));
        assert_eq!(summary["2024-02 - Fuel"], money("40"));
    }

    #[tokio::test]
    async fn test_assignment_drives_category_spending() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Groceries".into(), None).await.unwrap();
        let t = TransactionService::create_transaction(&db, raw("2024-05-01", "Market", Some("42.10"), None))
            .await
            .unwrap();
        assert_eq!(CategoryLedger::total_spending(&db, cat.id).await.unwrap(), Decimal::ZERO);

        TransactionService::assign_category(&db, t.id, cat.id).await.unwrap();
        assert_eq!(CategoryLedger::total_spending(&db, cat.id).await.unwrap(), money("42.10"));

        TransactionService::remove_category(&db, t.id).await.unwrap();
        assert_eq!(CategoryLedger::total_spending(&db, cat.id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_monthly_summary_overflow_is_an_error() {
        let db = get_test_db().await;
        let cat = CategoryService::create_category(&db, "Estates".into(), None).await.unwrap();
        let max = Decimal::MAX.to_string();
        TransactionService::create_transaction(&db, raw("2024-06-01", "Manor", Some(max.as_str()), Some(cat.id))).await.unwrap();
        TransactionService::create_transaction(&db, raw("2024-06-02", "Castle", Some(max.as_str()), Some(cat.id))).await.unwrap();

        let result = TransactionService::monthly_summary(&db, 2024).await;
        assert!(matches!(result, Err(TransactionError::Infrastructure(_))));
    }
}
