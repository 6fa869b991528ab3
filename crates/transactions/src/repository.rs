use crate::models::{NewTransaction, Transaction};
use chrono::{DateTime, NaiveDate, Utc};
use database::{self, RepositoryError};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

const SELECT_TRANSACTIONS: &str = "SELECT t.id, t.transaction_date, t.description, t.debit, t.credit, t.balance, t.category_id, c.name AS category_name, t.upload_batch_id, t.created_date FROM transactions t LEFT JOIN categories c ON c.id = t.category_id";

const NEWEST_FIRST: &str = "ORDER BY t.transaction_date DESC, t.id DESC";

#[derive(FromRow)]
struct TransactionRecord {
    id: i64,
    transaction_date: NaiveDate,
    description: String,
    debit: Option<String>,
    credit: Option<String>,
    balance: Option<String>,
    category_id: Option<i64>,
    category_name: Option<String>,
    upload_batch_id: String,
    created_date: DateTime<Utc>,
}

fn decode_amount(column: &str, raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    raw.map(|s| {
        Decimal::from_str(&s).map_err(|e| RepositoryError::Corrupt(format!("{} '{}': {}", column, s, e)))
    })
    .transpose()
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = RepositoryError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let upload_batch_id = Uuid::parse_str(&record.upload_batch_id)
            .map_err(|e| RepositoryError::Corrupt(format!("upload_batch_id '{}': {}", record.upload_batch_id, e)))?;

        Ok(Transaction {
            id: record.id,
            transaction_date: record.transaction_date,
            description: record.description,
            debit: decode_amount("debit", record.debit)?,
            credit: decode_amount("credit", record.credit)?,
            balance: decode_amount("balance", record.balance)?,
            category_id: record.category_id,
            category_name: record.category_name,
            upload_batch_id,
            created_date: record.created_date,
        })
    }
}

fn into_transactions(records: Vec<TransactionRecord>) -> Result<Vec<Transaction>, RepositoryError> {
    records.into_iter().map(Transaction::try_from).collect()
}

pub(crate) struct TransactionRepository<'a> {
    conn: &'a mut database::Connection,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(conn: &'a mut database::Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&mut self, req: &NewTransaction, category_id: Option<i64>) -> Result<i64, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO transactions (transaction_date, description, debit, credit, balance, category_id, upload_batch_id, created_date) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(req.transaction_date())
        .bind(req.description())
        .bind(req.debit().map(|d| d.to_string()))
        .bind(req.credit().map(|c| c.to_string()))
        .bind(req.balance().map(|b| b.to_string()))
        .bind(category_id)
        .bind(req.upload_batch_id().to_string())
        .bind(req.created_date())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(id)
    }

    /// Inserts every row on the current connection; atomicity comes from the
    /// surrounding unit of work.
    pub async fn add_range(&mut self, batch: &[NewTransaction]) -> Result<Vec<i64>, RepositoryError> {
        let mut ids = Vec::with_capacity(batch.len());
        for req in batch {
            ids.push(self.create(req, None).await?);
        }
        Ok(ids)
    }

    pub async fn find_by_id(&mut self, id: i64) -> Result<Option<Transaction>, RepositoryError> {
        let record = sqlx::query_as::<_, TransactionRecord>(&format!("{} WHERE t.id = $1", SELECT_TRANSACTIONS))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        record.map(Transaction::try_from).transpose()
    }

    pub async fn list_all(&mut self) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!("{} {}", SELECT_TRANSACTIONS, NEWEST_FIRST))
            .fetch_all(&mut *self.conn)
            .await?;

        into_transactions(records)
    }

    pub async fn list_by_category(&mut self, category_id: i64) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            "{} WHERE t.category_id = $1 {}",
            SELECT_TRANSACTIONS, NEWEST_FIRST
        ))
        .bind(category_id)
        .fetch_all(&mut *self.conn)
        .await?;

        into_transactions(records)
    }

    /// Both bounds inclusive.
    pub async fn list_by_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            "{} WHERE t.transaction_date >= $1 AND t.transaction_date <= $2 {}",
            SELECT_TRANSACTIONS, NEWEST_FIRST
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.conn)
        .await?;

        into_transactions(records)
    }

    pub async fn list_by_batch(&mut self, upload_batch_id: Uuid) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            "{} WHERE t.upload_batch_id = $1 {}",
            SELECT_TRANSACTIONS, NEWEST_FIRST
        ))
        .bind(upload_batch_id.to_string())
        .fetch_all(&mut *self.conn)
        .await?;

        into_transactions(records)
    }

    /// Categorized transactions with a debit, dated within `year`.
    pub async fn list_categorized_debits(&mut self, year: i32) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            "{} WHERE strftime('%Y', t.transaction_date) = $1 AND t.debit IS NOT NULL AND t.category_id IS NOT NULL {}",
            SELECT_TRANSACTIONS, NEWEST_FIRST
        ))
        .bind(format!("{:04}", year))
        .fetch_all(&mut *self.conn)
        .await?;

        into_transactions(records)
    }

    pub async fn set_category(&mut self, id: i64, category_id: Option<i64>) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE transactions SET category_id = $1 WHERE id = $2")
            .bind(category_id)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_batch(&mut self, upload_batch_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM transactions WHERE upload_batch_id = $1")
            .bind(upload_batch_id.to_string())
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
