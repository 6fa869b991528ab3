use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use transactions::service::TransactionError;
use uuid::Uuid;

/// Statement columns the importer understands. Headers match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    TransactionDate,
    Description,
    Debits,
    Credits,
    Balance,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::TransactionDate,
        Column::Description,
        Column::Debits,
        Column::Credits,
        Column::Balance,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::TransactionDate => "Transaction Date",
            Column::Description => "Description",
            Column::Debits => "Debits",
            Column::Credits => "Credits",
            Column::Balance => "Balance",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == header)
    }
}

/// One data row as read, before any interpretation. A column missing from
/// the header, or cut off by a short row, has no entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub line: u64,
    fields: HashMap<Column, String>,
}

impl RawRow {
    pub fn new(line: u64) -> Self {
        Self { line, fields: HashMap::new() }
    }

    pub fn with(mut self, column: Column, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    /// The first occurrence of a column wins.
    pub fn insert(&mut self, column: Column, value: &str) {
        self.fields.entry(column).or_insert_with(|| value.to_string());
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.fields.get(&column).map(String::as_str)
    }
}

/// A row that parsed cleanly but is not yet tied to an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Line {line}: {message}")]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

impl RowError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// The upload itself could not be read as text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StreamError(#[from] pub csv::Error);

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid upload: {0}")]
    InvalidInput(String),
    #[error("Failed to store imported transactions: {0}")]
    Persistence(String),
}

impl From<TransactionError> for ImportError {
    fn from(err: TransactionError) -> Self {
        ImportError::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub total_records: usize,
    pub successful_imports: usize,
    pub failed_imports: usize,
    pub upload_batch_id: Uuid,
    pub errors: Vec<String>,
}
