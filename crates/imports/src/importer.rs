use crate::models::{ImportError, ImportOutcome, RowError, StreamError};
use crate::normalizer;
use crate::reader::RecordReader;
use chrono::{DateTime, Utc};
use database::Database;
use std::io::Read;
use tracing::instrument;
use transactions::models::NewTransaction;
use transactions::service::TransactionService;
use uuid::Uuid;

/// Rows of one upload, split into what will be stored and what was rejected.
#[derive(Debug, Default)]
pub struct ImportFold {
    pub total_records: usize,
    pub transactions: Vec<NewTransaction>,
    pub errors: Vec<RowError>,
    pub stream_error: Option<StreamError>,
}

impl ImportFold {
    fn push_row(&mut self, result: Result<NewTransaction, RowError>) {
        self.total_records += 1;
        match result {
            Ok(transaction) => self.transactions.push(transaction),
            Err(e) => self.errors.push(e),
        }
    }

    fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(RowError::to_string).collect()
    }
}

/// Reads and normalizes every row, stamping the successes with one batch id
/// and one creation time. Stops at the first stream error.
pub fn fold_rows<R: Read>(source: R, upload_batch_id: Uuid, created_date: DateTime<Utc>) -> ImportFold {
    let mut fold = ImportFold::default();

    let reader = match RecordReader::new(source) {
        Ok(reader) => reader,
        Err(e) => {
            fold.stream_error = Some(e);
            return fold;
        }
    };

    for row in reader {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                fold.stream_error = Some(e);
                break;
            }
        };

        let line = row.line;
        let result = normalizer::normalize(&row).and_then(|n| {
            NewTransaction::new(
                n.transaction_date,
                n.description,
                n.debit,
                n.credit,
                n.balance,
                upload_batch_id,
                created_date,
            )
            .map_err(|msg| RowError::new(line, msg))
        });
        fold.push_row(result);
    }

    fold
}

pub struct BatchImporter;

impl BatchImporter {
    /// Imports one statement as a single batch.
    ///
    /// Malformed rows are reported in the outcome and never stop the import.
    /// A stream error discards the whole upload. Nothing is written unless at
    /// least one row succeeds, and a failed write is returned as
    /// `ImportError::Persistence`.
    #[instrument(skip(db, source))]
    pub async fn import<R: Read>(db: &Database, source: R) -> Result<ImportOutcome, ImportError> {
        let upload_batch_id = Uuid::new_v4();
        let fold = fold_rows(source, upload_batch_id, Utc::now());

        if let Some(stream_error) = &fold.stream_error {
            tracing::warn!(%upload_batch_id, error = %stream_error, "Statement could not be read");
            let mut errors = fold.error_messages();
            errors.push(format!("Failed to parse CSV file: {}", stream_error));
            return Ok(ImportOutcome {
                total_records: fold.total_records,
                successful_imports: 0,
                failed_imports: fold.total_records,
                upload_batch_id,
                errors,
            });
        }

        let successful_imports = if fold.transactions.is_empty() {
            0
        } else {
            TransactionService::add_batch(db, &fold.transactions).await?
        };

        tracing::info!(
            %upload_batch_id,
            total = fold.total_records,
            imported = successful_imports,
            rejected = fold.errors.len(),
            "Statement imported"
        );

        Ok(ImportOutcome {
            total_records: fold.total_records,
            successful_imports,
            failed_imports: fold.total_records - successful_imports,
            upload_batch_id,
            errors: fold.error_messages(),
        })
    }
}
