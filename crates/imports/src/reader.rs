use crate::models::{Column, RawRow, StreamError};
use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};
use std::io::Read;

/// Lazily yields the data rows of a headed CSV statement in file order.
///
/// Only the known columns are kept; anything else in the header is ignored.
/// Rows may be shorter or longer than the header. The iterator is
/// single-pass and stops being useful after the first `StreamError`.
///
/// Line numbers count records, with the header as line 1. Blank lines are
/// skipped and do not advance the count.
pub struct RecordReader<R: Read> {
    records: StringRecordsIntoIter<R>,
    columns: Vec<(usize, Column)>,
    records_read: u64,
}

impl<R: Read> RecordReader<R> {
    /// Reads the header row. Fails only when the input is not readable text.
    pub fn new(source: R) -> Result<Self, StreamError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Fields)
            .from_reader(source);

        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(index, header)| Column::from_header(header).map(|c| (index, c)))
            .collect();

        Ok(Self {
            records: reader.into_records(),
            columns,
            records_read: 0,
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().map(|(_, c)| *c)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<RawRow, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        self.records_read += 1;
        let mut row = RawRow::new(self.records_read + 1);
        for (index, column) in &self.columns {
            if let Some(value) = record.get(*index) {
                row.insert(*column, value);
            }
        }

        Some(Ok(row))
    }
}
