//! Row-oriented input source
//!
//! The input is a CSV file with a header row. One named column carries the
//! raw tweet payload. Every rank opens the file on its own and walks all rows
//! so that ordinal indices agree across ranks; ownership is decided later.

use anyhow::{anyhow, Context, Result};
use csv::{ErrorKind, ReaderBuilder, StringRecordsIntoIter};
use std::path::{Path, PathBuf};

use crate::decompression::DecompressionReader;

/// One input row with its 0-based ordinal position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index: u64,
    pub payload: String,
}

/// A row as read from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Record(Record),
    /// The row could not be read; it still occupies its index
    Malformed { index: u64, reason: String },
}

impl Row {
    pub fn index(&self) -> u64 {
        match self {
            Row::Record(record) => record.index,
            Row::Malformed { index, .. } => *index,
        }
    }

    pub fn record(index: u64, payload: impl Into<String>) -> Self {
        Row::Record(Record {
            index,
            payload: payload.into(),
        })
    }
}

/// Location and shape of the input
#[derive(Debug, Clone)]
pub struct InputSource {
    path: PathBuf,
    field: String,
}

impl InputSource {
    pub fn new(path: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the source and resolve the payload column
    pub fn open(&self) -> Result<RowReader> {
        let decompressed = DecompressionReader::open(&self.path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(decompressed);

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header of {}", self.path.display()))?
            .clone();

        // A completely empty file has no rows at all
        let column = if headers.is_empty() {
            None
        } else {
            let position = headers.iter().position(|h| h == self.field).ok_or_else(|| {
                anyhow!(
                    "Input {} has no '{}' column (found: {})",
                    self.path.display(),
                    self.field,
                    headers.iter().collect::<Vec<_>>().join(", ")
                )
            })?;
            Some(position)
        };

        Ok(RowReader {
            rows: reader.into_records(),
            column,
            next_index: 0,
            finished: column.is_none(),
        })
    }
}

/// Single-pass iterator over the rows of an input source.
///
/// Yields `Err` only for fatal conditions (I/O failure), after which it is
/// exhausted. Rows that merely fail to parse come back as `Row::Malformed`.
pub struct RowReader {
    rows: StringRecordsIntoIter<DecompressionReader>,
    column: Option<usize>,
    next_index: u64,
    finished: bool,
}

impl std::fmt::Debug for RowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowReader")
            .field("column", &self.column)
            .field("next_index", &self.next_index)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Iterator for RowReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = match self.rows.next() {
            Some(result) => result,
            None => {
                self.finished = true;
                return None;
            }
        };

        let index = self.next_index;
        self.next_index += 1;

        match result {
            Ok(record) => {
                let payload = self
                    .column
                    .and_then(|column| record.get(column))
                    .unwrap_or_default();
                Some(Ok(Row::record(index, payload)))
            }
            Err(err) => match err.kind() {
                ErrorKind::Utf8 { .. } | ErrorKind::UnequalLengths { .. } => {
                    Some(Ok(Row::Malformed {
                        index,
                        reason: err.to_string(),
                    }))
                }
                _ => {
                    self.finished = true;
                    Some(Err(anyhow::Error::new(err)
                        .context(format!("Could not read row {} of the input", index))))
                }
            },
        }
    }
}
