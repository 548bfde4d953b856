//! CSV record source
//!
//! Streams MSISDNs out of a CSV export one row at a time. The first row is a
//! header and is always discarded; only the first column of each remaining
//! row is used.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{ImportError, Result};

/// One input row reduced to its identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub msisdn: String,
}

/// Lazy, single-pass iterator of [`Record`]s
pub struct RecordSource<R = File> {
    reader: csv::Reader<R>,
    row: StringRecord,
    header_skipped: bool,
    finished: bool,
}

impl RecordSource<File> {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ImportError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file))
    }
}

impl<R: io::Read> RecordSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        Self {
            reader,
            row: StringRecord::new(),
            header_skipped: false,
            finished: false,
        }
    }
}

impl<R: io::Read> Iterator for RecordSource<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.reader.read_record(&mut self.row) {
                Ok(false) => {
                    self.finished = true;
                    return None;
                },
                Err(e) if e.is_io_error() => {
                    self.finished = true;
                    return Some(Err(e.into()));
                },
                // The first row is the header whether or not it decodes
                Ok(true) | Err(_) if !self.header_skipped => {
                    self.header_skipped = true;
                    continue;
                },
                Ok(true) => {},
                // Undecodable rows are dropped like blank ones
                Err(_) => continue,
            }

            if let Some(first) = self.row.get(0) {
                return Some(Ok(Record {
                    msisdn: strip_quotes(first).to_string(),
                }));
            }
        }

        None
    }
}

/// Remove one literal `"` from each end of `field`
pub fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}
