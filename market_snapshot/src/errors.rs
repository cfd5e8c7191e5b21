//! Error types shared across snapshot reading, writing, and merging.

use thiserror::Error;

/// The unified error type for snapshot reading and writing.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// None of the known timestamp column names were present in the header.
    #[error("no timestamp column found (tried {tried:?}), header was {found:?}")]
    Schema {
        /// Column names that were tried, in order.
        tried: &'static [&'static str],
        /// Column names actually present in the file.
        found: Vec<String>,
    },

    /// A timestamp or numeric field could not be parsed.
    #[error("row {row}: cannot parse {field} value {value:?}")]
    Parse {
        /// 1-based data row number (header excluded).
        row: usize,
        /// Which field failed.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// An error from the CSV layer (malformed record, wrong field count).
    #[error("malformed delimited data")]
    Csv(#[from] csv::Error),
}
