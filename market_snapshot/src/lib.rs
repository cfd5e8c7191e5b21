//! In-memory model and file handling for published OHLCV snapshots.
//!
//! A snapshot is the full ordered bar history for one instrument/timeframe,
//! persisted as a delimited text file whose header dialect varies across
//! sources. This crate owns the forgiving reader for those files, the
//! dialect-preserving writer, and the incremental merge that folds freshly
//! fetched bars into an existing snapshot.

#![deny(missing_docs)]

pub mod bar;
pub mod errors;
pub mod merge;
pub mod reader;
pub mod timestamp;
pub mod writer;
