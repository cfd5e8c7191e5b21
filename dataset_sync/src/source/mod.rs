//! Source abstraction for acquiring candidate new bars.
//!
//! This module defines the [`BarSource`] trait, the unified interface for
//! pulling bars recorded after a cutoff timestamp from any backing store.
//! Two implementations exist: a query against the operational PostgreSQL
//! schema ([`postgres::PostgresSource`]) and a file dropped by an external
//! trading-terminal export ([`export::ExportFileSource`]).
//!
//! A source with nothing new returns an empty `Vec`, never an error.

pub mod export;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use market_snapshot::bar::Bar;
use thiserror::Error;

/// Errors that can occur within a [`BarSource`] implementation.
///
/// All of these are fatal for the current run; source fetches are not
/// retried.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("cannot reach data source: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// A query against the backing store failed.
    #[error("source query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// The configured instrument symbol has no row in the instruments table.
    #[error("instrument {0:?} not found in database")]
    MissingInstrument(String),

    /// The external export did not produce a usable file.
    #[error("terminal export unavailable: {0}")]
    Export(String),

    /// The export file existed but could not be parsed.
    #[error("export file unreadable")]
    Snapshot(#[from] market_snapshot::errors::SnapshotError),

    /// An internal error occurred while processing data within the source.
    #[error("internal source error: {0}")]
    Internal(String),
}

/// A queryable origin of bar data.
#[async_trait]
pub trait BarSource {
    /// Fetches bars strictly newer than `cutoff`, ordered ascending.
    ///
    /// `None` means "no cutoff": return everything the source has.
    async fn fetch_since(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<Bar>, SourceError>;
}
