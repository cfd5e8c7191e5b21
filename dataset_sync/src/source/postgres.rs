//! PostgreSQL bar source: the operational 1-minute time-series table.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use market_snapshot::bar::Bar;
use tracing::info;

use crate::source::{BarSource, SourceError};

/// Fetches bars for one instrument from the `market` schema.
///
/// The query mirrors the published snapshot's semantics: rows strictly after
/// the cutoff, ascending by timestamp. `timestamptz` values are taken at
/// their UTC wall clock with the offset stripped, matching the snapshot's
/// offset-naive convention.
pub struct PostgresSource {
    database_url: String,
    symbol: String,
}

impl PostgresSource {
    /// Creates a source for `symbol` (e.g. "XAUUSD") backed by the database
    /// at `database_url`.
    pub fn new(database_url: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            symbol: symbol.into(),
        }
    }
}

#[async_trait]
impl BarSource for PostgresSource {
    async fn fetch_since(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<Bar>, SourceError> {
        let database_url = self.database_url.clone();
        let symbol = self.symbol.clone();

        // Diesel is synchronous; keep the query off the async executor.
        tokio::task::spawn_blocking(move || fetch_blocking(&database_url, &symbol, cutoff))
            .await
            .map_err(|e| SourceError::Internal(e.to_string()))?
    }
}

fn fetch_blocking(
    database_url: &str,
    symbol: &str,
    cutoff: Option<NaiveDateTime>,
) -> Result<Vec<Bar>, SourceError> {
    let mut conn = PgConnection::establish(database_url)?;

    let instrument_id: i32 = {
        use crate::schema::instruments::dsl as ins;
        ins::instruments
            .filter(ins::symbol.eq(symbol))
            .select(ins::id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| SourceError::MissingInstrument(symbol.to_string()))?
    };

    use crate::schema::timeframe_1m::dsl as tf;
    let mut query = tf::timeframe_1m
        .filter(tf::instrument_id.eq(instrument_id))
        .select((tf::ts, tf::open, tf::high, tf::low, tf::close, tf::volume))
        .order(tf::ts.asc())
        .into_boxed();

    if let Some(cutoff) = cutoff {
        let cutoff_utc = DateTime::<Utc>::from_naive_utc_and_offset(cutoff, Utc);
        query = query.filter(tf::ts.gt(cutoff_utc));
    }

    let rows: Vec<(DateTime<Utc>, f64, f64, f64, f64, f64)> = query.load(&mut conn)?;
    info!(
        instrument_id,
        rows = rows.len(),
        "fetched bars from database"
    );

    Ok(rows
        .into_iter()
        .map(|(ts, open, high, low, close, volume)| Bar {
            timestamp: ts.naive_utc(),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect())
}
