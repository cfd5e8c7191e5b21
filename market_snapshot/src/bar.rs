//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the standard row type across the pipeline: the snapshot
//! reader produces it, the merger combines it, and every bar source
//! implementation returns it.

use chrono::NaiveDateTime;

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// Timestamps are wall-clock naive: the published snapshot format carries no
/// offset, and all comparisons happen in that convention (see
/// [`crate::timestamp::OffsetPolicy`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// The timestamp for this bar; the natural sort and dedup key.
    pub timestamp: NaiveDateTime,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,
}

impl Bar {
    /// Whether `low <= open,close <= high` holds.
    ///
    /// A violation is a data-quality warning, not a fatal error; callers log
    /// it and keep the row.
    pub fn ohlc_in_bounds(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Header dialect of a snapshot file: which delimiter it uses and what the
/// timestamp column is called.
///
/// Published snapshots are not stable on either axis (`;` vs `,`, `Date` vs
/// `Open time`), so the reader records what it detected and the writer
/// round-trips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Name of the timestamp column.
    pub timestamp_column: &'static str,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            timestamp_column: "Date",
        }
    }
}

/// A complete snapshot: the ordered bar history for one instrument/timeframe,
/// plus the dialect it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The bars, in file order when freshly read (not guaranteed sorted).
    pub bars: Vec<Bar>,
    /// Header dialect of the backing file.
    pub dialect: Dialect,
}

impl Snapshot {
    /// Creates a snapshot from bars and a dialect.
    pub fn new(bars: Vec<Bar>, dialect: Dialect) -> Self {
        Self { bars, dialect }
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// True when the snapshot holds no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The maximum timestamp present, or `None` for an empty snapshot.
    ///
    /// This is the high-water mark: fetched rows at or below it are already
    /// covered by the snapshot.
    pub fn high_water_mark(&self) -> Option<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).max()
    }
}
