//! Forgiving reader for published snapshot files.
//!
//! Snapshot files are delimited text with a header row, but neither the
//! delimiter nor the timestamp column name is stable across sources. Rather
//! than branching on exceptions, the reader walks an explicit ordered list of
//! candidate delimiters: a header that collapses into a single column means
//! the delimiter was wrong, so the next candidate is tried. The timestamp
//! column is resolved from a fixed candidate list in order.
//!
//! Rows come back in file order; sorting is the merger's responsibility.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::bar::{Bar, Dialect, Snapshot};
use crate::errors::SnapshotError;
use crate::timestamp::{OffsetPolicy, parse_timestamp};

/// Candidate delimiters, tried in order.
const DELIMITERS: &[u8] = &[b';', b','];

/// Candidate timestamp column names, tried in order.
pub const TIMESTAMP_COLUMNS: &[&str] = &["Date", "Open time"];

/// Price/volume columns as (header name, error label). Matched
/// case-insensitively.
const VALUE_COLUMNS: [(&str, &str); 5] = [
    ("Open", "open"),
    ("High", "high"),
    ("Low", "low"),
    ("Close", "close"),
    ("Volume", "volume"),
];

/// Reads the snapshot at `path`.
///
/// Returns `Ok(None)` when no file exists there; an absent snapshot is a
/// normal starting state, not an error.
pub fn read_snapshot(
    path: impl AsRef<Path>,
    policy: OffsetPolicy,
) -> Result<Option<Snapshot>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    parse_snapshot_str(&raw, policy).map(Some)
}

/// Parses snapshot content from a string, sniffing the dialect.
pub fn parse_snapshot_str(data: &str, policy: OffsetPolicy) -> Result<Snapshot, SnapshotError> {
    let mut widest_header: Vec<String> = Vec::new();

    for &delimiter in DELIMITERS {
        match try_delimiter(data, delimiter, policy)? {
            Parsed::Snapshot(snapshot) => return Ok(snapshot),
            Parsed::SingleColumn(header) => {
                // Delimiter mismatch: everything landed in one column.
                if header.len() > widest_header.len() {
                    widest_header = header;
                }
            }
        }
    }

    Err(SnapshotError::Schema {
        tried: TIMESTAMP_COLUMNS,
        found: widest_header,
    })
}

enum Parsed {
    Snapshot(Snapshot),
    SingleColumn(Vec<String>),
}

fn try_delimiter(
    data: &str,
    delimiter: u8,
    policy: OffsetPolicy,
) -> Result<Parsed, SnapshotError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.len() <= 1 {
        return Ok(Parsed::SingleColumn(
            headers.iter().map(str::to_string).collect(),
        ));
    }

    let Some((ts_index, ts_column)) = TIMESTAMP_COLUMNS.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .map(|i| (i, *name))
    }) else {
        return Err(SnapshotError::Schema {
            tried: TIMESTAMP_COLUMNS,
            found: headers.iter().map(str::to_string).collect(),
        });
    };

    let mut value_indices = [0usize; 5];
    for (slot, (name, _)) in value_indices.iter_mut().zip(VALUE_COLUMNS) {
        let Some(index) = headers.iter().position(|h| h.eq_ignore_ascii_case(name)) else {
            return Err(SnapshotError::Schema {
                tried: TIMESTAMP_COLUMNS,
                found: headers.iter().map(str::to_string).collect(),
            });
        };
        *slot = index;
    }

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let raw_ts = &record[ts_index];
        let timestamp = parse_timestamp(raw_ts, policy).map_err(|_| SnapshotError::Parse {
            row,
            field: "timestamp",
            value: raw_ts.to_string(),
        })?;

        let mut values = [0f64; 5];
        for (slot, (&index, (_, label))) in values
            .iter_mut()
            .zip(value_indices.iter().zip(VALUE_COLUMNS))
        {
            let raw = &record[index];
            *slot = raw.parse::<f64>().map_err(|_| SnapshotError::Parse {
                row,
                field: label,
                value: raw.to_string(),
            })?;
        }

        let bar = Bar {
            timestamp,
            open: values[0],
            high: values[1],
            low: values[2],
            close: values[3],
            volume: values[4],
        };
        if !bar.ohlc_in_bounds() {
            warn!(timestamp = %bar.timestamp, row, "OHLC bounds violated; keeping row");
        }
        bars.push(bar);
    }

    Ok(Parsed::Snapshot(Snapshot::new(
        bars,
        Dialect {
            delimiter,
            timestamp_column: ts_column,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn semicolon_file_parses_into_six_typed_columns() {
        let data = "Date;Open;High;Low;Close;Volume\n\
                    2024.01.01 00:00;2063.5;2064.0;2063.1;2063.8;120\n\
                    2024.01.01 00:01;2063.8;2064.2;2063.6;2064.1;95\n";
        let snap = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.dialect.delimiter, b';');
        assert_eq!(snap.dialect.timestamp_column, "Date");
        assert_eq!(snap.bars[0].timestamp, ts(0, 0));
        assert_eq!(snap.bars[0].open, 2063.5);
        assert_eq!(snap.bars[1].close, 2064.1);
        assert_eq!(snap.bars[1].volume, 95.0);
    }

    #[test]
    fn comma_file_triggers_redetection() {
        // The semicolon attempt collapses this header into one column, so the
        // reader must fall through to the comma strategy.
        let data = "Date,Open,High,Low,Close,Volume\n\
                    2024.01.01 00:00,2063.5,2064.0,2063.1,2063.8,120\n";
        let snap = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.dialect.delimiter, b',');
    }

    #[test]
    fn open_time_column_is_second_candidate() {
        let data = "Open time,Open,High,Low,Close,Volume\n\
                    2021-01-05T00:00:00Z,1943.2,1944.0,1942.8,1943.6,44\n";
        let snap = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap();
        assert_eq!(snap.dialect.timestamp_column, "Open time");
        assert_eq!(
            snap.bars[0].timestamp,
            NaiveDate::from_ymd_opt(2021, 1, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn missing_timestamp_column_is_a_schema_error() {
        let data = "When,Open,High,Low,Close,Volume\n\
                    2024.01.01 00:00,1,2,0,1,5\n";
        let err = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap_err();
        match err {
            SnapshotError::Schema { tried, found } => {
                assert_eq!(tried, TIMESTAMP_COLUMNS);
                assert!(found.contains(&"When".to_string()));
            }
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn bad_number_is_a_parse_error_with_row_context() {
        let data = "Date,Open,High,Low,Close,Volume\n\
                    2024.01.01 00:00,2063.5,2064.0,2063.1,2063.8,120\n\
                    2024.01.01 00:01,oops,2064.2,2063.6,2064.1,95\n";
        let err = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap_err();
        match err {
            SnapshotError::Parse { row, field, value } => {
                assert_eq!(row, 2);
                assert_eq!(field, "open");
                assert_eq!(value, "oops");
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_is_fatal_for_the_whole_read() {
        let data = "Date,Open,High,Low,Close,Volume\n\
                    never,2063.5,2064.0,2063.1,2063.8,120\n";
        let err = parse_snapshot_str(data, OffsetPolicy::Strip).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Parse {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn absent_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_snapshot.csv");
        assert!(read_snapshot(&missing, OffsetPolicy::Strip)
            .unwrap()
            .is_none());
    }
}
