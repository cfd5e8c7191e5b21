//! Dialect-preserving writer for merged snapshots.
//!
//! The writer emits the header the snapshot was read with (same delimiter,
//! same timestamp column name) so a republished file keeps its source's
//! conventions. Output lands in a temporary sibling file first and is
//! renamed into place, so a failed write never leaves a truncated snapshot
//! at the destination.

use std::fs;
use std::path::Path;

use crate::bar::Snapshot;
use crate::errors::SnapshotError;
use crate::timestamp::STRICT_FORMAT;

/// Writes `snapshot` to `path`, replacing any existing file atomically.
///
/// Timestamps are encoded with [`STRICT_FORMAT`]; prices and volume use the
/// shortest exact decimal representation.
pub fn write_snapshot(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let tmp = path.with_extension("csv.tmp");

    match write_rows(snapshot, &tmp) {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn write_rows(snapshot: &Snapshot, tmp: &Path) -> Result<(), SnapshotError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(snapshot.dialect.delimiter)
        .from_path(tmp)?;

    writer.write_record([
        snapshot.dialect.timestamp_column,
        "Open",
        "High",
        "Low",
        "Close",
        "Volume",
    ])?;

    for bar in &snapshot.bars {
        writer.write_record([
            bar.timestamp.format(STRICT_FORMAT).to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::{Bar, Dialect};
    use crate::reader::read_snapshot;
    use crate::timestamp::OffsetPolicy;
    use chrono::NaiveDate;

    fn sample(delimiter: u8, timestamp_column: &'static str) -> Snapshot {
        let bars = vec![
            Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: 2063.5,
                high: 2064.0,
                low: 2063.1,
                close: 2063.8,
                volume: 120.0,
            },
            Bar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 1, 0)
                    .unwrap(),
                open: 2063.8,
                high: 2064.2,
                low: 2063.6,
                close: 2064.1,
                volume: 95.0,
            },
        ];
        Snapshot::new(
            bars,
            Dialect {
                delimiter,
                timestamp_column,
            },
        )
    }

    #[test]
    fn written_file_keeps_the_source_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("XAU_1m_data.csv");

        let snapshot = sample(b';', "Open time");
        write_snapshot(&snapshot, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("Open time;Open;High;Low;Close;Volume"));
        assert!(raw.contains("2024.01.01 00:00;2063.5;2064;2063.1;2063.8;120"));

        let reread = read_snapshot(&path, OffsetPolicy::Strip).unwrap().unwrap();
        assert_eq!(reread, snapshot);
    }

    #[test]
    fn no_temporary_file_survives_a_successful_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("XAU_1m_data.csv");

        write_snapshot(&sample(b',', "Date"), &path).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["XAU_1m_data.csv".to_string()]);
    }
}
