//! End-to-end exercise of the snapshot read → merge → write cycle, the way
//! a refresh run uses it.

use chrono::{NaiveDate, NaiveDateTime};
use market_snapshot::bar::{Bar, Snapshot};
use market_snapshot::merge::merge;
use market_snapshot::reader::read_snapshot;
use market_snapshot::timestamp::OffsetPolicy;
use market_snapshot::writer::write_snapshot;

fn ts(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn fetched(h: u32, m: u32, close: f64) -> Bar {
    Bar {
        timestamp: ts(h, m),
        open: close - 0.3,
        high: close + 0.4,
        low: close - 0.6,
        close,
        volume: 42.0,
    }
}

#[test]
fn refresh_cycle_appends_only_new_minutes_and_keeps_dialect() {
    let dir = tempfile::tempdir().unwrap();
    let published = dir.path().join("XAU_1m_data.csv");

    // The previously published snapshot uses the semicolon dialect and ends
    // at 2024-01-01 00:00.
    std::fs::write(
        &published,
        "Date;Open;High;Low;Close;Volume\n\
         2023.12.31 23:59;2062.9;2063.4;2062.5;2063.2;80\n\
         2024.01.01 00:00;2063.2;2063.9;2063.0;2063.5;77\n",
    )
    .unwrap();

    let existing = read_snapshot(&published, OffsetPolicy::Strip)
        .unwrap()
        .expect("published snapshot exists");
    assert_eq!(existing.high_water_mark(), Some(ts(0, 0)));

    // The fetch yields three rows: two new minutes, one duplicated with a
    // differing close.
    let incoming = vec![
        fetched(0, 1, 2063.8),
        fetched(0, 2, 2064.0),
        fetched(0, 2, 2064.3),
    ];

    let outcome = merge(&existing.bars, &incoming);
    assert_eq!(outcome.appended, 2);
    assert!(!outcome.is_noop());

    let merged = Snapshot::new(outcome.bars, existing.dialect);
    let merged_path = dir.path().join("merged").join("XAU_1m_data.csv");
    std::fs::create_dir_all(merged_path.parent().unwrap()).unwrap();
    write_snapshot(&merged, &merged_path).unwrap();

    // The republished file keeps the semicolon dialect and the new tail.
    let reread = read_snapshot(&merged_path, OffsetPolicy::Strip)
        .unwrap()
        .unwrap();
    assert_eq!(reread.dialect, existing.dialect);
    assert_eq!(reread.len(), 4);
    assert_eq!(reread.high_water_mark(), Some(ts(0, 2)));
    assert_eq!(reread.bars[3].close, 2064.3);

    // A second run with the same fetch result finds nothing to do.
    let rerun = merge(&reread.bars, &incoming);
    assert!(rerun.is_noop());
    assert_eq!(rerun.bars, reread.bars);
}
