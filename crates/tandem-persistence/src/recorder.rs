//! Top-of-book capture for offline analysis.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tandem_core::BboSnapshot;

use crate::error::PersistenceResult;
use crate::writer::JsonLinesWriter;

/// One top-of-book observation, flattened for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BboRecord {
    pub timestamp_ms: u64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub spread_pct: f64,
}

impl BboRecord {
    pub fn from_snapshot(snapshot: &BboSnapshot) -> Self {
        Self {
            timestamp_ms: snapshot.observed_at_ms,
            bid: snapshot.bid.inner().to_f64().unwrap_or(0.0),
            ask: snapshot.ask.inner().to_f64().unwrap_or(0.0),
            bid_size: snapshot.bid_size.inner().to_f64().unwrap_or(0.0),
            ask_size: snapshot.ask_size.inner().to_f64().unwrap_or(0.0),
            spread_pct: snapshot.spread_pct.to_f64().unwrap_or(0.0),
        }
    }
}

/// Records every observed snapshot to daily `bbo_{date}.jsonl` files.
pub struct BboRecorder {
    writer: JsonLinesWriter<BboRecord>,
}

impl BboRecorder {
    pub fn new(base_dir: impl Into<std::path::PathBuf>, max_buffer_size: usize) -> Self {
        Self {
            writer: JsonLinesWriter::new(base_dir, "bbo", max_buffer_size),
        }
    }

    pub fn record(&mut self, snapshot: &BboSnapshot) -> PersistenceResult<()> {
        self.writer.add_record(BboRecord::from_snapshot(snapshot))
    }

    pub fn flush(&mut self) -> PersistenceResult<()> {
        self.writer.flush()
    }

    pub fn close(&mut self) -> PersistenceResult<()> {
        self.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::{BufRead, BufReader};
    use tandem_core::{Price, Size};
    use tempfile::TempDir;

    fn snapshot() -> BboSnapshot {
        BboSnapshot::from_quote(
            Price::new(dec!(100)),
            Price::new(dec!(100)),
            Size::new(dec!(2.5)),
            Size::new(dec!(3)),
            1_700_000_000_000,
        )
        .unwrap()
    }

    #[test]
    fn test_record_round_trips_snapshot_fields() {
        let dir = TempDir::new().unwrap();
        let mut recorder = BboRecorder::new(dir.path(), 100);

        recorder.record(&snapshot()).unwrap();
        recorder.close().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().into_string().unwrap();
        assert!(name.starts_with("bbo_"), "unexpected file name: {name}");
        assert!(name.ends_with(".jsonl"), "unexpected file name: {name}");

        let file = std::fs::File::open(entries[0].path()).unwrap();
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .collect();
        assert_eq!(lines.len(), 1);

        let record: BboRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record.timestamp_ms, 1_700_000_000_000);
        assert_eq!(record.bid, 100.0);
        assert_eq!(record.ask, 100.0);
        assert_eq!(record.bid_size, 2.5);
        assert_eq!(record.ask_size, 3.0);
        assert_eq!(record.spread_pct, 0.0);
    }
}
