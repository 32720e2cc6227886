//! JSON Lines file writer with daily rotation.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if a write was interrupted

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Active writer state for the current day's file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered JSON Lines writer for any serializable record type.
///
/// Files are named `{prefix}_{YYYY-MM-DD}.jsonl` under the base
/// directory and rotate at the UTC date boundary. Opens in append mode,
/// so restarts never truncate existing data.
pub struct JsonLinesWriter<T: Serialize> {
    base_dir: PathBuf,
    prefix: String,
    buffer: Vec<T>,
    /// Buffer size that forces a flush.
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl<T: Serialize> JsonLinesWriter<T> {
    pub fn new(base_dir: impl Into<PathBuf>, prefix: &str, max_buffer_size: usize) -> Self {
        let base_dir = base_dir.into();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create output directory");
        }

        Self {
            base_dir,
            prefix: prefix.to_string(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            active_writer: None,
        }
    }

    /// Buffer one record, flushing when the buffer fills.
    pub fn add_record(&mut self, record: T) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn create_new_writer(&mut self, date: &str) -> PersistenceResult<()> {
        let filename = self
            .base_dir
            .join(format!("{}_{}.jsonl", self.prefix, date));

        info!(filename = %filename.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });

        Ok(())
    }

    /// Write the buffer out, rotating the file at a date change.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();

        let needs_rotation = self
            .active_writer
            .as_ref()
            .is_some_and(|w| w.date != today);
        if needs_rotation {
            self.close_active_writer();
        }
        if self.active_writer.is_none() {
            self.create_new_writer(&today)?;
        }

        let record_count = self.buffer.len();
        let active = self
            .active_writer
            .as_mut()
            .expect("writer opened above");
        for record in &self.buffer {
            let json = serde_json::to_string(record)?;
            writeln!(active.writer, "{}", json)?;
        }
        active.writer.flush()?;
        active.records_written += record_count;

        debug!(date = %today, records = record_count, "Flushed JSON Lines");
        self.buffer.clear();

        Ok(())
    }

    /// Flush pending records and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl<T: Serialize> Drop for JsonLinesWriter<T> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestRecord {
        seq: u32,
        label: String,
    }

    fn record(seq: u32) -> TestRecord {
        TestRecord {
            seq,
            label: format!("r{seq}"),
        }
    }

    fn read_lines(dir: &TempDir) -> Vec<String> {
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        let file = File::open(entries[0].path()).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path(), "test", 100);

        for i in 0..5 {
            writer.add_record(record(i)).unwrap();
        }
        writer.close().unwrap();

        let lines = read_lines(&dir);
        assert_eq!(lines.len(), 5);
        let first: TestRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(first.label, "r0");
    }

    #[test]
    fn test_append_across_writer_instances() {
        let dir = TempDir::new().unwrap();

        {
            let mut writer = JsonLinesWriter::new(dir.path(), "test", 100);
            for i in 0..3 {
                writer.add_record(record(i)).unwrap();
            }
            writer.close().unwrap();
        }
        {
            let mut writer = JsonLinesWriter::new(dir.path(), "test", 100);
            for i in 3..6 {
                writer.add_record(record(i)).unwrap();
            }
            writer.close().unwrap();
        }

        assert_eq!(read_lines(&dir).len(), 6);
    }

    #[test]
    fn test_buffer_flushes_at_capacity() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path(), "test", 2);

        writer.add_record(record(0)).unwrap();
        assert_eq!(writer.buffered(), 1);
        writer.add_record(record(1)).unwrap();
        assert_eq!(writer.buffered(), 0);

        assert_eq!(read_lines(&dir).len(), 2);
    }

    #[test]
    fn test_empty_flush_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut writer: JsonLinesWriter<TestRecord> = JsonLinesWriter::new(dir.path(), "test", 100);

        writer.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(entries.is_empty());
    }
}
