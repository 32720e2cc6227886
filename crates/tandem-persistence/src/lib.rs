//! Data persistence (JSON Lines) for the tandem bot.
//!
//! Records top-of-book snapshots to daily-rotated .jsonl files
//! for post-analysis in Python/Polars.

pub mod error;
pub mod recorder;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use recorder::{BboRecord, BboRecorder};
pub use writer::JsonLinesWriter;
