//! Epoch-millisecond clock helpers.
//!
//! All state-machine deadlines (hold timeout, quota windows, staleness)
//! compare epoch-ms integers so tests can inject a fixed `now`.

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
