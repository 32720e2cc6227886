//! Market data feed seam.
//!
//! The core never speaks a wire protocol. A [`FeedSource`] hands out a
//! channel of raw top-of-book quotes; validation and derivation happen in
//! the tracker, one hop downstream.

use tandem_core::{Price, Size};
use tokio::sync::mpsc;

/// One raw top-of-book update as it arrives from the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedEvent {
    pub bid: Price,
    pub ask: Price,
    pub bid_size: Size,
    pub ask_size: Size,
}

/// Push-based quote subscription for one instrument.
///
/// Implementations own their producer task; dropping the receiver tears
/// the subscription down.
pub trait FeedSource: Send + Sync {
    /// Instrument this source quotes.
    fn instrument(&self) -> &str;

    /// Start streaming quotes.
    fn subscribe(&self) -> mpsc::Receiver<FeedEvent>;
}
