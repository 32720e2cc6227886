//! Market condition tracking for the tandem scalper.
//!
//! The [`ConditionTracker`] is the single-writer/multi-reader view of the
//! traded instrument: the feed task applies raw quotes, the control loop
//! reads entry/exit readiness, safe sizing, and regime classification.
//! [`FeedSource`] is the seam to whatever produces quotes.

pub mod feed;
pub mod tracker;

pub use feed::{FeedEvent, FeedSource};
pub use tracker::{ConditionTracker, Regime, TrackerConfig};
