//! Paper trading support: a synthetic feed and an in-process venue.
//!
//! Lets the binary run the full open/close cycle end to end with no
//! credentials. The [`SyntheticFeed`] drives the same [`PaperMarket`] the
//! [`PaperVenue`] fills against, so paper fills are consistent with what
//! the condition tracker observed.

pub mod feed;
pub mod market;
pub mod venue;

pub use feed::{SyntheticFeed, SyntheticFeedConfig};
pub use market::{PaperMarket, PaperQuote};
pub use venue::PaperVenue;
