//! Market data and account identity types.
//!
//! `BboSnapshot` is the single source of truth for "what does the top of
//! book look like right now". It is constructed once per feed update and
//! never mutated; consumers replace the whole value.

use crate::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/offer snapshot with derived spread and mid.
///
/// Construction validates bid > 0 and ask > 0; an update that fails
/// validation must not replace the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BboSnapshot {
    /// Best bid price.
    pub bid: Price,
    /// Best ask price.
    pub ask: Price,
    /// Size resting at the best bid.
    pub bid_size: Size,
    /// Size resting at the best ask.
    pub ask_size: Size,
    /// Spread as a percentage of mid: (ask - bid) / mid * 100.
    pub spread_pct: Decimal,
    /// Midpoint price.
    pub mid: Price,
    /// Epoch ms when the update was observed.
    pub observed_at_ms: u64,
}

impl BboSnapshot {
    /// Build a snapshot from a raw quote.
    ///
    /// Returns `None` when either price is missing or non-positive; the
    /// caller keeps its previous snapshot in that case.
    pub fn from_quote(
        bid: Price,
        ask: Price,
        bid_size: Size,
        ask_size: Size,
        observed_at_ms: u64,
    ) -> Option<Self> {
        if !bid.is_positive() || !ask.is_positive() {
            return None;
        }
        let mid = Price::mid_of(bid, ask);
        let spread_pct = (ask.inner() - bid.inner()) / mid.inner() * Decimal::from(100);
        Some(Self {
            bid,
            ask,
            bid_size,
            ask_size,
            spread_pct,
            mid,
            observed_at_ms,
        })
    }

    /// The thinner of the two top-of-book sizes.
    pub fn min_depth(&self) -> Size {
        self.bid_size.min(self.ask_size)
    }

    /// True when the snapshot is older than `max_age_ms` at `now_ms`.
    pub fn is_stale_at(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.observed_at_ms) > max_age_ms
    }
}

/// Opaque per-account key (the account's public address).
///
/// Unique per account and stable for its lifetime; partitions quota state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIdentity(String);

impl AccountIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
