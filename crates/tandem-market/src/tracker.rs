//! Zero-spread condition tracking.
//!
//! Maintains the current [`BboSnapshot`], how long the spread has stayed
//! at or below the zero-spread threshold, and whether the market is in the
//! accelerated regime. All checks take an injected `now` for tests; the
//! plain-named wrappers use the wall clock.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tandem_core::{now_ms, BboSnapshot, Price, Size};
use tracing::debug;

/// Market classification, coarser than entry/exit readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Normal,
    /// Sustained zero spread with thick books; cycles may chain.
    Accelerated,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Accelerated => write!(f, "accelerated"),
        }
    }
}

/// Thresholds and venue constraints the tracker evaluates against.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Spread percentage at or below which the spread counts as "zero".
    pub zero_spread_pct: Decimal,
    /// Zero-spread duration that flips the regime to accelerated.
    pub burst_window_ms: u64,
    /// Minimum depth on both sides for the accelerated regime.
    pub burst_min_depth: Size,
    /// Hard cap on a single order's size.
    pub max_order_size: Size,
    /// Fraction of the thinner book side considered safe to take.
    pub depth_safety_factor: Decimal,
    /// Venue lot size (sizes are floored to it).
    pub lot_size: Size,
    /// Venue minimum order size; anything smaller means "do not trade".
    pub min_order_size: Size,
    /// Snapshot age beyond which no action may be taken.
    pub staleness_ms: u64,
}

#[derive(Debug)]
struct TrackerState {
    snapshot: Option<BboSnapshot>,
    /// Epoch ms when the spread first dropped to/below the threshold.
    zero_since_ms: Option<u64>,
}

/// Live market condition state for one instrument.
///
/// Single writer (the feed task), many readers (the control loop).
pub struct ConditionTracker {
    config: TrackerConfig,
    state: RwLock<TrackerState>,
}

impl ConditionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(TrackerState {
                snapshot: None,
                zero_since_ms: None,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Apply a raw quote observed now.
    pub fn apply_quote(&self, bid: Price, ask: Price, bid_size: Size, ask_size: Size) {
        self.apply_quote_at(bid, ask, bid_size, ask_size, now_ms());
    }

    /// Apply a raw quote observed at an injected time.
    ///
    /// Quotes with a non-positive side are dropped and the previous
    /// snapshot stays in place. The zero-spread window resets the moment
    /// the spread rises above the threshold.
    pub fn apply_quote_at(
        &self,
        bid: Price,
        ask: Price,
        bid_size: Size,
        ask_size: Size,
        now: u64,
    ) {
        let Some(snapshot) = BboSnapshot::from_quote(bid, ask, bid_size, ask_size, now) else {
            debug!(%bid, %ask, "Dropping quote with non-positive side");
            return;
        };

        let mut state = self.state.write();
        if snapshot.spread_pct <= self.config.zero_spread_pct {
            state.zero_since_ms.get_or_insert(now);
        } else {
            state.zero_since_ms = None;
        }
        state.snapshot = Some(snapshot);
    }

    /// Current snapshot as a consistent point-in-time value.
    pub fn snapshot(&self) -> Option<BboSnapshot> {
        self.state.read().snapshot.clone()
    }

    /// How long the spread has stayed at/below the threshold, as of `now`.
    pub fn zero_spread_duration_at(&self, now: u64) -> u64 {
        self.state
            .read()
            .zero_since_ms
            .map_or(0, |since| now.saturating_sub(since))
    }

    pub fn is_spread_ready(&self, min_duration_ms: u64) -> bool {
        self.is_spread_ready_at(min_duration_ms, now_ms())
    }

    /// Entry/exit timing gate.
    ///
    /// True only when the snapshot is fresh, the spread is at/below the
    /// threshold, and it has stayed there for at least `min_duration_ms`.
    pub fn is_spread_ready_at(&self, min_duration_ms: u64, now: u64) -> bool {
        let state = self.state.read();
        let Some(snapshot) = &state.snapshot else {
            return false;
        };
        if snapshot.is_stale_at(now, self.config.staleness_ms) {
            return false;
        }
        if snapshot.spread_pct > self.config.zero_spread_pct {
            return false;
        }
        state
            .zero_since_ms
            .is_some_and(|since| now.saturating_sub(since) >= min_duration_ms)
    }

    pub fn calc_safe_size(&self) -> Size {
        self.calc_safe_size_at(now_ms())
    }

    /// Size that can be taken without eating past the safety fraction of
    /// the thinner side, floored to the lot.
    ///
    /// Zero means "do not trade": stale snapshot, no snapshot yet, or a
    /// result below the venue minimum.
    pub fn calc_safe_size_at(&self, now: u64) -> Size {
        let state = self.state.read();
        let Some(snapshot) = &state.snapshot else {
            return Size::ZERO;
        };
        if snapshot.is_stale_at(now, self.config.staleness_ms) {
            return Size::ZERO;
        }

        let from_depth = snapshot.min_depth() * self.config.depth_safety_factor;
        let size = self
            .config
            .max_order_size
            .min(from_depth)
            .round_to_lot(self.config.lot_size);

        if size < self.config.min_order_size {
            return Size::ZERO;
        }
        size
    }

    /// Depth gate for closing: both sides must hold at least `size`.
    ///
    /// Timing and staleness are the readiness gate's concern; the
    /// timeout-forced close path skips this check entirely.
    pub fn can_fill_close(&self, size: Size) -> bool {
        let state = self.state.read();
        state
            .snapshot
            .as_ref()
            .is_some_and(|s| s.bid_size >= size && s.ask_size >= size)
    }

    pub fn regime(&self) -> Regime {
        self.regime_at(now_ms())
    }

    /// Regime classification at `now`.
    ///
    /// Accelerated exactly while the zero-spread window has run at least
    /// `burst_window_ms` and both sides hold the burst minimum depth.
    pub fn regime_at(&self, now: u64) -> Regime {
        let state = self.state.read();
        let Some(snapshot) = &state.snapshot else {
            return Regime::Normal;
        };
        let sustained = state
            .zero_since_ms
            .is_some_and(|since| now.saturating_sub(since) >= self.config.burst_window_ms);
        if sustained && snapshot.min_depth() >= self.config.burst_min_depth {
            Regime::Accelerated
        } else {
            Regime::Normal
        }
    }
}
