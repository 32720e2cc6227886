//! Per-run trade accounting.

use rust_decimal::Decimal;

use tandem_core::{Price, Size};

/// Counters for one coordinator run.
///
/// A completed cycle crosses the book four times (two opens, two closes),
/// so its notional contribution is `price * size * 4`. PnL is inferred
/// from combined-balance drift rather than per-fill bookkeeping.
#[derive(Debug, Default)]
pub struct CycleStats {
    completed_cycles: u32,
    failed_cycles: u32,
    volume: Decimal,
    initial_balance: Option<Decimal>,
    latest_balance: Option<Decimal>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed cycle at the given close price.
    pub fn record_cycle(&mut self, price: Price, size: Size) {
        self.completed_cycles += 1;
        self.volume += price.inner() * size.inner() * Decimal::from(4u32);
    }

    pub fn record_failed_cycle(&mut self) {
        self.failed_cycles += 1;
    }

    /// Feed one combined (leg A + leg B) balance reading.
    ///
    /// The first reading becomes the run baseline for PnL.
    pub fn observe_combined_balance(&mut self, total: Decimal) {
        if self.initial_balance.is_none() {
            self.initial_balance = Some(total);
        }
        self.latest_balance = Some(total);
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn failed_cycles(&self) -> u32 {
        self.failed_cycles
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    /// Balance drift since the baseline. `None` until both readings exist.
    pub fn realized_pnl(&self) -> Option<Decimal> {
        match (self.initial_balance, self.latest_balance) {
            (Some(initial), Some(latest)) => Some(latest - initial),
            _ => None,
        }
    }

    /// One-line run summary for logs and notifications.
    pub fn summary(&self) -> String {
        let pnl = self
            .realized_pnl()
            .map_or_else(|| "n/a".to_string(), |p| p.to_string());
        format!(
            "cycles={} failed={} volume={} pnl={}",
            self.completed_cycles, self.failed_cycles, self.volume, pnl
        )
    }
}
