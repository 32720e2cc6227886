//! Prometheus metrics for the tandem scalper.
//!
//! Covers the signals an operator watches during a run:
//! - cycle throughput and failures
//! - per-leg order outcomes, compensations, close retries
//! - quota denials and group failovers
//! - live spread / zero-spread window / engine state
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram_vec, Counter, CounterVec, Gauge, GaugeVec, HistogramVec,
};

/// Completed open+close cycles.
pub static CYCLES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tandem_cycles_total", "Completed open+close cycles").unwrap()
});

/// Failed cycle attempts by phase (open/close).
pub static CYCLES_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tandem_cycles_failed_total",
        "Failed cycle attempts by phase",
        &["phase"]
    )
    .unwrap()
});

/// Per-leg order outcomes.
pub static LEG_ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tandem_leg_orders_total",
        "Leg order submissions by account, side, and outcome",
        &["account", "side", "outcome"]
    )
    .unwrap()
});

/// Compensating orders after a half-open, by outcome.
pub static COMPENSATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tandem_compensations_total",
        "Single-leg compensating orders by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Close-leg retries.
pub static CLOSE_RETRIES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tandem_close_retries_total", "Close-leg retry attempts").unwrap()
});

/// Quota denials by account and window.
pub static QUOTA_DENIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tandem_quota_denied_total",
        "Order admissions denied by quota window",
        &["account", "window"]
    )
    .unwrap()
});

/// Timeout-forced closes.
pub static FORCED_CLOSES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tandem_forced_closes_total",
        "Closes forced by the hold timeout or an emergency"
    )
    .unwrap()
});

/// Account-pair group switches.
pub static GROUP_SWITCHES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!("tandem_group_switches_total", "Account-pair group failovers").unwrap()
});

/// Chained opens taken in the accelerated regime.
pub static BURST_ROUNDS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tandem_burst_rounds_total",
        "Chained opens taken in the accelerated regime"
    )
    .unwrap()
});

/// Current spread as percent of mid.
pub static SPREAD_PCT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("tandem_spread_pct", "Current spread as percent of mid").unwrap()
});

/// Current zero-spread window length in milliseconds.
pub static ZERO_SPREAD_MS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tandem_zero_spread_ms",
        "Zero-spread window length in milliseconds"
    )
    .unwrap()
});

/// Engine state (1 = active row).
pub static ENGINE_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tandem_engine_state",
        "Engine state machine state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Order round-trip latency per account.
pub static ORDER_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tandem_order_latency_ms",
        "Order submission round-trip latency in milliseconds",
        &["account"],
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0]
    )
    .unwrap()
});

/// Last fetched account balance.
pub static ACCOUNT_BALANCE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tandem_account_balance",
        "Last fetched account balance",
        &["account"]
    )
    .unwrap()
});

/// Cumulative traded notional volume.
pub static VOLUME_NOTIONAL: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "tandem_volume_notional",
        "Cumulative traded notional volume"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a completed cycle.
    pub fn cycle_completed() {
        CYCLES_TOTAL.inc();
    }

    /// Record a failed cycle attempt in the given phase.
    pub fn cycle_failed(phase: &str) {
        CYCLES_FAILED_TOTAL.with_label_values(&[phase]).inc();
    }

    /// Record one leg order outcome.
    pub fn leg_order(account: &str, side: &str, ok: bool) {
        let outcome = if ok { "filled" } else { "failed" };
        LEG_ORDERS_TOTAL
            .with_label_values(&[account, side, outcome])
            .inc();
    }

    /// Record a compensating order outcome.
    pub fn compensation(ok: bool) {
        let outcome = if ok { "filled" } else { "failed" };
        COMPENSATIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a close-leg retry.
    pub fn close_retry() {
        CLOSE_RETRIES_TOTAL.inc();
    }

    /// Record a quota denial.
    pub fn quota_denied(account: &str, window: &str) {
        QUOTA_DENIED_TOTAL
            .with_label_values(&[account, window])
            .inc();
    }

    /// Record a forced close.
    pub fn forced_close() {
        FORCED_CLOSES_TOTAL.inc();
    }

    /// Record a group failover.
    pub fn group_switched() {
        GROUP_SWITCHES_TOTAL.inc();
    }

    /// Record a chained open in the accelerated regime.
    pub fn burst_round() {
        BURST_ROUNDS_TOTAL.inc();
    }

    /// Update live spread gauges.
    pub fn market_state(spread_pct: f64, zero_spread_ms: f64) {
        SPREAD_PCT.set(spread_pct);
        ZERO_SPREAD_MS.set(zero_spread_ms);
    }

    /// Set the engine state machine state.
    /// Only the active state is 1, all others 0.
    pub fn engine_state(state: &str) {
        for s in &["idle", "holding", "stopped"] {
            ENGINE_STATE.with_label_values(&[s]).set(0.0);
        }
        ENGINE_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record order round-trip latency.
    pub fn order_latency(account: &str, latency_ms: f64) {
        ORDER_LATENCY_MS
            .with_label_values(&[account])
            .observe(latency_ms);
    }

    /// Update the balance gauge for an account.
    pub fn balance(account: &str, value: f64) {
        ACCOUNT_BALANCE.with_label_values(&[account]).set(value);
    }

    /// Update cumulative traded volume.
    pub fn volume_total(value: f64) {
        VOLUME_NOTIONAL.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_records_without_panic() {
        Metrics::cycle_completed();
        Metrics::cycle_failed("open");
        Metrics::leg_order("g1-a", "buy", true);
        Metrics::leg_order("g1-b", "sell", false);
        Metrics::compensation(true);
        Metrics::close_retry();
        Metrics::quota_denied("g1-a", "1m");
        Metrics::forced_close();
        Metrics::group_switched();
        Metrics::burst_round();
        Metrics::market_state(0.0005, 420.0);
        Metrics::engine_state("holding");
        Metrics::order_latency("g1-a", 12.5);
        Metrics::balance("g1-a", 10_000.0);
        Metrics::volume_total(123_456.0);

        assert!(CYCLES_TOTAL.get() >= 1.0);
    }

    #[test]
    fn test_engine_state_is_exclusive() {
        Metrics::engine_state("idle");
        Metrics::engine_state("holding");

        let idle = ENGINE_STATE.with_label_values(&["idle"]).get();
        let holding = ENGINE_STATE.with_label_values(&["holding"]).get();
        assert_eq!(idle, 0.0);
        assert_eq!(holding, 1.0);
    }
}
