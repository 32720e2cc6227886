//! Tick-driven coordination of the dual-account cycle.
//!
//! State machine:
//! - `Idle`: wait for a sustained zero-spread window, then open one
//!   position on each account (opposite sides, same size).
//! - `Holding`: close both legs when the window re-opens, or force the
//!   close unconditionally once the hold deadline passes.
//!
//! Everything funnels through [`Coordinator::tick`]: quota failover,
//! compensation after a half-open, bounded close retries, chained opens
//! in the accelerated regime, and the stop latch. The bot calls `tick`
//! on a fixed interval and exits when it reports a stop reason.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, error, info, warn};

use tandem_account::{AccountHandle, BALANCE_UNAVAILABLE};
use tandem_core::{now_ms, OrderSide, Price, Size};
use tandem_market::{ConditionTracker, Regime};
use tandem_telemetry::{DynNotifier, Metrics};

use crate::error::EngineResult;
use crate::pair::{submit_pair, CycleDirection, LegOutcome, LegPlan};
use crate::pool::{GroupAdmission, PoolManager};
use crate::stats::CycleStats;
use crate::stop::{EmergencyStop, StopController, StopReason};

// ============================================================================
// Configuration
// ============================================================================

/// Knobs for the coordinator loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Zero-spread dwell required before an open, milliseconds.
    pub entry_window_ms: u64,
    /// Hold time after which a close stops waiting for conditions, seconds.
    pub max_hold_secs: u64,
    /// Completed-cycle budget for the whole run.
    pub cycle_cap: u32,
    /// Chained opens allowed per accelerated stretch.
    pub burst_max_rounds: u32,
    /// Failed cycles in a row before the run stops.
    pub max_consecutive_failures: u32,
    /// Retry budget for a close leg whose partner already filled.
    pub close_retry_attempts: u32,
    /// Pause before each close retry, milliseconds.
    pub close_retry_delay_ms: u64,
    /// Re-check cadence while every group is rate-limited, milliseconds.
    pub quota_recheck_ms: u64,
    /// Seconds between balance sweeps.
    pub balance_refresh_secs: u64,
    /// Sessions older than this are refreshed during the sweep, seconds.
    pub session_max_age_secs: u64,
    /// Completed cycles between progress notifications. Zero disables.
    pub notify_every_cycles: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_window_ms: 300,
            max_hold_secs: 30,
            cycle_cap: 500,
            burst_max_rounds: 5,
            max_consecutive_failures: 5,
            close_retry_attempts: 3,
            close_retry_delay_ms: 500,
            quota_recheck_ms: 1_000,
            balance_refresh_secs: 10,
            session_max_age_secs: 240,
            notify_every_cycles: 10,
        }
    }
}

impl EngineConfig {
    /// Zero-spread dwell required before a conditional close: half the
    /// entry dwell.
    pub fn exit_window_ms(&self) -> u64 {
        self.entry_window_ms / 2
    }
}

// ============================================================================
// State
// ============================================================================

/// A live paired position.
#[derive(Debug, Clone, Copy)]
pub struct OpenPosition {
    pub direction: CycleDirection,
    pub size: Size,
    pub opened_at_ms: u64,
}

/// Coordinator phase.
#[derive(Debug, Clone, Copy)]
pub enum EngineState {
    Idle,
    Holding(OpenPosition),
}

impl EngineState {
    pub fn is_holding(&self) -> bool {
        matches!(self, Self::Holding(_))
    }
}

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stopped(StopReason),
}

/// How a close was initiated. Forced closes skip the readiness, depth,
/// and admission gates; the fills are still recorded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseMode {
    Conditional,
    Forced,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owner of the cycle state machine.
///
/// Single-task by construction: the bot drives `tick` from one loop, so
/// no field needs interior mutability. Shared pieces (tracker, stop
/// latch, notifier) are `Arc`s shared with the feed and signal tasks.
pub struct Coordinator {
    config: EngineConfig,
    tracker: Arc<ConditionTracker>,
    pool: PoolManager,
    stop: Arc<StopController>,
    emergency: EmergencyStop,
    notifier: DynNotifier,
    state: EngineState,
    direction: CycleDirection,
    burst_rounds: u32,
    stats: CycleStats,
    last_balance_sweep_ms: u64,
}

impl Coordinator {
    pub fn new(
        config: EngineConfig,
        tracker: Arc<ConditionTracker>,
        pool: PoolManager,
        stop: Arc<StopController>,
        emergency: EmergencyStop,
        notifier: DynNotifier,
    ) -> Self {
        Self {
            config,
            tracker,
            pool,
            stop,
            emergency,
            notifier,
            state: EngineState::Idle,
            direction: CycleDirection::ALongBShort,
            burst_rounds: 0,
            stats: CycleStats::new(),
            last_balance_sweep_ms: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn stop_controller(&self) -> Arc<StopController> {
        Arc::clone(&self.stop)
    }

    pub fn active_group_name(&self) -> &str {
        self.pool.active_group().name()
    }

    /// Connect the active group and take the opening balance snapshot.
    ///
    /// Authentication failures at startup are fatal for the whole run.
    pub async fn startup(&mut self) -> EngineResult<()> {
        let (handle_a, handle_b) = self.active_handles();
        handle_a.connect().await?;
        handle_b.connect().await?;
        self.sweep_balances().await;
        self.last_balance_sweep_ms = now_ms();
        Metrics::engine_state("idle");
        info!(group = self.active_group_name(), "Coordinator ready");
        Ok(())
    }

    /// One pass of the control loop.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = now_ms();

        if self.emergency.is_set() {
            self.stop.trigger(StopReason::EmergencyFile);
        }
        if let Some(reason) = self.stop.reason() {
            return self.settle_and_stop(reason).await;
        }

        self.publish_market_gauges(now);
        self.maintain_accounts(now).await;
        if let Some(reason) = self.stop.reason() {
            return self.settle_and_stop(reason).await;
        }

        match self.state {
            EngineState::Idle => self.tick_idle(now).await,
            EngineState::Holding(position) => self.tick_holding(position, now).await,
        }

        // Budget checks run after the in-flight action settled.
        if self.stats.completed_cycles() >= self.config.cycle_cap {
            self.stop.trigger(StopReason::CycleCapReached {
                cycles: self.stats.completed_cycles(),
            });
        }

        match self.stop.reason() {
            Some(reason) => self.settle_and_stop(reason).await,
            None => TickOutcome::Continue,
        }
    }

    /// Final reconciliation after the loop exits: one last balance sweep
    /// and a one-line run summary.
    pub async fn shutdown_summary(&mut self) -> String {
        self.sweep_balances().await;
        let reason = self
            .stop
            .reason()
            .map_or_else(|| "clean exit".to_string(), |r| r.to_string());
        format!("Run finished ({reason}): {}", self.stats.summary())
    }

    // ------------------------------------------------------------------
    // Idle: opening
    // ------------------------------------------------------------------

    async fn tick_idle(&mut self, now: u64) {
        if self.pool.is_dead(self.pool.active_index()) {
            self.handle_quota_exhaustion(now).await;
            return;
        }
        if !self
            .tracker
            .is_spread_ready_at(self.config.entry_window_ms, now)
        {
            return;
        }
        let size = self.tracker.calc_safe_size_at(now);
        if size.is_zero() {
            debug!("Entry window open but no safe size");
            return;
        }

        let admission = self.pool.active_group().admission_at(now);
        match admission {
            GroupAdmission::Granted => {
                self.open_position(size).await;
            }
            GroupAdmission::Denied {
                account,
                window,
                retry_after_ms,
            } => {
                Metrics::quota_denied(&account, &window.to_string());
                info!(
                    account = %account,
                    window = %window,
                    retry_after_ms,
                    "Admission denied, evaluating failover"
                );
                self.handle_quota_exhaustion(now).await;
            }
        }
    }

    /// Submit the opening pair and move to `Holding` if both legs fill.
    /// A half-open is compensated immediately, exactly once.
    async fn open_position(&mut self, size: Size) {
        let (handle_a, handle_b) = self.active_handles();
        let (side_a, side_b) = self.direction.open_sides();
        info!(direction = ?self.direction, size = %size, "Opening paired position");

        let (out_a, out_b) = submit_pair(
            LegPlan {
                handle: Arc::clone(&handle_a),
                side: side_a,
            },
            LegPlan {
                handle: Arc::clone(&handle_b),
                side: side_b,
            },
            size,
        )
        .await;
        Metrics::leg_order(handle_a.name(), &side_a.to_string(), out_a.is_filled());
        Metrics::leg_order(handle_b.name(), &side_b.to_string(), out_b.is_filled());

        match (out_a, out_b) {
            (LegOutcome::Filled(fill_a), LegOutcome::Filled(fill_b)) => {
                handle_a.ledger().record();
                handle_b.ledger().record();
                self.state = EngineState::Holding(OpenPosition {
                    direction: self.direction,
                    size,
                    opened_at_ms: now_ms(),
                });
                Metrics::engine_state("holding");
                info!(
                    price_a = %fill_a.price,
                    price_b = %fill_b.price,
                    size = %size,
                    "Both legs open"
                );
            }
            (LegOutcome::Filled(fill), LegOutcome::Failed(err)) => {
                handle_a.ledger().record();
                warn!(
                    account = handle_b.name(),
                    error = %err,
                    "Leg B open failed, compensating leg A"
                );
                self.compensate(&handle_a, side_a, fill.size).await;
                self.register_cycle_failure("open");
            }
            (LegOutcome::Failed(err), LegOutcome::Filled(fill)) => {
                handle_b.ledger().record();
                warn!(
                    account = handle_a.name(),
                    error = %err,
                    "Leg A open failed, compensating leg B"
                );
                self.compensate(&handle_b, side_b, fill.size).await;
                self.register_cycle_failure("open");
            }
            (LegOutcome::Failed(err_a), LegOutcome::Failed(err_b)) => {
                warn!(error_a = %err_a, error_b = %err_b, "Both open legs failed");
                self.register_cycle_failure("open");
            }
        }
    }

    /// Unwind one filled leg after its partner failed. Exactly one
    /// attempt; a failed unwind is escalated, never retried here.
    async fn compensate(&self, handle: &Arc<AccountHandle>, opened_side: OrderSide, size: Size) {
        let side = opened_side.opposite();
        match handle.submit_market_order(side, size).await {
            Ok(fill) => {
                handle.ledger().record();
                Metrics::compensation(true);
                info!(
                    account = handle.name(),
                    side = %side,
                    price = %fill.price,
                    "Compensated half-open leg"
                );
            }
            Err(err) => {
                Metrics::compensation(false);
                error!(
                    account = handle.name(),
                    error = %err,
                    "Compensation failed, manual intervention required"
                );
                self.notifier
                    .notify(&format!(
                        "URGENT: compensation failed on {}, a {} {} position is still open",
                        handle.name(),
                        side.opposite(),
                        size
                    ))
                    .await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Holding: closing
    // ------------------------------------------------------------------

    async fn tick_holding(&mut self, position: OpenPosition, now: u64) {
        let held_ms = now.saturating_sub(position.opened_at_ms);
        if held_ms > self.config.max_hold_secs * 1_000 {
            warn!(held_ms, size = %position.size, "Hold deadline passed, forcing close");
            self.execute_close(position, CloseMode::Forced).await;
            return;
        }

        if !self
            .tracker
            .is_spread_ready_at(self.config.exit_window_ms(), now)
        {
            return;
        }
        if !self.tracker.can_fill_close(position.size) {
            debug!(size = %position.size, "Book too thin to close, holding");
            return;
        }
        let admission = self.pool.active_group().admission_at(now);
        if let GroupAdmission::Denied {
            account,
            window,
            retry_after_ms,
        } = admission
        {
            debug!(
                account = %account,
                window = %window,
                retry_after_ms,
                "Close admission denied, holding until the window frees or the deadline forces"
            );
            return;
        }

        self.execute_close(position, CloseMode::Conditional).await;
    }

    /// Submit the closing pair at exactly the open size.
    async fn execute_close(&mut self, position: OpenPosition, mode: CloseMode) {
        let (handle_a, handle_b) = self.active_handles();
        let (side_a, side_b) = position.direction.close_sides();
        if mode == CloseMode::Forced {
            Metrics::forced_close();
        }
        info!(mode = ?mode, size = %position.size, "Closing paired position");

        let (out_a, out_b) = submit_pair(
            LegPlan {
                handle: Arc::clone(&handle_a),
                side: side_a,
            },
            LegPlan {
                handle: Arc::clone(&handle_b),
                side: side_b,
            },
            position.size,
        )
        .await;
        Metrics::leg_order(handle_a.name(), &side_a.to_string(), out_a.is_filled());
        Metrics::leg_order(handle_b.name(), &side_b.to_string(), out_b.is_filled());

        match (out_a, out_b) {
            (LegOutcome::Filled(fill_a), LegOutcome::Filled(_)) => {
                handle_a.ledger().record();
                handle_b.ledger().record();
                self.finish_cycle(position, fill_a.price, mode).await;
            }
            (LegOutcome::Filled(_), LegOutcome::Failed(err)) => {
                handle_a.ledger().record();
                warn!(account = handle_b.name(), error = %err, "Close leg B failed");
                self.retry_close_leg(&handle_b, side_b, position, mode).await;
            }
            (LegOutcome::Failed(err), LegOutcome::Filled(_)) => {
                handle_b.ledger().record();
                warn!(account = handle_a.name(), error = %err, "Close leg A failed");
                self.retry_close_leg(&handle_a, side_a, position, mode).await;
            }
            (LegOutcome::Failed(err_a), LegOutcome::Failed(err_b)) => {
                // Symmetric failure: both legs still open, still paired.
                // Stay holding; the deadline keeps forcing new attempts.
                warn!(error_a = %err_a, error_b = %err_b, "Both close legs failed");
                self.register_cycle_failure("close");
            }
        }
    }

    /// Bounded retry for a close leg whose partner already filled.
    /// Exhausting the budget latches the one fatal stop: the accounts
    /// have diverged.
    async fn retry_close_leg(
        &mut self,
        handle: &Arc<AccountHandle>,
        side: OrderSide,
        position: OpenPosition,
        mode: CloseMode,
    ) {
        for attempt in 1..=self.config.close_retry_attempts {
            Metrics::close_retry();
            if self.config.close_retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.close_retry_delay_ms)).await;
            }
            warn!(account = handle.name(), attempt, "Retrying close leg");
            match handle.submit_market_order(side, position.size).await {
                Ok(fill) => {
                    handle.ledger().record();
                    info!(
                        account = handle.name(),
                        attempt,
                        price = %fill.price,
                        "Close leg recovered"
                    );
                    self.finish_cycle(position, fill.price, mode).await;
                    return;
                }
                Err(err) => {
                    warn!(account = handle.name(), attempt, error = %err, "Close retry failed");
                }
            }
        }

        let account = handle.name().to_string();
        error!(account = %account, "Close retries exhausted, accounts have diverged");
        self.notifier
            .notify(&format!(
                "FATAL: close failed on {account} after retries, position diverged"
            ))
            .await;
        self.stop.trigger(StopReason::Divergence { account });
        self.register_cycle_failure("close");
    }

    /// Book a completed cycle, flip direction, and decide whether to
    /// chain straight into the next open.
    async fn finish_cycle(&mut self, position: OpenPosition, close_price: Price, mode: CloseMode) {
        self.stats.record_cycle(close_price, position.size);
        Metrics::cycle_completed();
        if let Some(volume) = self.stats.volume().to_f64() {
            Metrics::volume_total(volume);
        }
        self.stop.reset_failures();
        self.state = EngineState::Idle;
        Metrics::engine_state("idle");
        self.direction = self.direction.flipped();

        let cycles = self.stats.completed_cycles();
        info!(cycles, volume = %self.stats.volume(), "Cycle complete");
        if self.config.notify_every_cycles > 0 && cycles % self.config.notify_every_cycles == 0 {
            self.notifier
                .notify(&format!(
                    "Progress: {} cycles, volume {}",
                    cycles,
                    self.stats.volume()
                ))
                .await;
        }

        if mode == CloseMode::Forced {
            self.burst_rounds = 0;
            return;
        }
        self.try_chain_open().await;
    }

    /// Chained open in the accelerated regime. Any failed precondition
    /// ends the stretch and resets the round counter.
    async fn try_chain_open(&mut self) {
        let now = now_ms();
        let chain_ok = !self.stop.is_triggered()
            && self.tracker.regime_at(now) == Regime::Accelerated
            && self.burst_rounds < self.config.burst_max_rounds
            && self.stats.completed_cycles() < self.config.cycle_cap;
        if !chain_ok {
            self.burst_rounds = 0;
            return;
        }
        let size = self.tracker.calc_safe_size_at(now);
        if size.is_zero() || !self.pool.active_group().admission_at(now).is_granted() {
            self.burst_rounds = 0;
            return;
        }

        self.burst_rounds += 1;
        Metrics::burst_round();
        if self.burst_rounds == 1 {
            self.notifier
                .notify("Accelerated regime: chaining cycles")
                .await;
        }
        info!(round = self.burst_rounds, size = %size, "Accelerated regime, chaining next open");
        self.open_position(size).await;
        if !self.state.is_holding() {
            self.burst_rounds = 0;
        }
    }

    /// Book a failed attempt. The streak counter lives in the stop latch
    /// and trips it at the ceiling.
    fn register_cycle_failure(&mut self, phase: &str) {
        self.stats.record_failed_cycle();
        Metrics::cycle_failed(phase);
        self.stop.record_cycle_failure();
    }

    // ------------------------------------------------------------------
    // Failover and waiting
    // ------------------------------------------------------------------

    /// The active group cannot take another order. Promote the first
    /// group that can, or wait for the soonest window to free.
    async fn handle_quota_exhaustion(&mut self, now: u64) {
        if let Some(index) = self.pool.find_admitting_at(now) {
            if index != self.pool.active_index() {
                self.switch_group(index).await;
            }
            return;
        }
        self.wait_for_headroom().await;
    }

    /// Promote `target` to active: flatten any held position first, then
    /// connect both legs and take a fresh balance snapshot. A group whose
    /// connect fails is dead for the rest of the run.
    async fn switch_group(&mut self, mut target: usize) {
        if let EngineState::Holding(position) = self.state {
            self.execute_close(position, CloseMode::Forced).await;
            if self.stop.is_triggered() {
                return;
            }
        }

        loop {
            let connected = {
                let group = self.pool.group(target);
                match group.leg_a().connect().await {
                    Ok(()) => group.leg_b().connect().await,
                    Err(err) => Err(err),
                }
            };
            match connected {
                Ok(()) => {
                    let from = self.pool.active_group().name().to_string();
                    self.pool.set_active(target);
                    Metrics::group_switched();
                    info!(from = %from, to = self.active_group_name(), "Switched account group");
                    self.notifier
                        .notify(&format!(
                            "Failover: trading moved to group {}",
                            self.active_group_name()
                        ))
                        .await;
                    self.sweep_balances().await;
                    return;
                }
                Err(err) => {
                    error!(
                        group = self.pool.group(target).name(),
                        error = %err,
                        "Group connect failed"
                    );
                    self.pool.mark_dead(target);
                    if self.pool.live_groups() == 0 {
                        self.stop.trigger(StopReason::NoHealthyGroup);
                        return;
                    }
                    match self.pool.find_admitting_at(now_ms()) {
                        Some(next) => target = next,
                        None => return,
                    }
                }
            }
        }
    }

    /// Every group is rate-limited. Sleep until the soonest window
    /// unlock, re-checking the ledgers, the stop latch, and the
    /// emergency file on a short cadence.
    async fn wait_for_headroom(&mut self) {
        let mut announced = false;
        loop {
            if self.emergency.is_set() {
                self.stop.trigger(StopReason::EmergencyFile);
            }
            if self.stop.is_triggered() {
                return;
            }

            let now = now_ms();
            if let Some(index) = self.pool.find_admitting_at(now) {
                if index != self.pool.active_index() {
                    self.switch_group(index).await;
                }
                return;
            }
            if self.pool.live_groups() == 0 {
                self.stop.trigger(StopReason::NoHealthyGroup);
                return;
            }

            let wait = self
                .pool
                .shortest_unlock_at(now)
                .unwrap_or(self.config.quota_recheck_ms);
            if !announced {
                info!(wait_ms = wait, "All groups rate-limited, waiting for headroom");
                announced = true;
            }
            let nap = wait.clamp(50, self.config.quota_recheck_ms);
            tokio::time::sleep(Duration::from_millis(nap)).await;
        }
    }

    // ------------------------------------------------------------------
    // Maintenance and shutdown
    // ------------------------------------------------------------------

    /// Balance sweep plus session refresh on the configured cadence.
    async fn maintain_accounts(&mut self, now: u64) {
        if now.saturating_sub(self.last_balance_sweep_ms)
            < self.config.balance_refresh_secs * 1_000
        {
            return;
        }
        self.last_balance_sweep_ms = now;
        self.sweep_balances().await;
        self.refresh_sessions(now).await;
    }

    /// Fetch both balances concurrently; both must be real readings
    /// before the combined total feeds PnL.
    async fn sweep_balances(&mut self) {
        let (handle_a, handle_b) = self.active_handles();
        let (balance_a, balance_b) =
            tokio::join!(handle_a.fetch_balance(), handle_b.fetch_balance());
        if balance_a != BALANCE_UNAVAILABLE && balance_b != BALANCE_UNAVAILABLE {
            self.stats.observe_combined_balance(balance_a + balance_b);
            debug!(
                balance_a = %balance_a,
                balance_b = %balance_b,
                "Balance sweep"
            );
        }
    }

    async fn refresh_sessions(&mut self, now: u64) {
        let (handle_a, handle_b) = self.active_handles();
        for handle in [handle_a, handle_b] {
            if let Err(err) = handle
                .refresh_session_if_stale_at(self.config.session_max_age_secs, now)
                .await
            {
                error!(account = handle.name(), error = %err, "Session refresh failed");
                if err.is_fatal() {
                    self.handle_group_death().await;
                    return;
                }
            }
        }
    }

    /// The active group lost authentication mid-run. Flatten, retire the
    /// group, and fail over if anywhere is left to go.
    async fn handle_group_death(&mut self) {
        let index = self.pool.active_index();
        self.notifier
            .notify(&format!(
                "Group {} lost authentication",
                self.pool.group(index).name()
            ))
            .await;

        if let EngineState::Holding(position) = self.state {
            self.execute_close(position, CloseMode::Forced).await;
            if self.stop.is_triggered() {
                return;
            }
        }

        self.pool.mark_dead(index);
        if self.pool.live_groups() == 0 {
            self.stop.trigger(StopReason::NoHealthyGroup);
            return;
        }
        // Otherwise the idle path finds a new group or waits for headroom
        // on the next tick.
        if let Some(next) = self.pool.find_admitting_at(now_ms()) {
            self.switch_group(next).await;
        }
    }

    /// Close out whatever is still held and report the final outcome.
    /// A diverged position is left alone; its close already failed.
    async fn settle_and_stop(&mut self, reason: StopReason) -> TickOutcome {
        if let EngineState::Holding(position) = self.state {
            if matches!(reason, StopReason::Divergence { .. }) {
                warn!("Skipping settlement close, exposure already diverged");
            } else {
                info!(reason = %reason, "Run stopping, closing open position");
                self.execute_close(position, CloseMode::Forced).await;
            }
        }
        Metrics::engine_state("stopped");
        TickOutcome::Stopped(reason)
    }

    fn publish_market_gauges(&self, now: u64) {
        if let Some(snapshot) = self.tracker.snapshot() {
            let spread = snapshot.spread_pct.to_f64().unwrap_or(0.0);
            Metrics::market_state(spread, self.tracker.zero_spread_duration_at(now) as f64);
        }
    }

    fn active_handles(&self) -> (Arc<AccountHandle>, Arc<AccountHandle>) {
        let group = self.pool.active_group();
        (Arc::clone(group.leg_a()), Arc::clone(group.leg_b()))
    }
}
