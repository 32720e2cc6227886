//! Sliding-window admission control for order submission.
//!
//! One ledger per account. Three windows run concurrently; an order is
//! admitted only when it fits all of them. Denials name the violated
//! window and how long until it frees up, checked minute -> half-hour ->
//! day so operator messages stay deterministic.

use crate::error::QuotaResult;
use crate::store::LedgerStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tandem_core::{now_ms, AccountIdentity};
use tracing::{debug, warn};

/// The three quota windows, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Minute,
    HalfHour,
    Day,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] = [Self::Minute, Self::HalfHour, Self::Day];

    /// Window span in milliseconds.
    pub const fn span_ms(&self) -> u64 {
        match self {
            Self::Minute => 60_000,
            Self::HalfHour => 1_800_000,
            Self::Day => 86_400_000,
        }
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minute => write!(f, "1m"),
            Self::HalfHour => write!(f, "30m"),
            Self::Day => write!(f, "24h"),
        }
    }
}

/// Per-window order caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub per_minute: u32,
    pub per_half_hour: u32,
    pub per_day: u32,
}

impl WindowLimits {
    pub fn new(per_minute: u32, per_half_hour: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_half_hour,
            per_day,
        }
    }

    fn cap(&self, window: WindowKind) -> u32 {
        match window {
            WindowKind::Minute => self.per_minute,
            WindowKind::HalfHour => self.per_half_hour,
            WindowKind::Day => self.per_day,
        }
    }
}

impl Default for WindowLimits {
    fn default() -> Self {
        Self::new(30, 300, 1000)
    }
}

/// Admission verdict for one prospective order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Denied by `window`; capacity frees after `retry_after_ms`.
    Denied {
        window: WindowKind,
        retry_after_ms: u64,
    },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Wait until this verdict would flip to granted. Zero when granted.
    pub fn retry_after_ms(&self) -> u64 {
        match self {
            Self::Granted => 0,
            Self::Denied { retry_after_ms, .. } => *retry_after_ms,
        }
    }
}

/// Durable sliding-window quota ledger for one account.
///
/// The timestamp log is owned exclusively by this ledger. Every recorded
/// order rewrites the persisted log; a write failure downgrades to a
/// warning so an in-flight order is never blocked on disk I/O.
pub struct QuotaLedger {
    identity: AccountIdentity,
    limits: WindowLimits,
    log: Mutex<VecDeque<u64>>,
    store: Option<LedgerStore>,
}

impl QuotaLedger {
    /// Memory-only ledger (no persistence).
    pub fn new(identity: AccountIdentity, limits: WindowLimits) -> Self {
        Self {
            identity,
            limits,
            log: Mutex::new(VecDeque::new()),
            store: None,
        }
    }

    /// Ledger backed by `store`, reloading and pruning any persisted log.
    pub fn with_store(
        identity: AccountIdentity,
        limits: WindowLimits,
        store: LedgerStore,
    ) -> QuotaResult<Self> {
        let mut stamps = store.load(&identity)?;
        let cutoff = now_ms().saturating_sub(WindowKind::Day.span_ms());
        stamps.retain(|&t| t > cutoff);
        debug!(
            identity = %identity,
            restored = stamps.len(),
            "Loaded quota ledger"
        );
        Ok(Self {
            identity,
            limits,
            log: Mutex::new(stamps.into()),
            store: Some(store),
        })
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    /// Check whether one more order fits every window right now.
    pub fn can_admit(&self) -> Admission {
        self.can_admit_at(now_ms())
    }

    /// Check admission against an injected clock.
    pub fn can_admit_at(&self, now: u64) -> Admission {
        let log = self.log.lock();
        for window in WindowKind::ALL {
            let span = window.span_ms();
            let cutoff = now.saturating_sub(span);
            // Log is non-decreasing; everything past this index is in-window.
            let idx = log.partition_point(|&t| t <= cutoff);
            let count = log.len() - idx;
            if count >= self.limits.cap(window) as usize {
                // The oldest in-window entry is the soonest to expire.
                let retry_after_ms = log
                    .get(idx)
                    .map_or(span, |&oldest| (oldest + span).saturating_sub(now));
                return Admission::Denied {
                    window,
                    retry_after_ms,
                };
            }
        }
        Admission::Granted
    }

    /// Record an accepted order at the current time and persist the log.
    pub fn record(&self) {
        self.record_at(now_ms());
    }

    /// Record an accepted order at an injected time.
    ///
    /// Prunes entries that have left the 24h window, then rewrites the
    /// on-disk log. Persistence failures are logged and swallowed.
    pub fn record_at(&self, now: u64) {
        let snapshot: Vec<u64> = {
            let mut log = self.log.lock();
            let cutoff = now.saturating_sub(WindowKind::Day.span_ms());
            while log.front().is_some_and(|&t| t <= cutoff) {
                log.pop_front();
            }
            log.push_back(now);
            log.iter().copied().collect()
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.identity, &snapshot) {
                warn!(
                    identity = %self.identity,
                    error = %e,
                    "Quota log write failed; in-memory state stays authoritative"
                );
            }
        }
    }

    /// Orders currently inside `window` at an injected time.
    pub fn count_in_window_at(&self, window: WindowKind, now: u64) -> usize {
        let log = self.log.lock();
        let cutoff = now.saturating_sub(window.span_ms());
        log.len() - log.partition_point(|&t| t <= cutoff)
    }
}
