//! Run-stop latch and emergency stop file.
//!
//! StopController: a latch that, once triggered, keeps its first reason for
//! the rest of the run. It also owns the consecutive-failure counter so a
//! losing streak trips the latch without the coordinator doing arithmetic.
//! EmergencyStop: polls for an operator-dropped stop file next to the
//! process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, error, warn};

use tandem_core::now_ms;

/// Why the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Operator dropped the emergency stop file.
    EmergencyFile,
    /// Ctrl-C / SIGTERM.
    Interrupted,
    /// Completed-cycle budget for the run is spent.
    CycleCapReached { cycles: u32 },
    /// Too many failed cycles in a row.
    FailureCeiling { count: u32 },
    /// A close leg stayed unfilled through every retry; the two accounts
    /// are no longer flat against each other.
    Divergence { account: String },
    /// Every configured account group is dead or unusable.
    NoHealthyGroup,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmergencyFile => write!(f, "emergency stop file detected"),
            Self::Interrupted => write!(f, "interrupted by signal"),
            Self::CycleCapReached { cycles } => write!(f, "cycle cap reached: {}", cycles),
            Self::FailureCeiling { count } => write!(f, "consecutive failures: {}", count),
            Self::Divergence { account } => write!(f, "position divergence on {}", account),
            Self::NoHealthyGroup => write!(f, "no healthy account group left"),
        }
    }
}

/// Latched stop signal shared across the engine.
///
/// Thread-safe via `Arc<StopController>`; the signal task, the tick loop,
/// and the pool wait loop all consult the same latch.
pub struct StopController {
    triggered: AtomicBool,
    /// Epoch ms of the first trigger, 0 while untriggered.
    triggered_at: AtomicU64,
    reason: RwLock<Option<StopReason>>,
    consecutive_failures: AtomicU32,
    max_consecutive_failures: u32,
}

impl StopController {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            triggered: AtomicBool::new(false),
            triggered_at: AtomicU64::new(0),
            reason: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            max_consecutive_failures,
        }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Latch the stop. The first reason wins; later triggers are ignored.
    pub fn trigger(&self, reason: StopReason) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.triggered_at.store(now_ms(), Ordering::SeqCst);
            {
                let mut guard = self.reason.write();
                *guard = Some(reason.clone());
            }
            error!(reason = %reason, "RUN STOP TRIGGERED");
        } else {
            warn!(new_reason = %reason, "stop already triggered, keeping original reason");
        }
    }

    /// Epoch ms of the trigger, `None` while running.
    #[must_use]
    pub fn triggered_at(&self) -> Option<u64> {
        if self.is_triggered() {
            let ts = self.triggered_at.load(Ordering::SeqCst);
            if ts > 0 {
                return Some(ts);
            }
        }
        None
    }

    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        if self.is_triggered() {
            self.reason.read().clone()
        } else {
            None
        }
    }

    /// Count one failed cycle. Trips the latch at the configured ceiling.
    ///
    /// Returns the new consecutive count.
    pub fn record_cycle_failure(&self) -> u32 {
        let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, "consecutive cycle failures");
        if count >= self.max_consecutive_failures {
            self.trigger(StopReason::FailureCeiling { count });
        }
        count
    }

    /// A completed cycle clears the streak.
    pub fn reset_failures(&self) {
        let prev = self.consecutive_failures.swap(0, Ordering::SeqCst);
        if prev > 0 {
            debug!(previous_count = prev, "failure streak reset");
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

/// Operator kill switch: a file dropped next to the process.
///
/// Checked every tick and inside the quota wait loop. The file is never
/// deleted by the engine; clearing it is the operator's move.
#[derive(Debug, Clone)]
pub struct EmergencyStop {
    path: PathBuf,
}

impl EmergencyStop {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_initially_clear() {
        let stop = StopController::new(5);
        assert!(!stop.is_triggered());
        assert!(stop.triggered_at().is_none());
        assert!(stop.reason().is_none());
    }

    #[test]
    fn test_first_trigger_wins() {
        let stop = StopController::new(5);
        stop.trigger(StopReason::EmergencyFile);
        stop.trigger(StopReason::Interrupted);

        assert!(stop.is_triggered());
        assert!(stop.triggered_at().is_some());
        assert_eq!(stop.reason(), Some(StopReason::EmergencyFile));
    }

    #[test]
    fn test_failure_ceiling_trips_latch() {
        let stop = StopController::new(3);

        assert_eq!(stop.record_cycle_failure(), 1);
        assert_eq!(stop.record_cycle_failure(), 2);
        assert!(!stop.is_triggered());

        assert_eq!(stop.record_cycle_failure(), 3);
        assert!(stop.is_triggered());
        assert_eq!(
            stop.reason(),
            Some(StopReason::FailureCeiling { count: 3 })
        );
    }

    #[test]
    fn test_success_resets_streak() {
        let stop = StopController::new(3);
        stop.record_cycle_failure();
        stop.record_cycle_failure();
        stop.reset_failures();
        assert_eq!(stop.consecutive_failures(), 0);

        stop.record_cycle_failure();
        assert!(!stop.is_triggered());
    }

    #[test]
    fn test_reason_display() {
        let cases = [
            (StopReason::EmergencyFile, "emergency stop file detected"),
            (StopReason::Interrupted, "interrupted by signal"),
            (
                StopReason::CycleCapReached { cycles: 500 },
                "cycle cap reached: 500",
            ),
            (
                StopReason::FailureCeiling { count: 5 },
                "consecutive failures: 5",
            ),
            (
                StopReason::Divergence {
                    account: "g1-b".to_string(),
                },
                "position divergence on g1-b",
            ),
            (StopReason::NoHealthyGroup, "no healthy account group left"),
        ];
        for (reason, expected) in cases {
            assert_eq!(reason.to_string(), expected);
        }
    }

    #[test]
    fn test_emergency_stop_file() {
        let dir = tempfile::tempdir().unwrap();
        let emergency = EmergencyStop::new(dir.path().join("STOP"));
        assert!(!emergency.is_set());

        std::fs::write(emergency.path(), b"halt").unwrap();
        assert!(emergency.is_set());
    }
}
