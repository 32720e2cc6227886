//! Cycle coordination for the tandem dual-account scalper.
//!
//! The [`Coordinator`] owns the Idle/Holding state machine and drives one
//! paired cycle at a time: fork-join order submission on two accounts,
//! compensation after a half-open, bounded close retries, quota failover
//! across [`pool::AccountPairGroup`]s, and chained opens while the market
//! stays in the accelerated regime. [`StopController`] latches the first
//! reason a run must end.

pub mod coordinator;
pub mod error;
pub mod pair;
pub mod pool;
pub mod stats;
pub mod stop;

pub use coordinator::{Coordinator, EngineConfig, EngineState, OpenPosition, TickOutcome};
pub use error::{EngineError, EngineResult};
pub use pair::{submit_pair, CycleDirection, LegOutcome, LegPlan};
pub use pool::{AccountPairGroup, GroupAdmission, PoolManager};
pub use stats::CycleStats;
pub use stop::{EmergencyStop, StopController, StopReason};
