//! Durable per-account order quota accounting.
//!
//! Each trading account owns one [`QuotaLedger`] keyed by its
//! [`tandem_core::AccountIdentity`]. The ledger tracks accepted-order
//! timestamps against three concurrent sliding windows (1 minute,
//! 30 minutes, 24 hours) and persists the timestamp log across restarts:
//! - `can_admit` reports whether a new order fits all three windows
//! - `record` appends the order and atomically rewrites the on-disk log
//! - a persistence failure never blocks the in-memory decision

pub mod error;
pub mod ledger;
pub mod store;

pub use error::{QuotaError, QuotaResult};
pub use ledger::{Admission, QuotaLedger, WindowKind, WindowLimits};
pub use store::LedgerStore;
