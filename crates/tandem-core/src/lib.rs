//! Core domain types for the tandem dual-account scalper.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`, `Size`: precision-safe numeric types
//! - `BboSnapshot`: immutable top-of-book value with spread/mid derivation
//! - `OrderSide`, `FillResult`, `ClientOrderId`: order primitives
//! - `AccountIdentity`: quota partition key for one venue account

pub mod decimal;
pub mod order;
pub mod time;
pub mod types;

pub use decimal::{Price, Size};
pub use order::{ClientOrderId, FillResult, OrderSide};
pub use time::now_ms;
pub use types::{AccountIdentity, BboSnapshot};
