//! Dual-account zero-spread tandem scalper.
//!
//! Binary crate wiring:
//! - TOML configuration with per-instrument sizing presets
//! - Component construction (tracker, ledgers, paper venues, coordinator)
//! - Feed pump, metrics endpoint, notification sink
//! - The coordinator tick loop and graceful shutdown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
