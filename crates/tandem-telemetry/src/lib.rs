//! Prometheus metrics, structured logging, and event notification.
//!
//! Observability for the tandem scalper:
//! - Prometheus metrics for cycles, legs, quota, spread state
//! - Structured JSON logging with tracing
//! - `/metrics` + `/health` HTTP endpoints
//! - Fire-and-forget notification sink (Telegram or null)

pub mod error;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use notify::{DynNotifier, EventNotifier, MockNotifier, NullNotifier, TelegramNotifier};
pub use server::serve_metrics;
