//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tandem_core::Size;
use tandem_market::TrackerConfig;
use tandem_paper::SyntheticFeedConfig;
use tandem_quota::WindowLimits;

/// Resolved venue sizing for one instrument.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentSizing {
    pub max_order_size: Decimal,
    pub lot_size: Decimal,
    pub min_order_size: Decimal,
    pub burst_min_depth: Decimal,
}

/// Built-in sizing presets for instruments we trade regularly, so config
/// only has to name the symbol. Explicit config fields override these.
fn preset_for(symbol: &str) -> InstrumentSizing {
    if symbol.starts_with("BTC") {
        InstrumentSizing {
            max_order_size: Decimal::new(1, 2),    // 0.01
            lot_size: Decimal::new(1, 3),          // 0.001
            min_order_size: Decimal::new(1, 3),    // 0.001
            burst_min_depth: Decimal::new(3, 2),   // 0.03
        }
    } else if symbol.starts_with("ETH") {
        InstrumentSizing {
            max_order_size: Decimal::new(1, 1),    // 0.1
            lot_size: Decimal::new(1, 2),          // 0.01
            min_order_size: Decimal::new(1, 2),    // 0.01
            burst_min_depth: Decimal::ONE,
        }
    } else {
        InstrumentSizing {
            max_order_size: Decimal::ONE,
            lot_size: Decimal::new(1, 2),          // 0.01
            min_order_size: Decimal::new(1, 2),    // 0.01
            burst_min_depth: Decimal::ONE,
        }
    }
}

/// Instrument to trade. Sizing fields are optional; unset ones fall back
/// to the symbol's preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default)]
    pub max_order_size: Option<Decimal>,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
    #[serde(default)]
    pub min_order_size: Option<Decimal>,
    #[serde(default)]
    pub burst_min_depth: Option<Decimal>,
}

impl InstrumentConfig {
    pub fn sizing(&self) -> InstrumentSizing {
        let preset = preset_for(&self.symbol);
        InstrumentSizing {
            max_order_size: self.max_order_size.unwrap_or(preset.max_order_size),
            lot_size: self.lot_size.unwrap_or(preset.lot_size),
            min_order_size: self.min_order_size.unwrap_or(preset.min_order_size),
            burst_min_depth: self.burst_min_depth.unwrap_or(preset.burst_min_depth),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "ETH-USD-PERP".to_string(),
            max_order_size: None,
            lot_size: None,
            min_order_size: None,
            burst_min_depth: None,
        }
    }
}

/// Spread and depth thresholds the tracker evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Spread percentage at or below which the book counts as pinched.
    #[serde(default = "default_zero_spread_pct")]
    pub zero_spread_pct: Decimal,
    /// Zero-spread dwell before an open (ms). Exit uses half of this.
    #[serde(default = "default_entry_window_ms")]
    pub entry_window_ms: u64,
    /// Zero-spread duration that flips the regime to accelerated (ms).
    #[serde(default = "default_burst_window_ms")]
    pub burst_window_ms: u64,
    /// Chained opens allowed per accelerated stretch.
    #[serde(default = "default_burst_max_rounds")]
    pub burst_max_rounds: u32,
    /// Fraction of the thinner book side considered safe to take.
    #[serde(default = "default_depth_safety_factor")]
    pub depth_safety_factor: Decimal,
    /// Snapshot age beyond which no action is taken (ms).
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,
}

fn default_zero_spread_pct() -> Decimal {
    Decimal::new(1, 3)
}

fn default_entry_window_ms() -> u64 {
    300
}

fn default_burst_window_ms() -> u64 {
    2_000
}

fn default_burst_max_rounds() -> u32 {
    5
}

fn default_depth_safety_factor() -> Decimal {
    Decimal::new(5, 1)
}

fn default_staleness_ms() -> u64 {
    1_000
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            zero_spread_pct: default_zero_spread_pct(),
            entry_window_ms: default_entry_window_ms(),
            burst_window_ms: default_burst_window_ms(),
            burst_max_rounds: default_burst_max_rounds(),
            depth_safety_factor: default_depth_safety_factor(),
            staleness_ms: default_staleness_ms(),
        }
    }
}

/// Engine loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Hold time after which a close stops waiting for conditions (s).
    #[serde(default = "default_max_hold_secs")]
    pub max_hold_secs: u64,
    /// Completed-cycle budget for the whole run.
    #[serde(default = "default_cycle_cap")]
    pub cycle_cap: u32,
    /// Failed cycles in a row before the run stops.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Retry budget for a close leg whose partner already filled.
    #[serde(default = "default_close_retry_attempts")]
    pub close_retry_attempts: u32,
    /// Pause before each close retry (ms).
    #[serde(default = "default_close_retry_delay_ms")]
    pub close_retry_delay_ms: u64,
    /// Re-check cadence while every group is rate-limited (ms).
    #[serde(default = "default_quota_recheck_ms")]
    pub quota_recheck_ms: u64,
    /// Seconds between balance sweeps.
    #[serde(default = "default_balance_refresh_secs")]
    pub balance_refresh_secs: u64,
    /// Sessions older than this are refreshed during the sweep (s).
    #[serde(default = "default_session_max_age_secs")]
    pub session_max_age_secs: u64,
    /// Completed cycles between progress notifications. Zero disables.
    #[serde(default = "default_notify_every_cycles")]
    pub notify_every_cycles: u32,
    /// Control loop cadence (ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Touch this file to stop the run.
    #[serde(default = "default_emergency_stop_file")]
    pub emergency_stop_file: String,
}

fn default_max_hold_secs() -> u64 {
    30
}

fn default_cycle_cap() -> u32 {
    500
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_close_retry_attempts() -> u32 {
    3
}

fn default_close_retry_delay_ms() -> u64 {
    500
}

fn default_quota_recheck_ms() -> u64 {
    1_000
}

fn default_balance_refresh_secs() -> u64 {
    10
}

fn default_session_max_age_secs() -> u64 {
    240
}

fn default_notify_every_cycles() -> u32 {
    10
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_emergency_stop_file() -> String {
    "STOP".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_hold_secs: default_max_hold_secs(),
            cycle_cap: default_cycle_cap(),
            max_consecutive_failures: default_max_consecutive_failures(),
            close_retry_attempts: default_close_retry_attempts(),
            close_retry_delay_ms: default_close_retry_delay_ms(),
            quota_recheck_ms: default_quota_recheck_ms(),
            balance_refresh_secs: default_balance_refresh_secs(),
            session_max_age_secs: default_session_max_age_secs(),
            notify_every_cycles: default_notify_every_cycles(),
            tick_interval_ms: default_tick_interval_ms(),
            emergency_stop_file: default_emergency_stop_file(),
        }
    }
}

/// Per-account order quota windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    #[serde(default = "default_per_half_hour")]
    pub per_half_hour: u32,
    #[serde(default = "default_per_day")]
    pub per_day: u32,
    /// Directory for the persisted timestamp logs.
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: String,
}

fn default_per_minute() -> u32 {
    30
}

fn default_per_half_hour() -> u32 {
    300
}

fn default_per_day() -> u32 {
    1_000
}

fn default_ledger_dir() -> String {
    "./data/quota".to_string()
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_half_hour: default_per_half_hour(),
            per_day: default_per_day(),
            ledger_dir: default_ledger_dir(),
        }
    }
}

/// One tradable account pair. Leg names double as ledger identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub leg_a: String,
    pub leg_b: String,
}

fn default_groups() -> Vec<GroupConfig> {
    vec![GroupConfig {
        name: "g1".to_string(),
        leg_a: "paper-a".to_string(),
        leg_b: "paper-b".to_string(),
    }]
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus metrics port. Zero binds an ephemeral port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

/// Top-of-book recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_recorder_enabled")]
    pub enabled: bool,
    #[serde(default = "default_recorder_data_dir")]
    pub data_dir: String,
    /// Buffered records before a flush.
    #[serde(default = "default_recorder_buffer_size")]
    pub buffer_size: usize,
}

fn default_recorder_enabled() -> bool {
    true
}

fn default_recorder_data_dir() -> String {
    "./data/bbo".to_string()
}

fn default_recorder_buffer_size() -> usize {
    100
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: default_recorder_enabled(),
            data_dir: default_recorder_data_dir(),
            buffer_size: default_recorder_buffer_size(),
        }
    }
}

/// Notification sink. Telegram is used when both fields are set,
/// otherwise events are dropped silently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
}

impl NotifierConfig {
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some((token, chat))
            }
            _ => None,
        }
    }
}

/// Paper venue and synthetic feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_base_price")]
    pub base_price: Decimal,
    #[serde(default = "default_paper_starting_balance")]
    pub starting_balance: Decimal,
    /// Taker fee as a fraction of notional.
    #[serde(default = "default_paper_fee_rate")]
    pub fee_rate: Decimal,
    /// Simulated venue round trip per order (ms).
    #[serde(default = "default_paper_latency_ms")]
    pub latency_ms: u64,
    #[serde(default = "default_paper_seed")]
    pub seed: u64,
    /// Synthetic quote cadence (ms).
    #[serde(default = "default_paper_feed_tick_interval_ms")]
    pub feed_tick_interval_ms: u64,
    /// Ticks per pinched stretch (bid == ask).
    #[serde(default = "default_paper_pinched_ticks")]
    pub pinched_ticks: u32,
    /// Ticks per normally spread stretch.
    #[serde(default = "default_paper_normal_ticks")]
    pub normal_ticks: u32,
}

fn default_paper_base_price() -> Decimal {
    Decimal::ONE_HUNDRED
}

fn default_paper_starting_balance() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_paper_fee_rate() -> Decimal {
    Decimal::new(3, 4)
}

fn default_paper_latency_ms() -> u64 {
    5
}

fn default_paper_seed() -> u64 {
    42
}

fn default_paper_feed_tick_interval_ms() -> u64 {
    50
}

fn default_paper_pinched_ticks() -> u32 {
    50
}

fn default_paper_normal_ticks() -> u32 {
    20
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            base_price: default_paper_base_price(),
            starting_balance: default_paper_starting_balance(),
            fee_rate: default_paper_fee_rate(),
            latency_ms: default_paper_latency_ms(),
            seed: default_paper_seed(),
            feed_tick_interval_ms: default_paper_feed_tick_interval_ms(),
            pinched_ticks: default_paper_pinched_ticks(),
            normal_ticks: default_paper_normal_ticks(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Account pairs in failover order.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            thresholds: ThresholdsConfig::default(),
            engine: EngineSettings::default(),
            quota: QuotaConfig::default(),
            groups: default_groups(),
            telemetry: TelemetryConfig::default(),
            recorder: RecorderConfig::default(),
            notifier: NotifierConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run safely.
    pub fn validate(&self) -> AppResult<()> {
        if self.groups.is_empty() {
            return Err(AppError::Config(
                "at least one account group is required".to_string(),
            ));
        }
        for group in &self.groups {
            if group.leg_a == group.leg_b {
                return Err(AppError::Config(format!(
                    "group {} uses the same account for both legs",
                    group.name
                )));
            }
        }
        Ok(())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        let sizing = self.instrument.sizing();
        TrackerConfig {
            zero_spread_pct: self.thresholds.zero_spread_pct,
            burst_window_ms: self.thresholds.burst_window_ms,
            burst_min_depth: Size::new(sizing.burst_min_depth),
            max_order_size: Size::new(sizing.max_order_size),
            depth_safety_factor: self.thresholds.depth_safety_factor,
            lot_size: Size::new(sizing.lot_size),
            min_order_size: Size::new(sizing.min_order_size),
            staleness_ms: self.thresholds.staleness_ms,
        }
    }

    pub fn engine_config(&self) -> tandem_engine::EngineConfig {
        tandem_engine::EngineConfig {
            entry_window_ms: self.thresholds.entry_window_ms,
            max_hold_secs: self.engine.max_hold_secs,
            cycle_cap: self.engine.cycle_cap,
            burst_max_rounds: self.thresholds.burst_max_rounds,
            max_consecutive_failures: self.engine.max_consecutive_failures,
            close_retry_attempts: self.engine.close_retry_attempts,
            close_retry_delay_ms: self.engine.close_retry_delay_ms,
            quota_recheck_ms: self.engine.quota_recheck_ms,
            balance_refresh_secs: self.engine.balance_refresh_secs,
            session_max_age_secs: self.engine.session_max_age_secs,
            notify_every_cycles: self.engine.notify_every_cycles,
        }
    }

    pub fn window_limits(&self) -> WindowLimits {
        WindowLimits::new(
            self.quota.per_minute,
            self.quota.per_half_hour,
            self.quota.per_day,
        )
    }

    pub fn feed_config(&self) -> SyntheticFeedConfig {
        SyntheticFeedConfig {
            instrument: self.instrument.symbol.clone(),
            base_price: self.paper.base_price,
            tick_interval_ms: self.paper.feed_tick_interval_ms,
            pinched_ticks: self.paper.pinched_ticks,
            normal_ticks: self.paper.normal_ticks,
            seed: self.paper.seed,
            ..SyntheticFeedConfig::default()
        }
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.telemetry.metrics_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.thresholds.entry_window_ms, 300);
        assert_eq!(config.engine.cycle_cap, 500);
        assert_eq!(config.quota.per_minute, 30);
        assert_eq!(config.groups.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml_overrides() {
        let toml_str = r#"
            [instrument]
            symbol = "BTC-USD-PERP"

            [thresholds]
            entry_window_ms = 200

            [engine]
            cycle_cap = 10

            [[groups]]
            name = "g1"
            leg_a = "a1"
            leg_b = "b1"

            [[groups]]
            name = "g2"
            leg_a = "a2"
            leg_b = "b2"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.thresholds.entry_window_ms, 200);
        assert_eq!(config.engine.cycle_cap, 10);
        // Unset sections keep their defaults.
        assert_eq!(config.engine.max_hold_secs, 30);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[1].name, "g2");
    }

    #[test]
    fn test_instrument_presets() {
        let btc = InstrumentConfig {
            symbol: "BTC-USD-PERP".to_string(),
            ..InstrumentConfig::default()
        };
        assert_eq!(btc.sizing().max_order_size, dec!(0.01));
        assert_eq!(btc.sizing().burst_min_depth, dec!(0.03));

        let eth = InstrumentConfig::default();
        assert_eq!(eth.sizing().max_order_size, dec!(0.1));
        assert_eq!(eth.sizing().burst_min_depth, dec!(1));

        // Explicit fields win over the preset.
        let custom = InstrumentConfig {
            symbol: "BTC-USD-PERP".to_string(),
            max_order_size: Some(dec!(0.005)),
            ..InstrumentConfig::default()
        };
        assert_eq!(custom.sizing().max_order_size, dec!(0.005));
        assert_eq!(custom.sizing().lot_size, dec!(0.001));
    }

    #[test]
    fn test_validate_rejects_mirrored_legs() {
        let mut config = AppConfig::default();
        config.groups[0].leg_b = config.groups[0].leg_a.clone();
        assert!(config.validate().is_err());

        config.groups.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exit_window_derived_from_entry() {
        let config = AppConfig::default();
        assert_eq!(config.engine_config().exit_window_ms(), 150);
    }

    #[test]
    fn test_telegram_requires_both_fields() {
        let mut notifier = NotifierConfig::default();
        assert!(notifier.telegram().is_none());

        notifier.telegram_bot_token = Some("token".to_string());
        assert!(notifier.telegram().is_none());

        notifier.telegram_chat_id = Some("chat".to_string());
        assert_eq!(notifier.telegram(), Some(("token", "chat")));
    }
}
