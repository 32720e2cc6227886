//! Main application orchestration.
//!
//! Builds every component from config, pumps the synthetic feed into the
//! condition tracker, and drives the coordinator tick loop until a stop
//! reason latches:
//! - Paper venues and quota ledgers per configured account
//! - Feed pump task (tracker updates + optional BBO recording)
//! - Prometheus metrics endpoint
//! - Ctrl-C mapped onto the stop latch so positions still flatten

use crate::config::AppConfig;
use crate::error::AppResult;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tandem_account::{AccountHandle, DynVenueClient};
use tandem_core::AccountIdentity;
use tandem_engine::{
    AccountPairGroup, Coordinator, EmergencyStop, PoolManager, StopController, StopReason,
    TickOutcome,
};
use tandem_market::{ConditionTracker, FeedSource};
use tandem_paper::{PaperMarket, PaperVenue, SyntheticFeed};
use tandem_persistence::BboRecorder;
use tandem_quota::{LedgerStore, QuotaLedger};
use tandem_telemetry::{serve_metrics, DynNotifier, NullNotifier, TelegramNotifier};
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    coordinator: Coordinator,
    tracker: Arc<ConditionTracker>,
    feed: SyntheticFeed,
    notifier: DynNotifier,
    recorder: Option<Arc<Mutex<BboRecorder>>>,
}

impl Application {
    /// Build all components. Venue sessions are not opened yet; that
    /// happens at the start of [`Application::run`].
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let tracker = Arc::new(ConditionTracker::new(config.tracker_config()));

        let notifier: DynNotifier = match config.notifier.telegram() {
            Some((token, chat)) => {
                info!("Telegram notifications enabled");
                Arc::new(TelegramNotifier::new(token, chat)?)
            }
            None => Arc::new(NullNotifier),
        };

        // The feed writes the paper market the venues fill against.
        let market = Arc::new(PaperMarket::new());
        let feed = SyntheticFeed::new(config.feed_config(), Arc::clone(&market));

        let store = LedgerStore::open(&config.quota.ledger_dir)?;
        let mut groups = Vec::with_capacity(config.groups.len());
        for group in &config.groups {
            groups.push(AccountPairGroup::new(
                &group.name,
                Self::build_account(&group.leg_a, &config, &market, &store)?,
                Self::build_account(&group.leg_b, &config, &market, &store)?,
            ));
        }

        let stop = Arc::new(StopController::new(config.engine.max_consecutive_failures));
        let emergency = EmergencyStop::new(&config.engine.emergency_stop_file);
        let pool = PoolManager::new(groups)?;
        let coordinator = Coordinator::new(
            config.engine_config(),
            Arc::clone(&tracker),
            pool,
            stop,
            emergency,
            Arc::clone(&notifier),
        );

        let recorder = if config.recorder.enabled {
            Some(Arc::new(Mutex::new(BboRecorder::new(
                &config.recorder.data_dir,
                config.recorder.buffer_size,
            ))))
        } else {
            None
        };

        Ok(Self {
            config,
            coordinator,
            tracker,
            feed,
            notifier,
            recorder,
        })
    }

    /// One paper account: venue client plus its persisted quota ledger.
    fn build_account(
        name: &str,
        config: &AppConfig,
        market: &Arc<PaperMarket>,
        store: &LedgerStore,
    ) -> AppResult<Arc<AccountHandle>> {
        let identity = AccountIdentity::new(name);
        let ledger =
            QuotaLedger::with_store(identity.clone(), config.window_limits(), store.clone())?;
        let venue: DynVenueClient = Arc::new(PaperVenue::new(
            name,
            Arc::clone(market),
            config.paper.starting_balance,
            config.paper.fee_rate,
            config.paper.latency_ms,
        ));
        Ok(Arc::new(AccountHandle::new(name, identity, venue, ledger)))
    }

    /// Run until a stop reason latches.
    pub async fn run(mut self) -> AppResult<()> {
        let metrics_addr = self.config.metrics_addr();
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = serve_metrics(metrics_addr).await {
                error!(?e, "Metrics server failed");
            }
        });

        // Feed pump: tracker updates plus optional tape recording.
        let mut feed_rx = self.feed.subscribe();
        let pump_tracker = Arc::clone(&self.tracker);
        let pump_recorder = self.recorder.clone();
        let pump_handle = tokio::spawn(async move {
            while let Some(event) = feed_rx.recv().await {
                pump_tracker.apply_quote(event.bid, event.ask, event.bid_size, event.ask_size);
                if let Some(recorder) = &pump_recorder {
                    if let Some(snapshot) = pump_tracker.snapshot() {
                        if let Err(e) = recorder.lock().record(&snapshot) {
                            warn!(?e, "Failed to record snapshot");
                        }
                    }
                }
            }
        });

        self.coordinator.startup().await?;

        let sizing = self.config.instrument.sizing();
        self.notifier
            .notify(&format!(
                "Tandem run started: {} (max size {}), {} group(s), cycle cap {}",
                self.config.instrument.symbol,
                sizing.max_order_size,
                self.config.groups.len(),
                self.config.engine.cycle_cap,
            ))
            .await;

        let stop = self.coordinator.stop_controller();
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.engine.tick_interval_ms));

        info!("Entering control loop");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let TickOutcome::Stopped(reason) = self.coordinator.tick().await {
                        info!(%reason, "Control loop stopped");
                        break;
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    // Latch only; the next tick flattens and settles.
                    info!("Shutdown signal received");
                    stop.trigger(StopReason::Interrupted);
                }
            }
        }

        let summary = self.coordinator.shutdown_summary().await;
        info!("{summary}");
        self.notifier.notify(&summary).await;

        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.lock().close() {
                warn!(?e, "Failed to close recorder");
            }
        }

        pump_handle.abort();
        metrics_handle.abort();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wiring_from_default_config() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.quota.ledger_dir = dir.path().join("quota").to_string_lossy().into_owned();
        config.recorder.enabled = false;

        let app = Application::new(config).unwrap();
        assert_eq!(app.config.groups.len(), 1);
        assert!(app.recorder.is_none());
    }

    #[test]
    fn test_wiring_rejects_empty_groups() {
        let mut config = AppConfig::default();
        config.groups.clear();

        assert!(Application::new(config).is_err());
    }
}
