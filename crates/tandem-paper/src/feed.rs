//! Synthetic top-of-book generator.
//!
//! Produces a seeded random walk that alternates between a pinched book
//! (bid == ask, the condition the engine trades) and a normally spread
//! book, so a paper run exercises entry, exit, and regime detection
//! without a venue connection.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tandem_core::{Price, Size};
use tandem_market::{FeedEvent, FeedSource};
use tokio::sync::mpsc;
use tracing::debug;

use crate::market::{PaperMarket, PaperQuote};

#[derive(Debug, Clone)]
pub struct SyntheticFeedConfig {
    pub instrument: String,
    /// Mid price the walk starts from.
    pub base_price: Decimal,
    pub tick_interval_ms: u64,
    /// Per-tick mid drift, uniform in [-max_drift_bps, +max_drift_bps].
    pub max_drift_bps: i64,
    /// Quoted spread while the book is not pinched.
    pub normal_spread_bps: i64,
    /// Ticks per pinched stretch (bid == ask).
    pub pinched_ticks: u32,
    /// Ticks per normal stretch.
    pub normal_ticks: u32,
    /// Depth bounds in tenths of a unit, e.g. 5..=40 is 0.5 to 4.0.
    pub min_depth_tenths: i64,
    pub max_depth_tenths: i64,
    pub seed: u64,
}

impl Default for SyntheticFeedConfig {
    fn default() -> Self {
        Self {
            instrument: "PAPER-USD".to_string(),
            base_price: Decimal::from(100u32),
            tick_interval_ms: 50,
            max_drift_bps: 5,
            normal_spread_bps: 4,
            // 50 ticks at 50ms holds the pinch for 2.5s, long enough to
            // cross both the entry window and the accelerated threshold.
            pinched_ticks: 50,
            normal_ticks: 20,
            min_depth_tenths: 5,
            max_depth_tenths: 40,
            seed: 42,
        }
    }
}

/// Seeded synthetic quote stream; same seed, same tape.
pub struct SyntheticFeed {
    config: SyntheticFeedConfig,
    market: Arc<PaperMarket>,
}

impl SyntheticFeed {
    pub fn new(config: SyntheticFeedConfig, market: Arc<PaperMarket>) -> Self {
        Self { config, market }
    }
}

impl FeedSource for SyntheticFeed {
    fn instrument(&self) -> &str {
        &self.config.instrument
    }

    fn subscribe(&self) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(256);
        let config = self.config.clone();
        let market = Arc::clone(&self.market);

        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut mid = config.base_price;
            let mut pinched = true;
            let mut ticks_left = config.pinched_ticks.max(1);

            loop {
                tokio::time::sleep(tokio::time::Duration::from_millis(
                    config.tick_interval_ms,
                ))
                .await;

                // Drift the mid by a few basis points per tick.
                let jitter_bps = rng.gen_range(-config.max_drift_bps..=config.max_drift_bps);
                mid += mid * Decimal::new(jitter_bps, 4);

                let (bid, ask) = if pinched {
                    let px = mid.round_dp(2);
                    (px, px)
                } else {
                    let half = mid * Decimal::new(config.normal_spread_bps, 4) / Decimal::TWO;
                    let bid = (mid - half).round_dp(2);
                    let mut ask = (mid + half).round_dp(2);
                    if ask <= bid {
                        ask = bid + Decimal::new(1, 2);
                    }
                    (bid, ask)
                };

                let depth = |rng: &mut StdRng| {
                    Size::new(Decimal::new(
                        rng.gen_range(config.min_depth_tenths..=config.max_depth_tenths),
                        1,
                    ))
                };
                let event = FeedEvent {
                    bid: Price::new(bid),
                    ask: Price::new(ask),
                    bid_size: depth(&mut rng),
                    ask_size: depth(&mut rng),
                };

                market.set_quote(PaperQuote {
                    bid: event.bid,
                    ask: event.ask,
                    bid_size: event.bid_size,
                    ask_size: event.ask_size,
                });

                // Drop on backpressure; a stale quote is worse than a missing one.
                match tx.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }

                ticks_left -= 1;
                if ticks_left == 0 {
                    pinched = !pinched;
                    ticks_left = if pinched {
                        config.pinched_ticks.max(1)
                    } else {
                        config.normal_ticks.max(1)
                    };
                    debug!(pinched, mid = %mid, "Synthetic book phase flip");
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SyntheticFeedConfig {
        SyntheticFeedConfig {
            tick_interval_ms: 1,
            pinched_ticks: 3,
            normal_ticks: 3,
            ..SyntheticFeedConfig::default()
        }
    }

    #[tokio::test]
    async fn test_pinched_phase_quotes_zero_spread() {
        let market = Arc::new(PaperMarket::new());
        let feed = SyntheticFeed::new(fast_config(), Arc::clone(&market));
        let mut rx = feed.subscribe();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.bid, first.ask);

        // The shared market mirrors the latest event.
        assert!(market.quote().is_some());
    }

    #[tokio::test]
    async fn test_phases_alternate() {
        let feed = SyntheticFeed::new(fast_config(), Arc::new(PaperMarket::new()));
        let mut rx = feed.subscribe();

        let mut saw_pinched = false;
        let mut saw_spread = false;
        for _ in 0..8 {
            let event = rx.recv().await.unwrap();
            if event.bid == event.ask {
                saw_pinched = true;
            } else {
                assert!(event.ask > event.bid);
                saw_spread = true;
            }
        }
        assert!(saw_pinched && saw_spread);
    }

    #[tokio::test]
    async fn test_same_seed_same_tape() {
        let feed_a = SyntheticFeed::new(fast_config(), Arc::new(PaperMarket::new()));
        let feed_b = SyntheticFeed::new(fast_config(), Arc::new(PaperMarket::new()));
        let mut rx_a = feed_a.subscribe();
        let mut rx_b = feed_b.subscribe();

        for _ in 0..5 {
            let a = rx_a.recv().await.unwrap();
            let b = rx_b.recv().await.unwrap();
            assert_eq!(a, b);
        }
    }
}
