//! In-process venue with instant fills at the synthetic quote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tandem_account::{AccountError, AccountResult, BoxFuture, VenueClient};
use tandem_core::{ClientOrderId, FillResult, OrderSide, Size};
use tracing::debug;

use crate::market::PaperMarket;

/// Paper trading venue for one account.
///
/// Fills every market order at the shared [`PaperMarket`] quote (buys at
/// the ask, sells at the bid), charges a taker fee against a simulated
/// balance, and never rejects for size. `set_offline(true)` makes every
/// endpoint fail, which is how outages are staged in paper runs.
pub struct PaperVenue {
    name: String,
    market: Arc<PaperMarket>,
    balance: Mutex<Decimal>,
    /// Taker fee as a fraction of notional, e.g. 0.00035.
    fee_rate: Decimal,
    /// Simulated venue round trip per order.
    latency_ms: u64,
    offline: AtomicBool,
}

impl PaperVenue {
    pub fn new(
        name: impl Into<String>,
        market: Arc<PaperMarket>,
        starting_balance: Decimal,
        fee_rate: Decimal,
        latency_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            market,
            balance: Mutex::new(starting_balance),
            fee_rate,
            latency_ms,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate a venue outage; all endpoints fail until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }

    fn check_online(&self) -> AccountResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AccountError::Unavailable(format!(
                "paper venue {} offline",
                self.name
            )));
        }
        Ok(())
    }
}

impl VenueClient for PaperVenue {
    fn connect(&self) -> BoxFuture<'_, AccountResult<()>> {
        Box::pin(async move {
            self.check_online()?;
            debug!(account = %self.name, "Paper session established");
            Ok(())
        })
    }

    fn submit_market_order(
        &self,
        side: OrderSide,
        size: Size,
        client_id: ClientOrderId,
    ) -> BoxFuture<'_, AccountResult<FillResult>> {
        Box::pin(async move {
            self.check_online()?;
            if self.latency_ms > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(self.latency_ms)).await;
            }

            let price = self.market.fill_price(side).ok_or_else(|| {
                AccountError::Unavailable("no synthetic quote yet".to_string())
            })?;

            let fee = price.inner() * size.inner() * self.fee_rate;
            *self.balance.lock() -= fee;

            debug!(
                account = %self.name,
                %side,
                %size,
                price = %price,
                fee = %fee,
                "Paper fill"
            );
            Ok(FillResult::new(client_id, side, price, size))
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, AccountResult<Decimal>> {
        Box::pin(async move {
            self.check_online()?;
            Ok(*self.balance.lock())
        })
    }

    fn refresh_session(&self) -> BoxFuture<'_, AccountResult<()>> {
        Box::pin(async move { self.check_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PaperQuote;
    use rust_decimal_macros::dec;
    use tandem_core::Price;

    fn venue_with_quote() -> PaperVenue {
        let market = Arc::new(PaperMarket::new());
        market.set_quote(PaperQuote {
            bid: Price::new(dec!(99.98)),
            ask: Price::new(dec!(100.02)),
            bid_size: Size::new(dec!(2)),
            ask_size: Size::new(dec!(2)),
        });
        PaperVenue::new("paper-a", market, dec!(1000), dec!(0.001), 0)
    }

    #[tokio::test]
    async fn test_fills_cross_the_book() {
        let venue = venue_with_quote();

        let buy = venue
            .submit_market_order(OrderSide::Buy, Size::new(dec!(1)), ClientOrderId::new())
            .await
            .unwrap();
        assert_eq!(buy.price.inner(), dec!(100.02));

        let sell = venue
            .submit_market_order(OrderSide::Sell, Size::new(dec!(1)), ClientOrderId::new())
            .await
            .unwrap();
        assert_eq!(sell.price.inner(), dec!(99.98));
    }

    #[tokio::test]
    async fn test_fee_reduces_balance() {
        let venue = venue_with_quote();

        venue
            .submit_market_order(OrderSide::Buy, Size::new(dec!(1)), ClientOrderId::new())
            .await
            .unwrap();

        // 100.02 * 1 * 0.001
        assert_eq!(venue.balance(), dec!(1000) - dec!(0.10002));
        assert_eq!(venue.fetch_balance().await.unwrap(), venue.balance());
    }

    #[tokio::test]
    async fn test_no_quote_means_no_fill() {
        let market = Arc::new(PaperMarket::new());
        let venue = PaperVenue::new("paper-a", market, dec!(1000), dec!(0.001), 0);

        let result = venue
            .submit_market_order(OrderSide::Buy, Size::new(dec!(1)), ClientOrderId::new())
            .await;
        assert!(matches!(result, Err(AccountError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_offline_fails_every_endpoint() {
        let venue = venue_with_quote();
        venue.set_offline(true);

        assert!(venue.connect().await.is_err());
        assert!(venue.fetch_balance().await.is_err());
        assert!(venue
            .submit_market_order(OrderSide::Buy, Size::new(dec!(1)), ClientOrderId::new())
            .await
            .is_err());

        venue.set_offline(false);
        assert!(venue.connect().await.is_ok());
    }
}
