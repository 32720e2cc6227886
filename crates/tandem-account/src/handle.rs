//! Account handle: one authenticated account plus its quota ledger.

use crate::client::DynVenueClient;
use crate::error::AccountResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tandem_core::{now_ms, AccountIdentity, ClientOrderId, FillResult, OrderSide, Size};
use tandem_quota::QuotaLedger;
use tandem_telemetry::Metrics;
use tracing::{debug, info, warn};

/// Sentinel for "balance currently unknown" (transient fetch failure).
pub const BALANCE_UNAVAILABLE: Decimal = Decimal::NEGATIVE_ONE;

/// One trading account as the coordinator sees it.
///
/// Owns the account's quota ledger and its session-age bookkeeping. The
/// handle never schedules its own refreshes; the coordinator drives
/// `refresh_session_if_stale` on its cadence.
pub struct AccountHandle {
    name: String,
    identity: AccountIdentity,
    client: DynVenueClient,
    ledger: QuotaLedger,
    session_refreshed_at_ms: AtomicU64,
}

impl AccountHandle {
    pub fn new(
        name: impl Into<String>,
        identity: AccountIdentity,
        client: DynVenueClient,
        ledger: QuotaLedger,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            client,
            ledger,
            session_refreshed_at_ms: AtomicU64::new(0),
        }
    }

    /// Operator-facing label (e.g. `g1-a`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    /// This account's quota ledger.
    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Establish a session.
    ///
    /// Authentication errors propagate; they are permanent for this
    /// account and the caller decides whether another group can take over.
    pub async fn connect(&self) -> AccountResult<()> {
        self.client.connect().await?;
        self.session_refreshed_at_ms.store(now_ms(), Ordering::SeqCst);
        info!(account = %self.name, identity = %self.identity, "Session established");
        Ok(())
    }

    /// Submit one market order and wait for the fill.
    ///
    /// Failures surface as errors, never as a silent no-op. Latency is
    /// measured around the venue round trip.
    pub async fn submit_market_order(
        &self,
        side: OrderSide,
        size: Size,
    ) -> AccountResult<FillResult> {
        let client_id = ClientOrderId::new();
        let started = Instant::now();
        let result = self
            .client
            .submit_market_order(side, size, client_id.clone())
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        Metrics::order_latency(&self.name, latency_ms);

        match &result {
            Ok(fill) => debug!(
                account = %self.name,
                %side,
                size = %fill.size,
                price = %fill.price,
                latency_ms,
                "Order filled"
            ),
            Err(e) => warn!(
                account = %self.name,
                %side,
                %size,
                cloid = %client_id,
                error = %e,
                "Order failed"
            ),
        }
        result
    }

    /// Fetch the account value, mapping transient failures to the
    /// [`BALANCE_UNAVAILABLE`] sentinel.
    pub async fn fetch_balance(&self) -> Decimal {
        match self.client.fetch_balance().await {
            Ok(balance) => {
                if let Some(v) = balance.to_f64() {
                    Metrics::balance(&self.name, v);
                }
                balance
            }
            Err(e) => {
                warn!(account = %self.name, error = %e, "Balance fetch failed");
                BALANCE_UNAVAILABLE
            }
        }
    }

    /// Refresh the session credential if it is older than `max_age_secs`.
    pub async fn refresh_session_if_stale(&self, max_age_secs: u64) -> AccountResult<()> {
        self.refresh_session_if_stale_at(max_age_secs, now_ms()).await
    }

    /// Refresh against an injected clock.
    pub async fn refresh_session_if_stale_at(
        &self,
        max_age_secs: u64,
        now: u64,
    ) -> AccountResult<()> {
        let last = self.session_refreshed_at_ms.load(Ordering::SeqCst);
        if now.saturating_sub(last) < max_age_secs * 1000 {
            return Ok(());
        }
        self.client.refresh_session().await?;
        self.session_refreshed_at_ms.store(now, Ordering::SeqCst);
        debug!(account = %self.name, "Session refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockVenue;
    use crate::error::AccountError;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tandem_core::Price;
    use tandem_quota::{QuotaLedger, WindowLimits};

    fn handle_with(venue: Arc<MockVenue>) -> AccountHandle {
        let identity = AccountIdentity::new("0xhandle");
        AccountHandle::new(
            "g1-a",
            identity.clone(),
            venue,
            QuotaLedger::new(identity, WindowLimits::default()),
        )
    }

    #[tokio::test]
    async fn test_submit_passes_through_fill() {
        let venue = Arc::new(MockVenue::new(Price::new(dec!(250))));
        let handle = handle_with(venue.clone());

        let fill = handle
            .submit_market_order(OrderSide::Buy, Size::new(dec!(2)))
            .await
            .unwrap();

        assert_eq!(fill.price.inner(), dec!(250));
        assert_eq!(venue.get_submissions().len(), 1);
        assert_eq!(venue.get_submissions()[0].side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_balance_sentinel_on_failure() {
        let venue = Arc::new(MockVenue::new(Price::new(dec!(100))));
        venue.set_balance(Err(AccountError::Unavailable("flaky".into())));
        let handle = handle_with(venue);

        assert_eq!(handle.fetch_balance().await, BALANCE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_balance_passthrough_on_success() {
        let venue = Arc::new(MockVenue::new(Price::new(dec!(100))));
        venue.set_balance(Ok(dec!(10000)));
        let handle = handle_with(venue);

        assert_eq!(handle.fetch_balance().await, dec!(10000));
    }

    #[tokio::test]
    async fn test_refresh_only_when_stale() {
        let venue = Arc::new(MockVenue::new(Price::new(dec!(100))));
        let handle = handle_with(venue.clone());

        // Fresh session (refreshed at t=1_000_000).
        handle
            .refresh_session_if_stale_at(240, 1_000_000)
            .await
            .unwrap();
        assert_eq!(venue.refresh_calls(), 1);

        // 239s later: still fresh.
        handle
            .refresh_session_if_stale_at(240, 1_239_000)
            .await
            .unwrap();
        assert_eq!(venue.refresh_calls(), 1);

        // 240s later: stale.
        handle
            .refresh_session_if_stale_at(240, 1_240_000)
            .await
            .unwrap();
        assert_eq!(venue.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_connect_propagates_auth_failure() {
        let venue = Arc::new(MockVenue::new(Price::new(dec!(100))));
        venue.set_connect_outcome(Err(AccountError::Auth("bad key".into())));
        let handle = handle_with(venue);

        let err = handle.connect().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
