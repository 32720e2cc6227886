//! Two-leg order fan-out.
//!
//! Both legs run as spawned tasks and both join handles are awaited, so a
//! panic or error in one leg never discards the other leg's outcome. The
//! coordinator needs both results to know whether it is flat, paired, or
//! half-open.

use std::sync::Arc;

use tokio::task::JoinError;
use tracing::error;

use tandem_account::{AccountError, AccountHandle, AccountResult};
use tandem_core::{FillResult, OrderSide, Size};

/// Which way the next cycle trades. Alternates cycle to cycle so each
/// account takes turns on each side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    /// Leg A buys the open, leg B sells it.
    ALongBShort,
    /// Leg A sells the open, leg B buys it.
    AShortBLong,
}

impl CycleDirection {
    /// Sides for the opening pair, `(leg_a, leg_b)`.
    pub fn open_sides(self) -> (OrderSide, OrderSide) {
        match self {
            Self::ALongBShort => (OrderSide::Buy, OrderSide::Sell),
            Self::AShortBLong => (OrderSide::Sell, OrderSide::Buy),
        }
    }

    /// Sides for the closing pair, `(leg_a, leg_b)`.
    pub fn close_sides(self) -> (OrderSide, OrderSide) {
        let (a, b) = self.open_sides();
        (a.opposite(), b.opposite())
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::ALongBShort => Self::AShortBLong,
            Self::AShortBLong => Self::ALongBShort,
        }
    }
}

/// One leg of a paired submission.
pub struct LegPlan {
    pub handle: Arc<AccountHandle>,
    pub side: OrderSide,
}

/// What came back from one leg.
#[derive(Debug)]
pub enum LegOutcome {
    Filled(FillResult),
    Failed(AccountError),
}

impl LegOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }
}

/// Submit the same size on two accounts at once and wait for both.
pub async fn submit_pair(leg_a: LegPlan, leg_b: LegPlan, size: Size) -> (LegOutcome, LegOutcome) {
    let task_a = tokio::spawn({
        let handle = Arc::clone(&leg_a.handle);
        let side = leg_a.side;
        async move { handle.submit_market_order(side, size).await }
    });
    let task_b = tokio::spawn({
        let handle = Arc::clone(&leg_b.handle);
        let side = leg_b.side;
        async move { handle.submit_market_order(side, size).await }
    });

    let (joined_a, joined_b) = tokio::join!(task_a, task_b);
    (leg_outcome(joined_a), leg_outcome(joined_b))
}

fn leg_outcome(joined: Result<AccountResult<FillResult>, JoinError>) -> LegOutcome {
    match joined {
        Ok(Ok(fill)) => LegOutcome::Filled(fill),
        Ok(Err(err)) => LegOutcome::Failed(err),
        Err(join_err) => {
            error!(error = %join_err, "leg task panicked");
            LegOutcome::Failed(AccountError::Unavailable(
                "leg task panicked".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tandem_account::{DynVenueClient, MockVenue, VenueClient};
    use tandem_core::{AccountIdentity, ClientOrderId, Price};
    use tandem_quota::{QuotaLedger, WindowLimits};

    type BoxFuture<'a, T> =
        std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

    /// Venue whose submit path panics, to exercise the join-error branch.
    struct PanickingVenue;

    impl VenueClient for PanickingVenue {
        fn connect(&self) -> BoxFuture<'_, AccountResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn submit_market_order(
            &self,
            _side: OrderSide,
            _size: Size,
            _client_id: ClientOrderId,
        ) -> BoxFuture<'_, AccountResult<FillResult>> {
            Box::pin(async { panic!("venue adapter bug") })
        }

        fn fetch_balance(&self) -> BoxFuture<'_, AccountResult<Decimal>> {
            Box::pin(async { Ok(Decimal::ZERO) })
        }

        fn refresh_session(&self) -> BoxFuture<'_, AccountResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn handle_for(name: &str, client: DynVenueClient) -> Arc<AccountHandle> {
        let identity = AccountIdentity::new(format!("0x{name}"));
        let ledger = QuotaLedger::new(identity.clone(), WindowLimits::default());
        Arc::new(AccountHandle::new(name, identity, client, ledger))
    }

    #[test]
    fn test_direction_sides_and_flip() {
        let dir = CycleDirection::ALongBShort;
        assert_eq!(dir.open_sides(), (OrderSide::Buy, OrderSide::Sell));
        assert_eq!(dir.close_sides(), (OrderSide::Sell, OrderSide::Buy));
        assert_eq!(dir.flipped(), CycleDirection::AShortBLong);
        assert_eq!(dir.flipped().flipped(), dir);
    }

    #[tokio::test]
    async fn test_both_legs_fill() {
        let venue_a = Arc::new(MockVenue::new(Price::new(dec!(100))));
        let venue_b = Arc::new(MockVenue::new(Price::new(dec!(100))));
        let leg_a = LegPlan {
            handle: handle_for("a", venue_a.clone()),
            side: OrderSide::Buy,
        };
        let leg_b = LegPlan {
            handle: handle_for("b", venue_b.clone()),
            side: OrderSide::Sell,
        };

        let (out_a, out_b) = submit_pair(leg_a, leg_b, Size::new(dec!(0.01))).await;

        assert!(out_a.is_filled());
        assert!(out_b.is_filled());
        assert_eq!(venue_a.get_submissions()[0].side, OrderSide::Buy);
        assert_eq!(venue_b.get_submissions()[0].side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn test_one_failure_keeps_other_fill() {
        let venue_a = Arc::new(MockVenue::new(Price::new(dec!(100))));
        let venue_b = Arc::new(MockVenue::new(Price::new(dec!(100))));
        venue_b.push_submit_outcome(Err(AccountError::OrderRejected("thin book".into())));

        let leg_a = LegPlan {
            handle: handle_for("a", venue_a),
            side: OrderSide::Buy,
        };
        let leg_b = LegPlan {
            handle: handle_for("b", venue_b),
            side: OrderSide::Sell,
        };

        let (out_a, out_b) = submit_pair(leg_a, leg_b, Size::new(dec!(0.01))).await;

        assert!(out_a.is_filled());
        assert!(!out_b.is_filled());
    }

    #[tokio::test]
    async fn test_panicked_leg_does_not_lose_partner_result() {
        let venue_a: DynVenueClient = Arc::new(PanickingVenue);
        let venue_b = Arc::new(MockVenue::new(Price::new(dec!(100))));

        let leg_a = LegPlan {
            handle: handle_for("a", venue_a),
            side: OrderSide::Buy,
        };
        let leg_b = LegPlan {
            handle: handle_for("b", venue_b),
            side: OrderSide::Sell,
        };

        let (out_a, out_b) = submit_pair(leg_a, leg_b, Size::new(dec!(0.01))).await;

        match out_a {
            LegOutcome::Failed(AccountError::Unavailable(msg)) => {
                assert!(msg.contains("panicked"));
            }
            other => panic!("expected panicked leg, got {other:?}"),
        }
        assert!(out_b.is_filled());
    }
}
