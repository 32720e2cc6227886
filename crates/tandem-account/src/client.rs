//! Venue client trait for session, order, and balance operations.
//!
//! Trait-based so the coordinator can be driven against the paper venue,
//! a recording mock, or a real adapter without caring which. Methods
//! return boxed futures to stay dyn-compatible.

use crate::error::{AccountError, AccountResult};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tandem_core::{ClientOrderId, FillResult, OrderSide, Price, Size};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One venue account's session, order, and balance endpoints.
///
/// Every call has bounded blocking time on the venue side; the
/// coordinator additionally spawns order calls so two accounts can be
/// driven concurrently.
pub trait VenueClient: Send + Sync {
    /// Establish a session. Authentication failures are permanent.
    fn connect(&self) -> BoxFuture<'_, AccountResult<()>>;

    /// Submit one market order and wait for its fill or error.
    fn submit_market_order(
        &self,
        side: OrderSide,
        size: Size,
        client_id: ClientOrderId,
    ) -> BoxFuture<'_, AccountResult<FillResult>>;

    /// Fetch the account value.
    fn fetch_balance(&self) -> BoxFuture<'_, AccountResult<Decimal>>;

    /// Refresh the session credential.
    fn refresh_session(&self) -> BoxFuture<'_, AccountResult<()>>;
}

/// Arc wrapper for venue client trait objects.
pub type DynVenueClient = Arc<dyn VenueClient>;

/// One order recorded by [`MockVenue`].
#[derive(Debug, Clone)]
pub struct SubmittedOrder {
    pub side: OrderSide,
    pub size: Size,
    pub client_id: ClientOrderId,
}

/// Scripted venue client for tests.
///
/// Fills at a settable price; submit outcomes can be queued to script
/// partial failures. With an empty script every order fills.
pub struct MockVenue {
    fill_price: parking_lot::Mutex<Price>,
    submit_script: parking_lot::Mutex<VecDeque<AccountResult<()>>>,
    submissions: parking_lot::Mutex<Vec<SubmittedOrder>>,
    balance: parking_lot::Mutex<AccountResult<Decimal>>,
    connect_outcome: parking_lot::Mutex<AccountResult<()>>,
    connect_calls: AtomicU32,
    refresh_calls: AtomicU32,
}

impl MockVenue {
    pub fn new(fill_price: Price) -> Self {
        Self {
            fill_price: parking_lot::Mutex::new(fill_price),
            submit_script: parking_lot::Mutex::new(VecDeque::new()),
            submissions: parking_lot::Mutex::new(Vec::new()),
            balance: parking_lot::Mutex::new(Ok(Decimal::ZERO)),
            connect_outcome: parking_lot::Mutex::new(Ok(())),
            connect_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
        }
    }

    /// Update the price subsequent orders fill at.
    pub fn set_fill_price(&self, price: Price) {
        *self.fill_price.lock() = price;
    }

    /// Queue the outcome for the next unscripted submission.
    pub fn push_submit_outcome(&self, outcome: AccountResult<()>) {
        self.submit_script.lock().push_back(outcome);
    }

    /// Set the balance endpoint's reply.
    pub fn set_balance(&self, balance: AccountResult<Decimal>) {
        *self.balance.lock() = balance;
    }

    /// Set the connect endpoint's reply.
    pub fn set_connect_outcome(&self, outcome: AccountResult<()>) {
        *self.connect_outcome.lock() = outcome;
    }

    /// Orders recorded so far.
    pub fn get_submissions(&self) -> Vec<SubmittedOrder> {
        self.submissions.lock().clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl VenueClient for MockVenue {
    fn connect(&self) -> BoxFuture<'_, AccountResult<()>> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.connect_outcome.lock().clone()
        })
    }

    fn submit_market_order(
        &self,
        side: OrderSide,
        size: Size,
        client_id: ClientOrderId,
    ) -> BoxFuture<'_, AccountResult<FillResult>> {
        Box::pin(async move {
            self.submissions.lock().push(SubmittedOrder {
                side,
                size,
                client_id: client_id.clone(),
            });
            let outcome = self.submit_script.lock().pop_front().unwrap_or(Ok(()));
            match outcome {
                Ok(()) => {
                    let price = *self.fill_price.lock();
                    Ok(FillResult::new(client_id, side, price, size))
                }
                Err(e) => Err(e),
            }
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, AccountResult<Decimal>> {
        Box::pin(async move { self.balance.lock().clone() })
    }

    fn refresh_session(&self) -> BoxFuture<'_, AccountResult<()>> {
        Box::pin(async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_fills_by_default() {
        let venue = MockVenue::new(Price::new(dec!(100)));

        let fill = venue
            .submit_market_order(
                OrderSide::Buy,
                Size::new(dec!(0.5)),
                ClientOrderId::new(),
            )
            .await
            .unwrap();

        assert_eq!(fill.price.inner(), dec!(100));
        assert_eq!(fill.size.inner(), dec!(0.5));
        assert_eq!(venue.get_submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_failure_then_fill() {
        let venue = MockVenue::new(Price::new(dec!(100)));
        venue.push_submit_outcome(Err(AccountError::Unavailable("down".into())));

        let first = venue
            .submit_market_order(OrderSide::Sell, Size::new(dec!(1)), ClientOrderId::new())
            .await;
        assert!(first.is_err());

        let second = venue
            .submit_market_order(OrderSide::Sell, Size::new(dec!(1)), ClientOrderId::new())
            .await;
        assert!(second.is_ok());
        assert_eq!(venue.get_submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_connect_outcome() {
        let venue = MockVenue::new(Price::new(dec!(100)));
        venue.set_connect_outcome(Err(AccountError::Auth("bad key".into())));

        assert!(venue.connect().await.is_err());
        assert_eq!(venue.connect_calls(), 1);
    }
}
