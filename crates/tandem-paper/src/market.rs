//! Shared quote state between the synthetic feed and the paper venue.

use parking_lot::RwLock;
use tandem_core::{OrderSide, Price, Size};

/// Top-of-book as the paper venue sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperQuote {
    pub bid: Price,
    pub ask: Price,
    pub bid_size: Size,
    pub ask_size: Size,
}

/// Current synthetic market, written by the feed task and read by the
/// venue at fill time. Both sides hold it behind an `Arc` so paper fills
/// always land on the same quote the tracker just saw.
pub struct PaperMarket {
    quote: RwLock<Option<PaperQuote>>,
}

impl PaperMarket {
    pub fn new() -> Self {
        Self {
            quote: RwLock::new(None),
        }
    }

    pub fn set_quote(&self, quote: PaperQuote) {
        *self.quote.write() = Some(quote);
    }

    pub fn quote(&self) -> Option<PaperQuote> {
        *self.quote.read()
    }

    /// Price a market order crossing the book: buys lift the ask,
    /// sells hit the bid.
    pub fn fill_price(&self, side: OrderSide) -> Option<Price> {
        self.quote.read().map(|q| match side {
            OrderSide::Buy => q.ask,
            OrderSide::Sell => q.bid,
        })
    }
}

impl Default for PaperMarket {
    fn default() -> Self {
        Self::new()
    }
}
