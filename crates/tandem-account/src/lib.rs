//! One authenticated venue account, wrapped for the coordinator.
//!
//! [`VenueClient`] is the seam to the venue's session, order, and balance
//! endpoints. [`AccountHandle`] wraps one client with the account's quota
//! ledger, session-age tracking, and the balance sentinel convention.

pub mod client;
pub mod error;
pub mod handle;

pub use client::{BoxFuture, DynVenueClient, MockVenue, SubmittedOrder, VenueClient};
pub use error::{AccountError, AccountResult};
pub use handle::{AccountHandle, BALANCE_UNAVAILABLE};
