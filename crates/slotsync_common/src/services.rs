// --- File: crates/slotsync_common/src/services.rs ---
//! Service abstractions for the server of record.
//!
//! The cache only talks to the pull API through this trait so tests and
//! alternative backends can stand in for the HTTP implementation.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::SlotSyncError;
use crate::models::{Availability, DateKey};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Pull-side access to availability data.
pub trait AvailabilitySource: Send + Sync {
    /// Fetch the slot map for one date.
    fn fetch_date(&self, date: DateKey) -> BoxFuture<'_, Availability, SlotSyncError>;

    /// Fetch several dates in one round trip.
    ///
    /// Implementations may omit dates from the result; callers treat omitted
    /// dates as not fetched.
    fn fetch_bulk(
        &self,
        dates: Vec<DateKey>,
    ) -> BoxFuture<'_, BTreeMap<DateKey, Availability>, SlotSyncError>;
}
