// --- File: crates/slotsync_cache/src/mock.rs ---
//! Scriptable `AvailabilitySource` for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use slotsync_common::{
    external_service_error, Availability, AvailabilitySource, BoxFuture, DateKey, SlotSyncError,
};
use tokio::sync::Semaphore;

#[derive(Default)]
struct MockState {
    data: HashMap<DateKey, Availability>,
    date_calls: Vec<DateKey>,
    bulk_calls: Vec<Vec<DateKey>>,
    failing_dates: Vec<DateKey>,
    fail_bulk: bool,
    /// Dates the bulk endpoint leaves out of its answer.
    bulk_omits: Vec<DateKey>,
}

/// Serves canned availability. Unknown dates are fully available.
///
/// While gated, every fetch waits for a `release()` permit before answering, so
/// tests can hold a request in flight.
#[derive(Clone)]
pub struct MockAvailabilitySource {
    state: Arc<Mutex<MockState>>,
    gate: Arc<Semaphore>,
    gated: Arc<Mutex<bool>>,
}

impl Default for MockAvailabilitySource {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            gate: Arc::new(Semaphore::new(0)),
            gated: Arc::default(),
        }
    }
}

impl MockAvailabilitySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, date: DateKey, availability: Availability) {
        self.lock().data.insert(date, availability);
    }

    pub fn fail_date(&self, date: DateKey) {
        self.lock().failing_dates.push(date);
    }

    pub fn heal_date(&self, date: DateKey) {
        self.lock().failing_dates.retain(|d| *d != date);
    }

    pub fn fail_bulk(&self, fail: bool) {
        self.lock().fail_bulk = fail;
    }

    pub fn omit_from_bulk(&self, date: DateKey) {
        self.lock().bulk_omits.push(date);
    }

    pub fn gate(&self) {
        *self.gated.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Lets `count` held fetches through.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn date_calls(&self) -> Vec<DateKey> {
        self.lock().date_calls.clone()
    }

    pub fn calls_for(&self, date: DateKey) -> usize {
        self.lock().date_calls.iter().filter(|d| **d == date).count()
    }

    pub fn bulk_calls(&self) -> Vec<Vec<DateKey>> {
        self.lock().bulk_calls.clone()
    }

    async fn pass_gate(&self) {
        let gated = *self.gated.lock().unwrap_or_else(PoisonError::into_inner);
        if gated {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
    }
}

impl AvailabilitySource for MockAvailabilitySource {
    fn fetch_date(&self, date: DateKey) -> BoxFuture<'_, Availability, SlotSyncError> {
        self.lock().date_calls.push(date);
        Box::pin(async move {
            self.pass_gate().await;
            let state = self.lock();
            if state.failing_dates.contains(&date) {
                return Err(external_service_error("mock", format!("no answer for {}", date)));
            }
            Ok(state.data.get(&date).cloned().unwrap_or_default())
        })
    }

    fn fetch_bulk(
        &self,
        dates: Vec<DateKey>,
    ) -> BoxFuture<'_, BTreeMap<DateKey, Availability>, SlotSyncError> {
        self.lock().bulk_calls.push(dates.clone());
        Box::pin(async move {
            self.pass_gate().await;
            let state = self.lock();
            if state.fail_bulk {
                return Err(external_service_error("mock", "bulk endpoint unavailable"));
            }
            Ok(dates
                .into_iter()
                .filter(|date| !state.bulk_omits.contains(date) && !state.failing_dates.contains(date))
                .map(|date| (date, state.data.get(&date).cloned().unwrap_or_default()))
                .collect())
        })
    }
}
