// --- File: crates/slotsync_cache/src/cache.rs ---
//! In-memory availability cache.
//!
//! One entry per `DateKey`, with a TTL that depends on whether the date is popular.
//! At most one fetch per date is in flight; concurrent readers attach to it.
//! Live deltas write into the same entries, and a fetch that started before a
//! delta never reverts the slot that delta touched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use futures_util::future::join_all;
use slotsync_common::{
    config_error, internal_error, Availability, AvailabilitySource, DateKey, SlotStatus,
    SlotSyncError, TimeSlot,
};
use slotsync_config::AppConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub type FetchOutcome = Result<Availability, SlotSyncError>;
type OutcomeReceiver = watch::Receiver<Option<FetchOutcome>>;
type OutcomeSender = watch::Sender<Option<FetchOutcome>>;

/// Freshness policy: popular dates expire sooner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    pub popular_ttl: Duration,
    pub regular_ttl: Duration,
    pub popular_days: Vec<Weekday>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            popular_ttl: Duration::from_secs(120),
            regular_ttl: Duration::from_secs(300),
            popular_days: vec![Weekday::Fri, Weekday::Sat, Weekday::Sun],
        }
    }
}

impl TtlPolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self, SlotSyncError> {
        Ok(Self {
            popular_ttl: Duration::from_secs(config.cache.popular_ttl_secs),
            regular_ttl: Duration::from_secs(config.cache.regular_ttl_secs),
            popular_days: config.popular_weekdays().map_err(config_error)?,
        })
    }

    pub fn is_popular(&self, date: DateKey) -> bool {
        self.popular_days.contains(&date.weekday())
    }

    pub fn ttl(&self, popular: bool) -> Duration {
        if popular {
            self.popular_ttl
        } else {
            self.regular_ttl
        }
    }

    /// Shared by lazy expiry on read and by the sweeper.
    pub fn is_expired(&self, fetched_at: Instant, popular: bool, now: Instant) -> bool {
        now.saturating_duration_since(fetched_at) >= self.ttl(popular)
    }
}

/// Result of applying a pushed slot status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    Applied { previous: SlotStatus },
    /// A newer push for the same slot was already applied.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct SlotState {
    status: SlotStatus,
    /// Cache-wide write counter at the time of the write.
    revision: u64,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct CacheEntry {
    slots: BTreeMap<TimeSlot, SlotState>,
    fetched_at: Instant,
    popular: bool,
    /// Created by a push before any fetch completed.
    partial: bool,
}

impl CacheEntry {
    fn empty(popular: bool, now: Instant) -> Self {
        Self {
            slots: BTreeMap::new(),
            fetched_at: now,
            popular,
            partial: true,
        }
    }

    fn view(&self) -> Availability {
        Availability::from_statuses(self.slots.iter().map(|(slot, state)| (*slot, state.status)))
    }

    fn status(&self, slot: TimeSlot) -> SlotStatus {
        self.slots
            .get(&slot)
            .map(|state| state.status)
            .unwrap_or_default()
    }

    /// Fills every slot not written after the fetch started.
    fn merge_fetch(&mut self, fetched: &Availability, started_revision: u64) {
        for (slot, status) in fetched.iter() {
            match self.slots.get_mut(&slot) {
                Some(state) if state.revision > started_revision => {
                    debug!("Keeping pushed status for {} over in-flight fetch", slot);
                }
                Some(state) => {
                    state.status = status;
                    state.revision = started_revision;
                }
                None => {
                    self.slots.insert(
                        slot,
                        SlotState {
                            status,
                            revision: started_revision,
                            pushed_at: None,
                        },
                    );
                }
            }
        }
    }
}

struct PendingFetch {
    started_revision: u64,
    outcome: OutcomeReceiver,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<DateKey, CacheEntry>,
    pending: HashMap<DateKey, PendingFetch>,
    revision: u64,
}

struct CacheInner {
    source: Arc<dyn AvailabilitySource>,
    policy: TtlPolicy,
    state: Mutex<CacheState>,
}

/// Handle to the shared cache. Clones share the same entries.
#[derive(Clone)]
pub struct AvailabilityCache {
    inner: Arc<CacheInner>,
}

enum Lookup {
    Hit(Availability),
    Wait(OutcomeReceiver),
}

impl AvailabilityCache {
    pub fn new(source: Arc<dyn AvailabilitySource>, policy: TtlPolicy) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                policy,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.inner.policy
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the slot map for `date`, fetching it if the cached entry is missing,
    /// expired or only known from pushes. Concurrent callers share one fetch.
    pub async fn get(&self, date: DateKey) -> Result<Availability, SlotSyncError> {
        let lookup = {
            let mut state = self.lock();
            match self.valid_view(&state, date) {
                Some(view) => Lookup::Hit(view),
                None => Lookup::Wait(self.attach_or_start(&mut state, date)),
            }
        };

        match lookup {
            Lookup::Hit(view) => {
                debug!("Availability cache hit for {}", date);
                Ok(view)
            }
            Lookup::Wait(outcome) => await_outcome(outcome).await,
        }
    }

    /// Starts a background fetch unless `date` is already valid or pending.
    /// Returns whether a fetch was started.
    pub fn warm(&self, date: DateKey) -> bool {
        let mut state = self.lock();
        if state.pending.contains_key(&date) || self.valid_view(&state, date).is_some() {
            return false;
        }
        self.attach_or_start(&mut state, date);
        true
    }

    /// Fetches several dates with one bulk request. Dates the bulk call fails on
    /// or omits are fetched individually; valid and pending dates are not refetched.
    pub async fn fetch_many(&self, dates: Vec<DateKey>) -> BTreeMap<DateKey, FetchOutcome> {
        let mut results: BTreeMap<DateKey, FetchOutcome> = BTreeMap::new();
        let mut waiting: Vec<(DateKey, OutcomeReceiver)> = Vec::new();
        let mut to_fetch: Vec<(DateKey, OutcomeSender)> = Vec::new();

        {
            let mut state = self.lock();
            for date in dates {
                if results.contains_key(&date) || waiting.iter().any(|(d, _)| *d == date) {
                    continue;
                }
                if let Some(view) = self.valid_view(&state, date) {
                    results.insert(date, Ok(view));
                } else if let Some(pending) = state.pending.get(&date) {
                    waiting.push((date, pending.outcome.clone()));
                } else {
                    let (sender, receiver) = watch::channel(None);
                    let started_revision = state.revision;
                    state.pending.insert(
                        date,
                        PendingFetch {
                            started_revision,
                            outcome: receiver.clone(),
                        },
                    );
                    waiting.push((date, receiver));
                    to_fetch.push((date, sender));
                }
            }
        }

        if !to_fetch.is_empty() {
            let cache = self.clone();
            tokio::spawn(async move { cache.run_bulk_fetch(to_fetch).await });
        }

        for (date, outcome) in waiting {
            results.insert(date, await_outcome(outcome).await);
        }
        results
    }

    async fn run_bulk_fetch(&self, to_fetch: Vec<(DateKey, OutcomeSender)>) {
        let dates: Vec<DateKey> = to_fetch.iter().map(|(date, _)| *date).collect();
        debug!("Bulk fetching availability for {} dates", dates.len());

        let mut fetched = match self.inner.source.fetch_bulk(dates).await {
            Ok(map) => map,
            Err(e) => {
                warn!("Bulk availability fetch failed, falling back to per-date requests: {}", e);
                BTreeMap::new()
            }
        };

        let mut fallback = Vec::new();
        for (date, sender) in to_fetch {
            match fetched.remove(&date) {
                Some(availability) => {
                    sender.send_replace(Some(self.complete_fetch(date, Ok(availability))));
                }
                None => fallback.push((date, sender)),
            }
        }

        join_all(fallback.into_iter().map(|(date, sender)| async move {
            let result = self.inner.source.fetch_date(date).await;
            sender.send_replace(Some(self.complete_fetch(date, result)));
        }))
        .await;
    }

    /// Writes one pushed slot status. Creates a partial entry when the date is
    /// not cached yet and refreshes the entry's age.
    pub fn apply_live_delta(
        &self,
        date: DateKey,
        slot: TimeSlot,
        status: SlotStatus,
        at: DateTime<Utc>,
    ) -> DeltaOutcome {
        let now = Instant::now();
        let popular = self.inner.policy.is_popular(date);
        let mut state = self.lock();
        state.revision += 1;
        let revision = state.revision;

        let policy = &self.inner.policy;
        let entry = state
            .entries
            .entry(date)
            .or_insert_with(|| CacheEntry::empty(popular, now));
        if policy.is_expired(entry.fetched_at, entry.popular, now) {
            // Unswept expired data must not be revived by a single-slot push.
            debug!("Push for {} lands on an expired entry; starting over", date);
            *entry = CacheEntry::empty(popular, now);
        }

        if let Some(existing) = entry.slots.get(&slot) {
            if existing.pushed_at.is_some_and(|seen| at < seen) {
                debug!("Ignoring out-of-date push for {} {}", date, slot);
                return DeltaOutcome::Stale;
            }
        }

        let previous = entry.status(slot);
        entry.slots.insert(
            slot,
            SlotState {
                status,
                revision,
                pushed_at: Some(at),
            },
        );
        entry.fetched_at = now;
        DeltaOutcome::Applied { previous }
    }

    /// Current cached view without fetching. Partial entries are included.
    pub fn peek(&self, date: DateKey) -> Option<Availability> {
        let state = self.lock();
        state
            .entries
            .get(&date)
            .filter(|entry| {
                !self
                    .inner
                    .policy
                    .is_expired(entry.fetched_at, entry.popular, Instant::now())
            })
            .map(CacheEntry::view)
    }

    /// Whether `get(date)` would be answered without a fetch.
    pub fn is_valid(&self, date: DateKey) -> bool {
        self.valid_view(&self.lock(), date).is_some()
    }

    pub fn is_pending(&self, date: DateKey) -> bool {
        self.lock().pending.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. In-flight fetches still complete and repopulate their date.
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        info!("Availability cache cleared ({} entries)", dropped);
    }

    /// Removes expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let policy = &self.inner.policy;
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !policy.is_expired(entry.fetched_at, entry.popular, now));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!("Swept {} expired availability entries", removed);
        }
        removed
    }

    /// Periodically purges expired entries. Stops once every cache handle is dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Availability cache dropped; sweeper exiting");
                    break;
                };
                AvailabilityCache { inner }.purge_expired();
            }
        })
    }

    fn valid_view(&self, state: &CacheState, date: DateKey) -> Option<Availability> {
        state
            .entries
            .get(&date)
            .filter(|entry| {
                !entry.partial
                    && !self
                        .inner
                        .policy
                        .is_expired(entry.fetched_at, entry.popular, Instant::now())
            })
            .map(CacheEntry::view)
    }

    fn attach_or_start(&self, state: &mut CacheState, date: DateKey) -> OutcomeReceiver {
        if let Some(pending) = state.pending.get(&date) {
            debug!("Joining in-flight availability fetch for {}", date);
            return pending.outcome.clone();
        }

        debug!("Availability cache miss for {}; fetching", date);
        let (sender, receiver) = watch::channel(None);
        state.pending.insert(
            date,
            PendingFetch {
                started_revision: state.revision,
                outcome: receiver.clone(),
            },
        );

        let cache = self.clone();
        tokio::spawn(async move {
            let result = cache.inner.source.fetch_date(date).await;
            sender.send_replace(Some(cache.complete_fetch(date, result)));
        });
        receiver
    }

    /// Stores a finished fetch and clears its pending marker. Waiters receive the merged view.
    fn complete_fetch(&self, date: DateKey, result: FetchOutcome) -> FetchOutcome {
        let now = Instant::now();
        let popular = self.inner.policy.is_popular(date);
        let mut state = self.lock();
        let started_revision = state
            .pending
            .remove(&date)
            .map(|pending| pending.started_revision)
            .unwrap_or(0);

        match result {
            Ok(fetched) => {
                let entry = state
                    .entries
                    .entry(date)
                    .or_insert_with(|| CacheEntry::empty(popular, now));
                entry.merge_fetch(&fetched, started_revision);
                entry.fetched_at = now;
                entry.partial = false;
                Ok(entry.view())
            }
            Err(e) => {
                warn!("Availability fetch for {} failed: {}", date, e);
                Err(e)
            }
        }
    }
}

async fn await_outcome(mut outcome: OutcomeReceiver) -> FetchOutcome {
    match outcome.wait_for(Option::is_some).await {
        Ok(ready) => ready
            .clone()
            .unwrap_or_else(|| Err(internal_error("availability fetch resolved without a value"))),
        Err(_) => Err(internal_error("availability fetch was abandoned")),
    }
}
