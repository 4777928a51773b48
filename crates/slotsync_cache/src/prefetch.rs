// --- File: crates/slotsync_cache/src/prefetch.rs ---
//! Speculative cache warm-up around the date the user is looking at.

use chrono::Utc;
use chrono_tz::Tz;
use slotsync_common::logging::log_error;
use slotsync_common::{config_error, DateKey, SlotSyncError};
use slotsync_config::AppConfig;
use tracing::debug;

use crate::cache::AvailabilityCache;

pub struct Prefetcher {
    cache: AvailabilityCache,
    lookahead_days: i64,
    popular_horizon_days: i64,
    time_zone: Tz,
}

impl Prefetcher {
    pub fn new(cache: AvailabilityCache, config: &AppConfig) -> Result<Self, SlotSyncError> {
        Ok(Self::with_settings(
            cache,
            config.cache.prefetch_lookahead_days,
            config.cache.popular_horizon_days,
            config.time_zone().map_err(config_error)?,
        ))
    }

    pub fn with_settings(
        cache: AvailabilityCache,
        lookahead_days: i64,
        popular_horizon_days: i64,
        time_zone: Tz,
    ) -> Self {
        Self {
            cache,
            lookahead_days,
            popular_horizon_days,
            time_zone,
        }
    }

    /// The business's current calendar date.
    pub fn today(&self) -> DateKey {
        DateKey::new(Utc::now().with_timezone(&self.time_zone).date_naive())
    }

    /// Dates worth warming for `focus`, without duplicates, in this order: the
    /// following days, the previous day unless it is before `today`, then every
    /// popular date from `today` through the horizon.
    pub fn candidates(&self, focus: DateKey, today: DateKey) -> Vec<DateKey> {
        let mut dates = Vec::new();
        let mut push = |date: Option<DateKey>| {
            if let Some(date) = date {
                if !dates.contains(&date) {
                    dates.push(date);
                }
            }
        };

        for offset in 1..=self.lookahead_days {
            push(focus.add_days(offset));
        }
        push(focus.add_days(-1).filter(|previous| *previous >= today));

        let policy = self.cache.policy();
        for offset in 0..=self.popular_horizon_days {
            push(today.add_days(offset).filter(|date| policy.is_popular(*date)));
        }
        dates
    }

    /// Fire-and-forget warm-up. Returns the dates a fetch was started for;
    /// already valid or pending dates are skipped and failures are only logged.
    pub fn prefetch(&self, focus: DateKey) -> Vec<DateKey> {
        let started: Vec<DateKey> = self
            .candidates(focus, self.today())
            .into_iter()
            .filter(|date| self.cache.warm(*date))
            .collect();
        debug!("Prefetch around {} started {} fetches", focus, started.len());
        started
    }

    /// Warms `dates` with one bulk request, degrading to per-date requests.
    /// Never fails; returns how many of the dates ended up cached.
    pub async fn bulk_prefetch(&self, dates: Vec<DateKey>) -> usize {
        let outcomes = self.cache.fetch_many(dates).await;
        let mut cached = 0;
        for (date, outcome) in &outcomes {
            match outcome {
                Ok(_) => cached += 1,
                Err(e) => log_error(e, &format!("Bulk prefetch of {}", date)),
            }
        }
        debug!("Bulk prefetch cached {} of {} dates", cached, outcomes.len());
        cached
    }
}
