// --- File: crates/slotsync_cache/src/suggestions.rs ---
//! Date suggestions for the date picker, computed through the cache so the
//! scan's fetches are coalesced and reused by later reads.

use chrono::Weekday;
use serde::Serialize;
use slotsync_common::DateKey;
use slotsync_config::BookingConfig;
use tracing::debug;

use crate::cache::AvailabilityCache;

const NEXT_AVAILABLE_LIMIT: usize = 5;
const WEEKEND_LIMIT: usize = 4;
const POPULAR_LIMIT: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateSuggestions {
    pub next_available: Vec<DateKey>,
    pub weekends: Vec<DateKey>,
    pub popular: Vec<DateKey>,
}

impl DateSuggestions {
    fn is_full(&self) -> bool {
        self.next_available.len() >= NEXT_AVAILABLE_LIMIT
            && self.weekends.len() >= WEEKEND_LIMIT
            && self.popular.len() >= POPULAR_LIMIT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionWindow {
    /// First bookable day, counted from today.
    pub min_advance_days: i64,
    pub window_days: i64,
}

impl Default for SuggestionWindow {
    fn default() -> Self {
        Self {
            min_advance_days: 2,
            window_days: 30,
        }
    }
}

impl From<&BookingConfig> for SuggestionWindow {
    fn from(config: &BookingConfig) -> Self {
        Self {
            min_advance_days: config.min_advance_days,
            window_days: config.suggestion_window_days,
        }
    }
}

/// Scans the bookable window in date order. A date qualifies when at least one
/// slot is fully available; dates that fail to load are treated as unavailable.
pub async fn suggest_dates(
    cache: &AvailabilityCache,
    today: DateKey,
    window: SuggestionWindow,
) -> DateSuggestions {
    let mut suggestions = DateSuggestions::default();

    for offset in window.min_advance_days..=window.window_days {
        let Some(date) = today.add_days(offset) else {
            break;
        };

        let has_availability = match cache.get(date).await {
            Ok(availability) => availability.has_available(),
            Err(e) => {
                debug!("No suggestion for {}: {}", date, e);
                false
            }
        };
        if !has_availability {
            continue;
        }

        if suggestions.next_available.len() < NEXT_AVAILABLE_LIMIT {
            suggestions.next_available.push(date);
        }
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
            && suggestions.weekends.len() < WEEKEND_LIMIT
        {
            suggestions.weekends.push(date);
        }
        if cache.policy().is_popular(date) && suggestions.popular.len() < POPULAR_LIMIT {
            suggestions.popular.push(date);
        }

        if suggestions.is_full() {
            break;
        }
    }
    suggestions
}
