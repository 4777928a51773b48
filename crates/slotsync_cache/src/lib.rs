// --- File: crates/slotsync_cache/src/lib.rs ---

pub mod cache;        // Keyed availability store with TTL and fetch coalescing
pub mod http_source;  // Pull API client
pub mod prefetch;     // Neighbour and popular-date warm-up
pub mod suggestions;  // Date picker suggestions

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod prefetch_test;

pub use cache::{AvailabilityCache, DeltaOutcome, FetchOutcome, TtlPolicy};
pub use http_source::HttpAvailabilitySource;
pub use prefetch::Prefetcher;
pub use suggestions::{suggest_dates, DateSuggestions, SuggestionWindow};
