#[cfg(test)]
mod tests {
    use crate::cache::{AvailabilityCache, TtlPolicy};
    use crate::mock::MockAvailabilitySource;
    use crate::prefetch::Prefetcher;
    use slotsync_common::DateKey;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn prefetcher(source: &MockAvailabilitySource) -> (Prefetcher, AvailabilityCache) {
        let cache = AvailabilityCache::new(Arc::new(source.clone()), TtlPolicy::default());
        (
            Prefetcher::with_settings(cache.clone(), 3, 14, chrono_tz::UTC),
            cache,
        )
    }

    #[test]
    fn test_candidates_cover_neighbours_and_popular_days() {
        let (prefetcher, _) = prefetcher(&MockAvailabilitySource::new());

        let candidates = prefetcher.candidates(date("2025-07-09"), date("2025-07-07"));

        let expected: Vec<DateKey> = [
            "2025-07-10", "2025-07-11", "2025-07-12", "2025-07-08", "2025-07-13",
            "2025-07-18", "2025-07-19", "2025-07-20",
        ]
        .iter()
        .map(|s| date(s))
        .collect();
        assert_eq!(candidates, expected);
    }

    #[test]
    fn test_previous_day_in_the_past_is_skipped() {
        let (prefetcher, _) = prefetcher(&MockAvailabilitySource::new());
        let today = date("2025-07-07");

        let candidates = prefetcher.candidates(today, today);

        assert!(!candidates.contains(&date("2025-07-06")));
        assert!(candidates.iter().all(|d| *d >= today));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_is_fire_and_forget_and_coalesced() {
        let source = MockAvailabilitySource::new();
        let (prefetcher, cache) = prefetcher(&source);
        let focus = prefetcher.today().add_days(10).unwrap();
        let expected = prefetcher.candidates(focus, prefetcher.today());

        let started = prefetcher.prefetch(focus);
        assert_eq!(started, expected);
        assert!(prefetcher.prefetch(focus).is_empty());

        sleep(Duration::from_millis(10)).await;
        for d in &expected {
            assert!(cache.is_valid(*d));
            assert_eq!(source.calls_for(*d), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_swallows_failures() {
        let source = MockAvailabilitySource::new();
        let (prefetcher, cache) = prefetcher(&source);
        let focus = prefetcher.today().add_days(5).unwrap();
        let next = focus.add_days(1).unwrap();
        source.fail_date(next);

        prefetcher.prefetch(focus);
        sleep(Duration::from_millis(10)).await;

        assert!(!cache.is_valid(next));
        assert!(!cache.is_pending(next));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_prefetch_degrades_and_reports_cached_count() {
        let source = MockAvailabilitySource::new();
        source.fail_bulk(true);
        source.fail_date(date("2025-07-06"));
        let (prefetcher, _) = prefetcher(&source);

        let cached = prefetcher
            .bulk_prefetch(vec![date("2025-07-04"), date("2025-07-05"), date("2025-07-06")])
            .await;

        assert_eq!(cached, 2);
        assert_eq!(source.bulk_calls().len(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn candidates_are_unique_and_never_past(focus_offset in 0i64..60, today_offset in 0i64..400) {
                let (prefetcher, _) = prefetcher(&MockAvailabilitySource::new());
                let today = date("2025-01-01").add_days(today_offset).unwrap();
                let focus = today.add_days(focus_offset).unwrap();

                let candidates = prefetcher.candidates(focus, today);

                let mut unique = candidates.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), candidates.len());
                prop_assert!(candidates.iter().all(|d| *d >= today));
            }
        }
    }
}
