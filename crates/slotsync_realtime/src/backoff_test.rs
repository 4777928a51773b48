#[cfg(test)]
mod tests {
    use crate::backoff::{BackoffPolicy, BackoffState};
    use std::time::Duration;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_schedule_doubles_then_gives_up() {
        let mut state = BackoffState::new(BackoffPolicy::default());
        let delays: Vec<Duration> = std::iter::from_fn(|| state.next_delay_and_advance()).collect();

        assert_eq!(delays, secs(&[1, 2, 4, 8, 16]));
        assert!(state.is_exhausted());
        assert_eq!(state.attempts(), 5);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy {
            max_attempts: 8,
            ..BackoffPolicy::default()
        };
        let mut state = BackoffState::new(policy);
        let delays: Vec<Duration> = std::iter::from_fn(|| state.next_delay_and_advance()).collect();

        assert_eq!(delays, secs(&[1, 2, 4, 8, 16, 30, 30, 30]));
    }

    #[test]
    fn test_reset_restores_base_delay() {
        let mut state = BackoffState::new(BackoffPolicy::default());
        state.next_delay_and_advance();
        state.next_delay_and_advance();
        state.reset();

        assert_eq!(state.attempts(), 0);
        assert_eq!(state.delay(), Duration::from_secs(1));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn schedule_is_monotonic_and_bounded(
                base_ms in 1u64..5_000,
                max_ms in 1u64..60_000,
                max_attempts in 0u32..12,
            ) {
                let policy = BackoffPolicy {
                    base: Duration::from_millis(base_ms),
                    max: Duration::from_millis(max_ms.max(base_ms)),
                    max_attempts,
                };
                let mut state = BackoffState::new(policy);
                let delays: Vec<Duration> =
                    std::iter::from_fn(|| state.next_delay_and_advance()).collect();

                prop_assert_eq!(delays.len() as u32, max_attempts);
                prop_assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
                prop_assert!(delays.iter().all(|delay| *delay <= policy.max));
            }
        }
    }
}
