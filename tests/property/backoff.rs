//! Property tests for backoff delays.
//!
//! Invariants tested:
//! - Delays never shrink
//! - Delays never exceed the cap after the first
//! - A fixed backoff yields the same delay forever

use fortify_retry::{BackoffConfig, next_delay};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: next_delay is monotone and capped
    #[test]
    fn next_delay_is_monotone_and_capped(
        current in 0u64..=1_000_000,
        multiplier in 1.0f64..=10.0,
        max_delay in 1u64..=2_000_000,
    ) {
        let current = current.min(max_delay);
        let next = next_delay(current, multiplier, max_delay);
        prop_assert!(next >= current, "{next} < {current}");
        prop_assert!(next <= max_delay, "{next} > {max_delay}");
    }

    /// Property: a capped sequence never grows past its cap after the first delay
    #[test]
    fn sequence_respects_the_cap(
        initial_ms in 1u64..=5_000,
        multiplier in 1.0f64..=4.0,
        cap_ms in 1u64..=60_000,
        steps in 1usize..=40,
    ) {
        let config = BackoffConfig::exponential(Duration::from_millis(initial_ms), multiplier)
            .with_max_delay(Duration::from_millis(cap_ms));
        let mut sequence = config.sequence();

        let first = sequence.advance();
        prop_assert_eq!(first, Duration::from_millis(initial_ms));

        let mut previous = first;
        for _ in 0..steps {
            let delay = sequence.advance();
            prop_assert!(delay <= Duration::from_millis(cap_ms).max(first));
            prop_assert!(delay >= previous.min(Duration::from_millis(cap_ms)));
            previous = delay;
        }
    }

    /// Property: a fixed backoff is constant
    #[test]
    fn fixed_backoff_is_constant(delay_ms in 0u64..=10_000, steps in 1usize..=20) {
        let mut sequence = BackoffConfig::fixed(Duration::from_millis(delay_ms)).sequence();
        for _ in 0..steps {
            prop_assert_eq!(sequence.advance(), Duration::from_millis(delay_ms));
        }
    }
}
