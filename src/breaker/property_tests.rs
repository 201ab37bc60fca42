//! Property-Based Tests for Circuit Breaker Module

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitRecord, CircuitState};
use crate::clock::ManualClock;

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Wait { ms: u64 },
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        3 => Just(Outcome::Success),
        3 => Just(Outcome::Failure),
        1 => (0u64..90_000).prop_map(|ms| Outcome::Wait { ms }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Once opened, no operation runs until the timeout has elapsed since the last failure.
    #[test]
    fn prop_open_circuit_never_invokes(wait_ms in 0u64..60_000, extra_calls in 1usize..10) {
        let clock = ManualClock::new(1_000_000);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default(), clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        tokio_test::block_on(async {
            for _ in 0..5 {
                let _: Result<Option<()>, &str> =
                    breaker.execute("/api/hero", || async { Err("down") }).await;
            }
            clock.advance(Duration::from_millis(wait_ms));

            for _ in 0..extra_calls {
                let calls = calls.clone();
                let result: Result<Option<()>, &str> = breaker
                    .execute("/api/hero", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
                prop_assert_eq!(result, Ok(None));
            }
            prop_assert!(breaker.is_open("/api/hero").await);
            Ok(())
        })?;

        prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    // Invariants hold for any sequence of outcomes.
    #[test]
    fn prop_record_invariants(outcomes in prop::collection::vec(outcome_strategy(), 1..100)) {
        let config = CircuitBreakerConfig::default();
        let mut record = CircuitRecord::default();
        let mut now = 0u64;

        for outcome in outcomes {
            match outcome {
                Outcome::Wait { ms } => now += ms,
                Outcome::Success | Outcome::Failure => {
                    let before = record.state;
                    let admission = record.admit(now, &config);
                    if admission == crate::breaker::Admission::Rejected {
                        prop_assert_eq!(before, CircuitState::Open);
                        prop_assert!(record.is_open_at(now, &config));
                        continue;
                    }
                    if matches!(outcome, Outcome::Success) {
                        record.record_success(&config);
                    } else {
                        record.record_failure(now, &config);
                    }
                }
            }

            if record.state == CircuitState::Closed {
                prop_assert!(record.failure_count < config.failure_threshold);
                prop_assert_eq!(record.success_count, 0);
            }
            if record.state == CircuitState::HalfOpen {
                prop_assert!(record.success_count < config.success_threshold);
            }
        }
    }
}
