//! Property-based tests for the bridge coordinator.

mod common;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use catdog_discovery::{EngineHooks, ProtocolVersion};
use catdog_test_utils::identity;
use common::Harness;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// One observation: which engine saw it, peer seed, seq, seconds, liveness.
fn observation() -> impl Strategy<Value = (bool, u64, u64, u64, u32)> {
    (any::<bool>(), 1u64..64, 1u64..100, 0u64..1_000_000, 0u32..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every observation lands exactly once in the other engine, unchanged.
    #[test]
    fn prop_each_observation_forwarded_once(
        observations in prop::collection::vec(observation(), 0..24)
    ) {
        runtime().block_on(async {
            let h = Harness::ready();
            let mut expected_v50 = Vec::new();
            let mut expected_v51 = Vec::new();

            for &(from_v50, seed, seq, secs, liveness) in &observations {
                let peer = identity::peer(seed, seq);
                let seen_at = UNIX_EPOCH + Duration::from_secs(secs);
                if from_v50 {
                    h.coordinator.on_seen_v50(Arc::clone(&peer), seen_at, liveness).await;
                    expected_v51.push((peer, seen_at, liveness));
                } else {
                    h.coordinator.on_seen_v51(Arc::clone(&peer), seen_at, liveness).await;
                    expected_v50.push((peer, seen_at, liveness));
                }
            }

            let actual = |calls: Vec<catdog_test_utils::InsertCall>| {
                calls
                    .into_iter()
                    .map(|c| (c.node, c.seen_at, c.liveness))
                    .collect::<Vec<_>>()
            };
            prop_assert_eq!(actual(h.v50.inserts()), expected_v50);
            prop_assert_eq!(actual(h.v51.inserts()), expected_v51);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Revalidation pings v5.0 exactly when v5.1 fails.
    #[test]
    fn prop_fallback_only_on_v51_failure(
        v51_answers in any::<bool>(),
        v50_answers in any::<bool>(),
        seq in 1u64..1000,
    ) {
        runtime().block_on(async {
            let h = Harness::ready();
            let peer = identity::record_with_seq(7, seq);
            if v51_answers {
                h.v51.answer_pings(peer.id(), seq);
            }
            if v50_answers {
                h.v50.answer_pings(peer.id(), seq);
            }

            let result = h.coordinator.revalidate(&peer).await;

            prop_assert_eq!(h.v51.pings().len(), 1);
            prop_assert_eq!(h.v50.pings().len(), usize::from(!v51_answers));
            prop_assert_eq!(result.is_ok(), v51_answers || v50_answers);
            if let Ok(answer) = result {
                prop_assert_eq!(answer, seq);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Hooks never touch an engine before the gate opens.
    #[test]
    fn prop_nothing_happens_before_ready(count in 1usize..8) {
        runtime().block_on(async {
            let h = Harness::pending();
            let mut tasks = Vec::new();
            for i in 0..count {
                let hooks = h.coordinator.hooks(if i % 2 == 0 {
                    ProtocolVersion::V50
                } else {
                    ProtocolVersion::V51
                });
                let peer = identity::peer(i as u64 + 1, 1);
                tasks.push(tokio::spawn(async move {
                    hooks.on_seen(peer, SystemTime::now(), 0).await;
                }));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;

            prop_assert!(h.v50.inserts().is_empty());
            prop_assert!(h.v51.inserts().is_empty());

            h.coordinator.gate().signal_ready();
            for task in tasks {
                task.await.unwrap();
            }
            prop_assert_eq!(h.v50.inserts().len() + h.v51.inserts().len(), count);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
