//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the freshness lifecycle and record storage.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use crate::cache::freshness::{classify, is_expired, is_stale, Freshness};
use crate::cache::{CacheRecord, CacheStore, GuardManager, GuardPhase, ManualClock, MemoryStore};

// == Strategies ==
/// Instants within a few days of the epoch, to second precision
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..400_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn optional_instant_strategy() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of(instant_strategy())
}

/// Arbitrary JSON payloads of modest depth
fn payload_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,32}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::hash_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn record_strategy() -> impl Strategy<Value = CacheRecord> {
    (
        payload_strategy(),
        optional_instant_strategy(),
        optional_instant_strategy(),
    )
        .prop_map(|(results, stale_at, expires_at)| CacheRecord {
            results,
            stale_at,
            expires_at,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Expiry is the stronger condition: every expired record is also stale.
    #[test]
    fn prop_expired_implies_stale(
        record in prop::option::of(record_strategy()),
        now in instant_strategy()
    ) {
        if is_expired(record.as_ref(), now) {
            prop_assert!(is_stale(record.as_ref(), now));
        }
    }

    // A record with no deadlines never leaves the fresh state.
    #[test]
    fn prop_no_deadlines_never_stale(payload in payload_strategy(), now in instant_strategy()) {
        let record = CacheRecord { results: payload, stale_at: None, expires_at: None };

        prop_assert!(!is_expired(Some(&record), now));
        prop_assert!(!is_stale(Some(&record), now));
        prop_assert_eq!(classify(Some(&record), now), Freshness::Fresh);
    }

    // Freshness only ever degrades as time moves forward.
    #[test]
    fn prop_freshness_is_monotonic(
        record in record_strategy(),
        start in instant_strategy(),
        elapsed in 0i64..400_000
    ) {
        let rank = |state: Freshness| match state {
            Freshness::Fresh => 0,
            Freshness::Stale => 1,
            Freshness::Expired => 2,
        };
        let before = classify(Some(&record), start);
        let after = classify(Some(&record), start + Duration::seconds(elapsed));

        prop_assert!(rank(after) >= rank(before));
    }

    // Computed records place their deadlines at exact offsets from `now`.
    #[test]
    fn prop_computed_offsets(
        now in instant_strategy(),
        stale_in in prop::option::of(0i64..10_000),
        expires_in in prop::option::of(0i64..10_000)
    ) {
        let record = CacheRecord::computed(
            json!(null),
            now,
            stale_in.map(Duration::seconds),
            expires_in.map(Duration::seconds),
        );

        prop_assert_eq!(record.stale_at, stale_in.map(|s| now + Duration::seconds(s)));
        prop_assert_eq!(record.expires_at, expires_in.map(|s| now + Duration::seconds(s)));
    }

    // Writing a record and reading it back yields the same record.
    #[test]
    fn prop_record_store_round_trip(record in record_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = MemoryStore::new();

        let read_back = runtime.block_on(async {
            store.write("owner@v1/unit", &record.encode().unwrap()).await.unwrap();
            store.read("owner@v1/unit").await.unwrap().unwrap()
        });

        prop_assert_eq!(CacheRecord::decode(&read_back).unwrap(), record);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // However many claims race for an absent guard, exactly one wins.
    #[test]
    fn prop_single_guard_winner(claimants in 2usize..24) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let winners = runtime.block_on(async move {
            let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let guards = GuardManager::new(store, clock, None);

            let tasks: Vec<_> = (0..claimants)
                .map(|_| {
                    let guards = guards.clone();
                    tokio::spawn(async move {
                        guards
                            .claim("owner@v1/unit:guard", GuardPhase::Queued)
                            .await
                            .unwrap()
                            .map(|lease| lease.keep())
                            .is_some()
                    })
                })
                .collect();

            let mut winners = 0;
            for task in tasks {
                if task.await.unwrap() {
                    winners += 1;
                }
            }
            winners
        });

        prop_assert_eq!(winners, 1);
    }
}
