// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for MysqlCluster defaulting and synchronization
//!
//! These tests use proptest to generate random configurations and verify that:
//! 1. Memory tiers are monotonic and defaults never clobber user settings
//! 2. Defaulting is idempotent and resource generation never panics
//! 3. Synchronization stops exactly at the first failing resource
//! 4. Replica resolution always picks the last healthy replica or the fallback

#[path = "../common/mod.rs"]
mod common;

use common::*;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use mysql_operator::controller::defaults::{
    BUFFER_POOL_SIZE_KEY, GIB, LOG_FILE_SIZE_KEY, MIB, apply_defaults, buffer_pool_size,
    log_file_size, parse_quantity,
};
use mysql_operator::controller::sync::Synchronizer;
use mysql_operator::crd::{MysqlCluster, ResourceName};
use mysql_operator::options::OperatorOptions;
use mysql_operator::resources::{backup, config, service, statefulset};
use mysql_operator::topology::{HEALTHY_LAG_THRESHOLD_SECS, TopologyResolver};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// =============================================================================
// Strategies
// =============================================================================

/// Memory in bytes, from 1 MiB to 128 GiB
fn memory_bytes() -> impl Strategy<Value = i64> {
    MIB..=128 * GIB
}

/// Generate a memory value string (shrinks toward smaller values)
fn memory_value() -> impl Strategy<Value = String> {
    prop_oneof![
        (128..=4096u32).prop_map(|m| format!("{}Mi", m)),
        (1..=64u32).prop_map(|g| format!("{}Gi", g)),
    ]
}

fn optional_memory() -> impl Strategy<Value = Option<String>> {
    prop_oneof![1 => Just(None), 3 => memory_value().prop_map(Some)]
}

fn conf_entry() -> impl Strategy<Value = (String, String)> {
    (
        prop_oneof![
            Just(BUFFER_POOL_SIZE_KEY.to_string()),
            Just(LOG_FILE_SIZE_KEY.to_string()),
            "[a-z]{3,12}(-[a-z]{3,8})?",
        ],
        "[0-9A-Za-z]{1,10}",
    )
}

fn cluster_strategy() -> impl Strategy<Value = MysqlCluster> {
    (
        "[a-z][a-z0-9]{0,10}",
        1..=7i32,
        optional_memory(),
        prop::collection::vec(conf_entry(), 0..4),
        prop::option::of(Just("@daily".to_string())),
    )
        .prop_map(|(name, replicas, memory, conf, schedule)| {
            let mut builder = MysqlClusterBuilder::new(&name, "db").with_replicas(replicas);
            if let Some(memory) = memory {
                builder = builder.with_memory_request(&memory);
            }
            for (key, value) in conf {
                builder = builder.with_conf(&key, &value);
            }
            if let Some(schedule) = schedule {
                builder = builder.with_backup(&schedule, "gs://bucket/backups");
            }
            builder.build()
        })
}

fn replica_lags() -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::of(0..30i64), 0..6)
}

// =============================================================================
// Property-based tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: More memory never yields a smaller buffer pool or log file
    #[test]
    fn prop_tiers_are_monotonic(a in memory_bytes(), b in memory_bytes()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(buffer_pool_size(low) <= buffer_pool_size(high));
        prop_assert!(log_file_size(low) <= log_file_size(high));
    }

    /// Property: From 1 GiB up, the buffer pool never exceeds three quarters of memory
    #[test]
    fn prop_buffer_pool_fits_in_memory(memory in GIB..=128 * GIB) {
        prop_assert!(buffer_pool_size(memory) as f64 <= memory as f64 * 0.75);
        prop_assert!(log_file_size(memory) < memory);
    }

    /// Property: Binary quantities parse to exact byte counts
    #[test]
    fn prop_binary_quantities(n in 1..=65_536i64) {
        prop_assert_eq!(parse_quantity(&format!("{}Mi", n)).unwrap(), n * MIB);
        prop_assert_eq!(parse_quantity(&format!("{}Ki", n)).unwrap(), n * 1024);
    }

    /// Property: Defaulting twice equals defaulting once
    #[test]
    fn prop_defaults_idempotent(cluster in cluster_strategy()) {
        let options = OperatorOptions::default();
        let mut once = cluster;
        apply_defaults(&mut once, &options).unwrap();
        let mut twice = once.clone();
        apply_defaults(&mut twice, &options).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: User supplied `my.cnf` values survive defaulting
    #[test]
    fn prop_defaults_keep_user_conf(cluster in cluster_strategy()) {
        let before = cluster.spec.mysql_conf.clone();
        let mut defaulted = cluster;
        apply_defaults(&mut defaulted, &OperatorOptions::default()).unwrap();
        for (key, value) in before {
            prop_assert_eq!(defaulted.spec.mysql_conf.get(&key), Some(&value));
        }
    }

    /// Property: Every generator succeeds for a defaulted cluster
    #[test]
    fn prop_defaulted_cluster_generates_resources(cluster in cluster_strategy()) {
        let options = OperatorOptions::default();
        let mut cluster = cluster;
        apply_defaults(&mut cluster, &options).unwrap();

        let cm = config::generate_config_map(&cluster);
        prop_assert!(cm.data.is_some());

        let svc = service::generate_headless_service(&cluster);
        prop_assert_eq!(
            svc.spec.as_ref().and_then(|s| s.cluster_ip.as_deref()),
            Some("None")
        );

        let sts = statefulset::generate_statefulset(&cluster, &options);
        prop_assert_eq!(
            sts.spec.as_ref().and_then(|s| s.replicas),
            Some(cluster.spec.replicas)
        );

        let job = backup::generate_backup_cronjob(&cluster, &options).unwrap();
        prop_assert_eq!(job.is_some(), cluster.spec.backup_schedule.is_some());
    }

    /// Property: A failure at position k means exactly k + 1 resources were attempted
    #[test]
    fn prop_sync_stops_at_first_failure(k in 0usize..5) {
        let failing = ResourceName::ORDERED[k];
        let syncer = FakeSyncer::new().failing_on(failing);
        let events = RecordingEvents::new();
        let topology = FakeConnector::refusing();
        let cluster = create_test_cluster("foo", "db", 3);

        let result = block_on(
            Synchronizer::new(&syncer, &events, &topology)
                .synchronize(&CancellationToken::new(), &cluster),
        );

        prop_assert!(result.is_err());
        prop_assert_eq!(syncer.calls(), ResourceName::ORDERED[..=k].to_vec());
        prop_assert_eq!(events.events().len(), 1);
    }

    /// Property: The resolved replica is the last healthy one, or the fallback
    #[test]
    fn prop_secondary_is_last_healthy(lags in replica_lags(), ready in 1..=6i32) {
        let hosts: Vec<String> = (0..lags.len()).map(|i| format!("replica-{}", i)).collect();
        let replicas: Vec<(&str, Option<i64>)> = hosts
            .iter()
            .map(String::as_str)
            .zip(lags.iter().copied())
            .collect();

        let topology = FakeConnector::new(FakeOrchestrator::new().with_replicas(&replicas));
        let cluster = MysqlClusterBuilder::new("foo", "db")
            .with_orchestrator("http://orc:3000/api")
            .with_ready_nodes(ready)
            .build();

        let host = block_on(TopologyResolver::new(&topology).resolve_healthy_secondary(&cluster));

        let expected = lags
            .iter()
            .rposition(|lag| lag.is_some_and(|l| l <= HEALTHY_LAG_THRESHOLD_SECS))
            .map(|i| hosts[i].clone())
            .unwrap_or_else(|| cluster.member_host(ready - 1));
        prop_assert_eq!(host, expected);
    }
}
