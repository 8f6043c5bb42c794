// ABOUTME: Integration tests for CPU percentage and usage derivation.
// ABOUTME: Exercises the formula on hand-built snapshots.

use proptest::prelude::*;
use skiff::deploy::{ContainerStats, STOPPED, compute, cpu_percent};
use skiff::runtime::{CpuSample, InterfaceCounters, StatsSnapshot};
use std::collections::HashMap;

fn snapshot(total: (u64, u64), system: (u64, u64), cpus: usize) -> StatsSnapshot {
    StatsSnapshot {
        cpu: CpuSample {
            total_usage: total.1,
            system_usage: system.1,
            percpu_usage: vec![0; cpus],
        },
        precpu: CpuSample {
            total_usage: total.0,
            system_usage: system.0,
            percpu_usage: vec![0; cpus],
        },
        ..Default::default()
    }
}

#[test]
fn scales_by_online_cpus() {
    let s = snapshot((100, 200), (1_000, 2_000), 4);
    assert!((cpu_percent(&s) - 40.0).abs() < 1e-9);
}

#[test]
fn empty_percpu_counts_as_one_cpu() {
    let s = snapshot((0, 250), (0, 1_000), 0);
    assert!((cpu_percent(&s) - 25.0).abs() < 1e-9);
}

#[test]
fn no_system_progress_is_zero() {
    let s = snapshot((100, 200), (1_000, 1_000), 2);
    assert_eq!(cpu_percent(&s), 0.0);
}

#[test]
fn counter_reset_is_zero() {
    let s = snapshot((500, 100), (1_000, 2_000), 2);
    assert_eq!(cpu_percent(&s), 0.0);
}

#[test]
fn compute_sums_every_interface() {
    let mut s = snapshot((0, 10), (0, 100), 1);
    s.memory_usage = 64 << 20;
    s.memory_limit = 512 << 20;
    s.networks = HashMap::from([
        (
            "eth0".to_string(),
            InterfaceCounters {
                rx_bytes: 1_000,
                tx_bytes: 300,
            },
        ),
        (
            "eth1".to_string(),
            InterfaceCounters {
                rx_bytes: 24,
                tx_bytes: 12,
            },
        ),
    ]);

    let stats = compute(&s, "running");
    assert_eq!(stats.network_rx, 1_024);
    assert_eq!(stats.network_tx, 312);
    assert_eq!(stats.memory_usage, 64 << 20);
    assert_eq!(stats.memory_limit, 512 << 20);
    assert_eq!(stats.status, "running");
    assert!((stats.cpu_percent - 10.0).abs() < 1e-9);
}

#[test]
fn idle_stats_serialize_with_status() {
    let json = serde_json::to_value(ContainerStats::idle(STOPPED)).unwrap();
    assert_eq!(json["status"], "STOPPED");
    assert_eq!(json["cpu_percent"], 0.0);
    assert_eq!(json["memory_usage"], 0);
}

proptest! {
    #[test]
    fn cpu_percent_is_finite_and_non_negative(
        pre_total in 0u64..1 << 40,
        total_delta in 0u64..1 << 30,
        pre_system in 0u64..1 << 40,
        system_delta in 0u64..1 << 30,
        cpus in 0usize..64,
    ) {
        let s = snapshot(
            (pre_total, pre_total + total_delta),
            (pre_system, pre_system + system_delta),
            cpus,
        );
        let pct = cpu_percent(&s);
        prop_assert!(pct.is_finite());
        prop_assert!(pct >= 0.0);
        if total_delta == 0 || system_delta == 0 {
            prop_assert_eq!(pct, 0.0);
        }
    }
}
