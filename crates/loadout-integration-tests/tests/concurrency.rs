//! Concurrent switch requests are serialized and readers see whole states.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use futures::future::join_all;
use loadout_profiles::SwitchState;
use loadout_test::{ConcurrencyGauge, Journal, ModuleScript, RegistryBuilder};

const PROFILES: &str = r#"
    default_profile = "red"

    [profiles.red]
    modules = ["r1", "r2"]

    [profiles.green]
    modules = ["g1"]

    [profiles.blue]
    modules = ["b1", "r1"]
"#;

fn harness(gauge: &ConcurrencyGauge, delay: Duration) -> Harness {
    let journal = Journal::new();
    let script = || {
        ModuleScript::new()
            .with_register_delay(delay)
            .with_cleanup_delay(delay)
            .with_gauge(gauge)
            .with_journal(&journal)
    };
    let registry = RegistryBuilder::new()
        .module("r1", &[], &[], script())
        .module("r2", &["r1"], &[], script())
        .module("g1", &[], &[], script())
        .module("b1", &["r1"], &[], script())
        .build();
    Harness::new(registry, PROFILES, journal.clone())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_switches_never_overlap() {
    let gauge = ConcurrencyGauge::new();
    let h = harness(&gauge, Duration::from_millis(5));
    assert!(h.manager.initialize().await.success);

    let targets = ["green", "blue", "red", "green", "blue", "red", "blue", "green"];
    let handles = targets.iter().map(|target| {
        let manager = Arc::clone(&h.manager);
        let target = (*target).to_string();
        tokio::spawn(async move { manager.switch_profile(&target, false).await })
    });
    let reports = join_all(handles).await;

    for report in reports {
        assert!(report.unwrap().success);
    }
    assert_eq!(gauge.max_concurrency(), 1);
    assert_eq!(h.manager.state(), SwitchState::Idle);

    // Whatever won last, the loaded set is exactly that profile's set.
    let active = h.manager.active();
    let profile = active.profile.clone().unwrap();
    let expected = h.manager.catalog().resolve(&profile).unwrap();
    assert_eq!(active.module_ids(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_switches_run_in_arrival_order() {
    let gauge = ConcurrencyGauge::new();
    let h = harness(&gauge, Duration::from_millis(30));
    assert!(h.manager.initialize().await.success);

    let mut handles = Vec::new();
    for target in ["green", "blue", "red"] {
        let manager = Arc::clone(&h.manager);
        handles.push(tokio::spawn(async move {
            manager.switch_profile(target, false).await
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let reports: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let path: Vec<(Option<String>, String)> = reports
        .iter()
        .map(|r| (r.from.clone(), r.to.clone()))
        .collect();
    assert_eq!(
        path,
        vec![
            (Some("red".to_string()), "green".to_string()),
            (Some("green".to_string()), "blue".to_string()),
            (Some("blue".to_string()), "red".to_string()),
        ]
    );
    assert_eq!(h.manager.current_profile().as_deref(), Some("red"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_see_previous_state_during_switch() {
    let gauge = ConcurrencyGauge::new();
    let h = harness(&gauge, Duration::from_millis(150));
    assert!(h.manager.initialize().await.success);
    let before = h.manager.active();

    let manager = Arc::clone(&h.manager);
    let switch = tokio::spawn(async move { manager.switch_profile("green", false).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.manager.state(), SwitchState::Switching);
    let during = h.manager.active();
    assert_eq!(during.profile.as_deref(), Some("red"));
    assert_eq!(during.module_ids(), before.module_ids());

    assert!(switch.await.unwrap().success);
    assert_eq!(h.manager.state(), SwitchState::Idle);
    assert_eq!(h.loaded(), vec!["g1"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_switch_still_publishes_loader_state() {
    let gauge = ConcurrencyGauge::new();
    let h = harness(&gauge, Duration::from_millis(200));
    assert!(h.manager.initialize().await.success);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.manager.switch_profile("green", false),
    )
    .await;
    assert!(abandoned.is_err());

    // The switch runs on after the caller gave up; once it releases the
    // lock, the published state matches what the loader holds.
    let loaded = h.manager.loaded_modules().await;
    assert_eq!(h.manager.active().module_ids(), loaded);
    assert_eq!(h.manager.current_profile().as_deref(), Some("green"));
    assert_eq!(h.loaded(), vec!["g1"]);
    assert_eq!(h.manager.state(), SwitchState::Idle);

    let report = h.manager.switch_profile("red", false).await;
    assert!(report.success);
    assert!(!report.is_noop());
    assert_eq!(h.loaded(), vec!["r1", "r2"]);
    assert_eq!(h.manager.loaded_modules().await, h.manager.active().module_ids());
}
