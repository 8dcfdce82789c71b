//! Tests for the lifecycle state store.
//!
//! Validates concurrent access, snapshot isolation and directive capture.

use hollowrun::cri::{ContainerConfig, ContainerMetadata, ImageSpec, PodSandboxConfig, PodSandboxMetadata};
use hollowrun::lifecycle::{self, Phase};
use hollowrun::{
    Clock, ManualClock, RUN_DURATION_LABEL, StateStore, TERMINAL_PHASE_LABEL, TerminalPhase,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn sandbox_config(labels: &[(&str, &str)]) -> PodSandboxConfig {
    PodSandboxConfig {
        metadata: Some(PodSandboxMetadata {
            name: "pod".to_string(),
            uid: "uid".to_string(),
            namespace: "default".to_string(),
            attempt: 0,
        }),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..Default::default()
    }
}

fn container_config() -> ContainerConfig {
    ContainerConfig {
        metadata: Some(ContainerMetadata {
            name: "app".to_string(),
            attempt: 0,
        }),
        image: Some(ImageSpec::new("busybox")),
        ..Default::default()
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_adds_are_not_lost() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 64;

    let store = Arc::new(StateStore::new());
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    store
                        .add_sandbox(&format!("sb-{t}-{i}"), sandbox_config(&[]), "hollow")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.sandboxes.len(), THREADS * PER_THREAD);
    let ids: HashSet<_> = snapshot.sandboxes.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids.len(), THREADS * PER_THREAD);
}

#[test]
fn test_concurrent_duplicate_adds_have_one_winner() {
    let store = Arc::new(StateStore::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add_sandbox("same", sandbox_config(&[]), "").is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(store.sandbox_count().unwrap(), 1);
}

#[test]
fn test_concurrent_containers_and_removal() {
    let store = Arc::new(StateStore::new());
    store.add_sandbox("sb", sandbox_config(&[]), "").unwrap();

    let adders: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    // Fails with ParentNotFound once the sandbox is gone.
                    let _ = store.add_container(&format!("c-{t}-{i}"), "sb", container_config(), "r");
                }
            })
        })
        .collect();

    let remover = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.remove_sandbox("sb").unwrap())
    };

    for handle in adders {
        handle.join().unwrap();
    }
    assert!(remover.join().unwrap());

    // No container can outlive its sandbox.
    let snapshot = store.snapshot().unwrap();
    assert!(snapshot.sandboxes.is_empty());
    assert!(snapshot.containers.is_empty());
}

// =============================================================================
// Phase Derivation on Stored Records
// =============================================================================

#[test]
fn test_stored_record_phases_over_time() {
    let clock = Arc::new(ManualClock::starting_now());
    let store = StateStore::with_clock(clock.clone());
    store
        .add_sandbox(
            "sb",
            sandbox_config(&[(RUN_DURATION_LABEL, "1m"), (TERMINAL_PHASE_LABEL, "failed")]),
            "",
        )
        .unwrap();
    store.add_sandbox("forever", sandbox_config(&[]), "").unwrap();

    let phase = |id: &str| lifecycle::phase(&store.sandbox(id).unwrap().timeline(), clock.now());

    assert_eq!(phase("sb"), Phase::Running);
    clock.advance(Duration::from_secs(59));
    assert_eq!(phase("sb"), Phase::Running);
    clock.advance(Duration::from_secs(1));
    assert_eq!(phase("sb"), Phase::Terminal(TerminalPhase::Failed));

    clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert_eq!(phase("forever"), Phase::Running);
}

#[test]
fn test_malformed_directive_is_ignored() {
    let store = StateStore::new();
    store
        .add_sandbox(
            "sb",
            sandbox_config(&[(RUN_DURATION_LABEL, "soon"), (TERMINAL_PHASE_LABEL, "Exploded")]),
            "",
        )
        .unwrap();

    let record = store.sandbox("sb").unwrap();
    assert_eq!(record.directive.duration, None);
    assert_eq!(record.directive.terminal_phase, None);
    assert_eq!(
        lifecycle::phase(&record.timeline(), store.now()),
        Phase::Running
    );
}
