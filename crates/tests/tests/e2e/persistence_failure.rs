//! End-to-end test: a round whose state cannot be written is dropped, the
//! working set goes back to the last persisted round, and the run halts.

use std::sync::Arc;
use whetstone_mutation::{MutationList, WorkingSet};
use whetstone_optimizer::{MemoryStateStore, OptimizerError, OptimizerPhase, StateStore};
use whetstone_tests::{add_marker, Harness};

#[tokio::test]
async fn write_failure_halts_run_at_last_persisted_round() {
    let h = Harness::new();
    // Baseline and round 1 persist; round 2 does not.
    let store = Arc::new(MemoryStateStore::failing_after(2));
    let mut opt = h.render_optimizer().with_state_store(store.clone());
    let list = MutationList::new(vec![add_marker(11), add_marker(12), add_marker(13)]).unwrap();

    opt.establish_baseline().await.unwrap();
    opt.step(&add_marker(11)).await.unwrap();
    let after_round_one = opt.working_set().unwrap().fingerprint().unwrap();

    let err = opt.run(&list).await.unwrap_err();
    assert!(matches!(err, OptimizerError::Persistence(_)));
    assert_eq!(opt.phase(), OptimizerPhase::Finished);

    let persisted = store.load().unwrap().unwrap();
    assert_eq!(persisted.current_round, 1);
    assert_eq!(opt.state().unwrap(), &persisted);

    let working = WorkingSet::open(&h.layout.working_dir).unwrap();
    assert_eq!(working.fingerprint().unwrap(), after_round_one);
    assert!(!working.read("system.md").unwrap().contains("marker-12"));
}

#[tokio::test]
async fn baseline_write_failure_is_fatal() {
    let h = Harness::new();
    let mut opt = h
        .render_optimizer()
        .with_state_store(Arc::new(MemoryStateStore::failing_after(0)));
    assert!(matches!(
        opt.establish_baseline().await,
        Err(OptimizerError::Persistence(_))
    ));
    assert!(opt.state().is_none());
}

#[tokio::test]
async fn unwritable_state_path_surfaces_as_persistence_error() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    opt.establish_baseline().await.unwrap();

    // Replace state.json with a directory so the rename cannot land.
    std::fs::remove_file(h.layout.state_path()).unwrap();
    std::fs::create_dir_all(h.layout.state_path().join("blocker")).unwrap();

    let err = opt.step(&add_marker(11)).await.unwrap_err();
    assert!(matches!(err, OptimizerError::Persistence(_)));
    assert_eq!(opt.state().unwrap().current_round, 0);
}
