//! End-to-end test: cancellation leaves the persisted state at the last
//! completed round and never persists a partial one.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use whetstone_mutation::MutationList;
use whetstone_optimizer::{FileStateStore, OptimizerConfig, OptimizerError, StateStore, StopReason};
use whetstone_tests::{add_marker, CancellingGenerator, Harness};

#[tokio::test]
async fn cancel_during_round_rolls_back_and_stops() {
    let h = Harness::new();
    // Two baseline calls, two for round 1, then cancel on round 2's first call.
    let generator = Arc::new(CancellingGenerator::new(5));
    let mut opt = h.optimizer(OptimizerConfig::default(), generator.clone());
    generator.arm(opt.cancel_handle());
    let list = MutationList::new(vec![add_marker(11), add_marker(12), add_marker(13)]).unwrap();

    let report = opt.run(&list).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(generator.calls(), 6);

    let persisted = FileStateStore::new(h.layout.state_path()).load().unwrap().unwrap();
    assert_eq!(persisted.current_round, 1);
    let working = opt.working_set().unwrap();
    let text = working.read("system.md").unwrap();
    assert!(text.contains("marker-11"));
    assert!(!text.contains("marker-12"));
}

#[tokio::test]
async fn cancel_handle_is_shared() {
    let h = Harness::new();
    let opt = h.render_optimizer();
    let handle = opt.cancel_handle();
    assert!(!opt.is_cancelled());
    handle.store(true, Ordering::SeqCst);
    assert!(opt.is_cancelled());
}

#[tokio::test]
async fn step_after_cancel_is_rejected() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    opt.establish_baseline().await.unwrap();
    opt.cancel();
    assert!(matches!(
        opt.step(&add_marker(11)).await,
        Err(OptimizerError::Cancelled)
    ));
    assert_eq!(opt.state().unwrap().current_round, 0);
}
