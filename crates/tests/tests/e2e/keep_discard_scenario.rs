//! End-to-end test: baseline 3.0, a kept mutation to 3.2, a discarded one
//! at 3.1, and the report and state files that come out of it.

use whetstone_mutation::{MutationList, WorkingSet};
use whetstone_optimizer::{
    Decision, DiscardReason, FileStateStore, OptimizationReport, OptimizerPhase, StateStore,
    StopReason,
};
use whetstone_tests::{add_marker, drop_second, neutral, Harness};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kept_then_discarded_scenario() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let list = MutationList::new(vec![add_marker(11), drop_second()]).unwrap();

    let report = opt.run(&list).await.unwrap();

    assert!(approx(report.baseline_score, 3.0));
    assert!(approx(report.final_score, 3.2));
    assert!(approx(report.absolute_improvement, 0.2));
    assert_eq!(report.kept, 1);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.stop_reason, StopReason::MutationsExhausted);
    assert!(approx(report.rows[1].new_score.unwrap(), 3.1));
    assert_eq!(report.rows[1].reason.as_deref(), Some("no_improvement"));
    assert_eq!(opt.phase(), OptimizerPhase::Finished);
}

#[tokio::test]
async fn discarded_round_restores_post_keep_working_set() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    opt.establish_baseline().await.unwrap();
    opt.step(&add_marker(11)).await.unwrap();
    let after_keep = opt.working_set().unwrap().fingerprint().unwrap();

    let round = opt.step(&drop_second()).await.unwrap();
    assert!(!round.decision.is_keep());

    let working = WorkingSet::open(&h.layout.working_dir).unwrap();
    assert_eq!(working.fingerprint().unwrap(), after_keep);
    assert!(working.read("system.md").unwrap().contains("{{second}}"));
}

#[tokio::test]
async fn tie_is_discarded() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    opt.establish_baseline().await.unwrap();
    let round = opt.step(&neutral("tie")).await.unwrap();
    assert!(approx(round.improvement, 0.0));
    assert_eq!(round.decision, Decision::discard(DiscardReason::NoImprovement));
    assert!(opt.state().unwrap().accepted_mutations.is_empty());
}

#[tokio::test]
async fn state_file_matches_history() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let list = MutationList::new(vec![add_marker(11), drop_second(), add_marker(12)]).unwrap();
    opt.run(&list).await.unwrap();

    let persisted = FileStateStore::new(h.layout.state_path()).load().unwrap().unwrap();
    assert_eq!(persisted.current_round, 3);
    assert_eq!(persisted.history.len(), 3);
    assert!(persisted.is_consistent());
    assert_eq!(
        persisted
            .accepted_mutations
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>(),
        vec!["add-marker-11", "add-marker-12"]
    );
    assert!(approx(persisted.current_score, 3.4));
}

#[tokio::test]
async fn report_files_written() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let list = MutationList::new(vec![add_marker(11), drop_second()]).unwrap();
    opt.run(&list).await.unwrap();

    let md = std::fs::read_to_string(h.layout.report_markdown_path()).unwrap();
    assert!(md.contains("| Kept / discarded | 1 / 1 |"));
    assert!(md.contains("add-marker-11"));

    let json = std::fs::read_to_string(h.layout.report_json_path()).unwrap();
    let report: OptimizationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(report.rows.len(), 2);
}

#[tokio::test]
async fn snapshots_retained_per_round() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let list = MutationList::new(vec![add_marker(11), drop_second(), neutral("n")]).unwrap();
    opt.run(&list).await.unwrap();

    for round in 1..=3 {
        assert!(h
            .layout
            .backups_dir()
            .join(format!("round-{:04}", round))
            .is_dir());
    }
}
