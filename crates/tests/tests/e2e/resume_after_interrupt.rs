//! End-to-end test: crash recovery from the persisted state and the
//! per-round snapshots.

use whetstone_mutation::{BackupManager, EditApplier, MutationList, WorkingSet};
use whetstone_optimizer::{FileStateStore, OptimizerError, OptimizerPhase, StateStore};
use whetstone_tests::{add_marker, drop_second, Harness};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test]
async fn resumed_run_matches_uninterrupted_run() {
    let list = MutationList::new(vec![add_marker(11), drop_second(), add_marker(12), add_marker(13)]).unwrap();

    let straight = Harness::new();
    let full = straight.render_optimizer().run(&list).await.unwrap();

    let h = Harness::new();
    {
        let mut first = h.render_optimizer();
        first.establish_baseline().await.unwrap();
        first.step(&add_marker(11)).await.unwrap();
        first.step(&drop_second()).await.unwrap();
    }
    let mut second = h.render_optimizer();
    assert_eq!(second.resume().unwrap().current_round, 2);
    let resumed = second.run(&list).await.unwrap();

    assert_eq!(resumed.rows.len(), full.rows.len());
    assert!(approx(resumed.final_score, full.final_score));
    assert_eq!(resumed.accepted_mutations, full.accepted_mutations);
    let names: Vec<&str> = resumed.rows.iter().map(|r| r.mutation.as_str()).collect();
    assert_eq!(names, vec!["add-marker-11", "drop-second", "add-marker-12", "add-marker-13"]);
}

#[tokio::test]
async fn crash_mid_round_is_rolled_back_on_resume() {
    let h = Harness::new();
    {
        let mut first = h.render_optimizer();
        first.establish_baseline().await.unwrap();
        first.step(&add_marker(11)).await.unwrap();
    }
    let committed = WorkingSet::open(&h.layout.working_dir).unwrap();
    let clean = committed.fingerprint().unwrap();

    // Round 2 got as far as its snapshot and edits before the process died.
    BackupManager::new(h.layout.backups_dir())
        .unwrap()
        .snapshot(&committed, 2)
        .unwrap();
    EditApplier::new().apply(&committed, &add_marker(12)).unwrap();
    assert_ne!(committed.fingerprint().unwrap(), clean);

    let mut second = h.render_optimizer();
    let state = second.resume().unwrap();
    assert_eq!(state.current_round, 1);
    assert_eq!(second.phase(), OptimizerPhase::RoundCompleted);
    assert_eq!(second.working_set().unwrap().fingerprint().unwrap(), clean);

    // Round 2 is re-run from scratch.
    let round = second.step(&add_marker(12)).await.unwrap();
    assert_eq!(round.round_number, 2);
    assert!(approx(round.previous_score, 3.2));
    assert!(round.decision.is_keep());
}

#[tokio::test]
async fn resume_rejects_changed_corpus() {
    let h = Harness::new();
    {
        let mut first = h.render_optimizer();
        first.establish_baseline().await.unwrap();
    }
    let store = FileStateStore::new(h.layout.state_path());
    let mut loaded = store.load().unwrap().unwrap();
    loaded.corpus_version = "some-other-corpus".into();
    store.save(&loaded).unwrap();

    let mut second = h.render_optimizer();
    assert!(matches!(second.resume(), Err(OptimizerError::Configuration(_))));
}

#[tokio::test]
async fn resume_rejects_tampered_history() {
    let h = Harness::new();
    {
        let mut first = h.render_optimizer();
        first.establish_baseline().await.unwrap();
        first.step(&add_marker(11)).await.unwrap();
    }
    let raw = std::fs::read_to_string(h.layout.state_path()).unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    json["current_round"] = serde_json::json!(5);
    std::fs::write(h.layout.state_path(), serde_json::to_vec(&json).unwrap()).unwrap();

    let mut second = h.render_optimizer();
    assert!(matches!(
        second.resume(),
        Err(OptimizerError::InvariantViolation(_))
    ));
}

#[tokio::test]
async fn resume_ignores_snapshot_older_than_state() {
    let h = Harness::new();
    {
        let mut first = h.render_optimizer();
        first.establish_baseline().await.unwrap();
        first.step(&add_marker(11)).await.unwrap();
    }
    let committed = WorkingSet::open(&h.layout.working_dir).unwrap();
    let clean = committed.fingerprint().unwrap();

    // A round-2 snapshot of some other template set, stamped before the
    // persisted state was written.
    let foreign_root = h.root().join("foreign");
    std::fs::create_dir_all(&foreign_root).unwrap();
    std::fs::write(foreign_root.join("system.md"), "unrelated templates\n").unwrap();
    let foreign = WorkingSet::open(&foreign_root).unwrap();
    let backups = BackupManager::new(h.layout.backups_dir()).unwrap();
    backups.snapshot(&foreign, 2).unwrap();
    let manifest = h.layout.backups_dir().join("round-0002.json");
    let mut json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&manifest).unwrap()).unwrap();
    json["created_at"] = serde_json::json!("2001-01-01T00:00:00Z");
    std::fs::write(&manifest, serde_json::to_vec(&json).unwrap()).unwrap();

    let mut second = h.render_optimizer();
    assert_eq!(second.resume().unwrap().current_round, 1);
    assert_eq!(second.working_set().unwrap().fingerprint().unwrap(), clean);
    assert!(second
        .working_set()
        .unwrap()
        .read("system.md")
        .unwrap()
        .contains("marker-11"));
}
