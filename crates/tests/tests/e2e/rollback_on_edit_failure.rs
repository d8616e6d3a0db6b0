//! End-to-end test: a mutation whose edits only partly apply is discarded
//! and the working set comes back byte for byte.

use whetstone_mutation::{Edit, Mutation, MutationList};
use whetstone_optimizer::{DiscardReason, OptimizerError};
use whetstone_tests::{add_marker, half_applicable, Harness, CRITERION};

#[tokio::test]
async fn partial_edits_are_rolled_back() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    opt.establish_baseline().await.unwrap();
    let before = opt.working_set().unwrap().fingerprint().unwrap();

    let round = opt.step(&half_applicable()).await.unwrap();

    match round.decision.reason() {
        Some(DiscardReason::EditFailed { edit_index, detail }) => {
            assert_eq!(*edit_index, 1);
            assert!(detail.contains("no-such-text"));
        }
        other => panic!("expected edit failure, got {:?}", other),
    }
    assert!(round.new_score.is_none());
    assert_eq!(round.samples_scored, 0);
    assert_eq!(opt.working_set().unwrap().fingerprint().unwrap(), before);
}

#[tokio::test]
async fn run_continues_after_edit_failure() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let missing_file = Mutation::new("missing-file", CRITERION).with_edit(Edit::append_to_end("ghost.md", "x"));
    let out_of_range = Mutation::new("out-of-range", CRITERION).with_edit(Edit::insert_at_line("system.md", 99, "x"));
    let list = MutationList::new(vec![missing_file, out_of_range, add_marker(11)]).unwrap();

    let report = opt.run(&list).await.unwrap();

    assert_eq!(report.discards_by_reason.get("edit_failed"), Some(&2));
    assert_eq!(report.kept, 1);
    assert_eq!(report.accepted_mutations, vec!["add-marker-11"]);
}

#[tokio::test]
async fn unknown_criterion_fails_before_any_round() {
    let h = Harness::new();
    let mut opt = h.render_optimizer();
    let stray = Mutation::new("stray", "tone").with_edit(Edit::append_to_end("system.md", "x"));
    let list = MutationList::new(vec![add_marker(11), stray]).unwrap();

    let err = opt.run(&list).await.unwrap_err();
    assert!(matches!(err, OptimizerError::Configuration(_)));
    assert!(opt.state().is_none());
    assert!(!h.layout.state_path().exists());
}
