//! Property tests: over any sequence of candidate mutations the run history
//! stays consistent and the current score never decreases.

use proptest::prelude::*;
use whetstone_mutation::{Mutation, MutationList};
use whetstone_tests::{add_marker, drop_second, half_applicable, neutral, Harness};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Candidate {
    AddMarker(usize),
    DropSecond,
    Neutral,
    HalfApplicable,
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    prop_oneof![
        3 => (11usize..=20).prop_map(Candidate::AddMarker),
        1 => Just(Candidate::DropSecond),
        1 => Just(Candidate::Neutral),
        1 => Just(Candidate::HalfApplicable),
    ]
}

/// Candidate list with unique names, as `MutationList` requires.
fn to_mutations(candidates: &[Candidate]) -> Vec<Mutation> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut m = match c {
                Candidate::AddMarker(n) => add_marker(*n),
                Candidate::DropSecond => drop_second(),
                Candidate::Neutral => neutral("neutral"),
                Candidate::HalfApplicable => half_applicable(),
            };
            m.name = format!("{:02}-{}", i, m.name);
            m
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn history_consistent_and_score_monotonic(
        candidates in prop::collection::vec(arb_candidate(), 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Harness::new();
            let mut opt = h.render_optimizer();
            let list = MutationList::new(to_mutations(&candidates)).unwrap();
            let report = opt.run(&list).await.unwrap();
            let state = opt.state().unwrap();

            // history.len() == N == current_round
            assert_eq!(state.history.len(), candidates.len());
            assert_eq!(state.current_round as usize, candidates.len());
            assert!(state.is_consistent());

            // accepted mutations are exactly the kept rounds, in order
            let kept: Vec<&Mutation> = state
                .history
                .iter()
                .filter(|r| r.decision.is_keep())
                .map(|r| &r.mutation)
                .collect();
            assert_eq!(kept, state.accepted_mutations.iter().collect::<Vec<_>>());

            // current score never decreases; keeps are strict improvements
            let mut current = state.baseline_score;
            for round in &state.history {
                assert_eq!(round.previous_score, current);
                if round.decision.is_keep() {
                    let next = round.new_score.unwrap();
                    assert!(next > current);
                    current = next;
                }
            }
            assert_eq!(current, state.current_score);
            assert!(report.final_score >= report.baseline_score);
        });
    }

    /// The working set after a run is exactly what the kept mutations alone
    /// would produce from the baseline.
    #[test]
    fn final_working_set_reflects_only_kept_mutations(
        candidates in prop::collection::vec(arb_candidate(), 1..6),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let h = Harness::new();
            let mut opt = h.render_optimizer();
            let list = MutationList::new(to_mutations(&candidates)).unwrap();
            opt.run(&list).await.unwrap();
            let state = opt.state().unwrap().clone();
            let actual = opt.working_set().unwrap().fingerprint().unwrap();

            let replay = Harness::new();
            let working = whetstone_mutation::WorkingSet::initialize_from(
                &replay.layout.baseline_dir,
                &replay.layout.working_dir,
            )
            .unwrap();
            for m in &state.accepted_mutations {
                whetstone_mutation::EditApplier::new().apply(&working, m).unwrap();
            }
            assert_eq!(working.fingerprint().unwrap(), actual);
        });
    }
}
