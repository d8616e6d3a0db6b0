//! Property tests: rubric scoring is deterministic and stays on the 1–5 scale.

use proptest::prelude::*;
use whetstone_rubric::{Check, Criterion, RubricScorer, MAX_SCORE, MIN_SCORE};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const WORDS: &[&str] = &["improve", "latency", "users", "goal", "risk", "cost", "10%", "from"];

/// A criterion with 1..5 checks over the word list, some expected absent.
fn arb_criterion(index: usize) -> impl Strategy<Value = Criterion> {
    (
        0.1f64..10.0,
        prop::collection::vec((0..WORDS.len(), any::<bool>()), 1..5),
    )
        .prop_map(move |(weight, checks)| {
            let checks = checks.into_iter().enumerate().map(|(i, (word, present))| {
                let name = format!("check-{}", i);
                let pattern = regex_escape(WORDS[word]);
                if present {
                    Check::pattern(name, &pattern).unwrap()
                } else {
                    Check::absent(name, &pattern).unwrap()
                }
            });
            Criterion::new(format!("criterion-{}", index), weight).with_checks(checks)
        })
}

fn arb_scorer() -> impl Strategy<Value = RubricScorer> {
    (1usize..5)
        .prop_flat_map(|n| (0..n).map(arb_criterion).collect::<Vec<_>>())
        .prop_map(|criteria| RubricScorer::new(criteria).unwrap())
}

fn arb_document() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::sample::select(WORDS).prop_map(str::to_string),
            "[a-z]{1,8}",
        ],
        0..40,
    )
    .prop_map(|words| words.join(" "))
}

fn regex_escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' {
                vec![c]
            } else {
                vec!['\\', c]
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Scoring the same text twice gives identical results.
    #[test]
    fn scoring_is_deterministic(scorer in arb_scorer(), doc in arb_document()) {
        prop_assert_eq!(scorer.score(&doc), scorer.score(&doc));
    }

    /// Every criterion score and the overall score lie in [1, 5].
    #[test]
    fn scores_are_bounded(scorer in arb_scorer(), doc in arb_document()) {
        let result = scorer.score(&doc);
        for (_, score) in &result.per_criterion {
            prop_assert!(*score >= MIN_SCORE && *score <= MAX_SCORE);
        }
        prop_assert!(result.overall >= MIN_SCORE && result.overall <= MAX_SCORE);
    }

    /// Overall never leaves the range spanned by the criterion scores.
    #[test]
    fn overall_between_min_and_max_criterion(scorer in arb_scorer(), doc in arb_document()) {
        let result = scorer.score(&doc);
        let lo = result.per_criterion.values().cloned().fold(f64::INFINITY, f64::min);
        let hi = result.per_criterion.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(result.overall >= lo - 1e-9);
        prop_assert!(result.overall <= hi + 1e-9);
    }

    /// The itemized detail accounts for every check of every criterion.
    #[test]
    fn detail_covers_all_checks(scorer in arb_scorer(), doc in arb_document()) {
        let result = scorer.score(&doc);
        let declared: usize = scorer.criteria().iter().map(|c| c.checks.len()).sum();
        prop_assert_eq!(result.total_checks(), declared);
        prop_assert!(result.passed_checks() <= declared);
    }
}
