//! End-to-end test: generator failures and timeouts.
//!
//! One failing case is excluded from the round average; every case failing
//! turns the round into a discard.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use whetstone_corpus::generator::render_templates;
use whetstone_corpus::{DocumentGenerator, FlakyGenerator, GenerationError, TemplateRenderGenerator, TestCase};
use whetstone_mutation::{Edit, Mutation};
use whetstone_optimizer::{DiscardReason, OptimizerConfig, OptimizerError};
use whetstone_tests::{add_marker, Harness, CRITERION};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fails every case once the templates contain `BREAK`; stalls once they
/// contain `STALL`.
struct TriggeredGenerator;

#[async_trait]
impl DocumentGenerator for TriggeredGenerator {
    async fn generate(&self, template_dir: &Path, case: &TestCase) -> Result<String, GenerationError> {
        let document = render_templates(template_dir, case)?;
        if document.contains("BREAK") {
            return Err(GenerationError::failed(&case.id, "model refused"));
        }
        if document.contains("STALL") {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        Ok(document)
    }
}

fn append(name: &str, text: &str) -> Mutation {
    Mutation::new(name, CRITERION).with_edit(Edit::append_to_end("system.md", text))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_failing_case_is_excluded() {
    let h = Harness::new();
    let flaky = FlakyGenerator::new(Arc::new(TemplateRenderGenerator::new()), ["a"]);
    let mut opt = h.optimizer(OptimizerConfig::default(), Arc::new(flaky));

    let state = opt.establish_baseline().await.unwrap();
    assert!(approx(state.baseline_score, 3.0));

    let round = opt.step(&add_marker(11)).await.unwrap();
    assert!(round.decision.is_keep());
    assert_eq!(round.samples_scored, 1);
    assert_eq!(round.samples_failed, 1);
}

#[tokio::test]
async fn all_cases_failing_discards_round() {
    let h = Harness::new();
    let mut opt = h.optimizer(OptimizerConfig::default(), Arc::new(TriggeredGenerator));
    opt.establish_baseline().await.unwrap();
    let before = opt.working_set().unwrap().fingerprint().unwrap();

    let round = opt.step(&append("break", "BREAK marker-11")).await.unwrap();

    assert!(matches!(
        round.decision.reason(),
        Some(DiscardReason::GenerationFailed { detail }) if detail.contains("model refused")
    ));
    assert!(round.new_score.is_none());
    assert_eq!(round.samples_failed, 2);
    assert_eq!(opt.working_set().unwrap().fingerprint().unwrap(), before);

    // The next mutation is scored normally.
    assert!(opt.step(&add_marker(12)).await.unwrap().decision.is_keep());
}

#[tokio::test(start_paused = true)]
async fn timeout_is_a_generation_failure() {
    let h = Harness::new();
    let config = OptimizerConfig::default().with_generation_timeout(Duration::from_millis(250));
    let mut opt = h.optimizer(config, Arc::new(TriggeredGenerator));
    opt.establish_baseline().await.unwrap();

    let round = opt.step(&append("stall", "STALL marker-11")).await.unwrap();

    match round.decision.reason() {
        Some(DiscardReason::GenerationFailed { detail }) => assert!(detail.contains("timed out")),
        other => panic!("expected generation failure, got {:?}", other),
    }
}

#[tokio::test]
async fn baseline_with_no_documents_is_fatal() {
    let h = Harness::new();
    let flaky = FlakyGenerator::new(Arc::new(TemplateRenderGenerator::new()), ["a", "b"]);
    let mut opt = h.optimizer(OptimizerConfig::default(), Arc::new(flaky));
    assert!(matches!(
        opt.establish_baseline().await,
        Err(OptimizerError::BaselineUnavailable)
    ));
}
