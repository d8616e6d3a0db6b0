use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use whetstone_corpus::{Corpus, DocumentGenerator, GenerationError, TestCase};
use whetstone_rubric::{RubricScorer, ScoreResult};

/// Scored document for one test case.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleScore {
    pub case_id: String,
    pub result: ScoreResult,
}

/// Test case that produced no document. Excluded from the averages.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleFailure {
    pub case_id: String,
    pub error: GenerationError,
}

/// Corpus-wide score of one template set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorpusScore {
    /// Mean overall score over the scored samples; `None` if none were scored.
    pub overall: Option<f64>,
    pub per_criterion: BTreeMap<String, f64>,
    /// In corpus order.
    pub samples: Vec<SampleScore>,
    /// In corpus order.
    pub failures: Vec<SampleFailure>,
}

impl CorpusScore {
    pub fn scored(&self) -> usize {
        self.samples.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// `; `-joined failure messages, for discard reasons and logs.
    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.error.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn reduce(outcomes: Vec<(String, Result<ScoreResult, GenerationError>)>) -> Self {
        let mut score = CorpusScore::default();
        for (case_id, outcome) in outcomes {
            match outcome {
                Ok(result) => score.samples.push(SampleScore { case_id, result }),
                Err(error) => score.failures.push(SampleFailure { case_id, error }),
            }
        }
        if score.samples.is_empty() {
            return score;
        }

        let n = score.samples.len() as f64;
        let mut overall = 0.0;
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for sample in &score.samples {
            overall += sample.result.overall;
            for (name, value) in &sample.result.per_criterion {
                *sums.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        score.overall = Some(overall / n);
        score.per_criterion = sums.into_iter().map(|(k, v)| (k, v / n)).collect();
        score
    }
}

/// Generates and scores every test case against a template directory.
///
/// Cases run concurrently up to `concurrency`, each bounded by `timeout`.
/// Results are reduced in corpus order, so the score does not depend on
/// completion order.
#[derive(Clone)]
pub struct CorpusEvaluator {
    scorer: Arc<RubricScorer>,
    generator: Arc<dyn DocumentGenerator>,
    timeout: Duration,
    concurrency: usize,
}

impl CorpusEvaluator {
    pub fn new(
        scorer: Arc<RubricScorer>,
        generator: Arc<dyn DocumentGenerator>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            scorer,
            generator,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub fn scorer(&self) -> &RubricScorer {
        &self.scorer
    }

    pub async fn evaluate(&self, template_dir: &Path, corpus: &Corpus) -> CorpusScore {
        let outcomes: Vec<(String, Result<ScoreResult, GenerationError>)> =
            stream::iter(corpus.cases())
                .map(|case| async move {
                    let outcome = self.evaluate_case(template_dir, case).await;
                    (case.id.clone(), outcome)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let score = CorpusScore::reduce(outcomes);
        for failure in &score.failures {
            tracing::warn!(case = %failure.case_id, error = %failure.error, "sample excluded");
        }
        score
    }

    async fn evaluate_case(
        &self,
        template_dir: &Path,
        case: &TestCase,
    ) -> Result<ScoreResult, GenerationError> {
        let document =
            match tokio::time::timeout(self.timeout, self.generator.generate(template_dir, case))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(GenerationError::Timeout {
                        case: case.id.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    })
                }
            };
        let result = self.scorer.score(&document);
        tracing::debug!(case = %case.id, score = result.overall, "sample scored");
        Ok(result)
    }
}
