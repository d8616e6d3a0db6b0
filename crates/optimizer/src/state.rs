use crate::error::OptimizerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use whetstone_mutation::Mutation;

/// Why a round's mutation was not kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DiscardReason {
    /// Scored, but not strictly better than the current score.
    NoImprovement,
    /// An edit could not be applied.
    EditFailed { edit_index: usize, detail: String },
    /// Every test case failed to generate, so nothing could be compared.
    GenerationFailed { detail: String },
}

impl DiscardReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoImprovement => "no_improvement",
            Self::EditFailed { .. } => "edit_failed",
            Self::GenerationFailed { .. } => "generation_failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Keep,
    Discard { reason: DiscardReason },
}

impl Decision {
    pub fn discard(reason: DiscardReason) -> Self {
        Self::Discard { reason }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn reason(&self) -> Option<&DiscardReason> {
        match self {
            Self::Keep => None,
            Self::Discard { reason } => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Discard { .. } => "discard",
        }
    }
}

/// One mutation's full apply-score-decide cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u64,
    pub mutation: Mutation,
    pub previous_score: f64,
    /// Absent when the mutation could not be applied or nothing generated.
    pub new_score: Option<f64>,
    /// `new_score - previous_score`, or 0 when unmeasured.
    pub improvement: f64,
    pub decision: Decision,
    pub samples_scored: usize,
    pub samples_failed: usize,
    /// Corpus-mean score per criterion after the mutation, when measured.
    #[serde(default)]
    pub per_criterion: BTreeMap<String, f64>,
    /// Change of the mutation's target criterion, when measured.
    #[serde(default)]
    pub target_delta: Option<f64>,
    /// Convergence detector verdict after this round. Advisory.
    #[serde(default)]
    pub diminishing_returns: bool,
    pub timestamp: DateTime<Utc>,
}

impl Round {
    /// Improvement as seen by the convergence detector: discarded rounds count 0.
    pub fn effective_improvement(&self) -> f64 {
        if self.decision.is_keep() {
            self.improvement
        } else {
            0.0
        }
    }
}

/// The whole run, persisted after every completed round.
///
/// `current_score` is the score after the most recent kept mutation (or the
/// baseline), `history.len() == current_round`, and `accepted_mutations`
/// are exactly the kept rounds' mutations in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationState {
    pub current_round: u64,
    pub baseline_score: f64,
    pub current_score: f64,
    #[serde(default)]
    pub baseline_per_criterion: BTreeMap<String, f64>,
    #[serde(default)]
    pub current_per_criterion: BTreeMap<String, f64>,
    pub history: Vec<Round>,
    pub accepted_mutations: Vec<Mutation>,
    #[serde(default)]
    pub corpus_version: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OptimizationState {
    pub fn new(
        baseline_score: f64,
        baseline_per_criterion: BTreeMap<String, f64>,
        corpus_version: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            current_round: 0,
            baseline_score,
            current_score: baseline_score,
            current_per_criterion: baseline_per_criterion.clone(),
            baseline_per_criterion,
            history: Vec::new(),
            accepted_mutations: Vec::new(),
            corpus_version: corpus_version.into(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Append a completed round, advancing the current score on keep.
    pub fn record(&mut self, round: Round) -> Result<(), OptimizerError> {
        if round.round_number != self.current_round + 1 {
            return Err(OptimizerError::InvariantViolation(format!(
                "round {} recorded after round {}",
                round.round_number, self.current_round
            )));
        }
        if round.decision.is_keep() {
            match round.new_score {
                Some(score) if score > self.current_score => {
                    self.current_score = score;
                    self.current_per_criterion = round.per_criterion.clone();
                    self.accepted_mutations.push(round.mutation.clone());
                }
                other => {
                    return Err(OptimizerError::InvariantViolation(format!(
                        "round {} kept without strict improvement ({:?} vs {})",
                        round.round_number, other, self.current_score
                    )));
                }
            }
        }
        self.current_round = round.round_number;
        self.updated_at = round.timestamp;
        self.history.push(round);
        Ok(())
    }

    pub fn kept_count(&self) -> usize {
        self.history.iter().filter(|r| r.decision.is_keep()).count()
    }

    pub fn discarded_count(&self) -> usize {
        self.history.len() - self.kept_count()
    }

    pub fn total_improvement(&self) -> f64 {
        self.current_score - self.baseline_score
    }

    /// Check the history invariants. Used after loading persisted state.
    pub fn is_consistent(&self) -> bool {
        if self.history.len() as u64 != self.current_round {
            return false;
        }
        let kept: Vec<&Mutation> = self
            .history
            .iter()
            .filter(|r| r.decision.is_keep())
            .map(|r| &r.mutation)
            .collect();
        if kept.len() != self.accepted_mutations.len()
            || kept.iter().zip(&self.accepted_mutations).any(|(a, b)| *a != b)
        {
            return false;
        }
        let numbered = self
            .history
            .iter()
            .enumerate()
            .all(|(i, r)| r.round_number == i as u64 + 1);
        let last_kept = self
            .history
            .iter()
            .rev()
            .find(|r| r.decision.is_keep())
            .and_then(|r| r.new_score)
            .unwrap_or(self.baseline_score);
        numbered && (last_kept - self.current_score).abs() < 1e-9
    }
}

/// Durable storage for [`OptimizationState`].
pub trait StateStore: Send + Sync {
    fn save(&self, state: &OptimizationState) -> Result<(), OptimizerError>;
    fn load(&self) -> Result<Option<OptimizationState>, OptimizerError>;
}

/// JSON file written by temp-file + fsync + rename, so a reader sees either
/// the previous or the new state, never a torn write.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &OptimizationState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)
    }
}

impl StateStore for FileStateStore {
    fn save(&self, state: &OptimizationState) -> Result<(), OptimizerError> {
        self.persist(state)
            .map_err(|e| OptimizerError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        tracing::debug!(path = %self.path.display(), round = state.current_round, "state persisted");
        Ok(())
    }

    fn load(&self) -> Result<Option<OptimizationState>, OptimizerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)
            .map_err(|e| OptimizerError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        let state = serde_json::from_slice(&bytes)
            .map_err(|e| OptimizerError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(state))
    }
}

/// In-memory store for tests. Can be told to fail after a number of saves.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: Option<OptimizationState>,
    saves: usize,
    fail_after: Option<usize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed for the first `saves` saves, fail for every one after.
    pub fn failing_after(saves: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                fail_after: Some(saves),
                ..MemoryInner::default()
            }),
        }
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|i| i.saves).unwrap_or(0)
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, state: &OptimizationState) -> Result<(), OptimizerError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| OptimizerError::Persistence("state store lock poisoned".into()))?;
        if inner.fail_after.is_some_and(|limit| inner.saves >= limit) {
            return Err(OptimizerError::Persistence("simulated write failure".into()));
        }
        inner.saves += 1;
        inner.state = Some(state.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<OptimizationState>, OptimizerError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| OptimizerError::Persistence("state store lock poisoned".into()))?;
        Ok(inner.state.clone())
    }
}
