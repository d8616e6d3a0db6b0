use crate::config::{OptimizerConfig, RunLayout};
use crate::convergence::ConvergenceDetector;
use crate::error::OptimizerError;
use crate::evaluation::CorpusEvaluator;
use crate::report::{OptimizationReport, StopReason};
use crate::state::{Decision, DiscardReason, FileStateStore, OptimizationState, Round, StateStore};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use whetstone_corpus::{Corpus, DocumentGenerator};
use whetstone_mutation::{BackupError, BackupHandle, BackupManager, EditApplier, Mutation, MutationList, WorkingSet};
use whetstone_rubric::RubricScorer;

/// Where the optimizer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerPhase {
    Uninitialized,
    BaselineEstablished,
    RoundInProgress,
    RoundCompleted,
    Finished,
}

impl fmt::Display for OptimizerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::BaselineEstablished => "baseline-established",
            Self::RoundInProgress => "round-in-progress",
            Self::RoundCompleted => "round-completed",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Sequential keep-or-discard search over candidate mutations.
///
/// Rounds run one at a time; within a round the corpus is evaluated
/// concurrently. The run state is persisted after the baseline and after
/// every completed round.
pub struct MutationOptimizer {
    config: OptimizerConfig,
    layout: RunLayout,
    corpus: Corpus,
    evaluator: CorpusEvaluator,
    applier: EditApplier,
    detector: ConvergenceDetector,
    store: Arc<dyn StateStore>,
    working: Option<WorkingSet>,
    backups: Option<BackupManager>,
    state: Option<OptimizationState>,
    phase: OptimizerPhase,
    cancel: Arc<AtomicBool>,
}

impl MutationOptimizer {
    pub fn new(
        config: OptimizerConfig,
        layout: RunLayout,
        scorer: RubricScorer,
        corpus: Corpus,
        generator: Arc<dyn DocumentGenerator>,
    ) -> Result<Self, OptimizerError> {
        config.validate()?;
        layout.validate()?;
        let evaluator = CorpusEvaluator::new(
            Arc::new(scorer),
            generator,
            config.generation_timeout(),
            config.max_concurrency,
        );
        let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(layout.state_path()));
        Ok(Self {
            detector: ConvergenceDetector::from_config(&config),
            config,
            layout,
            corpus,
            evaluator,
            applier: EditApplier::new(),
            store,
            working: None,
            backups: None,
            state: None,
            phase: OptimizerPhase::Uninitialized,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the default `state.json` store.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Shared flag; setting it stops the run at the next round boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> OptimizerPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&OptimizationState> {
        self.state.as_ref()
    }

    pub fn working_set(&self) -> Option<&WorkingSet> {
        self.working.as_ref()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn detector(&self) -> &ConvergenceDetector {
        &self.detector
    }

    /// Every mutation must target a criterion the rubric scores.
    pub fn validate_mutations(&self, mutations: &MutationList) -> Result<(), OptimizerError> {
        mutations
            .iter()
            .try_for_each(|m| self.validate_mutation(m))
    }

    fn validate_mutation(&self, mutation: &Mutation) -> Result<(), OptimizerError> {
        if self.evaluator.scorer().has_criterion(&mutation.target_criterion) {
            Ok(())
        } else {
            Err(OptimizerError::Configuration(format!(
                "mutation '{}' targets unknown criterion '{}'",
                mutation.name, mutation.target_criterion
            )))
        }
    }

    fn open_backups(&mut self) -> Result<(), OptimizerError> {
        let backups = BackupManager::new(self.layout.backups_dir()).map_err(|e| {
            OptimizerError::Persistence(format!("{}: {}", self.layout.backups_dir().display(), e))
        })?;
        self.backups = Some(backups);
        Ok(())
    }

    /// Drop snapshots left in the run directory by an earlier run, so that
    /// `resume` can never mistake one for this run's in-flight round.
    fn clear_snapshots(&self) -> Result<(), OptimizerError> {
        let backups = self.backups.as_ref().ok_or(OptimizerError::NotInitialized)?;
        let removed = backups.clear().map_err(|e| {
            OptimizerError::Persistence(format!("{}: {}", backups.root().display(), e))
        })?;
        if removed > 0 {
            tracing::warn!(removed, dir = %backups.root().display(), "cleared snapshots from a previous run");
        }
        Ok(())
    }

    /// Copy the baseline into a fresh working set and score it.
    ///
    /// Persists the round-0 state before returning.
    pub async fn establish_baseline(&mut self) -> Result<&OptimizationState, OptimizerError> {
        if self.phase != OptimizerPhase::Uninitialized {
            return Err(OptimizerError::InvalidPhase(self.phase.to_string()));
        }

        let working = WorkingSet::initialize_from(&self.layout.baseline_dir, &self.layout.working_dir)
            .map_err(|e| OptimizerError::WorkingSet(e.to_string()))?;
        self.open_backups()?;
        self.clear_snapshots()?;

        let score = self.evaluator.evaluate(working.root(), &self.corpus).await;
        let overall = score.overall.ok_or(OptimizerError::BaselineUnavailable)?;

        let state = OptimizationState::new(overall, score.per_criterion.clone(), self.corpus.version());
        self.store.save(&state)?;

        tracing::info!(
            score = overall,
            cases = self.corpus.len(),
            failed = score.failed(),
            "baseline established"
        );

        self.working = Some(working);
        self.phase = OptimizerPhase::BaselineEstablished;
        Ok(&*self.state.insert(state))
    }

    /// Continue a run from its persisted state.
    ///
    /// If the process died mid-round, the working set is rolled back to the
    /// snapshot taken at the start of that round. A snapshot older than the
    /// persisted state cannot belong to an in-flight round and is ignored.
    pub fn resume(&mut self) -> Result<&OptimizationState, OptimizerError> {
        if self.phase != OptimizerPhase::Uninitialized {
            return Err(OptimizerError::InvalidPhase(self.phase.to_string()));
        }
        let state = self.store.load()?.ok_or(OptimizerError::NotInitialized)?;
        if !state.is_consistent() {
            return Err(OptimizerError::InvariantViolation(
                "persisted history does not match its summary fields".into(),
            ));
        }
        if !state.corpus_version.is_empty() && state.corpus_version != self.corpus.version() {
            return Err(OptimizerError::Configuration(format!(
                "run was started with corpus version '{}', found '{}'",
                state.corpus_version,
                self.corpus.version()
            )));
        }

        self.open_backups()?;
        let in_flight = state.current_round + 1;
        let backups = self.backups.as_ref().ok_or(OptimizerError::NotInitialized)?;
        let working = match backups.get(in_flight) {
            Ok(handle) if handle.created_at >= state.updated_at => {
                if !self.layout.working_dir.exists() {
                    std::fs::create_dir_all(&self.layout.working_dir)
                        .map_err(|e| OptimizerError::WorkingSet(e.to_string()))?;
                }
                let working = WorkingSet::open(&self.layout.working_dir)
                    .map_err(|e| OptimizerError::WorkingSet(e.to_string()))?;
                backups.restore(&handle, &working)?;
                tracing::warn!(round = in_flight, "rolled back interrupted round");
                working
            }
            Ok(handle) => {
                tracing::warn!(
                    round = in_flight,
                    snapshot_at = %handle.created_at,
                    state_at = %state.updated_at,
                    "ignoring snapshot older than persisted state"
                );
                WorkingSet::open(&self.layout.working_dir)
                    .map_err(|e| OptimizerError::WorkingSet(e.to_string()))?
            }
            Err(BackupError::SnapshotNotFound(_)) => WorkingSet::open(&self.layout.working_dir)
                .map_err(|e| OptimizerError::WorkingSet(e.to_string()))?,
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            round = state.current_round,
            score = state.current_score,
            "run resumed"
        );

        self.working = Some(working);
        self.phase = if state.current_round == 0 {
            OptimizerPhase::BaselineEstablished
        } else {
            OptimizerPhase::RoundCompleted
        };
        Ok(&*self.state.insert(state))
    }

    /// Run one mutation through snapshot, apply, score and decide, then
    /// persist the completed round.
    ///
    /// Edit and generation failures become discarded rounds. A persistence
    /// failure rolls the working set back to the last persisted state and
    /// ends the run.
    pub async fn step(&mut self, mutation: &Mutation) -> Result<Round, OptimizerError> {
        match self.phase {
            OptimizerPhase::Uninitialized => return Err(OptimizerError::NotInitialized),
            OptimizerPhase::BaselineEstablished | OptimizerPhase::RoundCompleted => {}
            other => return Err(OptimizerError::InvalidPhase(other.to_string())),
        }
        if self.is_cancelled() {
            return Err(OptimizerError::Cancelled);
        }
        self.validate_mutation(mutation)?;

        let (working, backups, state) = match (&self.working, &self.backups, &self.state) {
            (Some(w), Some(b), Some(s)) => (w.clone(), b, s),
            _ => return Err(OptimizerError::NotInitialized),
        };
        let round_number = state.current_round + 1;
        let previous_score = state.current_score;
        let previous_per_criterion = state.current_per_criterion.clone();

        self.phase = OptimizerPhase::RoundInProgress;
        let handle = match backups.snapshot(&working, round_number) {
            Ok(handle) => handle,
            Err(e) => {
                self.phase = OptimizerPhase::Finished;
                return Err(OptimizerError::Persistence(format!(
                    "snapshot for round {}: {}",
                    round_number, e
                )));
            }
        };

        let mut round = Round {
            round_number,
            mutation: mutation.clone(),
            previous_score,
            new_score: None,
            improvement: 0.0,
            decision: Decision::Keep,
            samples_scored: 0,
            samples_failed: 0,
            per_criterion: BTreeMap::new(),
            target_delta: None,
            diminishing_returns: false,
            timestamp: Utc::now(),
        };

        match self.applier.apply(&working, mutation) {
            Err(failure) => {
                tracing::warn!(
                    round = round_number,
                    mutation = %mutation.name,
                    edit = failure.edit_index,
                    error = %failure.error,
                    "edit failed"
                );
                round.decision = Decision::discard(DiscardReason::EditFailed {
                    edit_index: failure.edit_index,
                    detail: failure.error.to_string(),
                });
            }
            Ok(applied) => {
                tracing::debug!(
                    round = round_number,
                    mutation = %mutation.name,
                    edits = applied.edits_applied,
                    "mutation applied"
                );
                let score = self.evaluator.evaluate(working.root(), &self.corpus).await;
                round.samples_scored = score.scored();
                round.samples_failed = score.failed();
                match score.overall {
                    None => {
                        round.decision = Decision::discard(DiscardReason::GenerationFailed {
                            detail: score.failure_summary(),
                        });
                    }
                    Some(new_score) => {
                        round.new_score = Some(new_score);
                        round.improvement = new_score - previous_score;
                        round.target_delta = score
                            .per_criterion
                            .get(&mutation.target_criterion)
                            .zip(previous_per_criterion.get(&mutation.target_criterion))
                            .map(|(new, old)| new - old);
                        round.per_criterion = score.per_criterion;
                        if round.improvement <= 0.0 {
                            round.decision = Decision::discard(DiscardReason::NoImprovement);
                        }
                    }
                }
            }
        }

        if !round.decision.is_keep() {
            self.rollback(&handle, &working)?;
        }

        if self.is_cancelled() {
            if round.decision.is_keep() {
                self.rollback(&handle, &working)?;
            }
            tracing::warn!(round = round_number, "run cancelled; in-flight round rolled back");
            self.phase = OptimizerPhase::Finished;
            return Err(OptimizerError::Cancelled);
        }

        let mut next = match &self.state {
            Some(state) => state.clone(),
            None => return Err(OptimizerError::NotInitialized),
        };
        round.timestamp = Utc::now();
        if let Err(e) = next.record(round) {
            self.rollback(&handle, &working)?;
            self.phase = OptimizerPhase::Finished;
            return Err(e);
        }
        let diminishing = self.detector.is_diminishing(&next.history);
        if let Some(last) = next.history.last_mut() {
            last.diminishing_returns = diminishing;
        }

        if let Err(e) = self.store.save(&next) {
            tracing::warn!(round = round_number, error = %e, "state not persisted; halting");
            self.rollback(&handle, &working)?;
            self.phase = OptimizerPhase::Finished;
            return Err(e);
        }

        let completed = next.history.last().cloned().ok_or_else(|| {
            OptimizerError::InvariantViolation("recorded round missing from history".into())
        })?;
        tracing::info!(
            round = round_number,
            mutation = %mutation.name,
            decision = completed.decision.label(),
            reason = completed.decision.reason().map(DiscardReason::code).unwrap_or("-"),
            previous = previous_score,
            score = ?completed.new_score,
            current = next.current_score,
            "round completed"
        );
        if diminishing {
            tracing::warn!(
                round = round_number,
                window = self.detector.window(),
                threshold = self.detector.threshold(),
                "diminishing returns"
            );
        }

        self.state = Some(next);
        self.phase = OptimizerPhase::RoundCompleted;
        Ok(completed)
    }

    fn rollback(&mut self, handle: &BackupHandle, working: &WorkingSet) -> Result<(), OptimizerError> {
        let backups = self.backups.as_ref().ok_or(OptimizerError::NotInitialized)?;
        if let Err(e) = backups.restore(handle, working) {
            self.phase = OptimizerPhase::Finished;
            return Err(e.into());
        }
        tracing::debug!(round = handle.round, "working set rolled back");
        Ok(())
    }

    /// Process the mutation list in order, from the first mutation not yet
    /// run, until it is exhausted, `max_rounds` is reached, or the run is
    /// cancelled.
    ///
    /// Establishes the baseline first if neither it nor a resumed state
    /// exists yet.
    pub async fn run(&mut self, mutations: &MutationList) -> Result<OptimizationReport, OptimizerError> {
        self.validate_mutations(mutations)?;
        match self.phase {
            OptimizerPhase::Uninitialized => {
                self.establish_baseline().await?;
            }
            OptimizerPhase::BaselineEstablished | OptimizerPhase::RoundCompleted => {}
            other => return Err(OptimizerError::InvalidPhase(other.to_string())),
        }

        let start = self.state.as_ref().map(|s| s.current_round).unwrap_or(0);
        let mut stop = StopReason::MutationsExhausted;
        for mutation in mutations.iter().skip(start as usize) {
            let completed = self.state.as_ref().map(|s| s.current_round).unwrap_or(0);
            if self.config.max_rounds.is_some_and(|max| completed >= max) {
                stop = StopReason::MaxRoundsReached;
                break;
            }
            if self.is_cancelled() {
                stop = StopReason::Cancelled;
                break;
            }
            match self.step(mutation).await {
                Ok(_) => {}
                Err(OptimizerError::Cancelled) => {
                    stop = StopReason::Cancelled;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.phase = OptimizerPhase::Finished;
        let report = self.report(stop)?;
        if self.config.write_report {
            report.write(&self.layout)?;
        }
        tracing::info!(
            baseline = report.baseline_score,
            final_score = report.final_score,
            kept = report.kept,
            discarded = report.discarded,
            stop = ?stop,
            "run finished"
        );
        Ok(report)
    }

    /// Project the current state into a report.
    pub fn report(&self, stop: StopReason) -> Result<OptimizationReport, OptimizerError> {
        let state = self.state.as_ref().ok_or(OptimizerError::NotInitialized)?;
        Ok(OptimizationReport::from_state(state, &self.detector, stop))
    }
}
