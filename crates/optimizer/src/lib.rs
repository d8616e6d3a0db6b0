#![deny(unsafe_code)]
//! # whetstone-optimizer
//!
//! Sequential keep-or-discard search over externally authored template
//! mutations.
//!
//! A run scores the pristine template set across the corpus to get a
//! baseline, then for each candidate mutation in order: snapshot, apply,
//! re-score, keep on strict improvement or restore the snapshot, persist
//! state. The current score never decreases. State is written after every
//! round so an interrupted run resumes from its last completed round.

pub mod config;
pub mod convergence;
pub mod error;
pub mod evaluation;
pub mod optimizer;
pub mod report;
pub mod state;

pub use config::{OptimizerConfig, RunLayout};
pub use convergence::{is_diminishing, ConvergenceDetector};
pub use error::OptimizerError;
pub use evaluation::{CorpusEvaluator, CorpusScore, SampleFailure, SampleScore};
pub use optimizer::{MutationOptimizer, OptimizerPhase};
pub use report::{OptimizationReport, RoundRow, StopReason};
pub use state::{
    Decision, DiscardReason, FileStateStore, MemoryStateStore, OptimizationState, Round, StateStore,
};
