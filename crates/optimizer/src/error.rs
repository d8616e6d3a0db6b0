use whetstone_corpus::CorpusError;
use whetstone_mutation::{BackupError, MutationListError};
use whetstone_rubric::RubricError;

/// Run-level errors. Recoverable per-round failures (edit or generation
/// errors) never surface here; they become discarded rounds.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("baseline unavailable: no test case produced a document")]
    BaselineUnavailable,
    #[error("optimizer not initialized; establish or resume a baseline first")]
    NotInitialized,
    #[error("operation not allowed in phase {0}")]
    InvalidPhase(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("working set error: {0}")]
    WorkingSet(String),
    #[error("rollback failed: {0}")]
    Rollback(#[from] BackupError),
    #[error("state invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<RubricError> for OptimizerError {
    fn from(e: RubricError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<CorpusError> for OptimizerError {
    fn from(e: CorpusError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<MutationListError> for OptimizerError {
    fn from(e: MutationListError) -> Self {
        Self::Configuration(e.to_string())
    }
}
