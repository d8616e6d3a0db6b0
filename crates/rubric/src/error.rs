/// Configuration errors raised while building a rubric.
///
/// Scoring itself never fails; everything here is reported at construction.
#[derive(Debug, thiserror::Error)]
pub enum RubricError {
    #[error("rubric has no criteria")]
    NoCriteria,
    #[error("duplicate criterion name: {0}")]
    DuplicateCriterion(String),
    #[error("criterion '{0}' has no checks")]
    EmptyCriterion(String),
    #[error("criterion '{criterion}' has duplicate check name: {check}")]
    DuplicateCheck { criterion: String, check: String },
    #[error("criterion '{criterion}' has invalid weight {weight} (must be finite and > 0)")]
    InvalidWeight { criterion: String, weight: f64 },
    #[error("check '{check}' has invalid pattern: {reason}")]
    InvalidPattern { check: String, reason: String },
    #[error("check '{check}' has invalid predicate: {reason}")]
    InvalidPredicate { check: String, reason: String },
    #[error("failed to read rubric definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rubric definition: {0}")]
    Parse(String),
}
