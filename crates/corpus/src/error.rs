/// Errors loading or validating a corpus. Always configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus contains no test cases")]
    Empty,
    #[error("duplicate test case id: {0}")]
    DuplicateCase(String),
    #[error("test case id must not be empty")]
    EmptyId,
    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse corpus: {0}")]
    Parse(String),
}

/// Failure to produce a document for one test case.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generator failed for case '{case}': {reason}")]
    Failed { case: String, reason: String },
    #[error("generation for case '{case}' timed out after {timeout_ms}ms")]
    Timeout { case: String, timeout_ms: u64 },
    #[error("template set unreadable: {0}")]
    Templates(String),
}

impl GenerationError {
    pub fn failed(case: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            case: case.into(),
            reason: reason.into(),
        }
    }
}
