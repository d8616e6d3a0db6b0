/// Failure of a single edit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("line {line} out of range for '{file}' ({len} lines)")]
    OutOfRange { file: String, line: usize, len: usize },
    #[error("pattern '{pattern}' not found in '{file}'")]
    PatternNotFound { file: String, pattern: String },
    #[error("target file not found: {0}")]
    FileNotFound(String),
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid target path: {0}")]
    InvalidTarget(String),
    #[error("i/o error on '{file}': {reason}")]
    Io { file: String, reason: String },
}

/// The first failing edit of a mutation. Remaining edits were not attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("edit #{edit_index} failed: {error}")]
pub struct EditFailure {
    pub edit_index: usize,
    #[source]
    pub error: EditError,
}

/// Errors from the backup/rollback manager.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("no snapshot for round {0}")]
    SnapshotNotFound(u64),
    #[error("snapshot for round {round} is corrupt: expected {expected}, found {found}")]
    Corrupt {
        round: u64,
        expected: String,
        found: String,
    },
    #[error("snapshot manifest unreadable: {0}")]
    Manifest(String),
    #[error("backup i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading or validating a candidate mutation list.
#[derive(Debug, thiserror::Error)]
pub enum MutationListError {
    #[error("mutation name must not be empty (position {0})")]
    EmptyName(usize),
    #[error("duplicate mutation name: {0}")]
    DuplicateName(String),
    #[error("mutation '{0}' has no edits")]
    NoEdits(String),
    #[error("mutation '{mutation}' has invalid target: {reason}")]
    InvalidTarget { mutation: String, reason: String },
    #[error("failed to read mutation list: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse mutation list: {0}")]
    Parse(String),
}
