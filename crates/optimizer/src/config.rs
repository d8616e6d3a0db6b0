use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for an optimization run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Stop after this many rounds even if candidates remain.
    pub max_rounds: Option<u64>,
    /// Trailing rounds inspected by the convergence detector.
    pub convergence_window: usize,
    /// Mean improvement (score points) below which returns are diminishing.
    pub convergence_threshold: f64,
    /// Per-test-case bound on a generation call.
    pub generation_timeout_ms: u64,
    /// Test cases generated and scored concurrently within a round.
    pub max_concurrency: usize,
    /// Write `report.md` and `report.json` into the run directory on finish.
    pub write_report: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_rounds: None,
            convergence_window: 5,
            convergence_threshold: 0.05,
            generation_timeout_ms: 60_000,
            max_concurrency: 4,
            write_report: true,
        }
    }
}

impl OptimizerConfig {
    /// Short runs against a fast or simulated generator.
    pub fn quick() -> Self {
        Self {
            max_rounds: Some(10),
            generation_timeout_ms: 10_000,
            max_concurrency: 8,
            ..Self::default()
        }
    }

    /// Long runs against a live generator.
    pub fn thorough() -> Self {
        Self {
            max_rounds: None,
            convergence_window: 8,
            convergence_threshold: 0.02,
            generation_timeout_ms: 120_000,
            max_concurrency: 2,
            write_report: true,
        }
    }

    pub fn with_max_rounds(mut self, rounds: u64) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.convergence_window == 0 {
            return Err(OptimizerError::Configuration(
                "convergence_window must be at least 1".into(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(OptimizerError::Configuration(format!(
                "convergence_threshold {} must be finite and >= 0",
                self.convergence_threshold
            )));
        }
        if self.generation_timeout_ms == 0 {
            return Err(OptimizerError::Configuration(
                "generation_timeout_ms must be > 0".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(OptimizerError::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, OptimizerError> {
        let config: Self =
            toml::from_str(s).map_err(|e| OptimizerError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, OptimizerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OptimizerError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Filesystem layout of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLayout {
    /// Pristine templates. Read once, never written.
    pub baseline_dir: PathBuf,
    /// Mutated copy of the templates.
    pub working_dir: PathBuf,
    /// State, backups and reports.
    pub run_dir: PathBuf,
}

impl RunLayout {
    pub fn new(
        baseline_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        run_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            baseline_dir: baseline_dir.into(),
            working_dir: working_dir.into(),
            run_dir: run_dir.into(),
        }
    }

    /// Working set placed at `run_dir/working`.
    pub fn in_run_dir(baseline_dir: impl Into<PathBuf>, run_dir: impl Into<PathBuf>) -> Self {
        let run_dir = run_dir.into();
        Self {
            baseline_dir: baseline_dir.into(),
            working_dir: run_dir.join("working"),
            run_dir,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.run_dir.join("state.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.run_dir.join("backups")
    }

    pub fn report_markdown_path(&self) -> PathBuf {
        self.run_dir.join("report.md")
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.run_dir.join("report.json")
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.baseline_dir == self.working_dir {
            return Err(OptimizerError::Configuration(
                "working_dir must differ from baseline_dir".into(),
            ));
        }
        if self.working_dir.starts_with(&self.baseline_dir) {
            return Err(OptimizerError::Configuration(
                "working_dir must not live inside baseline_dir".into(),
            ));
        }
        if self.baseline_dir.starts_with(&self.working_dir) {
            return Err(OptimizerError::Configuration(
                "baseline_dir must not live inside working_dir".into(),
            ));
        }
        // State and snapshots would be swapped out by a restore.
        if self.run_dir.starts_with(&self.working_dir) {
            return Err(OptimizerError::Configuration(
                "run_dir must not live inside working_dir".into(),
            ));
        }
        if self.run_dir.starts_with(&self.baseline_dir) {
            return Err(OptimizerError::Configuration(
                "run_dir must not live inside baseline_dir".into(),
            ));
        }
        Ok(())
    }
}
