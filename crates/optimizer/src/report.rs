use crate::config::RunLayout;
use crate::convergence::ConvergenceDetector;
use crate::error::OptimizerError;
use crate::state::{DiscardReason, OptimizationState, Round};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Why the round loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MutationsExhausted,
    MaxRoundsReached,
    Cancelled,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MutationsExhausted => "all candidate mutations processed",
            Self::MaxRoundsReached => "maximum round count reached",
            Self::Cancelled => "cancelled by operator",
        }
    }
}

/// One line of the per-round table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRow {
    pub round: u64,
    pub mutation: String,
    pub target_criterion: String,
    pub previous_score: f64,
    pub new_score: Option<f64>,
    pub improvement: f64,
    pub decision: String,
    pub reason: Option<String>,
    pub detail: Option<String>,
    pub samples_scored: usize,
    pub samples_failed: usize,
    pub diminishing_returns: bool,
}

impl From<&Round> for RoundRow {
    fn from(round: &Round) -> Self {
        let reason = round.decision.reason();
        let detail = reason.and_then(|r| match r {
            DiscardReason::NoImprovement => None,
            DiscardReason::EditFailed { edit_index, detail } => {
                Some(format!("edit {}: {}", edit_index, detail))
            }
            DiscardReason::GenerationFailed { detail } => Some(detail.clone()),
        });
        Self {
            round: round.round_number,
            mutation: round.mutation.name.clone(),
            target_criterion: round.mutation.target_criterion.clone(),
            previous_score: round.previous_score,
            new_score: round.new_score,
            improvement: round.improvement,
            decision: round.decision.label().to_string(),
            reason: reason.map(|r| r.code().to_string()),
            detail,
            samples_scored: round.samples_scored,
            samples_failed: round.samples_failed,
            diminishing_returns: round.diminishing_returns,
        }
    }
}

/// Summary of a finished run. A pure projection of [`OptimizationState`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub corpus_version: String,
    pub baseline_score: f64,
    pub final_score: f64,
    pub absolute_improvement: f64,
    pub percent_improvement: f64,
    pub rounds_completed: u64,
    pub kept: usize,
    pub discarded: usize,
    /// Discard count per reason code.
    pub discards_by_reason: BTreeMap<String, usize>,
    pub accepted_mutations: Vec<String>,
    pub baseline_per_criterion: BTreeMap<String, f64>,
    pub final_per_criterion: BTreeMap<String, f64>,
    pub diminishing_returns: bool,
    pub stop_reason: StopReason,
    pub rows: Vec<RoundRow>,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

impl OptimizationReport {
    pub fn from_state(state: &OptimizationState, detector: &ConvergenceDetector, stop: StopReason) -> Self {
        let mut discards_by_reason = BTreeMap::new();
        for reason in state.history.iter().filter_map(|r| r.decision.reason()) {
            *discards_by_reason.entry(reason.code().to_string()).or_insert(0) += 1;
        }
        let absolute = state.total_improvement();
        let percent = if state.baseline_score > 0.0 {
            absolute / state.baseline_score * 100.0
        } else {
            0.0
        };

        Self {
            corpus_version: state.corpus_version.clone(),
            baseline_score: state.baseline_score,
            final_score: state.current_score,
            absolute_improvement: absolute,
            percent_improvement: percent,
            rounds_completed: state.current_round,
            kept: state.kept_count(),
            discarded: state.discarded_count(),
            discards_by_reason,
            accepted_mutations: state.accepted_mutations.iter().map(|m| m.name.clone()).collect(),
            baseline_per_criterion: state.baseline_per_criterion.clone(),
            final_per_criterion: state.current_per_criterion.clone(),
            diminishing_returns: detector.is_diminishing(&state.history),
            stop_reason: stop,
            rows: state.history.iter().map(RoundRow::from).collect(),
            started_at: state.started_at,
            generated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, OptimizerError> {
        serde_json::to_string_pretty(self).map_err(|e| OptimizerError::Persistence(e.to_string()))
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Optimization report\n");
        let _ = writeln!(out, "| | |");
        let _ = writeln!(out, "|---|---|");
        let _ = writeln!(out, "| Corpus version | {} |", or_dash(&self.corpus_version));
        let _ = writeln!(out, "| Baseline score | {:.3} |", self.baseline_score);
        let _ = writeln!(out, "| Final score | {:.3} |", self.final_score);
        let _ = writeln!(
            out,
            "| Improvement | {:+.3} ({:+.1}%) |",
            self.absolute_improvement, self.percent_improvement
        );
        let _ = writeln!(out, "| Rounds | {} |", self.rounds_completed);
        let _ = writeln!(out, "| Kept / discarded | {} / {} |", self.kept, self.discarded);
        let _ = writeln!(out, "| Stopped | {} |", self.stop_reason.describe());
        let _ = writeln!(
            out,
            "| Diminishing returns | {} |",
            if self.diminishing_returns { "yes" } else { "no" }
        );

        if !self.discards_by_reason.is_empty() {
            let _ = writeln!(out, "\n## Discards by reason\n");
            for (code, count) in &self.discards_by_reason {
                let _ = writeln!(out, "- `{}`: {}", code, count);
            }
        }

        if !self.final_per_criterion.is_empty() {
            let _ = writeln!(out, "\n## Criteria\n");
            let _ = writeln!(out, "| Criterion | Baseline | Final |");
            let _ = writeln!(out, "|---|---|---|");
            for (name, score) in &self.final_per_criterion {
                let base = self
                    .baseline_per_criterion
                    .get(name)
                    .map(|b| format!("{:.3}", b))
                    .unwrap_or_else(|| "-".into());
                let _ = writeln!(out, "| {} | {} | {:.3} |", name, base, score);
            }
        }

        let _ = writeln!(out, "\n## Rounds\n");
        if self.rows.is_empty() {
            let _ = writeln!(out, "No rounds completed.");
        } else {
            let _ = writeln!(
                out,
                "| # | Mutation | Target | Before | After | Δ | Decision | Reason | Samples |"
            );
            let _ = writeln!(out, "|---|---|---|---|---|---|---|---|---|");
            for row in &self.rows {
                let after = row
                    .new_score
                    .map(|s| format!("{:.3}", s))
                    .unwrap_or_else(|| "-".into());
                let reason = match (&row.reason, &row.detail) {
                    (Some(code), Some(detail)) => format!("{}: {}", code, detail.replace('|', "/")),
                    (Some(code), None) => code.clone(),
                    _ => "-".into(),
                };
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {:.3} | {} | {:+.3} | {}{} | {} | {}/{} |",
                    row.round,
                    row.mutation,
                    row.target_criterion,
                    row.previous_score,
                    after,
                    row.improvement,
                    row.decision,
                    if row.diminishing_returns { " ⚠" } else { "" },
                    reason,
                    row.samples_scored,
                    row.samples_scored + row.samples_failed,
                );
            }
        }

        if !self.accepted_mutations.is_empty() {
            let _ = writeln!(out, "\n## Accepted mutations\n");
            for (i, name) in self.accepted_mutations.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, name);
            }
        }
        out
    }

    /// Write `report.md` and `report.json` into the run directory.
    pub fn write(&self, layout: &RunLayout) -> Result<(), OptimizerError> {
        let persist = |e: std::io::Error| OptimizerError::Persistence(format!("report: {}", e));
        std::fs::create_dir_all(&layout.run_dir).map_err(persist)?;
        std::fs::write(layout.report_markdown_path(), self.to_markdown()).map_err(persist)?;
        std::fs::write(layout.report_json_path(), self.to_json()?).map_err(persist)?;
        tracing::info!(path = %layout.report_markdown_path().display(), "report written");
        Ok(())
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
