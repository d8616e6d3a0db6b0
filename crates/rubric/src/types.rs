use crate::error::RubricError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Lowest score a criterion (or the overall rubric) can receive.
pub const MIN_SCORE: f64 = 1.0;
/// Highest score a criterion (or the overall rubric) can receive.
pub const MAX_SCORE: f64 = 5.0;

/// Boolean rule over the full document text.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How a check decides pass/fail.
#[derive(Clone)]
pub enum CheckKind {
    /// Passes when "pattern occurs" equals `expect_present`.
    Pattern { regex: Regex, expect_present: bool },
    /// Passes when the predicate returns true.
    Predicate(Predicate),
}

impl fmt::Debug for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern {
                regex,
                expect_present,
            } => f
                .debug_struct("Pattern")
                .field("regex", &regex.as_str())
                .field("expect_present", expect_present)
                .finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// Build the regex behind a check. Multi-line, so `^`/`$` anchor at line
/// boundaries; case-insensitive unless told otherwise. Every pattern in a
/// rubric, including those inside predicates, goes through here.
pub fn compile_pattern(check: &str, pattern: &str, case_insensitive: bool) -> Result<Regex, RubricError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(true)
        .build()
        .map_err(|e| RubricError::InvalidPattern {
            check: check.to_string(),
            reason: e.to_string(),
        })
}

/// An atomic pass/fail test within a criterion.
#[derive(Clone, Debug)]
pub struct Check {
    pub name: String,
    pub kind: CheckKind,
}

impl Check {
    /// Pattern that must be present (case-insensitive).
    pub fn pattern(name: impl Into<String>, pattern: &str) -> Result<Self, RubricError> {
        Self::compile(name.into(), pattern, true, true)
    }

    /// Pattern that must be absent (case-insensitive). Used for banned phrases.
    pub fn absent(name: impl Into<String>, pattern: &str) -> Result<Self, RubricError> {
        Self::compile(name.into(), pattern, false, true)
    }

    /// Pattern check with explicit expectation and case sensitivity.
    pub fn compile(
        name: String,
        pattern: &str,
        expect_present: bool,
        case_insensitive: bool,
    ) -> Result<Self, RubricError> {
        let regex = compile_pattern(&name, pattern, case_insensitive)?;
        Ok(Self {
            name,
            kind: CheckKind::Pattern {
                regex,
                expect_present,
            },
        })
    }

    /// Arbitrary predicate over the document text.
    pub fn predicate<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: CheckKind::Predicate(Arc::new(f)),
        }
    }

    /// Evaluate this check against a document.
    pub fn evaluate(&self, text: &str) -> bool {
        match &self.kind {
            CheckKind::Pattern {
                regex,
                expect_present,
            } => regex.is_match(text) == *expect_present,
            CheckKind::Predicate(f) => f(text),
        }
    }
}

/// A named, weighted quality dimension.
#[derive(Clone, Debug)]
pub struct Criterion {
    pub name: String,
    pub weight: f64,
    pub checks: Vec<Check>,
}

impl Criterion {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_checks(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        self.checks.extend(checks);
        self
    }
}

/// Outcome of one check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: String,
    pub passed: bool,
}

/// Itemized result of scoring one document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Criterion name → score in [1, 5].
    pub per_criterion: BTreeMap<String, f64>,
    /// Weight-normalized mean of `per_criterion`, in [1, 5].
    pub overall: f64,
    /// Criterion name → outcome of each check, in declared order.
    pub detail: BTreeMap<String, Vec<CheckOutcome>>,
}

impl ScoreResult {
    /// Total number of passing checks across all criteria.
    pub fn passed_checks(&self) -> usize {
        self.detail
            .values()
            .flat_map(|outcomes| outcomes.iter())
            .filter(|o| o.passed)
            .count()
    }

    /// Total number of checks evaluated.
    pub fn total_checks(&self) -> usize {
        self.detail.values().map(Vec::len).sum()
    }

    /// Names of the failing checks of one criterion.
    pub fn failed_checks(&self, criterion: &str) -> Vec<&str> {
        self.detail
            .get(criterion)
            .map(|outcomes| {
                outcomes
                    .iter()
                    .filter(|o| !o.passed)
                    .map(|o| o.check.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Linear 1–5 mapping of a pass ratio.
pub fn criterion_score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return MIN_SCORE;
    }
    MIN_SCORE + (MAX_SCORE - MIN_SCORE) * (passed as f64 / total as f64)
}
