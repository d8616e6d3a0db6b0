use crate::error::RubricError;
use crate::scorer::RubricScorer;
use crate::types::{compile_pattern, Check, CheckKind, Criterion, Predicate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Serializable rubric, as supplied per document type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RubricDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria: Vec<CriterionDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CriterionDefinition {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub checks: Vec<CheckDefinition>,
}

/// A check as written in configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckDefinition {
    Pattern {
        name: String,
        pattern: String,
        #[serde(default = "default_true")]
        expect_present: bool,
        #[serde(default = "default_true")]
        case_insensitive: bool,
    },
    Predicate {
        name: String,
        rule: PredicateRule,
    },
}

/// Named predicate rules for rules a single pattern cannot express.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateRule {
    /// At least `min` of `patterns` occur.
    AtLeast { patterns: Vec<String>, min: usize },
    /// `pattern` occurs at least `min` times.
    CountAtLeast { pattern: String, min: usize },
    /// Whitespace-separated word count within bounds.
    WordCount {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    /// At least `min` markdown headings.
    SectionHeadings { min: usize },
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl PredicateRule {
    /// Compile the rule into a predicate, validating its parameters.
    pub fn compile(&self, check: &str) -> Result<Predicate, RubricError> {
        let invalid = |reason: String| RubricError::InvalidPredicate {
            check: check.to_string(),
            reason,
        };

        match self {
            Self::AtLeast { patterns, min } => {
                if patterns.is_empty() {
                    return Err(invalid("at_least needs at least one pattern".into()));
                }
                if *min == 0 || *min > patterns.len() {
                    return Err(invalid(format!(
                        "min {} must be between 1 and {}",
                        min,
                        patterns.len()
                    )));
                }
                let regexes = patterns
                    .iter()
                    .map(|p| compile_pattern(check, p, true))
                    .collect::<Result<Vec<_>, _>>()?;
                let min = *min;
                Ok(Arc::new(move |text: &str| {
                    regexes.iter().filter(|r| r.is_match(text)).count() >= min
                }))
            }
            Self::CountAtLeast { pattern, min } => {
                if *min == 0 {
                    return Err(invalid("min must be at least 1".into()));
                }
                let regex = compile_pattern(check, pattern, true)?;
                let min = *min;
                Ok(Arc::new(move |text: &str| {
                    regex.find_iter(text).take(min).count() >= min
                }))
            }
            Self::WordCount { min, max } => {
                if min.is_none() && max.is_none() {
                    return Err(invalid("word_count needs min or max".into()));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(invalid(format!("min {} exceeds max {}", lo, hi)));
                    }
                }
                let (min, max) = (*min, *max);
                Ok(Arc::new(move |text: &str| {
                    let words = text.split_whitespace().count();
                    min.map_or(true, |lo| words >= lo) && max.map_or(true, |hi| words <= hi)
                }))
            }
            Self::SectionHeadings { min } => {
                let heading = compile_pattern(check, r"^#{1,6}\s+\S", true)?;
                let min = *min;
                Ok(Arc::new(move |text: &str| {
                    heading.find_iter(text).take(min).count() >= min
                }))
            }
        }
    }
}

impl CheckDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Pattern { name, .. } | Self::Predicate { name, .. } => name,
        }
    }

    pub fn compile(&self) -> Result<Check, RubricError> {
        match self {
            Self::Pattern {
                name,
                pattern,
                expect_present,
                case_insensitive,
            } => Check::compile(name.clone(), pattern, *expect_present, *case_insensitive),
            Self::Predicate { name, rule } => Ok(Check {
                name: name.clone(),
                kind: CheckKind::Predicate(rule.compile(name)?),
            }),
        }
    }
}

impl CriterionDefinition {
    pub fn compile(&self) -> Result<Criterion, RubricError> {
        let checks = self
            .checks
            .iter()
            .map(CheckDefinition::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Criterion::new(self.name.clone(), self.weight).with_checks(checks))
    }
}

impl RubricDefinition {
    pub fn from_json_str(s: &str) -> Result<Self, RubricError> {
        serde_json::from_str(s).map_err(|e| RubricError::Parse(e.to_string()))
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, RubricError> {
        serde_yaml::from_str(s).map_err(|e| RubricError::Parse(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self, RubricError> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    /// Compile and validate into a scorer.
    pub fn build(&self) -> Result<RubricScorer, RubricError> {
        let criteria = self
            .criteria
            .iter()
            .map(CriterionDefinition::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let scorer = RubricScorer::new(criteria)?;
        tracing::debug!(
            rubric = %self.name,
            criteria = scorer.criteria().len(),
            "rubric compiled"
        );
        Ok(scorer)
    }
}
