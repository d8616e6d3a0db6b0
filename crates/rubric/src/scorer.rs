use crate::error::RubricError;
use crate::types::{criterion_score, CheckOutcome, Criterion, ScoreResult, MAX_SCORE, MIN_SCORE};
use std::collections::{BTreeMap, HashSet};

/// Validated rubric. Construction rejects malformed criteria so that
/// [`RubricScorer::score`] is total.
#[derive(Clone, Debug)]
pub struct RubricScorer {
    criteria: Vec<Criterion>,
    total_weight: f64,
}

impl RubricScorer {
    pub fn new(criteria: Vec<Criterion>) -> Result<Self, RubricError> {
        if criteria.is_empty() {
            return Err(RubricError::NoCriteria);
        }

        let mut names = HashSet::new();
        for criterion in &criteria {
            if !names.insert(criterion.name.as_str()) {
                return Err(RubricError::DuplicateCriterion(criterion.name.clone()));
            }
            if !criterion.weight.is_finite() || criterion.weight <= 0.0 {
                return Err(RubricError::InvalidWeight {
                    criterion: criterion.name.clone(),
                    weight: criterion.weight,
                });
            }
            if criterion.checks.is_empty() {
                return Err(RubricError::EmptyCriterion(criterion.name.clone()));
            }
            let mut check_names = HashSet::new();
            for check in &criterion.checks {
                if !check_names.insert(check.name.as_str()) {
                    return Err(RubricError::DuplicateCheck {
                        criterion: criterion.name.clone(),
                        check: check.name.clone(),
                    });
                }
            }
        }

        let total_weight = criteria.iter().map(|c| c.weight).sum();
        Ok(Self {
            criteria,
            total_weight,
        })
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn criterion_names(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.name.as_str())
    }

    pub fn has_criterion(&self, name: &str) -> bool {
        self.criteria.iter().any(|c| c.name == name)
    }

    /// Score a document against every criterion.
    pub fn score(&self, text: &str) -> ScoreResult {
        let mut per_criterion = BTreeMap::new();
        let mut detail = BTreeMap::new();
        let mut weighted_sum = 0.0;

        for criterion in &self.criteria {
            let outcomes: Vec<CheckOutcome> = criterion
                .checks
                .iter()
                .map(|check| CheckOutcome {
                    check: check.name.clone(),
                    passed: check.evaluate(text),
                })
                .collect();
            let passed = outcomes.iter().filter(|o| o.passed).count();
            let score = criterion_score(passed, outcomes.len());

            weighted_sum += criterion.weight * score;
            per_criterion.insert(criterion.name.clone(), score);
            detail.insert(criterion.name.clone(), outcomes);
        }

        // Guard against the last ulp of float drift pushing past the scale.
        let overall = (weighted_sum / self.total_weight).clamp(MIN_SCORE, MAX_SCORE);

        ScoreResult {
            per_criterion,
            overall,
            detail,
        }
    }
}
