#![deny(unsafe_code)]
//! # whetstone-rubric
//!
//! Weighted multi-criterion rubric scoring.
//!
//! A rubric is a list of [`Criterion`]s, each holding a weight and a list of
//! pass/fail [`Check`]s. Scoring a document evaluates every check, maps each
//! criterion onto the 1–5 scale (`1 + 4 * passed / total`) and combines the
//! criteria into a weight-normalized overall score.
//!
//! Scoring is pure: no I/O, no interior state. All validation happens when the
//! [`RubricScorer`] is built.

pub mod definition;
pub mod error;
pub mod presets;
pub mod scorer;
pub mod types;

pub use definition::{CheckDefinition, CriterionDefinition, PredicateRule, RubricDefinition};
pub use error::RubricError;
pub use scorer::RubricScorer;
pub use types::{
    compile_pattern, Check, CheckKind, CheckOutcome, Criterion, Predicate, ScoreResult, MAX_SCORE, MIN_SCORE,
};
