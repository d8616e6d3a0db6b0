//! Built-in rubrics for the document types templates are usually tuned for.
//!
//! Both rubrics share the same four dimensions (clarity, measurability,
//! structure, scope) with different checks and weights. Callers needing a
//! different schema load a [`RubricDefinition`](crate::RubricDefinition).

use crate::error::RubricError;
use crate::scorer::RubricScorer;
use crate::types::{compile_pattern, Check, Criterion};

const VAGUE_TERMS: &[(&str, &str)] = &[
    ("no-vague-improve", r"\bimprove\b"),
    ("no-vague-enhance", r"\benhance\b"),
    ("no-vague-optimize", r"\boptimi[sz]e\b"),
    ("no-vague-better", r"\bbetter\b"),
    ("no-buzzword-leverage", r"\bleverage\b"),
    ("no-buzzword-synergy", r"\bsynerg(y|ies)\b"),
];

fn clarity(weight: f64) -> Result<Criterion, RubricError> {
    let checks = VAGUE_TERMS
        .iter()
        .map(|(name, pattern)| Check::absent(*name, pattern))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Criterion::new("clarity", weight).with_checks(checks))
}

fn measurability(weight: f64) -> Result<Criterion, RubricError> {
    Ok(Criterion::new("measurability", weight).with_checks(vec![
        Check::pattern("has-number", r"\d")?,
        Check::pattern("has-percentage", r"\d+(\.\d+)?\s?%")?,
        Check::pattern("has-baseline-to-target", r"from\s+\S+\s+to\s+\S+")?,
        Check::predicate("three-quantities", |text| {
            text.split(|c: char| !c.is_ascii_digit())
                .filter(|s| !s.is_empty())
                .take(3)
                .count()
                >= 3
        }),
    ]))
}

/// Rubric for a one-page proposal summary.
pub fn one_pager() -> Result<RubricScorer, RubricError> {
    let structure = Criterion::new("structure", 1.0).with_checks(vec![
        Check::pattern("problem-section", r"^#+\s*problem")?,
        Check::pattern("solution-section", r"^#+\s*(proposed\s+)?solution")?,
        Check::pattern("impact-section", r"^#+\s*(goals|impact|success)")?,
        Check::predicate("fits-one-page", |text| text.split_whitespace().count() <= 600),
    ]);
    let scope = Criterion::new("scope", 1.0).with_checks(vec![
        Check::pattern("names-audience", r"\b(users?|customers?|stakeholders?)\b")?,
        Check::pattern("states-non-goals", r"non-goals?|out of scope")?,
        Check::pattern("names-risks", r"\brisks?\b")?,
    ]);

    RubricScorer::new(vec![clarity(1.5)?, measurability(1.5)?, structure, scope])
}

/// Rubric for a full product requirements document.
pub fn requirements_document() -> Result<RubricScorer, RubricError> {
    const SECTIONS: &[(&str, &str)] = &[
        ("overview-section", r"^#+\s*(overview|summary)"),
        ("problem-section", r"^#+\s*problem"),
        ("requirements-section", r"^#+\s*(functional\s+)?requirements"),
        ("metrics-section", r"^#+\s*(success\s+)?metrics"),
        ("timeline-section", r"^#+\s*(timeline|milestones)"),
    ];
    const PILLARS: &[&str] = &[
        r"\bsecurity\b",
        r"\bperformance\b",
        r"\b(usability|accessibility)\b",
        r"\b(cost|budget)\b",
    ];

    let structure = Criterion::new("structure", 1.0).with_checks(
        SECTIONS
            .iter()
            .map(|(name, pattern)| Check::pattern(*name, pattern))
            .collect::<Result<Vec<_>, _>>()?,
    );

    let pillars = PILLARS
        .iter()
        .map(|p| compile_pattern("covers-pillars", p, true))
        .collect::<Result<Vec<_>, _>>()?;
    let scope = Criterion::new("scope", 1.0).with_checks(vec![
        Check::predicate("covers-pillars", move |text| {
            pillars.iter().filter(|r| r.is_match(text)).count() >= 3
        }),
        Check::pattern("user-stories", r"\bas an?\b.+\bi want\b")?,
        Check::pattern("acceptance-criteria", r"acceptance criteria")?,
        Check::absent("no-tbd", r"\bTBD\b")?,
    ]);

    RubricScorer::new(vec![clarity(1.0)?, measurability(2.0)?, structure, scope])
}
