use crate::error::CorpusError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One representative input scenario. Fields are opaque to the optimizer
/// and consumed only by the document generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl TestCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Versioned, ordered, read-only collection of test cases.
///
/// A `Corpus` can only be obtained through validation, so it always holds at
/// least one case and case ids are unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Corpus {
    version: String,
    cases: Vec<TestCase>,
}

#[derive(Deserialize)]
struct RawCorpus {
    #[serde(default)]
    version: String,
    cases: Vec<TestCase>,
}

impl Corpus {
    pub fn new(version: impl Into<String>, cases: Vec<TestCase>) -> Result<Self, CorpusError> {
        if cases.is_empty() {
            return Err(CorpusError::Empty);
        }
        let mut seen = HashSet::new();
        for case in &cases {
            if case.id.trim().is_empty() {
                return Err(CorpusError::EmptyId);
            }
            if !seen.insert(case.id.as_str()) {
                return Err(CorpusError::DuplicateCase(case.id.clone()));
            }
        }
        Ok(Self {
            version: version.into(),
            cases,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, CorpusError> {
        let raw: RawCorpus = serde_json::from_str(s).map_err(|e| CorpusError::Parse(e.to_string()))?;
        Self::new(raw.version, raw.cases)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, CorpusError> {
        let raw: RawCorpus = serde_yaml::from_str(s).map_err(|e| CorpusError::Parse(e.to_string()))?;
        Self::new(raw.version, raw.cases)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self, CorpusError> {
        let contents = std::fs::read_to_string(path)?;
        let corpus = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            _ => Self::from_json_str(&contents)?,
        };
        tracing::info!(
            path = %path.display(),
            version = %corpus.version,
            cases = corpus.len(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Always false for a validated corpus; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }
}
