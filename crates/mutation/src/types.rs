use crate::error::MutationListError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

/// BLAKE3 digest of a template tree or snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn from_hasher(hasher: &blake3::Hasher) -> Self {
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ContentHash::from_hex(&hex).ok_or_else(|| serde::de::Error::custom("invalid content hash"))
    }
}

/// What an edit does to its target file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditKind {
    /// Insert `content` as a new line before zero-based `line`.
    /// `line == line_count` appends after the last line.
    InsertAtLine { line: usize, content: String },
    /// Replace matches of the regular expression `pattern`. First match only
    /// unless `all` is set. `$1`-style capture references are expanded.
    ReplacePattern {
        pattern: String,
        replacement: String,
        #[serde(default)]
        all: bool,
    },
    /// Append `content` to the end of the file, on a new line.
    AppendToEnd { content: String },
}

/// One edit against one template file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// Path relative to the working set root.
    pub target_file: String,
    #[serde(flatten)]
    pub kind: EditKind,
}

impl Edit {
    pub fn insert_at_line(target: impl Into<String>, line: usize, content: impl Into<String>) -> Self {
        Self {
            target_file: target.into(),
            kind: EditKind::InsertAtLine {
                line,
                content: content.into(),
            },
        }
    }

    pub fn replace_pattern(
        target: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            target_file: target.into(),
            kind: EditKind::ReplacePattern {
                pattern: pattern.into(),
                replacement: replacement.into(),
                all: false,
            },
        }
    }

    pub fn replace_all(
        target: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            target_file: target.into(),
            kind: EditKind::ReplacePattern {
                pattern: pattern.into(),
                replacement: replacement.into(),
                all: true,
            },
        }
    }

    pub fn append_to_end(target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target_file: target.into(),
            kind: EditKind::AppendToEnd {
                content: content.into(),
            },
        }
    }
}

/// Reject absolute paths and any `..` component.
pub(crate) fn validate_relative(target: &str) -> Result<(), String> {
    let path = Path::new(target);
    if target.is_empty() {
        return Err("empty path".into());
    }
    if path.is_absolute() {
        return Err(format!("'{}' is absolute", target));
    }
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!("'{}' escapes the working set", target));
    }
    Ok(())
}

/// One externally authored candidate change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub name: String,
    /// Rubric criterion this change is meant to move.
    pub target_criterion: String,
    #[serde(default)]
    pub description: String,
    pub edits: Vec<Edit>,
}

impl Mutation {
    pub fn new(name: impl Into<String>, target_criterion: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_criterion: target_criterion.into(),
            description: String::new(),
            edits: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }
}

/// Ordered candidate list. Order is the processing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MutationList {
    mutations: Vec<Mutation>,
}

#[derive(Deserialize)]
struct RawMutationList {
    mutations: Vec<Mutation>,
}

impl MutationList {
    pub fn new(mutations: Vec<Mutation>) -> Result<Self, MutationListError> {
        let mut names = HashSet::new();
        for (i, m) in mutations.iter().enumerate() {
            if m.name.trim().is_empty() {
                return Err(MutationListError::EmptyName(i));
            }
            if !names.insert(m.name.as_str()) {
                return Err(MutationListError::DuplicateName(m.name.clone()));
            }
            if m.edits.is_empty() {
                return Err(MutationListError::NoEdits(m.name.clone()));
            }
            for edit in &m.edits {
                validate_relative(&edit.target_file).map_err(|reason| {
                    MutationListError::InvalidTarget {
                        mutation: m.name.clone(),
                        reason,
                    }
                })?;
            }
        }
        Ok(Self { mutations })
    }

    pub fn from_json_str(s: &str) -> Result<Self, MutationListError> {
        let raw: RawMutationList =
            serde_json::from_str(s).map_err(|e| MutationListError::Parse(e.to_string()))?;
        Self::new(raw.mutations)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, MutationListError> {
        let raw: RawMutationList =
            serde_yaml::from_str(s).map_err(|e| MutationListError::Parse(e.to_string()))?;
        Self::new(raw.mutations)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self, MutationListError> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }
}
