use crate::error::GenerationError;
use crate::types::TestCase;
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// Produces a candidate document from a template set and a test case.
///
/// Implementations may be slow or fail; callers bound each call with a
/// timeout and treat a timeout like any other [`GenerationError`].
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, template_dir: &Path, case: &TestCase) -> Result<String, GenerationError>;
}

/// Deterministic stand-in: concatenates every template file (sorted by
/// relative path) and substitutes `{{field}}` placeholders from the test case.
///
/// `{{id}}` and `{{description}}` resolve to the case's own id and
/// description unless a field of the same name overrides them.
#[derive(Clone, Debug, Default)]
pub struct TemplateRenderGenerator {
    latency: Option<Duration>,
}

impl TemplateRenderGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before rendering. Used to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// Render a template directory for one test case.
pub fn render_templates(template_dir: &Path, case: &TestCase) -> Result<String, GenerationError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(template_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| GenerationError::Templates(e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        return Err(GenerationError::Templates(format!(
            "no template files under {}",
            template_dir.display()
        )));
    }

    let placeholder =
        Regex::new(PLACEHOLDER).map_err(|e| GenerationError::Templates(e.to_string()))?;
    let mut document = String::new();
    for path in files {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| GenerationError::Templates(format!("{}: {}", path.display(), e)))?;
        document.push_str(&substitute(&text, case, &placeholder));
        if !document.ends_with('\n') {
            document.push('\n');
        }
    }
    Ok(document)
}

const PLACEHOLDER: &str = r"\{\{([^{}]+)\}\}";

fn lookup<'a>(case: &'a TestCase, key: &str) -> Option<&'a str> {
    case.field(key).or(match key {
        "id" => Some(case.id.as_str()),
        "description" => Some(case.description.as_str()),
        _ => None,
    })
}

/// Single pass: substituted values are never scanned for placeholders again.
fn substitute(text: &str, case: &TestCase, placeholder: &Regex) -> String {
    placeholder
        .replace_all(text, |caps: &Captures| match lookup(case, &caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[async_trait]
impl DocumentGenerator for TemplateRenderGenerator {
    async fn generate(&self, template_dir: &Path, case: &TestCase) -> Result<String, GenerationError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let dir = template_dir.to_path_buf();
        let case = case.clone();
        let case_id = case.id.clone();
        tokio::task::spawn_blocking(move || render_templates(&dir, &case))
            .await
            .map_err(|e| GenerationError::failed(case_id, e.to_string()))?
    }
}

/// Generator that always fails. For error-path tests.
pub struct FailingGenerator;

#[async_trait]
impl DocumentGenerator for FailingGenerator {
    async fn generate(&self, _template_dir: &Path, case: &TestCase) -> Result<String, GenerationError> {
        Err(GenerationError::failed(&case.id, "simulated generator failure"))
    }
}

/// Wraps another generator and fails for a fixed set of case ids.
pub struct FlakyGenerator {
    inner: Arc<dyn DocumentGenerator>,
    failing: HashSet<String>,
}

impl FlakyGenerator {
    pub fn new(inner: Arc<dyn DocumentGenerator>, failing: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            inner,
            failing: failing.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DocumentGenerator for FlakyGenerator {
    async fn generate(&self, template_dir: &Path, case: &TestCase) -> Result<String, GenerationError> {
        if self.failing.contains(&case.id) {
            return Err(GenerationError::failed(&case.id, "simulated flaky failure"));
        }
        self.inner.generate(template_dir, case).await
    }
}
