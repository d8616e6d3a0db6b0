use crate::error::{EditError, EditFailure};
use crate::types::{Edit, EditKind, Mutation};
use crate::working_set::WorkingSet;
use regex::Regex;
use std::collections::BTreeSet;

/// Files touched by a fully applied mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedEdits {
    pub files: BTreeSet<String>,
    pub edits_applied: usize,
}

/// Applies a mutation's edits to the working set in declared order.
///
/// The first failing edit stops the mutation. Earlier edits stay on disk;
/// the caller restores from its snapshot.
#[derive(Clone, Debug, Default)]
pub struct EditApplier;

impl EditApplier {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, working: &WorkingSet, mutation: &Mutation) -> Result<AppliedEdits, EditFailure> {
        let mut applied = AppliedEdits::default();
        for (edit_index, edit) in mutation.edits.iter().enumerate() {
            self.apply_edit(working, edit)
                .map_err(|error| EditFailure { edit_index, error })?;
            tracing::debug!(
                mutation = %mutation.name,
                edit = edit_index,
                file = %edit.target_file,
                "edit applied"
            );
            applied.files.insert(edit.target_file.clone());
            applied.edits_applied += 1;
        }
        Ok(applied)
    }

    /// Apply one edit, writing the file only on success.
    pub fn apply_edit(&self, working: &WorkingSet, edit: &Edit) -> Result<(), EditError> {
        let original = working.read(&edit.target_file)?;
        let updated = transform(&edit.target_file, &original, &edit.kind)?;
        working.write(&edit.target_file, &updated)
    }
}

/// Pure text transformation for one edit.
pub fn transform(file: &str, text: &str, kind: &EditKind) -> Result<String, EditError> {
    match kind {
        EditKind::InsertAtLine { line, content } => insert_at_line(file, text, *line, content),
        EditKind::ReplacePattern {
            pattern,
            replacement,
            all,
        } => {
            let regex = Regex::new(pattern).map_err(|e| EditError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            if !regex.is_match(text) {
                return Err(EditError::PatternNotFound {
                    file: file.to_string(),
                    pattern: pattern.clone(),
                });
            }
            let replaced = if *all {
                regex.replace_all(text, replacement.as_str())
            } else {
                regex.replace(text, replacement.as_str())
            };
            Ok(replaced.into_owned())
        }
        EditKind::AppendToEnd { content } => {
            let mut out = text.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn insert_at_line(file: &str, text: &str, line: usize, content: &str) -> Result<String, EditError> {
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    if line > lines.len() {
        return Err(EditError::OutOfRange {
            file: file.to_string(),
            line,
            len: lines.len(),
        });
    }
    if line == lines.len() {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
    }
    let mut inserted = content.to_string();
    if !inserted.ends_with('\n') {
        inserted.push('\n');
    }
    lines.insert(line, inserted);
    Ok(lines.concat())
}
