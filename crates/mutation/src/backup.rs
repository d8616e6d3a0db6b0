use crate::error::BackupError;
use crate::types::ContentHash;
use crate::working_set::{copy_tree, fingerprint_tree, list_files, WorkingSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a stored snapshot of the working set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackupHandle {
    pub round: u64,
    pub path: PathBuf,
    pub fingerprint: ContentHash,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Round-numbered snapshots of the working set.
///
/// Snapshots live under `root/round-NNNN/` with a `round-NNNN.json` manifest
/// beside them, and are kept for the life of the run.
pub struct BackupManager {
    root: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    Ok(())
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BackupError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_dir(&self, round: u64) -> PathBuf {
        self.root.join(format!("round-{:04}", round))
    }

    fn manifest_path(&self, round: u64) -> PathBuf {
        self.root.join(format!("round-{:04}.json", round))
    }

    /// Copy the working set into the snapshot for `round`.
    ///
    /// The copy is staged in a `.partial` directory and renamed into place,
    /// so a snapshot directory is never half-written. An existing snapshot for
    /// the same round is replaced.
    pub fn snapshot(&self, working: &WorkingSet, round: u64) -> Result<BackupHandle, BackupError> {
        let dir = self.snapshot_dir(round);
        let partial = with_suffix(&dir, ".partial");
        remove_if_exists(&partial)?;
        copy_tree(working.root(), &partial)?;

        let fingerprint = fingerprint_tree(&partial)?;
        let file_count = list_files(&partial)?.len();

        remove_if_exists(&dir)?;
        std::fs::rename(&partial, &dir)?;

        let handle = BackupHandle {
            round,
            path: dir,
            fingerprint,
            file_count,
            created_at: Utc::now(),
        };
        let manifest =
            serde_json::to_vec_pretty(&handle).map_err(|e| BackupError::Manifest(e.to_string()))?;
        std::fs::write(self.manifest_path(round), manifest)?;

        tracing::debug!(round, fingerprint = %handle.fingerprint, files = file_count, "snapshot taken");
        Ok(handle)
    }

    /// Overwrite the working set with the snapshot, byte for byte.
    ///
    /// The snapshot is copied to a staging directory beside the working set,
    /// verified against its fingerprint, then swapped in by rename. Safe to
    /// call repeatedly and when nothing changed.
    pub fn restore(&self, handle: &BackupHandle, working: &WorkingSet) -> Result<(), BackupError> {
        if !handle.path.is_dir() {
            return Err(BackupError::SnapshotNotFound(handle.round));
        }

        let target = working.root();
        let staging = with_suffix(target, ".restore");
        let retired = with_suffix(target, ".retired");
        remove_if_exists(&staging)?;
        remove_if_exists(&retired)?;

        copy_tree(&handle.path, &staging)?;
        let found = fingerprint_tree(&staging)?;
        if found != handle.fingerprint {
            remove_if_exists(&staging)?;
            return Err(BackupError::Corrupt {
                round: handle.round,
                expected: handle.fingerprint.to_hex(),
                found: found.to_hex(),
            });
        }

        if target.exists() {
            std::fs::rename(target, &retired)?;
        }
        std::fs::rename(&staging, target)?;
        remove_if_exists(&retired)?;

        tracing::debug!(round = handle.round, fingerprint = %found, "working set restored");
        Ok(())
    }

    /// Look up the snapshot taken for `round`.
    pub fn get(&self, round: u64) -> Result<BackupHandle, BackupError> {
        let manifest = self.manifest_path(round);
        if !manifest.is_file() || !self.snapshot_dir(round).is_dir() {
            return Err(BackupError::SnapshotNotFound(round));
        }
        let bytes = std::fs::read(&manifest)?;
        serde_json::from_slice(&bytes).map_err(|e| BackupError::Manifest(e.to_string()))
    }

    /// Every stored snapshot, ordered by round.
    pub fn list(&self) -> Result<Vec<BackupHandle>, BackupError> {
        let mut handles = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let round = name
                .strip_prefix("round-")
                .and_then(|s| s.strip_suffix(".json"))
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(round) = round {
                handles.push(self.get(round)?);
            }
        }
        handles.sort_by_key(|h| h.round);
        Ok(handles)
    }

    pub fn latest(&self) -> Result<Option<BackupHandle>, BackupError> {
        Ok(self.list()?.pop())
    }

    /// Remove every snapshot, manifest and leftover staging directory.
    /// Returns the number of snapshots removed.
    pub fn clear(&self) -> Result<usize, BackupError> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("round-") {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                if path.extension().is_none() {
                    removed += 1;
                }
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(removed)
    }
}
