use crate::error::EditError;
use crate::types::{validate_relative, ContentHash};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The mutable copy of the template directory.
///
/// The pristine baseline directory is only ever read, to seed a fresh
/// working set at the start of a run.
#[derive(Clone, Debug)]
pub struct WorkingSet {
    root: PathBuf,
}

impl WorkingSet {
    /// Wrap an existing working directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("working set {} does not exist", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Replace `working` with a verbatim copy of `baseline`.
    ///
    /// The two directories must not nest in either direction: clearing the
    /// working directory would otherwise delete or copy into the baseline.
    pub fn initialize_from(baseline: &Path, working: impl Into<PathBuf>) -> io::Result<Self> {
        let root = working.into();
        if !baseline.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("baseline {} does not exist", baseline.display()),
            ));
        }
        if baseline.starts_with(&root) || root.starts_with(baseline) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "working set {} overlaps baseline {}",
                    root.display(),
                    baseline.display()
                ),
            ));
        }
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        copy_tree(baseline, &root)?;
        tracing::debug!(
            baseline = %baseline.display(),
            working = %root.display(),
            "working set initialized"
        );
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative target inside the working set.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, EditError> {
        validate_relative(target).map_err(EditError::InvalidTarget)?;
        Ok(self.root.join(target))
    }

    pub fn read(&self, target: &str) -> Result<String, EditError> {
        let path = self.resolve(target)?;
        if !path.is_file() {
            return Err(EditError::FileNotFound(target.to_string()));
        }
        std::fs::read_to_string(&path).map_err(|e| EditError::Io {
            file: target.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn write(&self, target: &str, contents: &str) -> Result<(), EditError> {
        let path = self.resolve(target)?;
        std::fs::write(&path, contents).map_err(|e| EditError::Io {
            file: target.to_string(),
            reason: e.to_string(),
        })
    }

    /// Relative paths of every file, sorted, `/`-separated.
    pub fn files(&self) -> io::Result<Vec<String>> {
        list_files(&self.root)
    }

    /// Digest over every relative path and its bytes.
    pub fn fingerprint(&self) -> io::Result<ContentHash> {
        fingerprint_tree(&self.root)
    }
}

pub(crate) fn list_files(root: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(relative_name(root, entry.path())?);
        }
    }
    Ok(files)
}

fn relative_name(root: &Path, path: &Path) -> io::Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

pub(crate) fn fingerprint_tree(root: &Path) -> io::Result<ContentHash> {
    let mut hasher = blake3::Hasher::new();
    for name in list_files(root)? {
        let bytes = std::fs::read(root.join(&name))?;
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(ContentHash::from_hasher(&hasher))
}

/// Recursive byte-for-byte copy. `dst` must not exist.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
