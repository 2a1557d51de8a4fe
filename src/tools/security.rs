use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// A path tried to escape the working directory.
///
/// The message carries the path exactly as the caller supplied it; the
/// resolved host path is never echoed back.
#[derive(Debug, Error)]
#[error("Access denied: '{path}' is outside the working directory")]
pub struct PathSecurityError {
    path: String,
}

impl PathSecurityError {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

/// The directory file tools are confined to.
///
/// The root is canonicalized once at construction; every candidate path is
/// resolved against it and must stay inside.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let root = dir.as_ref().canonicalize().with_context(|| {
            format!(
                "Failed to resolve working directory: {}",
                dir.as_ref().display()
            )
        })?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` and check that it stays inside the root.
    ///
    /// Relative paths are joined onto the root; absolute paths are not
    /// rejected outright but resolved and checked like any other. The
    /// containment check runs on the fully resolved path, so `..` segments,
    /// symlinks, and mixed separators cannot smuggle a path outside.
    pub fn validate(&self, path: &str) -> Result<PathBuf, PathSecurityError> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = resolve(&joined);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(PathSecurityError::new(path))
        }
    }
}

/// Resolve a path to an absolute canonical form.
///
/// Existing paths are canonicalized directly (symlinks followed). For a
/// path whose tail does not exist yet, `.`/`..` segments are collapsed
/// lexically, the deepest existing ancestor is canonicalized, and the
/// remainder re-appended, so a missing file still resolves to a checkable
/// location under its real parent.
fn resolve(joined: &Path) -> PathBuf {
    if let Ok(canonical) = joined.canonicalize() {
        return canonical;
    }

    let cleaned = normalize(joined);
    let mut base = cleaned.clone();
    let mut tail: Vec<OsString> = Vec::new();
    while !base.as_os_str().is_empty() {
        if let Ok(canonical) = base.canonicalize() {
            return tail.iter().rev().fold(canonical, |acc, seg| acc.join(seg));
        }
        match base.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                base.pop();
            }
            None => break,
        }
    }
    cleaned
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
