// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-artifacts
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Filesystem operations that preserve two invariants: no partially written
//! file is ever observable at its target name (I1), and no write escapes its
//! base directory via path traversal (I2).
//!
//! Grounded on the two-phase write-then-rename idiom and orphan-sweep pattern
//! used by job-artifact commit protocols elsewhere in the corpus, generalized
//! from a single-phase commit marker to the store's batch contract.

use rand::Rng;
use solver_error::{ErrorCode, SolverError};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Errors raised by [`ArtifactStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The relative path failed the path-safety predicate.
    #[error("unsafe path: {0}")]
    UnsafePath(String),
    /// Resolving the path against the base escaped it.
    #[error("path escapes base: {0}")]
    PathEscape(String),
    /// An underlying filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<ArtifactError> for SolverError {
    fn from(e: ArtifactError) -> Self {
        match &e {
            ArtifactError::UnsafePath(p) => {
                SolverError::new(ErrorCode::UnsafePath, e.to_string()).with_path(p.clone())
            }
            ArtifactError::PathEscape(p) => {
                SolverError::new(ErrorCode::PathEscape, e.to_string()).with_path(p.clone())
            }
            ArtifactError::Io(_) => SolverError::new(ErrorCode::IoFailure, e.to_string()),
        }
    }
}

/// A relative path accepted by the store, along with its bytes to write.
#[derive(Debug, Clone)]
pub struct PendingArtifact {
    /// Path relative to the store's base directory.
    pub path: String,
    /// Full file contents.
    pub bytes: Vec<u8>,
}

/// `{path, size}` — the result of committing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    /// Relative path, unchanged from the request.
    pub path: String,
    /// Size of the written file, in bytes.
    pub size: u64,
}

/// Returns `true` iff `path` is non-empty, relative, contains no `..`
/// segment, and contains no NUL byte.
///
/// This is the same predicate the evidence validator applies to
/// manifest-declared paths — both callers must agree on what "safe" means.
#[must_use]
pub fn is_path_safe(path: &str) -> bool {
    if path.is_empty() || path.contains('\0') {
        return false;
    }
    let p = Path::new(path);
    if p.is_absolute() {
        return false;
    }
    !p.components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
}

/// Join `rel` onto `base`, rejecting any resolution that would escape `base`.
///
/// # Errors
///
/// Returns [`ArtifactError::UnsafePath`] if `rel` fails [`is_path_safe`], or
/// [`ArtifactError::PathEscape`] if the joined path's lexical components do
/// not remain a descendant of `base` (defense in depth beyond the predicate
/// above, since symlinks are not resolved here).
pub fn safe_join(base: &Path, rel: &str) -> Result<PathBuf, ArtifactError> {
    if !is_path_safe(rel) {
        return Err(ArtifactError::UnsafePath(rel.to_string()));
    }
    let joined = base.join(rel);
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => return Err(ArtifactError::PathEscape(rel.to_string())),
            other => normalized.push(other),
        }
    }
    if !normalized.starts_with(base) {
        return Err(ArtifactError::PathEscape(rel.to_string()));
    }
    Ok(normalized)
}

/// Path-safe, atomic artifact writer rooted at a single base directory
/// (typically a run's `artifacts/` directory).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    /// Bind a store to `base`. Does not create the directory.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory this store writes beneath.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Recursively create `path` (relative to the base) if absent.
    pub fn ensure_dir(&self, path: &str) -> Result<(), ArtifactError> {
        let target = safe_join(&self.base, path)?;
        fs::create_dir_all(target)?;
        Ok(())
    }

    /// Write `bytes` to `path` via write-to-temp-then-rename.
    ///
    /// The temp file is created alongside the target (same directory) so the
    /// final rename stays within one filesystem and is POSIX-atomic. On any
    /// failure the temp file is unlinked.
    pub fn write_artifact(&self, path: &str, bytes: &[u8]) -> Result<WrittenArtifact, ArtifactError> {
        let target = safe_join(&self.base, path)?;
        let parent = target
            .parent()
            .expect("safe_join always yields a path with a parent under base");
        fs::create_dir_all(parent)?;

        let temp = parent.join(format!(".tmp-{}", random_suffix()));
        let result = write_and_rename(&temp, &target, bytes);
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result?;

        Ok(WrittenArtifact {
            path: path.to_string(),
            size: bytes.len() as u64,
        })
    }

    /// Write every entry in `entries`, all-or-nothing at the temp-file phase.
    ///
    /// Phase 1 writes every entry to its own temp file; if any phase-1 write
    /// fails, every temp file already created is unlinked and the call fails
    /// without having touched a single final path. Phase 2 renames every temp
    /// file onto its target. Each rename is individually atomic; a crash
    /// between renames can leave a partial batch committed (documented in the
    /// design notes as an accepted risk — callers needing single-directory
    /// atomicity should write into a per-run staging directory and rename
    /// that directory as a whole instead).
    pub fn write_artifacts_batch(
        &self,
        entries: &[PendingArtifact],
    ) -> Result<Vec<WrittenArtifact>, ArtifactError> {
        let mut staged: Vec<(PathBuf, PathBuf, &PendingArtifact)> = Vec::with_capacity(entries.len());

        for entry in entries {
            let target = match safe_join(&self.base, &entry.path) {
                Ok(t) => t,
                Err(e) => {
                    unlink_all(&staged);
                    return Err(e);
                }
            };
            let parent = target
                .parent()
                .expect("safe_join always yields a path with a parent under base");
            if let Err(e) = fs::create_dir_all(parent) {
                unlink_all(&staged);
                return Err(e.into());
            }
            let temp = parent.join(format!(".tmp-{}", random_suffix()));
            if let Err(e) = fs::write(&temp, &entry.bytes) {
                unlink_all(&staged);
                return Err(e.into());
            }
            staged.push((temp, target, entry));
        }

        for (temp, target, _) in &staged {
            if let Err(e) = fs::rename(temp, target) {
                // Remaining un-renamed temp files are cleaned up; already-renamed
                // files are left in place per the documented partial-batch risk.
                for (t, _, _) in &staged {
                    if t.exists() {
                        let _ = fs::remove_file(t);
                    }
                }
                return Err(e.into());
            }
        }

        Ok(staged
            .into_iter()
            .map(|(_, _, entry)| WrittenArtifact {
                path: entry.path.clone(),
                size: entry.bytes.len() as u64,
            })
            .collect())
    }

    /// List every regular file beneath `root` (relative to the base),
    /// sorted ascending, skipping any `.tmp-*` temp files.
    pub fn list_files_recursive(&self, root: &str) -> Result<Vec<String>, ArtifactError> {
        let target = safe_join(&self.base, root)?;
        if !target.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&target).into_iter() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if file_name.starts_with(".tmp-") {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.base)
                .expect("walked entries are always under base")
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            paths.push(rel);
        }
        paths.sort();
        Ok(paths)
    }

    /// The on-disk size of `path`, in bytes.
    pub fn size_of(&self, path: &str) -> Result<u64, ArtifactError> {
        let target = safe_join(&self.base, path)?;
        Ok(fs::metadata(target)?.len())
    }

    /// Sweep orphan `.tmp-*` files older than `max_age` anywhere beneath the
    /// base directory. Intended to run once at process startup.
    ///
    /// Returns the number of files removed. Errors removing an individual
    /// orphan are logged and skipped rather than aborting the sweep.
    pub fn reap_orphans(&self, max_age: Duration) -> usize {
        if !self.base.exists() {
            return 0;
        }
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in walkdir::WalkDir::new(&self.base).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.starts_with(".tmp-") {
                continue;
            }
            let age = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|m| now.duration_since(m).ok());
            if age.is_some_and(|a| a >= max_age) {
                if let Err(e) = fs::remove_file(entry.path()) {
                    tracing::warn!(path = %entry.path().display(), error = %e, "failed to reap orphan temp file");
                } else {
                    removed += 1;
                }
            }
        }
        removed
    }
}

fn unlink_all(staged: &[(PathBuf, PathBuf, &PendingArtifact)]) {
    for (temp, _, _) in staged {
        let _ = fs::remove_file(temp);
    }
}

fn write_and_rename(temp: &Path, target: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    {
        let mut file = fs::File::create(temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(temp, target)?;
    Ok(())
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute the SHA-256 of a file by streaming fixed-size chunks, never
/// loading the whole file into memory.
pub fn streaming_sha256(path: &Path) -> io::Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_lower(&hasher.finalize()))
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
