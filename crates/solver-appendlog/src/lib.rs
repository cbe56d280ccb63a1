// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-appendlog
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! An append-only JSONL file with at-least-once-durable semantics under
//! concurrent writers, within a process and across processes.
//!
//! The durable path pays for a read-rewrite-rename on every append so the
//! observable file is never corrupt, even if the kernel crashes mid-write.
//! [`AppendLog::append_fast`] bypasses both the lock and the rewrite for
//! throughput-sensitive, single-writer callers; it is documented as unsafe
//! under concurrent writers rather than enforced at the type level.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Errors raised by [`AppendLog`] operations.
#[derive(Debug, thiserror::Error)]
pub enum AppendLogError {
    /// The exclusive lock could not be acquired within the retry budget.
    #[error("failed to acquire append lock on {0} after {1} attempts")]
    LockTimeout(PathBuf, u32),
    /// An underlying filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bounded exponential backoff parameters for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of acquisition attempts before failing with [`AppendLogError::LockTimeout`].
    pub max_attempts: u32,
    /// Base delay between attempts; doubled after each failed attempt, capped at `max_delay`.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

/// An append-only log bound to a single target file.
pub struct AppendLog {
    path: PathBuf,
    retry: RetryPolicy,
}

impl AppendLog {
    /// Bind a log to `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the default retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Append one JSON-object line (must not contain an embedded newline),
    /// durably: (1) ensure the parent directory; (2) acquire a cross-process
    /// exclusive lock, with bounded retry; (3) read-concatenate-rewrite-rename
    /// if the file exists, otherwise write the line directly; (4) release
    /// the lock (dropped with the file handle).
    pub fn append(&self, line: &str) -> Result<(), AppendLogError> {
        debug_assert!(!line.contains('\n'), "appended line must not embed a newline");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock_file = self.acquire_lock()?;

        let result = self.write_locked(line);

        FileExt::unlock(&lock_file).ok();
        drop(lock_file);

        result
    }

    /// Append a line with a direct `O_APPEND` write: no lock, no rewrite.
    ///
    /// This is durable against a crash mid-write landing at a line boundary
    /// on POSIX filesystems for writes under `PIPE_BUF`, but it is **not**
    /// safe under concurrent writers — two processes racing this call can
    /// interleave partial lines. Use only from a single, already-serialized
    /// writer (e.g. behind an in-process queue).
    pub fn append_fast(&self, line: &str) -> Result<(), AppendLogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    fn acquire_lock(&self) -> Result<File, AppendLogError> {
        let lock_path = self.path.with_extension(lock_extension(&self.path));
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let mut delay = self.retry.base_delay;
        for attempt in 1..=self.retry.max_attempts {
            match FileExt::try_lock_exclusive(&lock_file) {
                Ok(()) => return Ok(lock_file),
                Err(_) if attempt == self.retry.max_attempts => break,
                Err(_) => {
                    thread::sleep(delay);
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }
        Err(AppendLogError::LockTimeout(self.path.clone(), self.retry.max_attempts))
    }

    fn write_locked(&self, line: &str) -> Result<(), AppendLogError> {
        if self.path.exists() {
            let mut existing = Vec::new();
            File::open(&self.path)?.read_to_end(&mut existing)?;

            let mut combined = existing;
            combined.extend_from_slice(line.as_bytes());
            combined.push(b'\n');

            let temp = self.path.with_extension(format!("{}.rewrite-tmp", random_suffix()));
            {
                let mut temp_file = File::create(&temp)?;
                temp_file.write_all(&combined)?;
                temp_file.sync_all()?;
            }
            std::fs::rename(&temp, &self.path)?;
        } else {
            let mut file = File::create(&self.path)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Read every line currently in the log, in file order.
    pub fn read_all(&self) -> Result<Vec<String>, AppendLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(contents.lines().map(str::to_string).collect())
    }

    /// The path this log appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.lock"),
        None => "lock".to_string(),
    }
}

fn random_suffix() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
