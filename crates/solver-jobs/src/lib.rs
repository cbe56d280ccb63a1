// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-jobs
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Dispatches a [`NormalizedIntent`] + [`RunContext`] to the [`JobRunner`]
//! registered for its job type, and ships the `SAFE_REPORT` reference runner.
//!
//! The registry is a typed name-to-implementation map in the same shape as
//! the runtime's backend registry, narrowed from string-keyed dynamic
//! backends down to the closed [`JobType`] enumeration this workspace uses.

use solver_artifacts::{ArtifactStore, PendingArtifact};
use solver_core::{JobType, NormalizedIntent, RunContext};
use std::collections::BTreeMap;

mod safe_report;
pub use safe_report::SafeReportRunner;

/// Outcome of dispatching one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Whether the runner completed successfully.
    pub status: RunOutcome,
    /// Artifacts committed by the runner, relative to `artifacts/`.
    pub artifacts: Vec<ArtifactInfo>,
    /// Sanitized failure reason, present only when `status == Failed`.
    pub error: Option<String>,
}

/// Terminal outcome of a single job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The runner completed without error.
    Success,
    /// The runner reported a failure; no artifacts were committed.
    Failed,
}

/// `{path, size}` for one artifact produced during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Path relative to the run's `artifacts/` directory.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// A single artifact a runner wants committed, prior to being written.
#[derive(Debug, Clone)]
pub struct RunnerArtifact {
    /// Path relative to the run's `artifacts/` directory.
    pub path: String,
    /// Full file contents.
    pub bytes: Vec<u8>,
}

/// Implemented once per [`JobType`]. Runners never touch the filesystem
/// directly — they return the artifact bytes they want committed, and the
/// [`JobExecutor`] performs the atomic batch write via [`ArtifactStore`].
///
/// # Determinism
///
/// Implementations must not read the wall clock, consume entropy, iterate
/// mappings in non-sorted order, or use locale-dependent numeric formatting.
/// `intent` and `ctx` are the only sources of variation a runner may depend on.
pub trait JobRunner: Send + Sync {
    /// The job type this runner handles.
    fn job_type(&self) -> JobType;

    /// Execute the job, returning the artifacts to commit or a sanitized
    /// failure string (no absolute paths, no stack frames).
    fn run(&self, intent: &NormalizedIntent, ctx: &RunContext) -> Result<Vec<RunnerArtifact>, String>;
}

/// A typed registry of [`JobRunner`] implementations, keyed by [`JobType`].
#[derive(Default)]
pub struct JobRegistry {
    runners: BTreeMap<JobType, Box<dyn JobRunner>>,
}

impl JobRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner, replacing any previous entry for its job type.
    pub fn register(&mut self, runner: impl JobRunner + 'static) {
        self.runners.insert(runner.job_type(), Box::new(runner));
    }

    /// The reference registry: `SAFE_REPORT` only.
    #[must_use]
    pub fn with_reference_runners() -> Self {
        let mut registry = Self::new();
        registry.register(SafeReportRunner);
        registry
    }

    /// Look up the runner registered for `job_type`.
    #[must_use]
    pub fn get(&self, job_type: JobType) -> Option<&dyn JobRunner> {
        self.runners.get(&job_type).map(|b| &**b)
    }
}

/// Dispatches intents to registered runners and commits their artifacts.
pub struct JobExecutor<'a> {
    registry: &'a JobRegistry,
}

impl<'a> JobExecutor<'a> {
    /// Bind an executor to a registry.
    #[must_use]
    pub fn new(registry: &'a JobRegistry) -> Self {
        Self { registry }
    }

    /// Run the job for `intent` under `ctx`, committing its artifacts through
    /// `store` (rooted at `ctx.paths.run_dir`) as a single atomic batch.
    ///
    /// If no runner is registered for the job type, the run fails without
    /// writing anything (the caller should treat this the same as an
    /// `ErrorCode::NoRunnerRegistered` condition).
    pub fn execute(
        &self,
        intent: &NormalizedIntent,
        ctx: &RunContext,
        store: &ArtifactStore,
    ) -> RunResult {
        let Some(runner) = self.registry.get(ctx.job_type) else {
            return RunResult {
                status: RunOutcome::Failed,
                artifacts: Vec::new(),
                error: Some(format!("no runner registered for jobType '{}'", ctx.job_type)),
            };
        };

        let produced = match runner.run(intent, ctx) {
            Ok(artifacts) => artifacts,
            Err(message) => {
                return RunResult {
                    status: RunOutcome::Failed,
                    artifacts: Vec::new(),
                    error: Some(message),
                };
            }
        };

        let pending: Vec<PendingArtifact> = produced
            .into_iter()
            .map(|a| PendingArtifact {
                path: format!("artifacts/{}", a.path),
                bytes: a.bytes,
            })
            .collect();

        match store.write_artifacts_batch(&pending) {
            Ok(written) => RunResult {
                status: RunOutcome::Success,
                artifacts: written
                    .into_iter()
                    .map(|w| ArtifactInfo {
                        path: w.path.trim_start_matches("artifacts/").to_string(),
                        size: w.size,
                    })
                    .collect(),
                error: None,
            },
            Err(e) => RunResult {
                status: RunOutcome::Failed,
                artifacts: Vec::new(),
                error: Some(format!("failed to commit artifacts: {e}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_core::{IntentInputs, RunPaths, SafeReportInputs};
    use std::collections::BTreeMap as StdBTreeMap;
    use tempfile::TempDir;

    fn ctx(run_dir: &std::path::Path) -> RunContext {
        RunContext {
            intent_id: "intent-1".to_string(),
            run_id: "run-1".to_string(),
            job_type: JobType::SafeReport,
            paths: RunPaths::new(run_dir, "run-1"),
            requester: "alice".to_string(),
        }
    }

    fn intent() -> NormalizedIntent {
        NormalizedIntent {
            intent_id: "intent-1".to_string(),
            intent: solver_core::Intent {
                intent_version: "0.1.0".to_string(),
                intent_id: Some("intent-1".to_string()),
                requester: "alice".to_string(),
                created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
                expires_at: None,
                job_type: JobType::SafeReport,
                inputs: IntentInputs::SafeReport(SafeReportInputs {
                    subject: "Hi".to_string(),
                    data: StdBTreeMap::new(),
                }),
                constraints: None,
                acceptance_criteria: None,
                meta: None,
            },
        }
    }

    #[test]
    fn executes_the_reference_runner_and_commits_artifacts() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::with_reference_runners();
        let executor = JobExecutor::new(&registry);
        let c = ctx(dir.path());
        let store = ArtifactStore::new(&c.paths.run_dir);

        let result = executor.execute(&intent(), &c, &store);
        assert_eq!(result.status, RunOutcome::Success);
        assert_eq!(result.artifacts.len(), 2);
        assert!(dir.path().join("runs/run-1/artifacts/report.json").exists());
        assert!(dir.path().join("runs/run-1/artifacts/report.md").exists());
    }

    #[test]
    fn missing_runner_fails_without_writing_artifacts() {
        let dir = TempDir::new().unwrap();
        let registry = JobRegistry::new();
        let executor = JobExecutor::new(&registry);
        let c = ctx(dir.path());
        let store = ArtifactStore::new(&c.paths.run_dir);

        let result = executor.execute(&intent(), &c, &store);
        assert_eq!(result.status, RunOutcome::Failed);
        assert!(result.error.unwrap().contains("no runner registered"));
        assert!(!dir.path().join("runs/run-1/artifacts").exists());
    }
}
