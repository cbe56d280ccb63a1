// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-evidence
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Assembles an [`EvidenceManifest`] from a run's committed artifacts, and
//! independently re-verifies a persisted evidence bundle for tamper or
//! inconsistency.

use solver_artifacts::{streaming_sha256, ArtifactStore, PendingArtifact};
use solver_core::{
    ids, ArtifactEntry, EvidenceManifest, ExecutionSummary, JobType, PolicyDecision, RunPaths,
    SolverIdentity, MANIFEST_VERSION,
};
use std::path::Path;

/// Builds and persists an [`EvidenceManifest`] for a completed (or refused)
/// run.
pub struct EvidenceBuilder<'a> {
    paths: &'a RunPaths,
    solver: SolverIdentity,
}

impl<'a> EvidenceBuilder<'a> {
    /// Bind a builder to a run's paths and this deployment's identity.
    #[must_use]
    pub fn new(paths: &'a RunPaths, solver: SolverIdentity) -> Self {
        Self { paths, solver }
    }

    /// Enumerate `artifacts/`, hash every file by streaming, assemble the
    /// manifest, and atomically persist `evidence/manifest.json` and
    /// `evidence/manifest.sha256`.
    ///
    /// Returns the manifest and its digest (hex SHA-256 over the canonical
    /// encoding with `createdAt` excluded).
    ///
    /// # Errors
    ///
    /// Returns an error string if an artifact disappears mid-enumeration or
    /// the evidence directory cannot be written.
    pub fn build_and_persist(
        &self,
        intent_id: &str,
        run_id: &str,
        job_type: JobType,
        created_at: chrono::DateTime<chrono::Utc>,
        policy_decision: PolicyDecision,
        execution_summary: ExecutionSummary,
    ) -> Result<(EvidenceManifest, String), String> {
        let run_store = ArtifactStore::new(&self.paths.run_dir);
        let files = run_store
            .list_files_recursive("artifacts")
            .map_err(|e| format!("failed to enumerate artifacts: {e}"))?;

        let mut artifacts = Vec::with_capacity(files.len());
        for rel in &files {
            let abs = self.paths.run_dir.join(rel);
            let sha256 = streaming_sha256(&abs).map_err(|e| format!("failed to hash {rel}: {e}"))?;
            let bytes = std::fs::metadata(&abs)
                .map_err(|e| format!("failed to stat {rel}: {e}"))?
                .len();
            artifacts.push(ArtifactEntry {
                path: rel.clone(),
                sha256,
                bytes,
                content_type: content_type_for(rel),
            });
        }
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));

        let manifest = EvidenceManifest {
            manifest_version: MANIFEST_VERSION.to_string(),
            intent_id: intent_id.to_string(),
            run_id: run_id.to_string(),
            job_type,
            created_at,
            artifacts,
            policy_decision,
            execution_summary,
            solver: self.solver.clone(),
        };

        let digest = ids::manifest_digest(&manifest).map_err(|e| format!("failed to digest manifest: {e}"))?;

        let manifest_json = solver_core::canonical_bytes(&manifest)
            .map_err(|e| format!("failed to canonicalize manifest: {e}"))?;
        let sha256_file = format!("{digest}\n");

        let evidence_store = ArtifactStore::new(&self.paths.run_dir);
        evidence_store
            .write_artifacts_batch(&[
                PendingArtifact {
                    path: "evidence/manifest.json".to_string(),
                    bytes: manifest_json,
                },
                PendingArtifact {
                    path: "evidence/manifest.sha256".to_string(),
                    bytes: sha256_file.into_bytes(),
                },
            ])
            .map_err(|e| format!("failed to persist evidence: {e}"))?;

        Ok((manifest, digest))
    }
}

fn content_type_for(path: &str) -> String {
    match path.rsplit('.').next() {
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// A single ordered validation failure from [`EvidenceValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The stable check code (matches the error-taxonomy `ErrorCode` names).
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Optional path to the offending artifact entry.
    pub path: Option<String>,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Outcome of validating an evidence bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// `true` iff `errors` is empty.
    pub valid: bool,
    /// Every detected inconsistency, in check order.
    pub errors: Vec<ValidationError>,
}

/// Independently re-verifies a persisted evidence bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvidenceValidator;

impl EvidenceValidator {
    /// Validate the evidence bundle rooted at `run_dir`.
    ///
    /// Hashing streams file contents; bundles containing artifacts larger
    /// than available memory are handled correctly.
    #[must_use]
    pub fn validate(&self, run_dir: &Path) -> ValidationOutcome {
        let mut errors = Vec::new();

        let manifest_path = run_dir.join("evidence").join("manifest.json");
        let raw = match std::fs::read(&manifest_path) {
            Ok(bytes) => bytes,
            Err(_) => {
                errors.push(ValidationError::new(
                    "MANIFEST_NOT_FOUND",
                    format!("{} does not exist", manifest_path.display()),
                ));
                return ValidationOutcome { valid: false, errors };
            }
        };

        let value: serde_json::Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                errors.push(ValidationError::new("MANIFEST_PARSE_ERROR", e.to_string()));
                return ValidationOutcome { valid: false, errors };
            }
        };

        let manifest: EvidenceManifest = match serde_json::from_value(value) {
            Ok(m) => m,
            Err(e) => {
                errors.push(ValidationError::new("SCHEMA_VALIDATION_ERROR", e.to_string()));
                return ValidationOutcome { valid: false, errors };
            }
        };

        for artifact in &manifest.artifacts {
            if !solver_artifacts::is_path_safe(&artifact.path) {
                errors.push(
                    ValidationError::new("UNSAFE_PATH", "artifact path fails the path-safety predicate")
                        .with_path(artifact.path.clone()),
                );
                continue;
            }

            let resolved = match solver_artifacts::safe_join(run_dir, &artifact.path) {
                Ok(p) => p,
                Err(_) => {
                    errors.push(
                        ValidationError::new("PATH_ESCAPE", "artifact path escapes the run directory")
                            .with_path(artifact.path.clone()),
                    );
                    continue;
                }
            };

            let metadata = match std::fs::metadata(&resolved) {
                Ok(m) => m,
                Err(_) => {
                    errors.push(
                        ValidationError::new("ARTIFACT_NOT_FOUND", "file referenced by manifest is absent")
                            .with_path(artifact.path.clone()),
                    );
                    continue;
                }
            };

            if metadata.len() != artifact.bytes {
                errors.push(
                    ValidationError::new(
                        "SIZE_MISMATCH",
                        format!("expected {} bytes, found {}", artifact.bytes, metadata.len()),
                    )
                    .with_path(artifact.path.clone()),
                );
            }

            match streaming_sha256(&resolved) {
                Ok(actual) if actual == artifact.sha256 => {}
                Ok(actual) => errors.push(
                    ValidationError::new(
                        "HASH_MISMATCH",
                        format!("expected {}, computed {actual}", artifact.sha256),
                    )
                    .with_path(artifact.path.clone()),
                ),
                Err(e) => errors.push(
                    ValidationError::new("HASH_MISMATCH", format!("failed to hash: {e}"))
                        .with_path(artifact.path.clone()),
                ),
            }
        }

        let valid = errors.is_empty();
        ValidationOutcome { valid, errors }
    }
}
