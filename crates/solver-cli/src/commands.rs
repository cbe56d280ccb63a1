// SPDX-License-Identifier: MIT OR Apache-2.0
//! Business logic behind each `solver` subcommand, kept free of any
//! `clap`/`println!` concerns so it can be unit- and integration-tested
//! directly (mirrors the workspace's own "thin `main.rs`, fat `commands`"
//! split).

use chrono::Utc;
use solver_config::{ConfigWarning, SolverConfig};
use solver_core::{
    canonical_string, ExecutionSummary, JobType, NormalizedIntent, PolicyDecision, RunPaths, RunStatus,
    SolverIdentity,
};
use solver_daemon::{Pipeline, PipelineOutcome};
use solver_error::{ErrorCode, SolverError};
use solver_evidence::{EvidenceBuilder, EvidenceValidator, ValidationOutcome};
use solver_jobs::JobRegistry;
use solver_policy::PolicyConfig;
use solver_signer::SignerPort;
use solver_telemetry::Metrics;
use solver_validate::IntentValidator;
use std::path::Path;
use std::sync::Arc;

/// The resolved configuration plus any advisory warnings, as reported by
/// `check-config`.
#[derive(Debug)]
pub struct CheckConfigReport {
    /// The fully resolved configuration.
    pub config: SolverConfig,
    /// Advisory warnings (e.g. no requester allowlist).
    pub warnings: Vec<ConfigWarning>,
}

/// Load and validate configuration from the environment plus an optional
/// TOML overlay.
///
/// # Errors
///
/// Returns a [`SolverError`] with category `Config` if the overlay file is
/// missing, malformed, or the resolved configuration fails semantic
/// validation.
pub fn check_config(overlay_path: Option<&Path>) -> Result<CheckConfigReport, SolverError> {
    let config = solver_config::load(overlay_path).map_err(config_error)?;
    let warnings = solver_config::validate(&config).map_err(config_error)?;
    Ok(CheckConfigReport { config, warnings })
}

fn config_error(err: solver_config::ConfigError) -> SolverError {
    match err {
        solver_config::ConfigError::FileNotFound(path) => {
            SolverError::new(ErrorCode::ConfigFileNotFound, format!("config file not found: {path}"))
        }
        solver_config::ConfigError::ParseError(msg) => SolverError::new(ErrorCode::ConfigParseError, msg),
        solver_config::ConfigError::ValidationError(problems) => {
            let mut e = SolverError::new(ErrorCode::ConfigValidationError, problems.join("; "));
            for (i, problem) in problems.iter().enumerate() {
                e = e.with_context(format!("problems[{i}]"), problem.clone());
            }
            e
        }
    }
}

/// Read, validate, and normalize an intent document from `path`.
///
/// # Errors
///
/// Returns a [`SolverError`] with category `Validation` if the file cannot
/// be read, is not valid JSON, or fails intent-schema validation.
pub fn print_intent(path: &Path) -> Result<NormalizedIntent, SolverError> {
    let raw = read_json(path)?;
    IntentValidator::default().validate(&raw).map_err(validation_error)
}

fn validation_error(issues: Vec<solver_error::ValidationIssue>) -> SolverError {
    let first = issues.first().cloned().unwrap_or_else(|| solver_error::ValidationIssue::new("$", "validation failed"));
    let mut err = SolverError::new(ErrorCode::UnknownField, first.message).with_path(first.path);
    for (i, issue) in issues.iter().enumerate() {
        err = err.with_context(format!("issues[{i}]"), format!("{}: {}", issue.path, issue.message));
    }
    err
}

fn read_json(path: &Path) -> Result<serde_json::Value, SolverError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SolverError::new(ErrorCode::IoFailure, format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SolverError::new(ErrorCode::UnknownField, format!("not valid JSON: {e}")).with_path("$"))
}

/// Assemble a [`Pipeline`] bound to `config`, registering every reference
/// job runner and an optional signer.
#[must_use]
pub fn build_pipeline(
    config: SolverConfig,
    policy_config: PolicyConfig,
    identity: SolverIdentity,
    signer: Option<Box<dyn SignerPort>>,
    metrics: Arc<Metrics>,
) -> Pipeline {
    Pipeline::new(
        config,
        policy_config,
        JobRegistry::with_reference_runners(),
        identity,
        signer,
        Box::new(solver_core::SystemClock),
        metrics,
    )
}

/// Decode the intent document at `path` and run it through `pipeline` to
/// completion (refusal or receipt).
///
/// # Errors
///
/// Returns a [`SolverError`] for a malformed fixture file or any pipeline
/// failure upstream of a policy decision (validation, I/O, signer, encoding).
pub fn run_fixture(path: &Path, pipeline: &Pipeline) -> Result<PipelineOutcome, SolverError> {
    let raw = read_json(path)?;
    pipeline.execute_raw_intent(&raw)
}

/// Rebuild `evidence/manifest.json` and `evidence/manifest.sha256` for a run
/// directory whose `artifacts/` have already been populated, inferring
/// `runId` from the directory's own name.
///
/// This is an operator/repair tool, not part of the deterministic pipeline:
/// unlike [`run_fixture`], it has no `NormalizedIntent` to draw `intentId`
/// and `policyDecision` from, so those fields are supplied explicitly (or
/// default to an always-allow decision and a placeholder id) rather than
/// recomputed.
///
/// # Errors
///
/// Returns a [`SolverError`] if `run_dir`'s name cannot be read or artifact
/// enumeration/hashing fails.
pub fn make_evidence(run_dir: &Path, intent_id: Option<String>, identity: SolverIdentity) -> Result<String, SolverError> {
    let run_id = run_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| SolverError::new(ErrorCode::IoFailure, format!("{} has no file name component", run_dir.display())))?;

    let paths = RunPaths {
        data_dir: run_dir.parent().map(Path::to_path_buf).unwrap_or_else(|| run_dir.to_path_buf()),
        run_dir: run_dir.to_path_buf(),
        artifacts_dir: run_dir.join("artifacts"),
        evidence_dir: run_dir.join("evidence"),
    };

    let status = if paths.artifacts_dir.is_dir() { RunStatus::Success } else { RunStatus::Failed };
    let error = if status == RunStatus::Failed { Some("no artifacts directory present".to_string()) } else { None };

    let builder = EvidenceBuilder::new(&paths, identity);
    let (_manifest, digest) = builder
        .build_and_persist(
            intent_id.as_deref().unwrap_or(&"0".repeat(64)),
            &run_id,
            JobType::SafeReport,
            Utc::now(),
            PolicyDecision::allow(),
            ExecutionSummary { status, error },
        )
        .map_err(|e| SolverError::new(ErrorCode::IoFailure, e))?;

    Ok(digest)
}

/// Independently re-verify an already-persisted evidence bundle.
#[must_use]
pub fn validate_evidence(run_dir: &Path) -> ValidationOutcome {
    EvidenceValidator.validate(run_dir)
}

/// Re-derive `intentId` for a decoded-but-not-yet-validated document, used
/// by `print-intent --recompute-only` style inspection. Exposed mainly so
/// integration tests can cross-check CLI output against the same formula
/// `solver-core` uses.
#[must_use]
pub fn canonical_receipt_line(outcome: &PipelineOutcome) -> Option<String> {
    match outcome {
        PipelineOutcome::Completed { receipt, .. } => canonical_string(receipt).ok(),
        PipelineOutcome::Refused(_) => None,
    }
}
