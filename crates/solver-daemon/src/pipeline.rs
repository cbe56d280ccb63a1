// SPDX-License-Identifier: MIT OR Apache-2.0
//! The orchestrator that wires every crate in the workspace into the single
//! request/response flow described by the pipeline: validate, decide, run,
//! assemble evidence, append a record, sign.
//!
//! This is the solver's analogue of the runtime's own backend dispatch:
//! [`Pipeline::execute_raw_intent`] is the one function both [`crate::build_app`]
//! and `solver-cli`'s `run-fixture` command call into, so the HTTP surface and
//! the CLI can never drift in behavior.

use solver_appendlog::AppendLog;
use solver_artifacts::ArtifactStore;
use solver_config::SolverConfig;
use solver_core::{
    canonical_string, ids, ClockPort, DeliveredArtifact, EvidenceRef, ExecutionSummary, IntentInputs,
    NormalizedIntent, Receipt, RefusalRecord, RunContext, RunPaths, RunStatus, SolverIdentity,
    RECEIPT_VERSION,
};
use solver_error::{ErrorCode, SolverError};
use solver_evidence::EvidenceBuilder;
use solver_jobs::{JobExecutor, JobRegistry, RunOutcome};
use solver_policy::{PolicyConfig, PolicyEngine};
use solver_signer::{SignerError, SignerPort};
use solver_telemetry::Metrics;
use solver_validate::IntentValidator;
use std::sync::Arc;

/// The outcome of running one intent through the pipeline to completion.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The policy gate refused the intent before execution.
    Refused(RefusalRecord),
    /// Execution ran (successfully or not) and a receipt was persisted.
    Completed {
        /// The persisted receipt.
        receipt: Receipt,
        /// The runner's terminal status (`SUCCESS` or `FAILED`).
        status: RunStatus,
    },
}

/// Everything the pipeline needs, bound once at startup and shared across
/// every request/command for the lifetime of the process.
pub struct Pipeline {
    config: SolverConfig,
    policy_config: PolicyConfig,
    registry: JobRegistry,
    solver_identity: SolverIdentity,
    signer: Option<Box<dyn SignerPort>>,
    clock: Box<dyn ClockPort>,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    /// Assemble a pipeline. `signer` is optional: receipts are still valid
    /// (per the v0.1.0 schema's `signature?`) without one.
    #[must_use]
    pub fn new(
        config: SolverConfig,
        policy_config: PolicyConfig,
        registry: JobRegistry,
        solver_identity: SolverIdentity,
        signer: Option<Box<dyn SignerPort>>,
        clock: Box<dyn ClockPort>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            policy_config,
            registry,
            solver_identity,
            signer,
            clock,
            metrics,
        }
    }

    /// The bound configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Run a decoded intent document through validation, policy, execution,
    /// evidence assembly, and durable logging.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] for validation failures, I/O failures
    /// assembling or persisting evidence, or append-log failures. A policy
    /// refusal is **not** an error — it is [`PipelineOutcome::Refused`].
    pub fn execute_raw_intent(&self, raw: &serde_json::Value) -> Result<PipelineOutcome, SolverError> {
        let normalized = self.validate(raw)?;
        let now = self.clock.now();
        let run_id = self.derive_run_id(&normalized)?;

        let policy_engine = PolicyEngine::new(&self.policy_config);
        let decision = policy_engine.evaluate(&normalized, self.clock.as_ref());

        if !decision.allowed {
            return self.record_refusal(&normalized, &run_id, now, decision.reasons);
        }

        let paths = RunPaths::new(&self.config.data_dir, &run_id);
        let ctx = RunContext {
            intent_id: normalized.intent_id.clone(),
            run_id: run_id.clone(),
            job_type: normalized.job_type(),
            paths: paths.clone(),
            requester: normalized.requester().to_string(),
        };
        let store = ArtifactStore::new(&paths.run_dir);
        let executor = JobExecutor::new(&self.registry);
        let run_result = executor.execute(&normalized, &ctx, &store);
        self.metrics.record_run(run_result.status == RunOutcome::Success);

        let (status, error) = match run_result.status {
            RunOutcome::Success => (RunStatus::Success, None),
            RunOutcome::Failed => (RunStatus::Failed, run_result.error.clone()),
        };

        let builder = EvidenceBuilder::new(&paths, self.solver_identity.clone());
        let (manifest, digest) = builder
            .build_and_persist(
                &normalized.intent_id,
                &run_id,
                normalized.job_type(),
                now,
                decision,
                ExecutionSummary { status, error },
            )
            .map_err(|e| SolverError::new(ErrorCode::IoFailure, e))?;

        let receipt_id = ids::receipt_id(&normalized.intent_id, &run_id, &digest);
        let delivered: Vec<DeliveredArtifact> = manifest
            .artifacts
            .iter()
            .map(|a| DeliveredArtifact {
                path: a.path.clone(),
                sha256: a.sha256.clone(),
            })
            .collect();

        let mut receipt = Receipt {
            receipt_version: RECEIPT_VERSION.to_string(),
            receipt_id,
            intent_id: normalized.intent_id.clone(),
            run_id: run_id.clone(),
            status,
            delivered,
            evidence: EvidenceRef {
                manifest_sha256: digest.clone(),
                manifest_path: format!("runs/{run_id}/evidence/manifest.json"),
            },
            created_at: now,
            signature: None,
        };

        if let Some(signer) = &self.signer {
            receipt.signature = Some(self.sign_manifest_digest(signer.as_ref(), &digest)?);
        }

        let line = canonical_string(&receipt).map_err(|e| SolverError::new(ErrorCode::EncodingFailure, e.to_string()))?;
        self.append(&self.config.receipts_path, &line)?;
        self.metrics.record_receipt_written();

        Ok(PipelineOutcome::Completed { receipt, status })
    }

    fn validate(&self, raw: &serde_json::Value) -> Result<NormalizedIntent, SolverError> {
        IntentValidator::default().validate(raw).map_err(|issues| {
            let message = issues
                .first()
                .map(|i| i.message.clone())
                .unwrap_or_else(|| "validation failed".to_string());
            let mut err = SolverError::new(ErrorCode::UnknownField, message).with_path(
                issues
                    .first()
                    .map(|i| i.path.clone())
                    .unwrap_or_else(|| "$".to_string()),
            );
            for (i, issue) in issues.iter().enumerate() {
                err = err.with_context(format!("issues[{i}]"), format!("{}: {}", issue.path, issue.message));
            }
            err
        })
    }

    fn derive_run_id(&self, normalized: &NormalizedIntent) -> Result<String, SolverError> {
        match &normalized.intent.inputs {
            IntentInputs::SafeReport(inputs) => {
                ids::run_id(&normalized.intent_id, &normalized.job_type(), inputs)
            }
        }
        .map_err(|e| SolverError::new(ErrorCode::EncodingFailure, e.to_string()))
    }

    fn record_refusal(
        &self,
        normalized: &NormalizedIntent,
        run_id: &str,
        now: chrono::DateTime<chrono::Utc>,
        reasons: Vec<String>,
    ) -> Result<PipelineOutcome, SolverError> {
        self.metrics.record_refusal();
        let record = RefusalRecord {
            timestamp: now,
            intent_id: normalized.intent_id.clone(),
            run_id: run_id.to_string(),
            job_type: normalized.job_type(),
            requester: normalized.requester().to_string(),
            reasons,
            intent_version: normalized.intent.intent_version.clone(),
        };
        let line = canonical_string(&record).map_err(|e| SolverError::new(ErrorCode::EncodingFailure, e.to_string()))?;
        self.append(&self.config.refusals_path, &line)?;
        Ok(PipelineOutcome::Refused(record))
    }

    fn append(&self, path: &std::path::Path, line: &str) -> Result<(), SolverError> {
        AppendLog::new(path).append(line).map_err(|e| {
            self.metrics.record_append_log_lock_timeout();
            SolverError::new(ErrorCode::LockTimeout, e.to_string())
        })?;
        self.metrics.record_append_log_write();
        Ok(())
    }

    /// Sign the manifest digest (the evidence bundle's SHA-256, decoded from
    /// hex to its 32 raw bytes) rather than re-hashing the whole receipt —
    /// the manifest digest already uniquely identifies everything the
    /// receipt points at.
    fn sign_manifest_digest(
        &self,
        signer: &dyn SignerPort,
        manifest_sha256_hex: &str,
    ) -> Result<solver_core::Signature, SolverError> {
        let bytes = hex::decode(manifest_sha256_hex)
            .map_err(|e| SolverError::new(ErrorCode::EncodingFailure, format!("malformed manifest digest: {e}")))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SolverError::new(ErrorCode::EncodingFailure, "manifest digest is not 32 bytes"))?;
        signer.sign_digest(&digest).map_err(|e| match e {
            SignerError::Transient(msg) => SolverError::new(ErrorCode::SignerTransient, msg),
            SignerError::Permanent(msg) => SolverError::new(ErrorCode::SignerPermanent, msg),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_core::{FixedClock, JobType};
    use tempfile::TempDir;

    fn pipeline(data_dir: &std::path::Path) -> Pipeline {
        let config = SolverConfig {
            data_dir: data_dir.to_path_buf(),
            job_type_allowlist: vec!["SAFE_REPORT".to_string()],
            max_artifact_mb: 5,
            requester_allowlist: None,
            receipts_path: data_dir.join("receipts.jsonl"),
            refusals_path: data_dir.join("refusals.jsonl"),
            evidence_dir: data_dir.join("runs"),
        };
        let policy_config = PolicyConfig {
            job_type_allowlist: vec![JobType::SafeReport],
            max_artifact_mb: 5,
            requester_allowlist: None,
        };
        Pipeline::new(
            config,
            policy_config,
            JobRegistry::with_reference_runners(),
            SolverIdentity {
                service: "solver-daemon".to_string(),
                service_version: "0.1.0".to_string(),
                git_commit: None,
            },
            None,
            Box::new(FixedClock("2026-01-01T00:00:00Z".parse().unwrap())),
            Arc::new(Metrics::new()),
        )
    }

    fn accepted_intent() -> serde_json::Value {
        serde_json::json!({
            "intentVersion": "0.1.0",
            "requester": "alice",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "jobType": "SAFE_REPORT",
            "inputs": {"subject": "Hi", "data": {"k": "v"}}
        })
    }

    #[test]
    fn accepted_intent_produces_a_completed_receipt_with_two_artifacts() {
        let dir = TempDir::new().unwrap();
        let outcome = pipeline(dir.path()).execute_raw_intent(&accepted_intent()).unwrap();
        match outcome {
            PipelineOutcome::Completed { receipt, status } => {
                assert_eq!(status, RunStatus::Success);
                assert_eq!(receipt.delivered.len(), 2);
                assert!(receipt.signature.is_none());
            }
            PipelineOutcome::Refused(r) => panic!("expected acceptance, got refusal: {r:?}"),
        }
    }

    #[test]
    fn two_runs_of_the_same_intent_in_separate_data_dirs_agree_on_manifest_digest() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let outcome_a = pipeline(dir_a.path()).execute_raw_intent(&accepted_intent()).unwrap();
        let outcome_b = pipeline(dir_b.path()).execute_raw_intent(&accepted_intent()).unwrap();
        let PipelineOutcome::Completed { receipt: a, .. } = outcome_a else { panic!() };
        let PipelineOutcome::Completed { receipt: b, .. } = outcome_b else { panic!() };
        assert_eq!(a.evidence.manifest_sha256, b.evidence.manifest_sha256);
        assert_eq!(a.intent_id, b.intent_id);
    }

    #[test]
    fn refused_intent_writes_a_refusal_record_and_no_run_directory() {
        let dir = TempDir::new().unwrap();
        let mut intent = accepted_intent();
        intent["requester"] = serde_json::json!("not-allowed");
        let mut pipeline = pipeline(dir.path());
        pipeline.policy_config.requester_allowlist = Some(vec!["alice".to_string()]);

        let outcome = pipeline.execute_raw_intent(&intent).unwrap();
        match outcome {
            PipelineOutcome::Refused(record) => {
                assert!(record.reasons.iter().any(|r| r.contains("requester")));
            }
            PipelineOutcome::Completed { .. } => panic!("expected refusal"),
        }
        assert!(!dir.path().join("runs").exists());
        assert!(dir.path().join("refusals.jsonl").exists());
    }

    #[test]
    fn malformed_intent_fails_validation_before_touching_the_filesystem() {
        let dir = TempDir::new().unwrap();
        let err = pipeline(dir.path())
            .execute_raw_intent(&serde_json::json!({"jobType": "SAFE_REPORT"}))
            .unwrap_err();
        assert_eq!(err.code.category(), solver_error::ErrorCategory::Validation);
        assert!(!dir.path().join("refusals.jsonl").exists());
    }
}
