// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Stable contract types for the solver/executor: [`Intent`], [`NormalizedIntent`],
//! [`EvidenceManifest`], [`Receipt`], and the deterministic primitives
//! (`canon`, `ids`) that everything else is built from.
//!
//! If you only take one dependency from this workspace, take this one.

/// Canonical JSON encoding — the single choke point for hashed bytes.
pub mod canon;
/// `intentId` / `runId` / `receiptId` derivation.
pub mod ids;
/// Injected clock port; entropy is never permitted on the hashed path.
pub mod clock;

pub use canon::{canonical_bytes, canonical_string, CanonError};
pub use clock::{ClockPort, FixedClock, SystemClock};
pub use ids::IdVerificationMode;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only supported `intentVersion` literal.
pub const INTENT_VERSION: &str = "0.1.0";

/// The only supported `manifestVersion` literal.
pub const MANIFEST_VERSION: &str = "0.1.0";

/// The only supported `receiptVersion` literal.
pub const RECEIPT_VERSION: &str = "0.1.0";

/// Closed enumeration of job types the executor knows how to dispatch.
///
/// New job types are added here and picked up by the `JobRegistry` in
/// `solver-jobs`; the enum stays closed rather than `#[non_exhaustive]` so
/// exhaustive matches keep working across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// Summarize a `subject` and a `data` mapping into a deterministic report.
    SafeReport,
}

impl JobType {
    /// The wire tag for this job type (matches its serde representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SafeReport => "SAFE_REPORT",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-`jobType` input payload, discriminated by the `jobType` field at the
/// `Intent` level (serde's adjacently-tagged representation is avoided here —
/// the tag lives on the parent struct so `jobType` only appears once on the
/// wire).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SafeReportInputs {
    /// Non-empty subject line for the report.
    pub subject: String,
    /// Arbitrary string-keyed data to summarize.
    pub data: BTreeMap<String, serde_json::Value>,
}

/// A single acceptance-criterion entry attached to an [`Intent`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AcceptanceCriterion {
    /// Criterion type tag (free-form; not validated by the core).
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional criterion value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// An immutable request to perform work (v0.1.0 schema).
///
/// `createdAt`, `expiresAt`, `meta`, and `acceptanceCriteria` are carried for
/// bookkeeping but are **excluded** from `intentId` (see [`ids::intent_id`]).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    /// Must equal [`INTENT_VERSION`] exactly.
    #[serde(rename = "intentVersion")]
    pub intent_version: String,

    /// Caller-supplied identifier. Verified or trusted depending on
    /// [`crate::ids::IdVerificationMode`]; computed if absent.
    #[serde(rename = "intentId", skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,

    /// Non-empty opaque requester identifier.
    pub requester: String,

    /// Informational only; never hashed.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Informational only; never hashed. The `PolicyEngine`, not the
    /// validator, decides whether an expired intent is refused.
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Closed job-type enumeration.
    #[serde(rename = "jobType")]
    pub job_type: JobType,

    /// `jobType`-tagged input payload.
    pub inputs: IntentInputs,

    /// Optional free-form constraints mapping (hashed into `intentId`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<BTreeMap<String, serde_json::Value>>,

    /// Optional ordered acceptance criteria (never hashed).
    #[serde(rename = "acceptanceCriteria", skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<AcceptanceCriterion>>,

    /// Optional free-form metadata (never hashed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, serde_json::Value>>,
}

/// Discriminated input payload, one variant per [`JobType`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum IntentInputs {
    /// Inputs for [`JobType::SafeReport`].
    SafeReport(SafeReportInputs),
}

/// An [`Intent`] with `intentId` guaranteed present and canonical.
///
/// Produced once by the validator; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedIntent {
    /// The canonical, guaranteed-present intent identifier.
    pub intent_id: String,
    /// The underlying intent (with `intent_id` also populated, for convenience).
    pub intent: Intent,
}

impl NormalizedIntent {
    /// Convenience accessor for the job type.
    #[must_use]
    pub fn job_type(&self) -> JobType {
        self.intent.job_type
    }

    /// Convenience accessor for the requester.
    #[must_use]
    pub fn requester(&self) -> &str {
        &self.intent.requester
    }
}

/// The ordered, all-reasons outcome of the policy gate.
///
/// `reasons` is empty iff `allowed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Whether the intent may proceed to execution.
    pub allowed: bool,
    /// Every failing-check reason, in the fixed evaluation order.
    pub reasons: Vec<String>,
}

impl PolicyDecision {
    /// The decision for an intent that passed every check.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
        }
    }

    /// The decision for an intent that failed at least one check.
    ///
    /// # Panics
    ///
    /// Panics if `reasons` is empty — a refusal without a reason violates the
    /// `allowed iff reasons.is_empty()` invariant.
    #[must_use]
    pub fn deny(reasons: Vec<String>) -> Self {
        assert!(!reasons.is_empty(), "PolicyDecision::deny requires at least one reason");
        Self {
            allowed: false,
            reasons,
        }
    }
}

/// Derived execution plan; never persisted.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// The intent identifier.
    pub intent_id: String,
    /// The run identifier.
    pub run_id: String,
    /// The job type to dispatch.
    pub job_type: JobType,
    /// The run's artifact/evidence paths, rooted at `dataDir/runs/{runId}`.
    pub paths: RunPaths,
    /// The policy gate's verdict.
    pub policy_decision: PolicyDecision,
}

/// The filesystem layout for a single run, rooted at `dataDir`.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// `{dataDir}`
    pub data_dir: std::path::PathBuf,
    /// `{dataDir}/runs/{runId}`
    pub run_dir: std::path::PathBuf,
    /// `{dataDir}/runs/{runId}/artifacts`
    pub artifacts_dir: std::path::PathBuf,
    /// `{dataDir}/runs/{runId}/evidence`
    pub evidence_dir: std::path::PathBuf,
}

impl RunPaths {
    /// Derive the standard run layout under `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<std::path::PathBuf>, run_id: &str) -> Self {
        let data_dir = data_dir.into();
        let run_dir = data_dir.join("runs").join(run_id);
        Self {
            artifacts_dir: run_dir.join("artifacts"),
            evidence_dir: run_dir.join("evidence"),
            run_dir,
            data_dir,
        }
    }
}

/// Per-execution, read-only environment handed to a job runner.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The intent identifier.
    pub intent_id: String,
    /// The run identifier.
    pub run_id: String,
    /// The job type being executed.
    pub job_type: JobType,
    /// The run's filesystem layout.
    pub paths: RunPaths,
    /// The requester, for logging/attribution only.
    pub requester: String,
}

/// One artifact entry in an [`EvidenceManifest`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Relative path, beginning with `artifacts/`.
    pub path: String,
    /// Lowercase hex SHA-256, 64 characters.
    pub sha256: String,
    /// Size in bytes.
    pub bytes: u64,
    /// MIME content type, derived from the file extension.
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// High-level execution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The job runner completed successfully.
    Success,
    /// The job runner reported a failure.
    Failed,
    /// The policy gate refused the intent before execution.
    Refused,
}

/// Summary of how a run concluded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// The run's terminal status.
    pub status: RunStatus,
    /// Sanitized failure reason, present only when `status == FAILED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Identifies this deployment in an [`EvidenceManifest`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SolverIdentity {
    /// Stable service name.
    pub service: String,
    /// Service version string.
    #[serde(rename = "serviceVersion")]
    pub service_version: String,
    /// Optional git commit hash the binary was built from.
    #[serde(rename = "gitCommit", skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}

/// The evidence manifest (v0.1.0 schema).
///
/// `createdAt` is informational only and is excluded from [`ids::manifest_digest`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EvidenceManifest {
    /// Must equal [`MANIFEST_VERSION`] exactly.
    #[serde(rename = "manifestVersion")]
    pub manifest_version: String,
    /// The intent identifier.
    #[serde(rename = "intentId")]
    pub intent_id: String,
    /// The run identifier.
    #[serde(rename = "runId")]
    pub run_id: String,
    /// The job type that was executed.
    #[serde(rename = "jobType")]
    pub job_type: JobType,
    /// Informational timestamp; excluded from the manifest digest.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Artifact entries, sorted by `path` ascending.
    pub artifacts: Vec<ArtifactEntry>,
    /// The policy gate's verdict for this run.
    #[serde(rename = "policyDecision")]
    pub policy_decision: PolicyDecision,
    /// How the run concluded.
    #[serde(rename = "executionSummary")]
    pub execution_summary: ExecutionSummary,
    /// This deployment's identity.
    pub solver: SolverIdentity,
}

/// An append-only record of a policy refusal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RefusalRecord {
    /// RFC 3339 UTC timestamp of the refusal.
    pub timestamp: DateTime<Utc>,
    /// The intent identifier.
    #[serde(rename = "intentId")]
    pub intent_id: String,
    /// The run identifier that would have been used.
    #[serde(rename = "runId")]
    pub run_id: String,
    /// The requested job type.
    #[serde(rename = "jobType")]
    pub job_type: JobType,
    /// The requester.
    pub requester: String,
    /// Every failing-check reason, in evaluation order.
    pub reasons: Vec<String>,
    /// The intent's declared version.
    #[serde(rename = "intentVersion")]
    pub intent_version: String,
}

/// An r/s/v ECDSA signature, EIP-2 low-s normalized.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Signature {
    /// `r` component, lowercase hex, 64 characters.
    pub r: String,
    /// `s` component, lowercase hex, 64 characters, normalized to the lower half of the curve order.
    pub s: String,
    /// Recovery id, 27 or 28.
    pub v: u8,
}

/// A delivered artifact pointer inside a [`Receipt`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DeliveredArtifact {
    /// Relative path within the run's artifact directory.
    pub path: String,
    /// Lowercase hex SHA-256.
    pub sha256: String,
}

/// Pointer from a [`Receipt`] to its evidence bundle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EvidenceRef {
    /// The manifest digest (see [`ids::manifest_digest`]).
    #[serde(rename = "manifestSha256")]
    pub manifest_sha256: String,
    /// Relative path to `evidence/manifest.json` from `dataDir`.
    #[serde(rename = "manifestPath")]
    pub manifest_path: String,
}

/// A structured pointer from an intent to its evidence, optionally signed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Receipt {
    /// Must equal [`RECEIPT_VERSION`] exactly.
    #[serde(rename = "receiptVersion")]
    pub receipt_version: String,
    /// The derived receipt identifier (see [`ids::receipt_id`]).
    #[serde(rename = "receiptId")]
    pub receipt_id: String,
    /// The intent identifier.
    #[serde(rename = "intentId")]
    pub intent_id: String,
    /// The run identifier.
    #[serde(rename = "runId")]
    pub run_id: String,
    /// The run's terminal status.
    pub status: RunStatus,
    /// Every artifact delivered by this run.
    pub delivered: Vec<DeliveredArtifact>,
    /// Pointer to the evidence bundle.
    pub evidence: EvidenceRef,
    /// Informational timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Optional signature over the receipt's digest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_decision_allow_has_no_reasons() {
        let d = PolicyDecision::allow();
        assert!(d.allowed);
        assert!(d.reasons.is_empty());
    }

    #[test]
    #[should_panic(expected = "at least one reason")]
    fn policy_decision_deny_requires_a_reason() {
        let _ = PolicyDecision::deny(vec![]);
    }

    #[test]
    fn job_type_wire_tag_round_trips() {
        let v = serde_json::to_value(JobType::SafeReport).unwrap();
        assert_eq!(v, serde_json::json!("SAFE_REPORT"));
        let back: JobType = serde_json::from_value(v).unwrap();
        assert_eq!(back, JobType::SafeReport);
    }

    #[test]
    fn run_paths_layout_matches_spec() {
        let paths = RunPaths::new("/data", "abc123");
        assert_eq!(paths.run_dir, std::path::Path::new("/data/runs/abc123"));
        assert_eq!(
            paths.artifacts_dir,
            std::path::Path::new("/data/runs/abc123/artifacts")
        );
        assert_eq!(
            paths.evidence_dir,
            std::path::Path::new("/data/runs/abc123/evidence")
        );
    }
}
