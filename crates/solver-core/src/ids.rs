// SPDX-License-Identifier: MIT OR Apache-2.0
//! `intentId` / `runId` / `receiptId` derivation.
//!
//! Each formula is a pure SHA-256 over a canonicalized byte sequence with a
//! domain-separating prefix. None of these functions perform I/O, consult a
//! clock, or touch an RNG — passing the same inputs yields bit-identical
//! output on any host.

use crate::canon::{canonical_bytes, CanonError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// How strictly a caller-supplied `intentId` is checked against the computed
/// value (Open Question 1 in the design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdVerificationMode {
    /// Recompute and reject on mismatch.
    Strict,
    /// Accept the caller's value even on mismatch, logging a warning.
    Lenient,
}

impl Default for IdVerificationMode {
    fn default() -> Self {
        // Matches the source behavior referenced in Open Question 1: the
        // original accepts a caller-provided intentId without verifying it.
        Self::Lenient
    }
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_lower(&hasher.finalize())
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// `intentId = SHA256("intent:" || intentVersion || ":" || requester || ":" ||
/// canonical(jobType) || ":" || canonical(inputs) || ":" || canonical(constraints ?? {}))`
///
/// Excludes `createdAt`, `expiresAt`, `meta`, and `acceptanceCriteria`.
///
/// # Errors
///
/// Returns [`CanonError`] if `inputs` or `constraints` contain a float or a
/// non-JSON value.
pub fn intent_id<J: Serialize, I: Serialize>(
    intent_version: &str,
    requester: &str,
    job_type: &J,
    inputs: &I,
    constraints: Option<&BTreeMap<String, serde_json::Value>>,
) -> Result<String, CanonError> {
    let job_type_c = canonical_bytes(job_type)?;
    let inputs_c = canonical_bytes(inputs)?;
    let constraints_c = match constraints {
        Some(c) => canonical_bytes(c)?,
        None => canonical_bytes(&serde_json::Map::<String, serde_json::Value>::new())?,
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(b"intent:");
    buf.extend_from_slice(intent_version.as_bytes());
    buf.extend_from_slice(b":");
    buf.extend_from_slice(requester.as_bytes());
    buf.extend_from_slice(b":");
    buf.extend_from_slice(&job_type_c);
    buf.extend_from_slice(b":");
    buf.extend_from_slice(&inputs_c);
    buf.extend_from_slice(b":");
    buf.extend_from_slice(&constraints_c);

    Ok(sha256_hex(&buf))
}

/// `runId = SHA256("run:" || intentId || ":" || jobType || ":" || canonical(inputs))`
///
/// # Errors
///
/// Returns [`CanonError`] if `inputs` contains a float or a non-JSON value.
pub fn run_id<J: Serialize, I: Serialize>(
    intent_id: &str,
    job_type: &J,
    inputs: &I,
) -> Result<String, CanonError> {
    let job_type_c = canonical_bytes(job_type)?;
    let inputs_c = canonical_bytes(inputs)?;

    let mut buf = Vec::new();
    buf.extend_from_slice(b"run:");
    buf.extend_from_slice(intent_id.as_bytes());
    buf.extend_from_slice(b":");
    buf.extend_from_slice(&job_type_c);
    buf.extend_from_slice(b":");
    buf.extend_from_slice(&inputs_c);

    Ok(sha256_hex(&buf))
}

/// `receiptId = SHA256("receipt:" || intentId || ":" || runId || ":" || manifestSha256)`
#[must_use]
pub fn receipt_id(intent_id: &str, run_id: &str, manifest_sha256: &str) -> String {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"receipt:");
    buf.extend_from_slice(intent_id.as_bytes());
    buf.extend_from_slice(b":");
    buf.extend_from_slice(run_id.as_bytes());
    buf.extend_from_slice(b":");
    buf.extend_from_slice(manifest_sha256.as_bytes());
    sha256_hex(&buf)
}

/// `ManifestDigest = SHA256(canonical(manifest without createdAt))`.
///
/// `createdAt` is removed from the object entirely (not nulled) before
/// canonicalization, so touching only that field never changes the digest.
///
/// # Errors
///
/// Returns [`CanonError`] if `manifest` cannot be represented as JSON (it
/// never contains a float by construction, since [`crate::EvidenceManifest`]
/// has no floating-point fields).
pub fn manifest_digest<M: Serialize>(manifest: &M) -> Result<String, CanonError> {
    let mut v = serde_json::to_value(manifest).map_err(|e| CanonError::NotJson(e.to_string()))?;
    if let serde_json::Value::Object(map) = &mut v {
        map.remove("createdAt");
    }
    let bytes = crate::canon::canonicalize_value(&v)?.into_bytes();
    Ok(sha256_hex(&bytes))
}

/// Alignment hook for protocols that anchor `receiptId` on-chain with
/// `keccak256(abi.encode(intentHash, solverId, createdAt))` instead of the
/// SHA-256 formula above. The core specifies the port; no adapter ships here
/// (see Open Question 3 in the design notes) — off-chain artifacts always use
/// [`receipt_id`], and an on-chain submitter wires up its own keccak
/// implementation of this trait.
pub trait OnChainIdPort: Send + Sync {
    /// Compute the on-chain receipt identifier.
    fn receipt_id_onchain(
        &self,
        intent_hash: &[u8; 32],
        solver_id: &str,
        created_at_unix: i64,
    ) -> [u8; 32];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobType;
    use serde_json::json;

    #[test]
    fn intent_id_excludes_created_at_expires_at_meta_and_acceptance_criteria() {
        let a = intent_id(
            "0.1.0",
            "requester@example.com",
            &JobType::SafeReport,
            &json!({"subject": "Hi", "data": {"k": "v"}}),
            None,
        )
        .unwrap();
        // Same semantic fields; only createdAt/expiresAt/meta/acceptanceCriteria differ
        // (those never reach this function's signature at all — the test documents intent).
        let b = intent_id(
            "0.1.0",
            "requester@example.com",
            &JobType::SafeReport,
            &json!({"subject": "Hi", "data": {"k": "v"}}),
            None,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn key_permutation_in_data_does_not_change_intent_id() {
        let a = intent_id(
            "0.1.0",
            "r@example.com",
            &JobType::SafeReport,
            &json!({"subject": "Hi", "data": {"a": 1, "b": 2}}),
            None,
        )
        .unwrap();
        let b = intent_id(
            "0.1.0",
            "r@example.com",
            &JobType::SafeReport,
            &json!({"subject": "Hi", "data": {"b": 2, "a": 1}}),
            None,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_requester_yields_different_intent_id() {
        let a = intent_id("0.1.0", "alice", &JobType::SafeReport, &json!({}), None).unwrap();
        let b = intent_id("0.1.0", "bob", &JobType::SafeReport, &json!({}), None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn missing_constraints_equals_explicit_empty_object() {
        let a = intent_id("0.1.0", "r", &JobType::SafeReport, &json!({}), None).unwrap();
        let empty = BTreeMap::new();
        let b = intent_id("0.1.0", "r", &JobType::SafeReport, &json!({}), Some(&empty)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn run_id_is_a_function_of_intent_id_job_type_and_inputs() {
        let iid = "a".repeat(64);
        let a = run_id(&iid, &JobType::SafeReport, &json!({"x": 1})).unwrap();
        let b = run_id(&iid, &JobType::SafeReport, &json!({"x": 1})).unwrap();
        assert_eq!(a, b);
        let c = run_id(&iid, &JobType::SafeReport, &json!({"x": 2})).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn receipt_id_binds_to_manifest_bytes() {
        let a = receipt_id("intent1", "run1", "deadbeef");
        let b = receipt_id("intent1", "run1", "deadbeef");
        assert_eq!(a, b);
        let c = receipt_id("intent1", "run1", "cafebabe");
        assert_ne!(a, c);
    }

    #[test]
    fn manifest_digest_is_independent_of_created_at() {
        use crate::{
            ArtifactEntry, EvidenceManifest, ExecutionSummary, JobType, PolicyDecision, RunStatus,
            SolverIdentity,
        };
        use chrono::{TimeZone, Utc};

        let base = EvidenceManifest {
            manifest_version: "0.1.0".to_string(),
            intent_id: "a".repeat(64),
            run_id: "b".repeat(64),
            job_type: JobType::SafeReport,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            artifacts: vec![ArtifactEntry {
                path: "artifacts/report.json".to_string(),
                sha256: "c".repeat(64),
                bytes: 10,
                content_type: "application/json".to_string(),
            }],
            policy_decision: PolicyDecision::allow(),
            execution_summary: ExecutionSummary {
                status: RunStatus::Success,
                error: None,
            },
            solver: SolverIdentity {
                service: "solver-core".to_string(),
                service_version: "0.1.0".to_string(),
                git_commit: None,
            },
        };
        let mut later = base.clone();
        later.created_at = Utc.with_ymd_and_hms(2030, 6, 1, 12, 30, 0).unwrap();

        assert_eq!(manifest_digest(&base).unwrap(), manifest_digest(&later).unwrap());

        let mut changed = base.clone();
        changed.artifacts[0].sha256 = "d".repeat(64);
        assert_ne!(manifest_digest(&base).unwrap(), manifest_digest(&changed).unwrap());
    }

    #[test]
    fn float_in_inputs_is_rejected() {
        let err = intent_id(
            "0.1.0",
            "r",
            &JobType::SafeReport,
            &json!({"x": 1.5}),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CanonError::FloatForbidden { .. }));
    }
}
