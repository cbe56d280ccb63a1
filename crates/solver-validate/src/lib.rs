// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-validate
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Turns arbitrary decoded JSON into a [`solver_core::NormalizedIntent`], or
//! fails with an ordered list of [`solver_error::ValidationIssue`].

use solver_core::{ids, Intent, IntentInputs, JobType, NormalizedIntent, INTENT_VERSION};
use solver_error::ValidationIssue;

pub use solver_core::IdVerificationMode;

/// Intent schema enforcement, normalization, and `intentId` verification.
#[derive(Debug, Clone)]
pub struct IntentValidator {
    mode: IdVerificationMode,
}

impl Default for IntentValidator {
    fn default() -> Self {
        Self::new(IdVerificationMode::default())
    }
}

impl IntentValidator {
    /// Construct a validator with the given `intentId` verification mode.
    #[must_use]
    pub fn new(mode: IdVerificationMode) -> Self {
        Self { mode }
    }

    /// Validate and normalize a raw decoded JSON document into a
    /// [`NormalizedIntent`].
    ///
    /// # Errors
    ///
    /// Returns every validation issue found; the field is rejected as a whole
    /// rather than partially accepted.
    pub fn validate(&self, raw: &serde_json::Value) -> Result<NormalizedIntent, Vec<ValidationIssue>> {
        // Steps 1-4 (unknown fields, jobType enumeration, per-jobType input
        // dispatch, RFC 3339 timestamp parsing) are enforced atomically by
        // Intent's `#[serde(deny_unknown_fields)]` derive and its typed
        // jobType/inputs/timestamp fields — the same "serde strictness paired
        // with an explicit pass" idiom used across the workspace.
        let intent: Intent = match serde_json::from_value(raw.clone()) {
            Ok(i) => i,
            Err(e) => return Err(vec![ValidationIssue::new("$", e.to_string())]),
        };

        let mut issues = Vec::new();

        if intent.intent_version != INTENT_VERSION {
            issues.push(ValidationIssue::new(
                "intentVersion",
                format!(
                    "expected exactly \"{INTENT_VERSION}\", got \"{}\"",
                    intent.intent_version
                ),
            ));
        }

        if !matches!(
            (&intent.job_type, &intent.inputs),
            (JobType::SafeReport, IntentInputs::SafeReport(_))
        ) {
            issues.push(ValidationIssue::new(
                "inputs",
                "inputs shape does not match jobType".to_string(),
            ));
        }

        if intent.requester.trim().is_empty() {
            issues.push(ValidationIssue::new("requester", "must be non-empty"));
        }

        if let IntentInputs::SafeReport(ref inputs) = intent.inputs {
            if inputs.subject.trim().is_empty() {
                issues.push(ValidationIssue::new("inputs.subject", "must be non-empty"));
            }
        }

        // expiresAt <= createdAt is accepted at this stage; the PolicyEngine decides.

        if !issues.is_empty() {
            return Err(issues);
        }

        let computed = match &intent.inputs {
            IntentInputs::SafeReport(inputs) => ids::intent_id(
                &intent.intent_version,
                &intent.requester,
                &intent.job_type,
                inputs,
                intent.constraints.as_ref(),
            ),
        };
        let computed = match computed {
            Ok(id) => id,
            Err(e) => return Err(vec![ValidationIssue::new("$", e.to_string())]),
        };

        if let Some(supplied) = &intent.intent_id {
            if supplied != &computed {
                match self.mode {
                    IdVerificationMode::Strict => {
                        return Err(vec![ValidationIssue::new(
                            "intentId",
                            format!("supplied intentId \"{supplied}\" does not match computed \"{computed}\""),
                        )]);
                    }
                    IdVerificationMode::Lenient => {
                        tracing::warn!(
                            supplied = %supplied,
                            computed = %computed,
                            "intentId mismatch accepted under lenient verification"
                        );
                    }
                }
            }
        }

        let mut normalized_intent = intent;
        normalized_intent.intent_id = Some(computed.clone());

        Ok(NormalizedIntent {
            intent_id: computed,
            intent: normalized_intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_raw() -> serde_json::Value {
        json!({
            "intentVersion": "0.1.0",
            "requester": "test@example.com",
            "createdAt": "2026-01-01T00:00:00.000Z",
            "jobType": "SAFE_REPORT",
            "inputs": {"subject": "Hi", "data": {"k": "v"}}
        })
    }

    #[test]
    fn accepts_a_minimal_valid_intent() {
        let v = IntentValidator::default();
        let normalized = v.validate(&valid_raw()).expect("should validate");
        assert_eq!(normalized.intent_id.len(), 64);
        assert_eq!(normalized.intent.intent_id.as_deref(), Some(normalized.intent_id.as_str()));
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let mut raw = valid_raw();
        raw.as_object_mut()
            .unwrap()
            .insert("bogus".to_string(), json!(true));
        let v = IntentValidator::default();
        let err = v.validate(&raw).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn rejects_wrong_intent_version() {
        let mut raw = valid_raw();
        raw["intentVersion"] = json!("9.9.9");
        let v = IntentValidator::default();
        let err = v.validate(&raw).unwrap_err();
        assert!(err.iter().any(|i| i.path == "intentVersion"));
    }

    #[test]
    fn rejects_unknown_job_type() {
        let mut raw = valid_raw();
        raw["jobType"] = json!("UNKNOWN");
        let v = IntentValidator::default();
        assert!(v.validate(&raw).is_err());
    }

    #[test]
    fn intent_id_is_stable_across_calls() {
        let v = IntentValidator::default();
        let a = v.validate(&valid_raw()).unwrap();
        let b = v.validate(&valid_raw()).unwrap();
        assert_eq!(a.intent_id, b.intent_id);
    }

    #[test]
    fn mutating_created_at_does_not_change_intent_id() {
        let v = IntentValidator::default();
        let a = v.validate(&valid_raw()).unwrap();
        let mut raw2 = valid_raw();
        raw2["createdAt"] = json!("2030-06-01T12:30:00.000Z");
        let b = v.validate(&raw2).unwrap();
        assert_eq!(a.intent_id, b.intent_id);
    }

    #[test]
    fn strict_mode_rejects_mismatched_supplied_intent_id() {
        let mut raw = valid_raw();
        raw["intentId"] = json!("0".repeat(64));
        let v = IntentValidator::new(IdVerificationMode::Strict);
        assert!(v.validate(&raw).is_err());
    }

    #[test]
    fn lenient_mode_accepts_mismatched_supplied_intent_id() {
        let mut raw = valid_raw();
        let bogus = "0".repeat(64);
        raw["intentId"] = json!(bogus);
        let v = IntentValidator::new(IdVerificationMode::Lenient);
        let normalized = v.validate(&raw).expect("lenient mode accepts mismatch");
        // The normalized intentId is always the recomputed canonical value.
        assert_ne!(normalized.intent_id, bogus);
    }

    #[test]
    fn empty_subject_is_rejected() {
        let mut raw = valid_raw();
        raw["inputs"]["subject"] = json!("");
        let v = IntentValidator::default();
        let err = v.validate(&raw).unwrap_err();
        assert!(err.iter().any(|i| i.path == "inputs.subject"));
    }
}
