// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based tests for `intentId` determinism and verification-mode
//! handling (invariant 1): a validated intent's id depends only on
//! `{intentVersion, requester, jobType, inputs, constraints}`, and a
//! mismatched caller-supplied `intentId` is rejected or accepted according
//! to the configured [`IdVerificationMode`].

use proptest::prelude::*;
use serde_json::json;
use solver_validate::{IdVerificationMode, IntentValidator};

fn raw_intent(requester: &str, subject: &str, created_at: &str) -> serde_json::Value {
    json!({
        "intentVersion": "0.1.0",
        "requester": requester,
        "createdAt": created_at,
        "jobType": "SAFE_REPORT",
        "inputs": {"subject": subject, "data": {}}
    })
}

proptest! {
    /// Invariant 1: mutating only `createdAt` never changes the computed `intentId`.
    #[test]
    fn created_at_never_affects_intent_id(
        requester in "[a-zA-Z0-9.@_-]{3,16}",
        subject in "[a-zA-Z0-9 ]{1,16}",
    ) {
        let v = IntentValidator::default();
        let a = v.validate(&raw_intent(&requester, &subject, "2026-01-01T00:00:00.000Z")).unwrap();
        let b = v.validate(&raw_intent(&requester, &subject, "2030-06-01T12:30:00.000Z")).unwrap();
        prop_assert_eq!(a.intent_id, b.intent_id);
    }

    /// Strict mode rejects any caller-supplied `intentId` that does not match
    /// the recomputed value; lenient mode accepts it but always normalizes to
    /// the recomputed value, never the caller's.
    #[test]
    fn verification_mode_governs_mismatched_supplied_id(
        requester in "[a-zA-Z0-9.@_-]{3,16}",
        subject in "[a-zA-Z0-9 ]{1,16}",
        bogus_id in "[0-9a-f]{64}",
    ) {
        let mut raw = raw_intent(&requester, &subject, "2026-01-01T00:00:00.000Z");

        let computed = IntentValidator::default()
            .validate(&raw)
            .unwrap()
            .intent_id;
        prop_assume!(bogus_id != computed);

        raw["intentId"] = json!(bogus_id);

        let strict = IntentValidator::new(IdVerificationMode::Strict);
        prop_assert!(strict.validate(&raw).is_err());

        let lenient = IntentValidator::new(IdVerificationMode::Lenient);
        let normalized = lenient.validate(&raw).expect("lenient mode accepts mismatch");
        prop_assert_eq!(&normalized.intent_id, &computed);
        prop_assert_ne!(normalized.intent_id, bogus_id);
    }
}
