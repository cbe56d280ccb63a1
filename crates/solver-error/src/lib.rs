// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-error
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The taxonomy from §7 of the design: every error the solver surfaces to a
//! caller carries an [`ErrorCategory`], a stable [`ErrorCode`], a message, an
//! optional `path`, and a context bag that is safe to log (never raw
//! `inputs.data` or secrets).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or schema-violating intent input.
    Validation,
    /// Structured policy refusal (not an error, but rendered with this category at the CLI boundary).
    Policy,
    /// Runner-reported execution failure.
    Execution,
    /// Evidence-validator-detected tamper or inconsistency.
    Integrity,
    /// Filesystem or lock failure.
    Io,
    /// Digest-signing failure.
    Signer,
    /// Canonical-encoding producer bug.
    Encoding,
    /// Configuration load/validation failure.
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Policy => "policy",
            Self::Execution => "execution",
            Self::Integrity => "integrity",
            Self::Io => "io",
            Self::Signer => "signer",
            Self::Encoding => "encoding",
            Self::Config => "config",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code. Serializes as `SCREAMING_SNAKE_CASE`
/// and is guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    /// A top-level field is unknown to the v0.1.0 intent schema.
    UnknownField,
    /// `intentVersion` does not match the supported literal.
    UnsupportedIntentVersion,
    /// `jobType` is not in the closed enumeration.
    UnknownJobType,
    /// A timestamp field failed RFC 3339 parsing.
    InvalidTimestamp,
    /// A caller-supplied `intentId` did not match the recomputed value under strict mode.
    IntentIdMismatch,

    // -- Policy --
    /// `jobType` is not in the configured allowlist.
    JobTypeNotAllowed,
    /// The intent's `expiresAt` is in the past.
    IntentExpired,
    /// `requester` is not in the configured allowlist.
    RequesterNotAllowed,
    /// `inputs` exceeds the configured maximum size.
    InputsTooLarge,

    // -- Execution --
    /// The job runner reported a failure.
    JobFailed,
    /// No runner is registered for the requested job type.
    NoRunnerRegistered,

    // -- Integrity --
    /// `evidence/manifest.json` is missing.
    ManifestNotFound,
    /// The manifest file is not well-formed JSON.
    ManifestParseError,
    /// The manifest fails schema validation.
    SchemaValidationError,
    /// An artifact path fails the path-safety predicate.
    UnsafePath,
    /// Joining an artifact path against the run directory escapes it.
    PathEscape,
    /// A file referenced by the manifest is absent on disk.
    ArtifactNotFound,
    /// The on-disk file size does not match the manifest's recorded size.
    SizeMismatch,
    /// The recomputed SHA-256 does not match the manifest's recorded hash.
    HashMismatch,

    // -- Io --
    /// A filesystem operation failed.
    IoFailure,
    /// A cross-process append lock could not be acquired within the retry budget.
    LockTimeout,

    // -- Signer --
    /// The signer backend returned a transient error; may be retried.
    SignerTransient,
    /// The signer backend returned a permanent error.
    SignerPermanent,

    // -- Encoding --
    /// A value could not be represented as canonical JSON, or contained a forbidden float.
    EncodingFailure,

    // -- Config --
    /// The configuration file was not found.
    ConfigFileNotFound,
    /// The configuration file failed to parse.
    ConfigParseError,
    /// Configuration failed semantic validation.
    ConfigValidationError,
}

impl ErrorCode {
    /// The [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::UnknownField
            | Self::UnsupportedIntentVersion
            | Self::UnknownJobType
            | Self::InvalidTimestamp
            | Self::IntentIdMismatch => ErrorCategory::Validation,

            Self::JobTypeNotAllowed
            | Self::IntentExpired
            | Self::RequesterNotAllowed
            | Self::InputsTooLarge => ErrorCategory::Policy,

            Self::JobFailed | Self::NoRunnerRegistered => ErrorCategory::Execution,

            Self::ManifestNotFound
            | Self::ManifestParseError
            | Self::SchemaValidationError
            | Self::UnsafePath
            | Self::PathEscape
            | Self::ArtifactNotFound
            | Self::SizeMismatch
            | Self::HashMismatch => ErrorCategory::Integrity,

            Self::IoFailure | Self::LockTimeout => ErrorCategory::Io,

            Self::SignerTransient | Self::SignerPermanent => ErrorCategory::Signer,

            Self::EncodingFailure => ErrorCategory::Encoding,

            Self::ConfigFileNotFound | Self::ConfigParseError | Self::ConfigValidationError => {
                ErrorCategory::Config
            }
        }
    }
}

/// A single structured error, suitable for printing as the "one block per
/// error" the CLI surface requires and for safe structured logging.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}{}", self.path_suffix())]
pub struct SolverError {
    /// The stable error code.
    pub code: ErrorCode,
    /// Human-readable message. Never contains absolute paths or stack frames.
    pub message: String,
    /// Optional JSON-pointer-like path to the offending field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Safe-to-log key-value context (never raw `inputs.data` or secrets).
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, String>,
}

impl SolverError {
    /// Start building an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a field path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a safe-to-log context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The CLI exit code this error maps to, per the external interface table.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.code.category() {
            ErrorCategory::Policy => 2,
            ErrorCategory::Execution => 3,
            _ => 1,
        }
    }

    fn path_suffix(&self) -> String {
        match &self.path {
            Some(path) => format!(" (at {path})"),
            None => String::new(),
        }
    }
}

/// A single `{path, message}` validation issue, accumulated rather than
/// short-circuited by the intent validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON-pointer-like path to the offending field.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl ValidationIssue {
    /// Construct a new issue.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
