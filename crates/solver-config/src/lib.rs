// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-config
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Loads [`SolverConfig`] from the enumerated environment variables, with an
//! optional TOML file overlay where the file overrides env. Mirrors the
//! workspace's own env-plus-TOML-overlay config crate, narrowed to the fixed
//! set of knobs the solver needs: `dataDir`, the policy allowlists/cap, and
//! the receipts/refusals/evidence path overrides.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {0}")]
    FileNotFound(String),
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {0}")]
    ParseError(String),
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {0:?}")]
    ValidationError(Vec<String>),
}

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No requester allowlist is configured; any requester is accepted.
    NoRequesterAllowlist,
    /// The artifact size cap is unusually large.
    LargeArtifactCap {
        /// Configured cap, in megabytes.
        mb: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRequesterAllowlist => {
                write!(f, "no requester allowlist configured; every requester is accepted")
            }
            Self::LargeArtifactCap { mb } => write!(f, "POLICY_MAX_ARTIFACT_MB is unusually large ({mb} MB)"),
        }
    }
}

const LARGE_ARTIFACT_CAP_THRESHOLD_MB: u64 = 1024;

/// Overlay read from an optional TOML file; every field optional so a
/// partial overlay only overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverlay {
    /// See [`SolverConfig::data_dir`].
    pub data_dir: Option<PathBuf>,
    /// See [`SolverConfig::job_type_allowlist`].
    pub policy_job_type_allowlist: Option<Vec<String>>,
    /// See [`SolverConfig::max_artifact_mb`].
    pub policy_max_artifact_mb: Option<u64>,
    /// See [`SolverConfig::requester_allowlist`].
    pub policy_requester_allowlist: Option<Vec<String>>,
    /// See [`SolverConfig::receipts_path`].
    pub receipts_path: Option<PathBuf>,
    /// See [`SolverConfig::refusals_path`].
    pub refusals_path: Option<PathBuf>,
    /// See [`SolverConfig::evidence_dir`].
    pub evidence_dir: Option<PathBuf>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Root data directory; defaults to `./data`.
    pub data_dir: PathBuf,
    /// `jobType` values the policy gate permits.
    pub job_type_allowlist: Vec<String>,
    /// Maximum `inputs` size, in megabytes.
    pub max_artifact_mb: u64,
    /// Optional requester allowlist.
    pub requester_allowlist: Option<Vec<String>>,
    /// Path to the receipts JSONL log; defaults to `{dataDir}/receipts.jsonl`.
    pub receipts_path: PathBuf,
    /// Path to the refusals JSONL log; defaults to `{dataDir}/refusals.jsonl`.
    pub refusals_path: PathBuf,
    /// Directory holding per-run evidence bundles; defaults to `{dataDir}/runs`.
    pub evidence_dir: PathBuf,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            receipts_path: data_dir.join("receipts.jsonl"),
            refusals_path: data_dir.join("refusals.jsonl"),
            evidence_dir: data_dir.join("runs"),
            data_dir,
            job_type_allowlist: vec!["SAFE_REPORT".to_string()],
            max_artifact_mb: 5,
            requester_allowlist: None,
        }
    }
}

/// Load configuration from the enumerated environment variables, then merge
/// an optional TOML overlay file on top (file overrides env). Unknown
/// environment keys are ignored.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] or [`ConfigError::ParseError`] if
/// `overlay_path` is given but cannot be read or parsed.
pub fn load(overlay_path: Option<&Path>) -> Result<SolverConfig, ConfigError> {
    let mut config = from_env();

    if let Some(path) = overlay_path {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let overlay = parse_overlay(&content)?;
        apply_overlay(&mut config, overlay);
    }

    Ok(config)
}

/// Build a [`SolverConfig`] from environment variables alone, falling back
/// to the documented defaults for anything unset.
///
/// Recognised variables: `DATA_DIR`, `POLICY_JOBTYPE_ALLOWLIST` (comma
/// separated), `POLICY_MAX_ARTIFACT_MB`, `POLICY_REQUESTER_ALLOWLIST`
/// (comma separated), `RECEIPTS_PATH`, `REFUSALS_PATH`, `EVIDENCE_DIR`.
#[must_use]
pub fn from_env() -> SolverConfig {
    let mut config = SolverConfig::default();

    if let Ok(val) = std::env::var("DATA_DIR") {
        config.data_dir = PathBuf::from(val);
        config.receipts_path = config.data_dir.join("receipts.jsonl");
        config.refusals_path = config.data_dir.join("refusals.jsonl");
        config.evidence_dir = config.data_dir.join("runs");
    }
    if let Ok(val) = std::env::var("POLICY_JOBTYPE_ALLOWLIST") {
        config.job_type_allowlist = split_csv(&val);
    }
    if let Ok(val) = std::env::var("POLICY_MAX_ARTIFACT_MB") {
        if let Ok(mb) = val.parse() {
            config.max_artifact_mb = mb;
        }
    }
    if let Ok(val) = std::env::var("POLICY_REQUESTER_ALLOWLIST") {
        config.requester_allowlist = Some(split_csv(&val));
    }
    if let Ok(val) = std::env::var("RECEIPTS_PATH") {
        config.receipts_path = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("REFUSALS_PATH") {
        config.refusals_path = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("EVIDENCE_DIR") {
        config.evidence_dir = PathBuf::from(val);
    }

    config
}

fn split_csv(val: &str) -> Vec<String> {
    val.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Parse a TOML overlay document.
pub fn parse_overlay(content: &str) -> Result<ConfigOverlay, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn apply_overlay(config: &mut SolverConfig, overlay: ConfigOverlay) {
    if let Some(v) = overlay.data_dir {
        config.data_dir = v;
    }
    if let Some(v) = overlay.policy_job_type_allowlist {
        config.job_type_allowlist = v;
    }
    if let Some(v) = overlay.policy_max_artifact_mb {
        config.max_artifact_mb = v;
    }
    if let Some(v) = overlay.policy_requester_allowlist {
        config.requester_allowlist = Some(v);
    }
    if let Some(v) = overlay.receipts_path {
        config.receipts_path = v;
    }
    if let Some(v) = overlay.refusals_path {
        config.refusals_path = v;
    }
    if let Some(v) = overlay.evidence_dir {
        config.evidence_dir = v;
    }
}

/// Validate a resolved configuration, returning advisory warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if `max_artifact_mb` is zero or
/// the job-type allowlist is empty.
pub fn validate(config: &SolverConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.max_artifact_mb == 0 {
        errors.push("POLICY_MAX_ARTIFACT_MB must be a positive integer".to_string());
    } else if config.max_artifact_mb > LARGE_ARTIFACT_CAP_THRESHOLD_MB {
        warnings.push(ConfigWarning::LargeArtifactCap { mb: config.max_artifact_mb });
    }

    if config.job_type_allowlist.is_empty() {
        errors.push("POLICY_JOBTYPE_ALLOWLIST must not be empty".to_string());
    }

    if config.requester_allowlist.is_none() {
        warnings.push(ConfigWarning::NoRequesterAllowlist);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError(errors))
    }
}
