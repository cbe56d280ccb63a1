// SPDX-License-Identifier: MIT OR Apache-2.0
//! `solver` — the command-line front door for the off-chain solver/executor.
//!
//! Every subcommand here calls into the same `solver-*` crates the HTTP
//! daemon uses (`Pipeline::execute_raw_intent` in particular), so CLI and
//! server behavior cannot drift apart.

use clap::{Parser, Subcommand};
use solver_cli::commands;
use solver_core::JobType;
use solver_error::SolverError;
use solver_policy::PolicyConfig;
use solver_telemetry::Metrics;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "solver", version, about = "Deterministic off-chain solver/executor CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Widen logging to debug level (honors `RUST_LOG` if set).
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as newline-delimited JSON instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Optional TOML configuration overlay; overrides environment variables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate configuration, printing the resolved values and any warnings.
    CheckConfig,
    /// Validate and normalize an intent document, printing its derived `intentId`.
    PrintIntent {
        /// Path to a JSON intent document.
        file: PathBuf,
    },
    /// Run a single intent document through the full pipeline to completion.
    RunFixture {
        /// Path to a JSON intent document.
        file: PathBuf,
        /// Hex-encoded secp256k1 signing key; overrides `SIGNER_PRIVATE_KEY_HEX`.
        #[arg(long, value_name = "HEX")]
        signer_key: Option<String>,
    },
    /// Rebuild the evidence manifest for a run directory whose artifacts already exist on disk.
    MakeEvidence {
        /// Path to `{dataDir}/runs/{runId}`.
        run_dir: PathBuf,
        /// Override the `intentId` recorded in the rebuilt manifest.
        #[arg(long, value_name = "ID")]
        intent_id: Option<String>,
    },
    /// Independently re-verify a persisted evidence bundle.
    ValidateEvidence {
        /// Path to `{dataDir}/runs/{runId}`.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    solver_telemetry::init_tracing(cli.debug, cli.json_logs);

    let result = match &cli.command {
        Command::CheckConfig => cmd_check_config(cli.config.as_deref()),
        Command::PrintIntent { file } => cmd_print_intent(file),
        Command::RunFixture { file, signer_key } => cmd_run_fixture(file, cli.config.as_deref(), signer_key.as_deref()),
        Command::MakeEvidence { run_dir, intent_id } => cmd_make_evidence(run_dir, intent_id.clone()),
        Command::ValidateEvidence { path } => cmd_validate_evidence(path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn print_error(err: &SolverError) {
    eprintln!("error: {err}");
    if !err.context.is_empty() {
        for (key, value) in &err.context {
            eprintln!("  {key}: {value}");
        }
    }
}

fn cmd_check_config(overlay: Option<&std::path::Path>) -> Result<(), SolverError> {
    let report = commands::check_config(overlay)?;
    println!("{}", serde_json::to_string_pretty(&config_summary(&report)).unwrap());
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn config_summary(report: &commands::CheckConfigReport) -> serde_json::Value {
    serde_json::json!({
        "dataDir": report.config.data_dir,
        "jobTypeAllowlist": report.config.job_type_allowlist,
        "maxArtifactMb": report.config.max_artifact_mb,
        "requesterAllowlist": report.config.requester_allowlist,
        "receiptsPath": report.config.receipts_path,
        "refusalsPath": report.config.refusals_path,
        "evidenceDir": report.config.evidence_dir,
    })
}

fn cmd_print_intent(file: &std::path::Path) -> Result<(), SolverError> {
    let normalized = commands::print_intent(file)?;
    let value = serde_json::to_value(&normalized.intent).map_err(|e| {
        SolverError::new(solver_error::ErrorCode::EncodingFailure, e.to_string())
    })?;
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "intentId": normalized.intent_id,
        "intent": value,
    })).unwrap());
    Ok(())
}

fn cmd_run_fixture(file: &std::path::Path, overlay: Option<&std::path::Path>, signer_key: Option<&str>) -> Result<(), SolverError> {
    let config = commands::check_config(overlay)?.config;

    let policy_config = PolicyConfig {
        job_type_allowlist: config
            .job_type_allowlist
            .iter()
            .filter_map(|s| (s == JobType::SafeReport.as_str()).then_some(JobType::SafeReport))
            .collect(),
        max_artifact_mb: config.max_artifact_mb,
        requester_allowlist: config.requester_allowlist.clone(),
    };

    let identity = solver_core::SolverIdentity {
        service: "solver-cli".to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        git_commit: None,
    };

    let signer = build_signer(signer_key)?;
    let pipeline = commands::build_pipeline(config, policy_config, identity, signer, Arc::new(Metrics::new()));

    let outcome = commands::run_fixture(file, &pipeline)?;
    println!("{}", serde_json::to_string_pretty(&outcome_summary(&outcome)).unwrap());

    match outcome {
        solver_daemon::PipelineOutcome::Refused(record) => Err(refusal_error(&record)),
        solver_daemon::PipelineOutcome::Completed { status, .. } if status == solver_core::RunStatus::Failed => {
            Err(SolverError::new(solver_error::ErrorCode::JobFailed, "job runner reported failure"))
        }
        solver_daemon::PipelineOutcome::Completed { .. } => Ok(()),
    }
}

/// Map the first refusal reason to its originating [`solver_error::ErrorCode`],
/// by the same substring each policy check uses to build its reason string.
fn refusal_error(record: &solver_core::RefusalRecord) -> SolverError {
    use solver_error::ErrorCode;
    let first = record.reasons.first().map(String::as_str).unwrap_or("refused");
    let code = if first.contains("not in allowlist [") {
        ErrorCode::JobTypeNotAllowed
    } else if first.contains("expired") {
        ErrorCode::IntentExpired
    } else if first.contains("requester") {
        ErrorCode::RequesterNotAllowed
    } else {
        ErrorCode::InputsTooLarge
    };
    let mut err = SolverError::new(code, format!("intent refused: {first}"));
    for (i, reason) in record.reasons.iter().enumerate() {
        err = err.with_context(format!("reasons[{i}]"), reason.clone());
    }
    err
}

fn outcome_summary(outcome: &solver_daemon::PipelineOutcome) -> serde_json::Value {
    match outcome {
        solver_daemon::PipelineOutcome::Refused(record) => serde_json::json!({ "outcome": "REFUSED", "refusal": record }),
        solver_daemon::PipelineOutcome::Completed { receipt, status } => {
            serde_json::json!({ "outcome": "COMPLETED", "status": status, "receipt": receipt })
        }
    }
}

fn build_signer(signer_key: Option<&str>) -> Result<Option<Box<dyn solver_signer::SignerPort>>, SolverError> {
    let hex_key = signer_key.map(str::to_string).or_else(|| std::env::var("SIGNER_PRIVATE_KEY_HEX").ok());
    let Some(hex_key) = hex_key else { return Ok(None) };
    let signer = solver_signer::LocalSigner::from_hex(&hex_key)
        .map_err(|e| SolverError::new(solver_error::ErrorCode::SignerPermanent, e.to_string()))?;
    Ok(Some(Box::new(signer)))
}

fn cmd_make_evidence(run_dir: &std::path::Path, intent_id: Option<String>) -> Result<(), SolverError> {
    let identity = solver_core::SolverIdentity {
        service: "solver-cli".to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        git_commit: None,
    };
    let digest = commands::make_evidence(run_dir, intent_id, identity)?;
    println!("{digest}");
    Ok(())
}

fn cmd_validate_evidence(path: &std::path::Path) -> Result<(), SolverError> {
    let outcome = commands::validate_evidence(path);
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "valid": outcome.valid,
        "errors": outcome.errors.iter().map(|e| serde_json::json!({
            "code": e.code,
            "message": e.message,
            "path": e.path,
        })).collect::<Vec<_>>(),
    })).unwrap());

    if outcome.valid {
        Ok(())
    } else {
        Err(SolverError::new(
            solver_error::ErrorCode::HashMismatch,
            format!("evidence bundle failed validation ({} error(s))", outcome.errors.len()),
        ))
    }
}
