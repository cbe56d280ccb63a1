// SPDX-License-Identifier: MIT OR Apache-2.0
//! `solver-daemon` — the long-running HTTP front door for the solver/executor.
//!
//! Binds `/healthz`, `/metrics`, `/.well-known/agent-card.json`, and
//! `/execute` to a single [`solver_daemon::Pipeline`], shared across every
//! in-flight request. Shuts down gracefully on `SIGINT`/`SIGTERM`.

use clap::Parser;
use solver_core::{JobType, SolverIdentity};
use solver_daemon::{build_app, AgentCard, AppState, Pipeline};
use solver_jobs::JobRegistry;
use solver_policy::PolicyConfig;
use solver_telemetry::Metrics;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "solver-daemon", version, about = "Solver/executor HTTP control plane")]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: std::net::SocketAddr,

    /// Optional TOML configuration overlay; overrides environment variables.
    #[arg(long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Widen logging to debug level (honors `RUST_LOG` if set).
    #[arg(long)]
    debug: bool,

    /// Emit logs as newline-delimited JSON instead of human-readable text.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    solver_telemetry::init_tracing(cli.debug, cli.json_logs);

    let config = solver_config::load(cli.config.as_deref())?;
    let warnings = solver_config::validate(&config)?;
    for warning in &warnings {
        tracing::warn!(%warning, "configuration warning");
    }

    let policy_config = PolicyConfig {
        job_type_allowlist: config
            .job_type_allowlist
            .iter()
            .filter_map(|s| (s == JobType::SafeReport.as_str()).then_some(JobType::SafeReport))
            .collect(),
        max_artifact_mb: config.max_artifact_mb,
        requester_allowlist: config.requester_allowlist.clone(),
    };

    let identity = SolverIdentity {
        service: "solver-daemon".to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        git_commit: option_env!("VERGEN_GIT_SHA").map(str::to_string),
    };

    let signer = build_signer()?;
    let metrics = Arc::new(Metrics::new());
    let pipeline = Arc::new(Pipeline::new(
        config,
        policy_config,
        JobRegistry::with_reference_runners(),
        identity.clone(),
        signer,
        Box::new(solver_core::SystemClock),
        metrics.clone(),
    ));
    let agent_card = Arc::new(AgentCard::new(&identity));

    let app = build_app(AppState { pipeline, metrics, agent_card });

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    tracing::info!(addr = %cli.listen, "solver-daemon listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

fn build_signer() -> anyhow::Result<Option<Box<dyn solver_signer::SignerPort>>> {
    let Ok(hex_key) = std::env::var("SIGNER_PRIVATE_KEY_HEX") else {
        return Ok(None);
    };
    let signer = solver_signer::LocalSigner::from_hex(&hex_key)
        .map_err(|e| anyhow::anyhow!("failed to load SIGNER_PRIVATE_KEY_HEX: {e}"))?;
    Ok(Some(Box::new(signer)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
