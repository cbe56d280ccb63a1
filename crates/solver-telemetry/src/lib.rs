// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Structured logging initialization and a process-wide metrics registry.
//!
//! [`init_tracing`] mirrors the daemon's own `tracing_subscriber::fmt` setup
//! (env-filter driven, an optional JSON layer for machine-readable logs).
//! [`Metrics`] generalizes the runtime's atomic run counters to the solver's
//! own events (refusals, runs, append-log writes) and renders itself as
//! Prometheus exposition text for `HttpApi`'s `/metrics` endpoint.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber.
///
/// `debug` widens the default filter to `solver=debug`; both modes honor
/// `RUST_LOG` if set, taking precedence over the built-in default. `json`
/// switches the output layer from human-readable to newline-delimited JSON.
///
/// Must be called at most once per process; a second call is a no-op logged
/// at `warn` level by `tracing_subscriber` itself.
pub fn init_tracing(debug: bool, json: bool) {
    let default_filter = if debug { "solver=debug" } else { "solver=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

/// Process-wide counters for the solver pipeline.
///
/// Every field is an independent [`AtomicU64`] updated with `Relaxed`
/// ordering: these are monotonic counts for observability, not
/// synchronization primitives, so no ordering beyond atomicity is needed.
#[derive(Debug, Default)]
pub struct Metrics {
    runs_total: AtomicU64,
    runs_succeeded_total: AtomicU64,
    runs_failed_total: AtomicU64,
    refusals_total: AtomicU64,
    receipts_written_total: AtomicU64,
    append_log_writes_total: AtomicU64,
    append_log_lock_timeouts_total: AtomicU64,
    evidence_validation_failures_total: AtomicU64,
}

impl Metrics {
    /// Create a new, zero-initialized registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed job run, by outcome.
    pub fn record_run(&self, succeeded: bool) {
        self.runs_total.fetch_add(1, Relaxed);
        if succeeded {
            self.runs_succeeded_total.fetch_add(1, Relaxed);
        } else {
            self.runs_failed_total.fetch_add(1, Relaxed);
        }
    }

    /// Record a policy refusal.
    pub fn record_refusal(&self) {
        self.refusals_total.fetch_add(1, Relaxed);
    }

    /// Record a receipt persisted to the receipts log.
    pub fn record_receipt_written(&self) {
        self.receipts_written_total.fetch_add(1, Relaxed);
    }

    /// Record a successful append-only log write.
    pub fn record_append_log_write(&self) {
        self.append_log_writes_total.fetch_add(1, Relaxed);
    }

    /// Record an append-only log lock-acquisition timeout.
    pub fn record_append_log_lock_timeout(&self) {
        self.append_log_lock_timeouts_total.fetch_add(1, Relaxed);
    }

    /// Record an evidence bundle that failed [`EvidenceValidator`](../solver_evidence/struct.EvidenceValidator.html) checks.
    pub fn record_evidence_validation_failure(&self) {
        self.evidence_validation_failures_total.fetch_add(1, Relaxed);
    }

    /// Take a point-in-time, plain-value snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_total: self.runs_total.load(Relaxed),
            runs_succeeded_total: self.runs_succeeded_total.load(Relaxed),
            runs_failed_total: self.runs_failed_total.load(Relaxed),
            refusals_total: self.refusals_total.load(Relaxed),
            receipts_written_total: self.receipts_written_total.load(Relaxed),
            append_log_writes_total: self.append_log_writes_total.load(Relaxed),
            append_log_lock_timeouts_total: self.append_log_lock_timeouts_total.load(Relaxed),
            evidence_validation_failures_total: self.evidence_validation_failures_total.load(Relaxed),
        }
    }

    /// Render the current values as Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        self.snapshot().render_prometheus()
    }
}

/// A non-atomic, serializable snapshot of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total job runs attempted.
    pub runs_total: u64,
    /// Job runs that completed successfully.
    pub runs_succeeded_total: u64,
    /// Job runs that failed.
    pub runs_failed_total: u64,
    /// Intents refused by the policy gate.
    pub refusals_total: u64,
    /// Receipts appended to the receipts log.
    pub receipts_written_total: u64,
    /// Successful append-only log writes, across both logs.
    pub append_log_writes_total: u64,
    /// Append-only log lock-acquisition timeouts.
    pub append_log_lock_timeouts_total: u64,
    /// Evidence bundles that failed validation.
    pub evidence_validation_failures_total: u64,
}

const HELP_AND_TYPE: &[(&str, &str, &str)] = &[
    ("solver_runs_total", "Total job runs attempted.", "counter"),
    ("solver_runs_succeeded_total", "Job runs that completed successfully.", "counter"),
    ("solver_runs_failed_total", "Job runs that failed.", "counter"),
    ("solver_refusals_total", "Intents refused by the policy gate.", "counter"),
    ("solver_receipts_written_total", "Receipts appended to the receipts log.", "counter"),
    ("solver_append_log_writes_total", "Successful append-only log writes.", "counter"),
    ("solver_append_log_lock_timeouts_total", "Append-only log lock-acquisition timeouts.", "counter"),
    ("solver_evidence_validation_failures_total", "Evidence bundles that failed validation.", "counter"),
];

impl MetricsSnapshot {
    /// Render as Prometheus text exposition format (one `# HELP`/`# TYPE`
    /// pair and one sample line per metric, in declaration order).
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let values = [
            self.runs_total,
            self.runs_succeeded_total,
            self.runs_failed_total,
            self.refusals_total,
            self.receipts_written_total,
            self.append_log_writes_total,
            self.append_log_lock_timeouts_total,
            self.evidence_validation_failures_total,
        ];

        let mut out = String::new();
        for ((name, help, kind), value) in HELP_AND_TYPE.iter().zip(values) {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_snapshots_to_all_zeros() {
        let metrics = Metrics::new();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                runs_total: 0,
                runs_succeeded_total: 0,
                runs_failed_total: 0,
                refusals_total: 0,
                receipts_written_total: 0,
                append_log_writes_total: 0,
                append_log_lock_timeouts_total: 0,
                evidence_validation_failures_total: 0,
            }
        );
    }

    #[test]
    fn record_run_splits_into_succeeded_and_failed() {
        let metrics = Metrics::new();
        metrics.record_run(true);
        metrics.record_run(true);
        metrics.record_run(false);
        let snap = metrics.snapshot();
        assert_eq!(snap.runs_total, 3);
        assert_eq!(snap.runs_succeeded_total, 2);
        assert_eq!(snap.runs_failed_total, 1);
    }

    #[test]
    fn record_refusal_increments_refusals_total() {
        let metrics = Metrics::new();
        metrics.record_refusal();
        metrics.record_refusal();
        assert_eq!(metrics.snapshot().refusals_total, 2);
    }

    #[test]
    fn prometheus_render_includes_help_type_and_value_for_every_metric() {
        let metrics = Metrics::new();
        metrics.record_run(true);
        metrics.record_refusal();

        let text = metrics.render_prometheus();
        assert!(text.contains("# HELP solver_runs_total"));
        assert!(text.contains("# TYPE solver_runs_total counter"));
        assert!(text.contains("solver_runs_total 1"));
        assert!(text.contains("solver_refusals_total 1"));
        assert!(text.contains("solver_runs_failed_total 0"));
    }

    #[test]
    fn snapshot_is_a_stable_point_in_time_copy() {
        let metrics = Metrics::new();
        metrics.record_run(true);
        let snap = metrics.snapshot();
        metrics.record_run(true);
        assert_eq!(snap.runs_total, 1);
        assert_eq!(metrics.snapshot().runs_total, 2);
    }
}
