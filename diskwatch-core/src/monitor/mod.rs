//! Check orchestration across the configured fleet
//!
//! Drives the per-host pipeline (connect with retry, run the disk-usage
//! command, parse, evaluate, alert) strictly sequentially and aggregates a
//! run-level summary. Hosts are isolated: one host failing never aborts the
//! run or affects another host's check.

use std::time::Duration;

use crate::alert::{AlertDispatcher, AlertEvent, Severity};
use crate::config::{MonitorConfig, ServerTarget};
use crate::session::{connect_with_retry, CommandOutput, ExecError, RetryPolicy};
use crate::usage::{self, UsageRecord, DF_COMMAND};

/// Success/failure counts for one monitoring run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Hosts whose check completed through evaluation
    pub succeeded: usize,
    /// Hosts that failed at any stage
    pub failed: usize,
}

impl RunSummary {
    /// Total number of hosts processed
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    fn record(&mut self, outcome: &CheckOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Terminal state of one host's check within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Evaluation completed; `alerted` is set when the threshold was
    /// breached. Alerting is a side effect, not a failure mode.
    Completed {
        /// Whether a threshold alert was emitted
        alerted: bool,
    },
    /// Retry budget exhausted; a critical alert was emitted and no parsing
    /// or evaluation occurred
    ConnectFailed,
    /// The remote command failed or could not be run; no alert
    CommandFailed,
    /// The command succeeded but produced no parseable rows; no alert
    NothingParsed,
}

impl CheckOutcome {
    /// True iff the host counts as a run success
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Builds the alert emitted when a host's retry budget is exhausted
pub fn connection_failure_alert(host: &str) -> AlertEvent {
    AlertEvent::new(
        format!("Connection Failed: {host}"),
        format!(
            "Failed to connect to server {host}\n\
             Please check network connectivity and SSH credentials."
        ),
        Severity::Critical,
        host,
    )
}

/// Builds the alert emitted when filesystems exceed the threshold
pub fn threshold_alert(host: &str, exceeding: &[UsageRecord], threshold: u8) -> AlertEvent {
    AlertEvent::new(
        format!("Disk Usage Alert: {host}"),
        usage::format_alert_body(host, exceeding, threshold),
        Severity::Warning,
        host,
    )
}

/// Orchestrates disk usage checks across all configured servers
pub struct Monitor {
    config: MonitorConfig,
    dispatcher: AlertDispatcher,
}

impl Monitor {
    /// Creates a monitor, instantiating alert channels from the config
    pub fn new(config: MonitorConfig) -> Self {
        let dispatcher = AlertDispatcher::from_settings(&config.alerts);
        Self { config, dispatcher }
    }

    /// Creates a monitor with an explicit dispatcher
    pub fn with_dispatcher(config: MonitorConfig, dispatcher: AlertDispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Checks every configured server in declaration order.
    ///
    /// Hosts are processed strictly sequentially; alert delivery for a host
    /// completes before the next host's check starts. Individual host
    /// failures are absorbed into the summary, never propagated.
    pub async fn run(&self) -> RunSummary {
        tracing::info!(
            servers = self.config.servers.len(),
            threshold = self.config.threshold,
            "Starting disk monitoring"
        );

        let mut summary = RunSummary::default();
        for server in &self.config.servers {
            let outcome = self.check_host(server).await;
            summary.record(&outcome);
        }

        tracing::info!(
            "Monitoring complete: {} successful, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }

    /// Runs the full pipeline for one host
    async fn check_host(&self, target: &ServerTarget) -> CheckOutcome {
        tracing::info!(host = %target.host, "Checking server");

        let policy = RetryPolicy::new(self.config.ssh.retry_attempts);
        let timeout =
            Duration::from_secs(target.effective_timeout_secs(self.config.ssh.timeout));

        let session = match connect_with_retry(target, policy, timeout).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(host = %target.host, error = %err, "Connection failed");
                let event = connection_failure_alert(&target.host);
                self.dispatcher.dispatch(&event).await;
                return CheckOutcome::ConnectFailed;
            }
        };

        let result = session.execute(DF_COMMAND).await;
        session.close().await;

        let (outcome, alert) = self.evaluate(&target.host, result);
        if let Some(event) = alert {
            self.dispatcher.dispatch(&event).await;
        }
        outcome
    }

    /// Maps a command result to an outcome and an optional alert.
    ///
    /// A non-zero remote exit is a command-execution problem, not a
    /// reachability problem, so it records a failure without alerting.
    /// Likewise an empty parse result fails the host with a diagnostic
    /// only.
    fn evaluate(
        &self,
        host: &str,
        result: Result<CommandOutput, ExecError>,
    ) -> (CheckOutcome, Option<AlertEvent>) {
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(host, error = %err, "Failed to run disk usage command");
                return (CheckOutcome::CommandFailed, None);
            }
        };

        if !output.success {
            tracing::error!(host, stderr = %output.stderr, "Disk usage command failed");
            return (CheckOutcome::CommandFailed, None);
        }

        let records = usage::parse_df_output(&output.stdout);
        if records.is_empty() {
            tracing::warn!(host, "No disk usage data parsed");
            return (CheckOutcome::NothingParsed, None);
        }

        let exceeding = usage::over_threshold(&records, self.config.threshold);
        if exceeding.is_empty() {
            (CheckOutcome::Completed { alerted: false }, None)
        } else {
            let event = threshold_alert(host, &exceeding, self.config.threshold);
            (CheckOutcome::Completed { alerted: true }, Some(event))
        }
    }
}
