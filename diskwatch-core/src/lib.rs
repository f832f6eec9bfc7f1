//! `diskwatch` Core Library
//!
//! This crate provides the core functionality for the `diskwatch` remote
//! disk usage monitor: SSH session management with bounded retry, parsing
//! and threshold evaluation of `df -h` output, multi-channel alert dispatch,
//! and the per-host check orchestration.
//!
//! # Crate Structure
//!
//! - [`config`] - YAML configuration loading and validation
//! - [`session`] - SSH session establishment, retry policy, command execution
//! - [`usage`] - Disk usage parsing and threshold evaluation
//! - [`alert`] - Alert events and the multi-channel dispatcher (email, Slack)
//! - [`monitor`] - The per-host check pipeline and run summary

#![warn(missing_docs)]

pub mod alert;
pub mod config;
pub mod monitor;
pub mod session;
pub mod usage;

pub use alert::{
    AlertChannel, AlertDispatcher, AlertEvent, ChannelError, ChannelFailure, DispatchReport,
    EmailChannel, Severity, SlackChannel,
};
pub use config::{
    AlertSettings, AuthMethod, ConfigError, ConfigResult, EmailSettings, MonitorConfig,
    ServerTarget, SlackSettings, SshSettings,
};
pub use monitor::{
    connection_failure_alert, threshold_alert, CheckOutcome, Monitor, RunSummary,
};
pub use session::{
    connect_with_retry, with_retry, CommandOutput, ConnectError, ExecError, RetryPolicy,
    SshSession, DEFAULT_MAX_ATTEMPTS,
};
pub use usage::{format_alert_body, over_threshold, parse_df_output, UsageRecord, DF_COMMAND};
