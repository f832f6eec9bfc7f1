//! CLI error types and exit codes.

use diskwatch_core::ConfigError;

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other startup errors
    pub const GENERAL_ERROR: i32 = 1;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Host-level check failures are not errors; a run with failed hosts
    /// still exits 0 and reports them in the summary.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// True when the configuration file itself is missing, which warrants
    /// pointing the user at the example file
    pub const fn is_missing_config(&self) -> bool {
        matches!(self, Self::Config(ConfigError::NotFound(_)))
    }
}
