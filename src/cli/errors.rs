//! CLI-specific error types
//!
//! Each code maps to its own process exit status so scripts can tell a
//! misconfiguration from a disabled subsystem from an index failure.

use std::fmt;
use std::io;

use crate::search::{SearchError, SearchErrorCode};

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Config file missing or invalid
    ConfigError,
    /// Writing output failed
    IoError,
    /// Search subsystem reported failure
    SearchFailed,
    /// Search disabled by configuration
    SearchDisabled,
}

impl CliErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "WEBLOG_CLI_CONFIG_ERROR",
            Self::IoError => "WEBLOG_CLI_IO_ERROR",
            Self::SearchFailed => "WEBLOG_CLI_SEARCH_FAILED",
            Self::SearchDisabled => "WEBLOG_CLI_SEARCH_DISABLED",
        }
    }

    /// Process exit status for this code
    pub fn exit_status(self) -> i32 {
        match self {
            Self::SearchFailed => 1,
            Self::ConfigError => 2,
            Self::SearchDisabled => 3,
            Self::IoError => 4,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    detail: String,
    source: Option<SearchError>,
}

impl CliError {
    fn with_detail(code: CliErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            source: None,
        }
    }

    pub fn config_error(detail: impl Into<String>) -> Self {
        Self::with_detail(CliErrorCode::ConfigError, detail)
    }

    pub fn search_disabled() -> Self {
        Self::with_detail(
            CliErrorCode::SearchDisabled,
            "search_enabled is false in the configuration",
        )
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn exit_status(&self) -> i32 {
        self.code.exit_status()
    }

    /// Underlying search error, if this came from the subsystem
    pub fn search_error(&self) -> Option<&SearchError> {
        self.source.as_ref()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.code.as_str(), source),
            None => write!(f, "{}: {}", self.code.as_str(), self.detail),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::with_detail(CliErrorCode::IoError, format!("output: {}", e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_detail(CliErrorCode::IoError, format!("encoding output: {}", e))
    }
}

impl From<SearchError> for CliError {
    fn from(e: SearchError) -> Self {
        let code = match e.code() {
            SearchErrorCode::ConfigInvalid => CliErrorCode::ConfigError,
            _ => CliErrorCode::SearchFailed,
        };
        Self {
            code,
            detail: String::new(),
            source: Some(e),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
