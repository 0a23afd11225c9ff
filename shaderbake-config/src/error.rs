use std::path::PathBuf;
use thiserror::Error;

use shaderbake_common::ParseTargetError;

/// Errors produced while reading a shader list configuration.
///
/// Line numbers are 1-based, matching the `<config>(<line>,0)` prefix the
/// driver prints so messages are clickable in IDE output windows.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the config file could not be read")]
    IOError(PathBuf, #[source] std::io::Error),
    #[error("unexpected '#endif'")]
    UnexpectedEndif { line: u32 },
    #[error("unexpected '#else'")]
    UnexpectedElse { line: u32 },
    #[error("missing '}}'")]
    MissingClosingBrace { line: u32 },
    #[error("empty config line after expansion")]
    EmptyLine { line: u32 },
    #[error("unrecognized element in the config line: '{token}'")]
    UnrecognizedToken { line: u32, token: String },
    #[error("missing value for '{flag}'")]
    MissingValue { line: u32, flag: &'static str },
    #[error("shader target not specified")]
    MissingProfile { line: u32 },
    #[error("invalid optimization level '{value}'")]
    InvalidOptimizationLevel { line: u32, value: String },
    #[error("{source}")]
    InvalidTarget {
        line: u32,
        #[source]
        source: ParseTargetError,
    },
}

impl ConfigError {
    /// 1-based config line the error occurred on, if any.
    pub fn line(&self) -> Option<u32> {
        match self {
            ConfigError::IOError(..) => None,
            ConfigError::UnexpectedEndif { line }
            | ConfigError::UnexpectedElse { line }
            | ConfigError::MissingClosingBrace { line }
            | ConfigError::EmptyLine { line }
            | ConfigError::UnrecognizedToken { line, .. }
            | ConfigError::MissingValue { line, .. }
            | ConfigError::MissingProfile { line }
            | ConfigError::InvalidOptimizationLevel { line, .. }
            | ConfigError::InvalidTarget { line, .. } => Some(*line),
        }
    }
}
