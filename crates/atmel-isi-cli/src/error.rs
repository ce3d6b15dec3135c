// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Requested format cannot be produced by the sensor and controller
    FormatRejected(String),
    /// Buffer or descriptor resources exhausted
    Resources(String),
    /// Controller busy (stream running, sensor attached)
    Busy(String),
    /// Hardware handshake timed out
    Timeout(String),
    /// General error from the capture core
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::FormatRejected(msg) => write!(f, "Format rejected: {}", msg),
            CliError::Resources(msg) => write!(f, "Out of resources: {}", msg),
            CliError::Busy(msg) => write!(f, "Busy: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::General(_) => 1,
            CliError::InvalidArgs(_) => 2,
            CliError::FormatRejected(_) => 3,
            CliError::Resources(_) => 4,
            CliError::Busy(_) => 5,
            CliError::Timeout(_) => 6,
        }
    }
}

/// Map atmel_isi::Error to CliError with appropriate exit codes
impl From<atmel_isi::Error> for CliError {
    fn from(err: atmel_isi::Error) -> Self {
        use atmel_isi::Error;

        match err {
            Error::InvalidFormat(_) | Error::Sensor(_) => CliError::FormatRejected(err.to_string()),
            Error::BufferTooSmall { .. } | Error::NoDescriptors => {
                CliError::Resources(err.to_string())
            }
            Error::Busy => CliError::Busy(err.to_string()),
            Error::Timeout(_) => CliError::Timeout(err.to_string()),
            Error::InvalidArgument(msg) => CliError::InvalidArgs(msg),
            Error::InvalidState(_) | Error::UnknownBuffer(_) => CliError::General(err.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
