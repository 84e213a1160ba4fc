// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Parkdesk.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ErrorClass, ErrorCode};

/// Top-level error type for all printer driver operations.
#[derive(Debug, Error)]
pub enum PrinterError {
    // -- Connection errors --
    #[error("no printer device found: {0}")]
    DeviceNotFound(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("printer is not connected")]
    NotConnected,

    // -- Execution errors --
    #[error("write to printer failed: {0}")]
    Write(String),

    #[error("print spooler error: {0}")]
    Spooler(String),

    // -- Queue --
    #[error("print queue is full ({0} jobs)")]
    QueueFull(usize),

    // -- Configuration --
    #[error("invalid printer configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PrinterError {
    /// Which recovery policy applies to this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DeviceNotFound(_)
            | Self::Connection(_)
            | Self::Timeout(_)
            | Self::NotConnected => ErrorClass::Connection,
            Self::Write(_) | Self::Spooler(_) | Self::Io(_) => ErrorClass::Execution,
            Self::QueueFull(_) => ErrorClass::Queue,
            Self::InvalidConfig(_) | Self::Serialization(_) => ErrorClass::Configuration,
        }
    }

    /// Machine-readable code reported alongside the error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DeviceNotFound(_) => ErrorCode::DeviceNotFound,
            Self::Connection(_) | Self::Timeout(_) | Self::NotConnected => {
                ErrorCode::ConnectionFailed
            }
            Self::Write(_) | Self::Spooler(_) | Self::Io(_) => ErrorCode::WriteFailed,
            Self::QueueFull(_) => ErrorCode::QueueFull,
            Self::InvalidConfig(_) | Self::Serialization(_) => ErrorCode::InvalidConfig,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrinterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_connection_class() {
        assert_eq!(
            PrinterError::DeviceNotFound("/dev/usb/lp0".into()).class(),
            ErrorClass::Connection
        );
        assert_eq!(
            PrinterError::Timeout(Duration::from_secs(5)).class(),
            ErrorClass::Connection
        );
    }

    #[test]
    fn write_failures_are_execution_class() {
        let err = PrinterError::Write("paper out".into());
        assert_eq!(err.class(), ErrorClass::Execution);
        assert_eq!(err.code(), ErrorCode::WriteFailed);
    }

    #[test]
    fn queue_full_has_its_own_class() {
        let err = PrinterError::QueueFull(50);
        assert_eq!(err.class(), ErrorClass::Queue);
        assert_eq!(err.to_string(), "print queue is full (50 jobs)");
    }

    #[test]
    fn bad_settings_are_not_connection_failures() {
        let err = PrinterError::InvalidConfig("columns must be positive".into());
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(
            PrinterError::NotConnected.class(),
            ErrorClass::Connection
        );
    }

    #[test]
    fn timeout_message_in_millis() {
        let err = PrinterError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "connection timed out after 1500ms");
    }
}
