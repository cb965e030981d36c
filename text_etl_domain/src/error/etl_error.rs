// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the error taxonomy for the text ETL domain. Errors
//! are organized by failure category so that the error-recovery service can
//! select a strategy, and so that user-visible reports carry a stable kind.
//!
//! ## Error Categories
//!
//! - **Configuration**: `InvalidConfiguration`, `ValidationError` - surfaced,
//!   never retried.
//! - **Format**: `UnsupportedFormat` - loader dispatch failed.
//! - **Resources**: `ResourceExhausted` - memory or CPU threshold reached;
//!   routes to fallback.
//! - **I/O**: `IoError` - filesystem or network access; routes to skip or
//!   retry depending on the message.
//! - **Security**: `SecurityViolation` (static analysis rejection),
//!   `IntegrityError` (checksum mismatch) - surfaced, not recovered.
//! - **Scripts**: `ScriptTimeout`, `ScriptExecutionError` - from the sandbox.
//! - **Database**: `DatabaseError` - routes to rollback.
//! - **Control**: `Cancelled` - cooperative exit, not a failure.
//! - **Catch-all**: `InternalError` - default retry.
//!
//! ## Usage
//!
//! Domain and application code return `Result<T, EtlError>` and propagate
//! with `?`. Each error converts to a structured [`ErrorRecord`] for run
//! logs and user-visible reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors raised by the ETL engine.
///
/// The variant set mirrors the engine's failure taxonomy; `kind()` returns
/// the stable string used in persisted run errors and log entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EtlError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Integrity check failed: {0}")]
    IntegrityError(String),

    #[error("Security violation: {0}")]
    SecurityViolation(String),

    #[error("Script execution timed out after {0} seconds")]
    ScriptTimeout(u64),

    #[error("Script execution failed: {0}")]
    ScriptExecutionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EtlError {
    /// Stable kind string for persisted errors and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::InvalidConfiguration(_) => "config_invalid",
            EtlError::UnsupportedFormat(_) => "unsupported_format",
            EtlError::ResourceExhausted(_) => "resource_exhaustion",
            EtlError::IoError(_) => "io_failure",
            EtlError::IntegrityError(_) => "integrity_error",
            EtlError::SecurityViolation(_) => "security_violation",
            EtlError::ScriptTimeout(_) => "script_timeout",
            EtlError::ScriptExecutionError(_) => "script_execution_error",
            EtlError::DatabaseError(_) => "database_error",
            EtlError::SerializationError(_) => "serialization_error",
            EtlError::ValidationError(_) => "validation_error",
            EtlError::NotFound(_) => "not_found",
            EtlError::Cancelled(_) => "cancellation_requested",
            EtlError::InternalError(_) => "unknown",
        }
    }

    /// Whether the error represents a cooperative cancellation rather than
    /// a genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EtlError::Cancelled(_))
    }

    /// Whether automated recovery may be attempted for this error.
    ///
    /// Configuration and security failures are surfaced to the user and
    /// never retried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            EtlError::InvalidConfiguration(_)
                | EtlError::ValidationError(_)
                | EtlError::SecurityViolation(_)
                | EtlError::IntegrityError(_)
                | EtlError::Cancelled(_)
        )
    }

    /// Converts the error into a structured record for run logs.
    pub fn to_record(&self, stage: impl Into<String>) -> ErrorRecord {
        ErrorRecord {
            timestamp: Utc::now(),
            kind: self.kind().to_string(),
            message: self.to_string(),
            stage: stage.into(),
        }
    }
}

/// Uniform `{kind, message, stage, timestamp}` record attached to runs
/// and log entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub stage: String,
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::SerializationError(err.to_string())
    }
}

impl From<regex::Error> for EtlError {
    fn from(err: regex::Error) -> Self {
        EtlError::ValidationError(format!("invalid pattern: {}", err))
    }
}
