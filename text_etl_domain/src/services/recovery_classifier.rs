// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error-Recovery Classifier
//!
//! Deterministic keyword-driven mapping from an error message to a
//! [`RecoveryStrategy`]. The keyword table is precomputed and scanned in a
//! fixed order; the first matching group decides, and anything unmatched
//! falls back to retry.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One of the four recovery strategies the recovery service can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStrategy {
    Retry,
    Skip,
    Fallback,
    Rollback,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::Skip => "skip",
            RecoveryStrategy::Fallback => "fallback",
            RecoveryStrategy::Rollback => "rollback",
        };
        write!(f, "{}", name)
    }
}

/// Ordered keyword groups; first hit wins.
static KEYWORD_TABLE: Lazy<Vec<(&'static [&'static str], RecoveryStrategy)>> = Lazy::new(|| {
    vec![
        (
            &["memory", "oom", "out of memory"][..],
            RecoveryStrategy::Fallback,
        ),
        (&["timeout", "timed out"][..], RecoveryStrategy::Retry),
        (
            &["permission", "access denied", "file not found", "ioerror"][..],
            RecoveryStrategy::Skip,
        ),
        (
            &["connection", "network", "ssl", "cert"][..],
            RecoveryStrategy::Retry,
        ),
        (
            &["database", "sql", "query"][..],
            RecoveryStrategy::Rollback,
        ),
    ]
});

/// Selects the strategy for an error message.
pub fn classify(error_message: &str) -> RecoveryStrategy {
    let lowered = error_message.to_lowercase();
    for (keywords, strategy) in KEYWORD_TABLE.iter() {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return *strategy;
        }
    }
    RecoveryStrategy::Retry
}

/// Ordered strategy list for per-document recovery; the recovery service
/// tries these until one succeeds.
pub fn priority_list(error_message: &str) -> Vec<RecoveryStrategy> {
    let lowered = error_message.to_lowercase();
    if lowered.contains("corrupted") || lowered.contains("malformed") {
        vec![RecoveryStrategy::Skip]
    } else if lowered.contains("memory") || lowered.contains("oom") {
        vec![
            RecoveryStrategy::Fallback,
            RecoveryStrategy::Retry,
            RecoveryStrategy::Skip,
        ]
    } else {
        vec![
            RecoveryStrategy::Retry,
            RecoveryStrategy::Fallback,
            RecoveryStrategy::Skip,
        ]
    }
}
