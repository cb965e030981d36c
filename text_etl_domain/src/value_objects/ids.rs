// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Typed Entity Identifiers
//!
//! Strongly-typed identifiers for domain entities, built on ULIDs for
//! time-ordered creation sequence.
//!
//! ## Why Typed IDs
//!
//! - **Type Safety**: a `PipelineId` cannot be confused with a `RunId` or
//!   `ScriptId` in function signatures.
//! - **Temporal Ordering**: ULID-based identifiers sort chronologically,
//!   which gives natural ordering for audit trails and run history.
//! - **Interoperability**: string representation (`<category>_<ulid>`)
//!   round-trips through JSON and TEXT database columns.
//!
//! Identifiers loaded from external configuration files may carry arbitrary
//! non-empty values (users name their pipelines); only freshly generated
//! identifiers follow the prefixed ULID form.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::EtlError;

/// Category tag for a typed identifier.
pub trait IdCategory: Clone + Eq + Ord + std::hash::Hash {
    /// Prefix used when generating fresh identifiers, e.g. `"pipeline"`.
    fn category_name() -> &'static str;
}

/// Generic identifier wrapper parameterized by entity category.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent, bound(serialize = "", deserialize = ""))]
pub struct TypedId<C: IdCategory> {
    value: String,
    #[serde(skip)]
    _category: PhantomData<C>,
}

impl<C: IdCategory> TypedId<C> {
    /// Generates a fresh identifier with the current timestamp.
    pub fn new() -> Self {
        Self {
            value: format!("{}_{}", C::category_name(), Ulid::new().to_string().to_lowercase()),
            _category: PhantomData,
        }
    }

    /// Wraps an existing identifier string.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::ValidationError` when the value is empty.
    pub fn parse(value: impl Into<String>) -> Result<Self, EtlError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(EtlError::ValidationError(format!(
                "{} id cannot be empty",
                C::category_name()
            )));
        }
        Ok(Self {
            value,
            _category: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<C: IdCategory> Default for TypedId<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: IdCategory> fmt::Display for TypedId<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $marker:ident, $category:literal) => {
        $(#[$doc])*
        pub type $name = TypedId<$marker>;

        #[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $marker;

        impl IdCategory for $marker {
            fn category_name() -> &'static str {
                $category
            }
        }
    };
}

define_id!(
    /// Identifier of a pipeline configuration.
    PipelineId, PipelineMarker, "pipeline"
);
define_id!(
    /// Identifier of one pipeline execution.
    RunId, RunMarker, "run"
);
define_id!(
    /// Identifier of a stored user script.
    ScriptId, ScriptMarker, "script"
);
