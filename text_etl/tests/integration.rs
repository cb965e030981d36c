//! Integration Tests
//!
//! This module aggregates all integration tests for the text ETL engine.

// Shared test helpers
mod common;

#[path = "integration/pipeline_lifecycle_test.rs"]
mod pipeline_lifecycle_test;

#[path = "integration/processor_chain_test.rs"]
mod processor_chain_test;

#[path = "integration/header_detection_test.rs"]
mod header_detection_test;

#[path = "integration/script_subsystem_test.rs"]
mod script_subsystem_test;

#[path = "integration/dispatcher_and_recovery_test.rs"]
mod dispatcher_and_recovery_test;
