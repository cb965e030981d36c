// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Script Subsystem Integration Test
//!
//! The full script path: encrypted save through the store, integrity
//! verification, sandboxed execution with timeout, and the security
//! validator's deny-list guarantees.

use std::time::Duration;

use serde_json::json;

use crate::common::{engine, python_available};
use text_etl::infrastructure::script::{ScriptSandbox, SecurityValidator};
use text_etl_domain::error::EtlError;

#[tokio::test]
async fn test_save_execute_round_trip() {
    if !python_available() {
        return;
    }
    let engine = engine().await;
    let id = engine
        .scripts
        .save_script("upper", "result = input[\"text\"].upper()", None)
        .await
        .unwrap();

    let sandbox = ScriptSandbox::new();
    let outcome = engine
        .scripts
        .validate_and_execute(&id, &json!({"input": {"text": "hi"}}), &sandbox)
        .await
        .unwrap();
    assert_eq!(outcome.value, json!("HI"));
}

#[tokio::test]
async fn test_denied_script_never_saves() {
    let engine = engine().await;
    let err = engine
        .scripts
        .save_script("bad", "import os\nresult = os.getcwd()", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "security_violation");
    assert!(engine.scripts.list_scripts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_terminates_child() {
    if !python_available() {
        return;
    }
    let sandbox = ScriptSandbox::new();
    let started = std::time::Instant::now();
    let err = sandbox
        .execute_with_timeout("while True: pass", &json!({}), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err, EtlError::ScriptTimeout(1));
    // Deadline plus grace, well under an unbounded hang
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_tampered_ciphertext_is_surfaced() {
    let engine = engine().await;
    let id = engine
        .scripts
        .save_script("victim", "result = 41 + 1", None)
        .await
        .unwrap();

    // Corrupt the stored ciphertext directly in the metadata store
    sqlx::query("UPDATE user_scripts SET code_encrypted = 'AAAABBBBCCCC' WHERE id = ?")
        .bind(id.as_str())
        .execute(engine.store.pool())
        .await
        .unwrap();

    let err = engine.scripts.load_script(&id).await.unwrap_err();
    assert_eq!(err.kind(), "integrity_error");
}

/// No false negatives for the enumerated deny-list: every listed module,
/// function, and attribute is rejected.
#[test]
fn test_deny_list_has_no_false_negatives() {
    let modules = [
        "os", "subprocess", "sys", "importlib", "socket", "urllib", "requests", "pickle",
        "marshal", "shutil", "ctypes", "multiprocessing", "threading", "concurrent", "ftplib",
        "smtplib",
    ];
    for module in modules {
        assert!(
            !SecurityValidator::validate(&format!("import {}", module)).is_empty(),
            "import {} must be rejected",
            module
        );
        assert!(
            !SecurityValidator::validate(&format!("from {} import x", module)).is_empty(),
            "from {} import must be rejected",
            module
        );
    }

    let functions = [
        "exec", "eval", "compile", "open", "input", "getattr", "setattr", "globals", "locals",
        "vars", "dir", "type", "id",
    ];
    for function in functions {
        assert!(
            !SecurityValidator::validate(&format!("{}(payload)", function)).is_empty(),
            "call to {} must be rejected",
            function
        );
    }

    let attributes = ["__import__", "__globals__", "__subclasses__", "system", "popen", "read", "write", "remove"];
    for attribute in attributes {
        assert!(
            !SecurityValidator::validate(&format!("target.{}(x)", attribute)).is_empty(),
            "attribute {} must be rejected",
            attribute
        );
    }
}

#[test]
fn test_admissible_script_shapes() {
    let sources = [
        "result = value * 2",
        "result = json.dumps({\"k\": 1})",
        "total = sum([1, 2, 3])\nresult = total",
        "result = re.findall(r\"[a-z]+\", text)",
    ];
    for source in sources {
        assert!(
            SecurityValidator::validate(source).is_empty(),
            "should admit: {}",
            source
        );
    }
}
