// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Static Security Validator
//!
//! Line-level lexical analysis over user script source. Three deny-lists
//! are enforced: imported modules, free-function calls, and attribute
//! access. Every syntactic occurrence is flagged, including ones inside
//! strings or comments - the validator errs on the side of rejection, and
//! the sandbox's restricted builtins back it up at runtime.
//!
//! `validate` returns the ordered list of violation descriptions; an empty
//! list means the script is admissible.

use once_cell::sync::Lazy;
use regex::Regex;

use text_etl_domain::error::EtlError;

/// Modules whose import is rejected.
const DENIED_MODULES: &[&str] = &[
    "os",
    "subprocess",
    "sys",
    "importlib",
    "socket",
    "urllib",
    "requests",
    "pickle",
    "marshal",
    "shutil",
    "glob",
    "ftplib",
    "smtplib",
    "telnetlib",
    "xmlrpc",
    "ctypes",
    "multiprocessing",
    "threading",
    "concurrent",
    "asyncio",
    "platform",
    "resource",
    "signal",
    "faulthandler",
    "pdb",
    "code",
    "trace",
    "profile",
    "cProfile",
    "pstats",
    "dis",
    "inspect",
    "traceback",
];

/// Free functions whose call is rejected.
const DENIED_FUNCTIONS: &[&str] = &[
    "exec",
    "eval",
    "compile",
    "execfile",
    "open",
    "file",
    "input",
    "raw_input",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "globals",
    "locals",
    "vars",
    "help",
    "dir",
    "type",
    "id",
    "memoryview",
    "bytearray",
];

/// Attribute names whose access or call is rejected.
const DENIED_ATTRIBUTES: &[&str] = &[
    "__import__",
    "__build_class__",
    "__loader__",
    "__spec__",
    "__dict__",
    "__class__",
    "__bases__",
    "__mro__",
    "__subclasses__",
    "__globals__",
    "__code__",
    "__closure__",
    "__func__",
    "system",
    "popen",
    "exec",
    "eval",
    "compile",
    "open",
    "read",
    "write",
    "remove",
    "unlink",
    "rmdir",
    "makedirs",
    "mkdir",
    "chmod",
    "chown",
];

static FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| {
    let names = DENIED_FUNCTIONS.join("|");
    // Free call: not preceded by a dot or identifier character
    Regex::new(&format!(r"(?:^|[^\w.])({})\s*\(", names)).expect("function pattern is valid")
});

static ATTRIBUTE_ACCESS: Lazy<Regex> = Lazy::new(|| {
    let names = DENIED_ATTRIBUTES.join("|");
    Regex::new(&format!(r"\.\s*({})\b", names)).expect("attribute pattern is valid")
});

/// Static analyzer over user script source.
pub struct SecurityValidator;

impl SecurityValidator {
    /// Returns the ordered list of security violations; empty means
    /// admissible.
    pub fn validate(source: &str) -> Vec<String> {
        let mut violations = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let stripped = line.trim();

            if let Some(module) = denied_import(stripped) {
                violations.push(format!("Line {}: dangerous import: {}", line_no, module));
            }

            for caps in FUNCTION_CALL.captures_iter(stripped) {
                if let Some(name) = caps.get(1) {
                    violations.push(format!(
                        "Line {}: dangerous function call: {}",
                        line_no,
                        name.as_str()
                    ));
                }
            }

            for caps in ATTRIBUTE_ACCESS.captures_iter(stripped) {
                if let Some(name) = caps.get(1) {
                    violations.push(format!(
                        "Line {}: dangerous attribute access: {}",
                        line_no,
                        name.as_str()
                    ));
                }
            }

            // Dunder escapes are rejected anywhere they appear, even
            // without a leading dot
            for dunder in DENIED_ATTRIBUTES.iter().filter(|a| a.starts_with("__")) {
                if stripped.contains(dunder) && !violations.iter().any(|v| {
                    v.starts_with(&format!("Line {}:", line_no)) && v.ends_with(dunder)
                }) {
                    violations.push(format!(
                        "Line {}: dangerous attribute access: {}",
                        line_no, dunder
                    ));
                }
            }
        }

        violations
    }

    /// Validates, turning violations into a `SecurityViolation` error.
    pub fn ensure_admissible(source: &str) -> Result<(), EtlError> {
        let violations = Self::validate(source);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(EtlError::SecurityViolation(violations.join("; ")))
        }
    }
}

/// The first denied module named by an import line, if any.
fn denied_import(stripped: &str) -> Option<&'static str> {
    let modules: Vec<&str> = if let Some(rest) = stripped.strip_prefix("import ") {
        rest.split(',')
            .map(|part| part.trim().split_whitespace().next().unwrap_or(""))
            .collect()
    } else if let Some(rest) = stripped.strip_prefix("from ") {
        vec![rest.split_whitespace().next().unwrap_or("")]
    } else {
        return None;
    };

    for module in modules {
        let root = module.split('.').next().unwrap_or("");
        if let Some(denied) = DENIED_MODULES.iter().find(|m| **m == root) {
            return Some(*denied);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_script_is_admissible() {
        let source = "result = input_text.upper()\ncount = len(result)";
        assert!(SecurityValidator::validate(source).is_empty());
        assert!(SecurityValidator::ensure_admissible(source).is_ok());
    }

    #[test]
    fn test_every_denied_module_is_rejected() {
        for module in DENIED_MODULES {
            let source = format!("import {}", module);
            let violations = SecurityValidator::validate(&source);
            assert!(
                violations.iter().any(|v| v.contains(module)),
                "import {} not rejected",
                module
            );
        }
    }

    #[test]
    fn test_from_import_is_rejected() {
        let violations = SecurityValidator::validate("from subprocess import run");
        assert!(violations.iter().any(|v| v.contains("subprocess")));
        let violations = SecurityValidator::validate("from os.path import join");
        assert!(violations.iter().any(|v| v.contains("os")));
    }

    #[test]
    fn test_every_denied_function_is_rejected() {
        for function in DENIED_FUNCTIONS {
            let source = format!("x = {}('arg')", function);
            let violations = SecurityValidator::validate(&source);
            assert!(
                violations.iter().any(|v| v.contains(function)),
                "call to {} not rejected",
                function
            );
        }
    }

    #[test]
    fn test_method_call_is_not_a_free_function_call() {
        // .read( is caught by the attribute rule, not the free-call rule
        let violations = SecurityValidator::validate("f.read()");
        assert!(violations.iter().all(|v| v.contains("attribute")));
        assert!(!violations.is_empty());
    }

    #[test]
    fn test_dangerous_attribute_access() {
        for attribute in ["system", "popen", "__subclasses__", "__globals__"] {
            let source = format!("target.{}", attribute);
            let violations = SecurityValidator::validate(&source);
            assert!(
                violations.iter().any(|v| v.contains(attribute)),
                "attribute {} not rejected",
                attribute
            );
        }
    }

    #[test]
    fn test_dunder_without_dot_is_rejected() {
        let violations = SecurityValidator::validate("__import__('os')");
        assert!(violations.iter().any(|v| v.contains("__import__")));
    }

    #[test]
    fn test_violations_carry_line_numbers_in_order() {
        let source = "x = 1\nimport os\ny = eval('2')";
        let violations = SecurityValidator::validate(source);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].starts_with("Line 2:"));
        assert!(violations[1].starts_with("Line 3:"));
    }

    #[test]
    fn test_safe_lookalikes_pass() {
        // Substrings of denied names must not trigger
        let source = "osmosis = 1\nmy_open_count = 2\ntyped = str(3)";
        assert!(SecurityValidator::validate(source).is_empty());
    }
}
