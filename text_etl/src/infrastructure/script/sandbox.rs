// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Script Sandbox
//!
//! Executes admitted user scripts in an isolated child process (no shared
//! memory) running the Python interpreter with a trusted harness:
//!
//! - the harness installs a curated, read-only set of safe builtins plus
//!   the math / re / json / datetime / collections / string namespaces;
//! - the memory ceiling is applied with `resource.setrlimit` before user
//!   code runs;
//! - user stdout is redirected into a capture buffer;
//! - communication is two one-way channels: the request JSON goes down the
//!   child's stdin, exactly one result envelope comes back on stdout.
//!
//! The parent enforces the deadline: on expiry the child is terminated,
//! then killed after a grace timeout, and `ScriptTimeout` is raised. A
//! child-raised error surfaces as `ScriptExecutionError`. On normal
//! return the value bound to `result` is returned (or the captured stdout
//! when `result` is unset).

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use text_etl_domain::error::EtlError;

use super::validator::SecurityValidator;

/// Default per-script deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default memory ceiling for the child process.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 100;

/// Grace period between terminate and the final status reap.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Trusted harness executed by the child interpreter. Reads the request
/// envelope from stdin, confines user code, writes one JSON envelope to
/// stdout.
const HARNESS: &str = r#"
import sys, io, json, builtins
import math, re, datetime, collections, string

_SAFE_NAMES = [
    "len", "str", "int", "float", "bool", "list", "dict", "tuple", "set",
    "frozenset", "range", "enumerate", "zip", "map", "filter", "sum", "min",
    "max", "abs", "round", "sorted", "reversed", "any", "all", "pow",
    "divmod", "ord", "chr", "hex", "oct", "bin", "ascii", "repr", "format",
    "isinstance", "Exception", "ValueError", "TypeError", "KeyError",
    "IndexError", "AttributeError", "RuntimeError", "StopIteration",
    "True", "False", "None",
]

def _main():
    request = json.load(sys.stdin)
    limit_mb = request.get("memory_limit_mb", 100)
    try:
        import resource
        limit = int(limit_mb) * 1024 * 1024
        resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
    except Exception:
        pass

    safe_builtins = {name: getattr(builtins, name) for name in _SAFE_NAMES}
    safe_globals = {
        "__builtins__": safe_builtins,
        "math": math,
        "re": re,
        "json": json,
        "datetime": datetime,
        "collections": collections,
        "string": string,
    }
    local_env = dict(request.get("context", {}))

    capture = io.StringIO()
    real_stdout = sys.stdout
    sys.stdout = capture
    try:
        exec(compile(request["code"], "<user_script>", "exec"), safe_globals, local_env)
        result = local_env.get("result")
    except BaseException as exc:
        sys.stdout = real_stdout
        print(json.dumps({"err": "%s: %s" % (type(exc).__name__, exc)}))
        return
    finally:
        sys.stdout = real_stdout

    output = capture.getvalue()
    if result is None and output:
        result = output
    print(json.dumps({"ok": result, "stdout": output}, default=str))

_main()
"#;

/// Result of one sandboxed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    /// The value the script bound to `result` (or its captured stdout).
    pub value: Value,
    /// Everything the script printed.
    pub stdout: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    err: Option<String>,
}

/// Isolated child-process executor for user scripts.
#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    timeout: Duration,
    memory_limit_mb: u64,
    interpreter: String,
}

impl ScriptSandbox {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            interpreter: "python3".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_memory_limit_mb(mut self, limit_mb: u64) -> Self {
        self.memory_limit_mb = limit_mb;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validates and executes the script with the configured deadline.
    pub async fn execute(&self, source: &str, context: &Value) -> Result<ScriptOutcome, EtlError> {
        self.execute_with_timeout(source, context, self.timeout).await
    }

    /// Validates and executes the script with a per-call deadline.
    pub async fn execute_with_timeout(
        &self,
        source: &str,
        context: &Value,
        timeout: Duration,
    ) -> Result<ScriptOutcome, EtlError> {
        SecurityValidator::ensure_admissible(source)?;

        let request = json!({
            "code": source,
            "context": context,
            "memory_limit_mb": self.memory_limit_mb,
        });
        let payload = serde_json::to_vec(&request)?;

        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EtlError::ScriptExecutionError(format!("failed to spawn interpreter: {}", e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EtlError::InternalError("child stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EtlError::InternalError("child stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EtlError::InternalError("child stderr unavailable".to_string()))?;

        stdin.write_all(&payload).await?;
        drop(stdin);

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                // Deadline expired: terminate, then reap within the grace
                // window (kill_on_drop covers a stuck reap).
                let _ = child.start_kill();
                let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(EtlError::ScriptTimeout(timeout.as_secs()));
            }
        };

        let stdout_bytes = stdout_task
            .await
            .map_err(|e| EtlError::InternalError(format!("stdout reader failed: {}", e)))?;
        let stderr_bytes = stderr_task
            .await
            .map_err(|e| EtlError::InternalError(format!("stderr reader failed: {}", e)))?;

        let raw = String::from_utf8_lossy(&stdout_bytes);
        let envelope: Option<Envelope> = raw
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .and_then(|line| serde_json::from_str(line).ok());

        match envelope {
            Some(Envelope { err: Some(message), .. }) => {
                Err(EtlError::ScriptExecutionError(message))
            }
            Some(Envelope { ok, stdout, .. }) => Ok(ScriptOutcome {
                value: ok.unwrap_or(Value::Null),
                stdout: stdout.unwrap_or_default(),
            }),
            None => {
                let stderr_text = String::from_utf8_lossy(&stderr_bytes);
                Err(EtlError::ScriptExecutionError(format!(
                    "no result or error returned (exit: {}): {}",
                    status,
                    stderr_text.trim()
                )))
            }
        }
    }
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new()
    }
}
