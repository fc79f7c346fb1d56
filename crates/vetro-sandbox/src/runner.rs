//! Child process lifecycle: scratch dir, spawn, drain, envelope.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use vetro_core::SandboxConfig;

use crate::error::SandboxError;
use crate::request::{SandboxRequest, SandboxResult};

/// Appended to captured stdout when the cap was hit.
const OUTPUT_TRUNCATION_MARK: &str = "\n…[output truncated]";

/// Stderr tail length included in crash reports.
const STDERR_TAIL: usize = 500;

/// In-child driver: loads the bound context, executes the script against a
/// restricted builtin surface, evaluates the final expression, and writes a
/// result envelope to `result.json`. Exceptions become envelope errors, so
/// the only messages that ever leave the sandbox are the script's own.
const DRIVER: &str = r##"
import builtins as _builtins
import json as _json
import math
import re
from collections import Counter, defaultdict
from datetime import date, datetime, timedelta

_SAFE_BUILTIN_NAMES = (
    "abs", "all", "any", "bin", "bool", "chr", "dict", "divmod", "enumerate",
    "filter", "float", "format", "frozenset", "hash", "hex", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min",
    "next", "oct", "ord", "pow", "print", "range", "repr", "reversed",
    "round", "set", "slice", "sorted", "str", "sum", "tuple", "type", "zip",
    "Exception", "BaseException", "ValueError", "TypeError", "KeyError",
    "IndexError", "AttributeError", "ArithmeticError", "ZeroDivisionError",
    "StopIteration", "RuntimeError",
)


def _load_context():
    try:
        with open("context.json", "r", encoding="utf-8") as fh:
            return _json.load(fh)
    except OSError:
        return {}


_CONTEXT = _load_context()


def db_query(sql):
    key = " ".join(sql.split())
    if key not in _CONTEXT:
        raise ValueError(
            "query was not pre-bound; pass SQL to db_query() as a string literal"
        )
    return _CONTEXT[key]


def _write_envelope(result, error):
    if result is not None:
        try:
            _json.dumps(result)
        except (TypeError, ValueError):
            if hasattr(result, "isoformat"):
                result = result.isoformat()
            elif isinstance(result, (set, frozenset)):
                result = sorted(result, key=repr)
            else:
                result = str(result)
    with open("result.json", "w", encoding="utf-8") as fh:
        _json.dump({"result": result, "error": error}, fh, default=str)


def _main():
    with open("script.py", "r", encoding="utf-8") as fh:
        code = fh.read()

    safe = {name: getattr(_builtins, name) for name in _SAFE_BUILTIN_NAMES}
    env = {
        "__builtins__": safe,
        "__name__": "__main__",
        "math": math,
        "json": _json,
        "re": re,
        "datetime": datetime,
        "timedelta": timedelta,
        "date": date,
        "Counter": Counter,
        "defaultdict": defaultdict,
        "db_query": db_query,
    }

    result = None
    try:
        exec(compile(code, "<script>", "exec"), env)
        lines = [line for line in code.strip().splitlines() if line.strip()]
        if lines:
            last = lines[-1].strip()
            statement_prefixes = (
                "#", "import ", "from ", "def ", "class ", "if ", "elif ",
                "else", "for ", "while ", "try", "except", "finally", "with ",
                "return", "raise", "assert ", "pass", "break", "continue",
                "print(", "del ", "global ", "nonlocal ",
            )
            if not last.startswith(statement_prefixes):
                try:
                    result = eval(last, env)
                except Exception:
                    result = None
    except MemoryError:
        _write_envelope(None, "MemoryError: memory ceiling exceeded")
        return
    except BaseException as exc:
        _write_envelope(None, "%s: %s" % (type(exc).__name__, exc))
        return
    _write_envelope(result, None)


_main()
"##;

/// The driver's result envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<serde_json::Value>,
    error: Option<String>,
}

/// Run one request to completion inside a fresh scratch dir and process.
pub(crate) async fn run_isolated(
    config: &SandboxConfig,
    request: &SandboxRequest,
) -> Result<SandboxResult, SandboxError> {
    let scratch = match &config.scratch_root {
        Some(root) => tempfile::Builder::new().prefix("vetro-sb-").tempdir_in(root),
        None => tempfile::Builder::new().prefix("vetro-sb-").tempdir(),
    }
    .map_err(|e| SandboxError::Internal(format!("scratch dir: {e}")))?;

    tokio::fs::write(scratch.path().join("script.py"), &request.code).await?;
    let context = serde_json::to_vec(&request.context)
        .map_err(|e| SandboxError::Internal(format!("context serialization: {e}")))?;
    tokio::fs::write(scratch.path().join("context.json"), context).await?;
    tokio::fs::write(scratch.path().join("driver.py"), DRIVER).await?;

    let mut cmd = Command::new(&config.interpreter);
    cmd.arg("-I") // ignore PYTHON* env and user site-packages
        .arg("-X")
        .arg("utf8")
        .arg("driver.py")
        .current_dir(scratch.path())
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let memory_bytes = config.memory_mb.saturating_mul(1024 * 1024) as libc::rlim_t;
    let isolate = config.isolate_namespaces;
    // Safety: only async-signal-safe calls (setrlimit, unshare) run between
    // fork and exec.
    unsafe {
        cmd.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: memory_bytes,
                rlim_max: memory_bytes,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            if isolate && libc::unshare(libc::CLONE_NEWUSER | libc::CLONE_NEWNET) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| SandboxError::Spawn(e.to_string()))?;

    let timeout = Duration::from_secs(request.timeout_seconds);
    let drained = tokio::time::timeout(timeout, drain_child(&mut child, config.max_output_bytes))
        .await;

    let (status, stdout, stdout_truncated, stderr) = match drained {
        Err(_elapsed) => {
            // Kill and reap; the scratch dir and slot are released by RAII
            // either way.
            let _ = child.start_kill();
            let _ = child.wait().await;
            tracing::warn!(
                timeout_seconds = request.timeout_seconds,
                "sandbox run killed on timeout"
            );
            return Err(SandboxError::Timeout {
                seconds: request.timeout_seconds,
            });
        }
        Ok(Err(e)) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(SandboxError::Internal(e.to_string()));
        }
        Ok(Ok(parts)) => parts,
    };

    let duration_ms = started.elapsed().as_millis() as u64;

    // The envelope, when present, is authoritative regardless of exit code.
    let envelope_path = scratch.path().join("result.json");
    let envelope = match tokio::fs::read(&envelope_path).await {
        Ok(bytes) => serde_json::from_slice::<Envelope>(&bytes).ok(),
        Err(_) => None,
    };

    let mut stdout = stdout;
    if stdout_truncated {
        stdout.push_str(OUTPUT_TRUNCATION_MARK);
    }

    match envelope {
        Some(Envelope {
            error: Some(message),
            ..
        }) => {
            if message.starts_with("MemoryError") || message.starts_with("RecursionError") {
                Err(SandboxError::ResourceLimit { message })
            } else {
                Err(SandboxError::Script { message })
            }
        }
        Some(Envelope { result, error: None }) => Ok(SandboxResult {
            stdout: if stdout.is_empty() { None } else { Some(stdout) },
            stdout_truncated,
            value: result,
            duration_ms,
        }),
        None => {
            // Scratch paths are the only host detail stderr can contain;
            // scrub them before the message leaves the sandbox layer.
            let scrubbed = stderr
                .replace(&scratch.path().display().to_string(), "")
                .chars()
                .take(STDERR_TAIL)
                .collect::<String>();
            Err(SandboxError::Crashed {
                message: format!("exit status {status}: {}", scrubbed.trim()),
            })
        }
    }
}

/// Read stdout (bounded) and stderr concurrently, then reap the child.
/// Draining both pipes keeps a chatty child from blocking on a full pipe.
async fn drain_child(
    child: &mut Child,
    stdout_cap: usize,
) -> std::io::Result<(std::process::ExitStatus, String, bool, String)> {
    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        std::io::Error::other("child stdout was not piped")
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        std::io::Error::other("child stderr was not piped")
    })?;

    let stdout_fut = async {
        let mut collected: Vec<u8> = Vec::new();
        let mut truncated = false;
        let mut buf = [0u8; 8192];
        loop {
            let n = stdout_pipe.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if collected.len() < stdout_cap {
                let take = (stdout_cap - collected.len()).min(n);
                collected.extend_from_slice(&buf[..take]);
                if take < n {
                    truncated = true;
                }
            } else {
                truncated = true;
            }
        }
        Ok::<_, std::io::Error>((collected, truncated))
    };

    let stderr_fut = async {
        let mut collected: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stderr_pipe.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if collected.len() < 16 * 1024 {
                collected.extend_from_slice(&buf[..n.min(16 * 1024 - collected.len())]);
            }
        }
        Ok::<_, std::io::Error>(collected)
    };

    let ((stdout_bytes, truncated), stderr_bytes) = tokio::try_join!(stdout_fut, stderr_fut)?;
    let status = child.wait().await?;

    Ok((
        status,
        String::from_utf8_lossy(&stdout_bytes).into_owned(),
        truncated,
        String::from_utf8_lossy(&stderr_bytes).into_owned(),
    ))
}
