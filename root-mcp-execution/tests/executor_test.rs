//! Tests against a real Python worker.
//!
//! They skip themselves when `python3` is not installed. ROOT is not needed;
//! the worker runs with `require_root = false` unless a test says otherwise.

use root_mcp_config::{CppMode, ExecutionConfig};
use root_mcp_execution::{CodeExecutor, ExecutionError, RootExecutor};
use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn root_importable() -> bool {
    Command::new("python3")
        .args(["-c", "import ROOT"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn config() -> ExecutionConfig {
    ExecutionConfig {
        require_root: false,
        timeout: Duration::from_secs(30),
        ..ExecutionConfig::default()
    }
}

/// Stand-in `ROOT` module that mimics cling's answers closely enough for the
/// Declare/ProcessLine logic: only `int ...` declarations are accepted, and
/// ProcessLine fails on anything mentioning `undeclared`.
const FAKE_ROOT: &str = r#"
import sys

class _ROOT:
    def SetBatch(self, batch):
        self.batch = batch

    def GetVersion(self):
        return "6.32/02"

class _Interpreter:
    def Declare(self, code):
        if code.lstrip().startswith("int "):
            return True
        sys.stderr.write("input_line_3:1:1: error: expected unqualified-id\n")
        return False

    def ProcessLine(self, code, status=None):
        if "undeclared" in code:
            sys.stderr.write("input_line_5:2:3: error: use of undeclared identifier\n")
            if status is not None:
                status.value = 1
            return 0
        print("processed: " + code)
        return 0

gROOT = _ROOT()
gInterpreter = _Interpreter()
"#;

/// Config whose worker imports [`FAKE_ROOT`] from a temporary directory
fn fake_root_config() -> (TempDir, ExecutionConfig) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ROOT.py"), FAKE_ROOT).unwrap();

    let mut env = HashMap::new();
    env.insert(
        "PYTHONPATH".to_string(),
        dir.path().to_string_lossy().into_owned(),
    );
    let config = ExecutionConfig {
        require_root: true,
        env,
        ..config()
    };
    (dir, config)
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

#[tokio::test]
async fn test_print_is_captured() {
    require_python!();
    let executor = RootExecutor::new(config());

    let result = executor.run_python("print('hello')").await.unwrap();
    assert!(result.ok, "{:?}", result);
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.stderr, "");
    assert_eq!(result.error, None);
    assert!(!result.timed_out);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_session_state_persists() {
    require_python!();
    let executor = RootExecutor::new(config());

    assert!(executor.run_python("x = 41").await.unwrap().ok);
    let result = executor.run_python("x += 1\nprint(x)").await.unwrap();
    assert_eq!(result.stdout, "42\n");

    let result = executor
        .run_python("print(__name__, ROOT is None or hasattr(ROOT, 'gROOT'))")
        .await
        .unwrap();
    assert_eq!(result.stdout, "__root_mcp__ True\n");

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_exception_is_reported() {
    require_python!();
    let executor = RootExecutor::new(config());

    let result = executor.run_python("print('before')\n1/0").await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.stdout, "before\n");
    assert_eq!(result.error.as_deref(), Some("division by zero"));
    assert_eq!(result.error_type.as_deref(), Some("ZeroDivisionError"));
    assert!(result.stderr.contains("Traceback (most recent call last):"));
    assert!(result.stderr.contains("ZeroDivisionError: division by zero"));

    // The session survives the exception
    assert!(executor.run_python("pass").await.unwrap().ok);
    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_system_exit_does_not_kill_session() {
    require_python!();
    let executor = RootExecutor::new(config());

    executor.run_python("marker = 'alive'").await.unwrap();
    let result = executor.run_python("import sys\nsys.exit(3)").await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("SystemExit"));

    let result = executor.run_python("print(marker)").await.unwrap();
    assert_eq!(result.stdout, "alive\n");
    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stderr_and_raw_fd_output() {
    require_python!();
    let executor = RootExecutor::new(config());

    let result = executor
        .run_python("import os, sys\nos.write(1, b'raw\\n')\nprint('warn', file=sys.stderr)")
        .await
        .unwrap();
    assert!(result.ok);
    assert_eq!(result.stdout, "raw\n");
    assert_eq!(result.stderr, "warn\n");

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_user_code_cannot_read_requests() {
    require_python!();
    let executor = RootExecutor::new(config());

    let result = executor.run_python("input()").await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("EOFError"));

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_python_stderr_scan_is_opt_in() {
    require_python!();
    let code = "import sys\nsys.stderr.write('Error in <TFile::TFile>: file nope.root does not exist\\n')";

    let executor = RootExecutor::new(config());
    assert!(executor.run_python(code).await.unwrap().ok);
    executor.shutdown().await.unwrap();

    let executor = RootExecutor::new(ExecutionConfig {
        scan_python_stderr: true,
        ..config()
    });
    let result = executor.run_python(code).await.unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("InterpreterError"));
    assert_eq!(
        result.error.as_deref(),
        Some("Error in <TFile::TFile>: file nope.root does not exist")
    );
    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cpp_without_root() {
    require_python!();
    if root_importable() {
        eprintln!("ROOT is installed, skipping");
        return;
    }
    let executor = RootExecutor::new(config());

    let result = executor
        .run_cpp("int answer = 42;", Some(CppMode::Auto))
        .await
        .unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("RootUnavailableError"));
    assert_eq!(result.error.as_deref(), Some("PyROOT not available. Install ROOT"));

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cpp_with_root() {
    require_python!();
    if !root_importable() {
        eprintln!("ROOT is not installed, skipping");
        return;
    }
    let executor = RootExecutor::new(config());

    let result = executor
        .run_cpp("int root_mcp_answer() { return 42; }", None)
        .await
        .unwrap();
    assert!(result.ok, "{:?}", result);

    let result = executor
        .run_cpp("printf(\"%d\\n\", root_mcp_answer());", None)
        .await
        .unwrap();
    assert!(result.ok, "{:?}", result);
    assert_eq!(result.stdout, "42\n");

    let result = executor
        .run_cpp("undeclared_thing->Fill(1);", Some(CppMode::ProcessLine))
        .await
        .unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("InterpreterError"));

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_required_root_missing() {
    require_python!();
    if root_importable() {
        eprintln!("ROOT is installed, skipping");
        return;
    }
    let executor = RootExecutor::new(ExecutionConfig {
        require_root: true,
        ..config()
    });

    let err = executor.run_python("print(1)").await.unwrap_err();
    match err {
        ExecutionError::RootUnavailable(message) => {
            assert!(message.contains("PyROOT not available"))
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_kills_and_restarts_session() {
    require_python!();
    let executor = RootExecutor::new(ExecutionConfig {
        timeout: Duration::from_secs(1),
        ..config()
    });

    executor.run_python("state = 1").await.unwrap();
    let result = executor
        .run_python("import time\nprint('sleeping', flush=True)\ntime.sleep(30)")
        .await
        .unwrap();
    assert!(result.timed_out);
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("TimeoutError"));
    assert_eq!(result.stdout, "sleeping\n");

    // Fresh session: the old globals are gone
    let result = executor.run_python("print(state)").await.unwrap();
    assert_eq!(result.error_type.as_deref(), Some("NameError"));
    assert!(executor.run_python("print('back')").await.unwrap().ok);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_crash_is_reported_and_recovered() {
    require_python!();
    let executor = RootExecutor::new(config());

    let result = executor
        .run_python("import os\nprint('partial', flush=True)\nos._exit(7)")
        .await
        .unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("WorkerCrashed"));
    assert_eq!(result.stdout, "partial\n");

    let result = executor.run_python("print('again')").await.unwrap();
    assert!(result.ok);

    let health = executor.health_check().await.unwrap();
    assert_eq!(health.restarts, 1);
    assert_eq!(health.executions, 2);
    assert_eq!(health.failures, 1);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_budget_exhausted() {
    require_python!();
    let executor = RootExecutor::new(ExecutionConfig {
        max_restarts: 0,
        ..config()
    });

    let result = executor.run_python("import os\nos._exit(1)").await.unwrap();
    assert_eq!(result.error_type.as_deref(), Some("WorkerCrashed"));

    let err = executor.run_python("print(1)").await.unwrap_err();
    assert!(matches!(err, ExecutionError::WorkerError(_)));
}

#[tokio::test]
async fn test_health_check_reports_runtime() {
    require_python!();
    let executor = RootExecutor::new(config());

    executor.warm_up().await.unwrap();
    let health = executor.health_check().await.unwrap();
    assert!(health.pid > 0);
    assert!(health.python_version.starts_with('3'));
    assert_eq!(health.executions, 0);
    assert_eq!(health.restarts, 0);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cpp_auto_falls_back_to_process_line() {
    require_python!();
    let (_dir, config) = fake_root_config();
    let executor = RootExecutor::new(config);

    let result = executor.run_cpp("int counter = 0;", None).await.unwrap();
    assert!(result.ok, "{:?}", result);
    assert_eq!(result.stdout, "");

    let result = executor.run_cpp("printf(\"hi\");", None).await.unwrap();
    assert!(result.ok, "{:?}", result);
    assert_eq!(result.stdout, "processed: printf(\"hi\");\n");
    // Only the fallback's output is reported
    assert_eq!(result.stderr, "");

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cpp_declare_mode_reports_diagnostic() {
    require_python!();
    let (_dir, config) = fake_root_config();
    let executor = RootExecutor::new(config);

    let result = executor
        .run_cpp("printf(\"hi\");", Some(CppMode::Declare))
        .await
        .unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("InterpreterError"));
    assert_eq!(
        result.error.as_deref(),
        Some("input_line_3:1:1: error: expected unqualified-id")
    );
    assert_eq!(result.stdout, "");

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cpp_process_line_status_is_failure() {
    require_python!();
    let (_dir, config) = fake_root_config();
    let executor = RootExecutor::new(config);

    let result = executor
        .run_cpp("undeclared_thing->Fill(1);", Some(CppMode::ProcessLine))
        .await
        .unwrap();
    assert!(!result.ok);
    assert_eq!(result.error_type.as_deref(), Some("InterpreterError"));
    assert_eq!(
        result.error.as_deref(),
        Some("input_line_5:2:3: error: use of undeclared identifier")
    );

    // Both entry points fail in auto mode; the ProcessLine failure is reported
    let result = executor
        .run_cpp("undeclared_thing->Fill(1);", None)
        .await
        .unwrap();
    assert!(!result.ok);
    assert!(result.stderr.contains("use of undeclared identifier"));

    let health = executor.health_check().await.unwrap();
    assert_eq!(health.root_version.as_deref(), Some("6.32/02"));
    assert_eq!(health.failures, 2);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unbounded_timeout_is_accepted() {
    require_python!();
    let (_dir, config) = fake_root_config();
    let executor = RootExecutor::new(ExecutionConfig {
        timeout: Duration::from_secs(u64::MAX),
        ..config
    });

    let result = executor.run_python("print('py ok')").await.unwrap();
    assert!(result.ok, "{:?}", result);

    let result = executor.run_cpp("int g() { return 2; }", None).await.unwrap();
    assert!(result.ok, "{:?}", result);
    assert!(!result.timed_out);

    executor.shutdown().await.unwrap();
}
