//! Executor trait and the ROOT-backed implementation

use async_trait::async_trait;
use root_mcp_config::{CppMode, ExecutionConfig};
use root_mcp_ipc::{WorkerReply, WorkerRequest};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::result::{error_types, ExecutionResult};
use crate::scan::ErrorScanner;
use crate::worker::{Exchange, RootWorker, WorkerConfig, WorkerProcessStatus};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs code strings against an interpreter session
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute Python code with `ROOT` in scope
    async fn run_python(&self, code: &str) -> Result<ExecutionResult, ExecutionError>;

    /// Execute C++ code through cling; `None` uses the configured mode
    async fn run_cpp(
        &self,
        code: &str,
        mode: Option<CppMode>,
    ) -> Result<ExecutionResult, ExecutionError>;

    /// Check that the interpreter answers
    async fn health_check(&self) -> Result<WorkerHealth, ExecutionError>;

    /// Stop the interpreter
    async fn shutdown(&self) -> Result<(), ExecutionError>;
}

/// Snapshot of the worker reported by a health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub pid: u32,
    pub python_version: String,
    pub root_version: Option<String>,
    pub uptime_seconds: i64,
    pub executions: u64,
    pub failures: u64,
    pub restarts: u32,
}

/// Why the previous worker went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LostWorker {
    TimedOut,
    Crashed,
}

#[derive(Debug, Default)]
struct WorkerSlot {
    worker: Option<RootWorker>,
    lost: Option<LostWorker>,
    restarts: u32,
    executions: u64,
    failures: u64,
}

impl WorkerSlot {
    fn record(&mut self, result: &ExecutionResult) {
        self.executions += 1;
        if !result.ok {
            self.failures += 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CppStep {
    Declare,
    ProcessLine,
}

/// Executes code in a persistent ROOT worker process.
///
/// Calls are serialized: the session is shared, so one snippet runs at a time.
pub struct RootExecutor {
    config: ExecutionConfig,
    worker_config: WorkerConfig,
    scanner: ErrorScanner,
    slot: Mutex<WorkerSlot>,
}

impl RootExecutor {
    /// Create an executor; the worker starts on first use
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            worker_config: WorkerConfig::from(&config),
            scanner: ErrorScanner::new(config.error_keywords.iter().cloned()),
            config,
            slot: Mutex::new(WorkerSlot::default()),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Start the worker now instead of on the first call
    pub async fn warm_up(&self) -> Result<(), ExecutionError> {
        let mut slot = self.slot.lock().await;
        self.ensure_worker(&mut slot).await?;
        Ok(())
    }

    async fn ensure_worker<'a>(
        &self,
        slot: &'a mut WorkerSlot,
    ) -> Result<&'a mut RootWorker, ExecutionError> {
        let dead = match slot.worker.as_mut() {
            Some(worker) => !worker.is_alive(),
            None => false,
        };
        if dead {
            warn!("ROOT worker exited while idle");
            slot.worker = None;
            slot.lost = Some(LostWorker::Crashed);
        }

        if slot.worker.is_none() {
            match slot.lost {
                Some(LostWorker::Crashed) => {
                    if !self.config.restart_on_crash {
                        return Err(ExecutionError::WorkerError(
                            "ROOT worker crashed and restart_on_crash is disabled".to_string(),
                        ));
                    }
                    if slot.restarts >= self.config.max_restarts {
                        return Err(ExecutionError::WorkerError(format!(
                            "ROOT worker crashed and the restart limit ({}) is exhausted",
                            self.config.max_restarts
                        )));
                    }
                    slot.restarts += 1;
                    warn!(
                        "Restarting crashed ROOT worker ({}/{}); session state is lost",
                        slot.restarts, self.config.max_restarts
                    );
                }
                Some(LostWorker::TimedOut) => {
                    warn!("Starting a fresh ROOT session after a timeout; previous state is lost");
                }
                None => {
                    info!("Starting ROOT worker");
                }
            }

            let worker = RootWorker::spawn(&self.worker_config).await?;
            slot.lost = None;
            slot.worker = Some(worker);
        }

        slot.worker
            .as_mut()
            .ok_or_else(|| ExecutionError::WorkerError("ROOT worker unavailable".to_string()))
    }

    /// Run one request, discarding the worker if the exchange cost us it
    async fn exchange_on(
        &self,
        slot: &mut WorkerSlot,
        request: WorkerRequest,
        limit: Duration,
    ) -> Result<Exchange, ExecutionError> {
        let worker = self.ensure_worker(slot).await?;
        let outcome = worker.exchange(request, limit).await;

        if let Err(err) = &outcome {
            let failed = slot
                .worker
                .as_ref()
                .is_some_and(|w| w.status == WorkerProcessStatus::Failed);

            if err.loses_worker() || failed {
                slot.worker = None;
                slot.lost = Some(match err {
                    ExecutionError::Timeout { .. } => LostWorker::TimedOut,
                    _ => LostWorker::Crashed,
                });
            }
        }

        outcome
    }

    /// Turn an exchange into a tool result
    fn settle(
        &self,
        exchange: Result<Exchange, ExecutionError>,
    ) -> Result<ExecutionResult, ExecutionError> {
        match exchange {
            Ok(Exchange {
                reply: WorkerReply::Completed { outcome, .. },
                stdout,
                stderr,
            }) => Ok(ExecutionResult::from_outcome(outcome, stdout, stderr)),
            Ok(Exchange {
                reply: WorkerReply::Error { message, .. },
                ..
            }) => Err(ExecutionError::WorkerError(message)),
            Ok(Exchange { reply, .. }) => Err(ExecutionError::IpcError(format!(
                "Unexpected reply to code request: {:?}",
                reply
            ))),
            Err(ExecutionError::Timeout {
                limit,
                stdout,
                stderr,
            }) => Ok(ExecutionResult::timed_out(limit, stdout, stderr)),
            Err(ExecutionError::WorkerExited {
                reason,
                stdout,
                stderr,
            }) => Ok(ExecutionResult::failure(
                reason,
                error_types::WORKER_CRASHED,
                stdout,
                stderr,
            )),
            Err(other) => Err(other),
        }
    }

    /// Apply the keyword scan to a finished run
    fn scan(&self, result: &mut ExecutionResult) {
        if result.lost_worker() {
            return;
        }
        if let Some(line) = self.scanner.scan(&result.stderr) {
            debug!("Diagnostic found in interpreter output: {}", line);
            result.flag_diagnostic(line);
        }
    }

    async fn cpp_step(
        &self,
        slot: &mut WorkerSlot,
        step: CppStep,
        code: &str,
        deadline: Option<Instant>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let correlation_id = Uuid::new_v4();
        let request = match step {
            CppStep::Declare => WorkerRequest::DeclareCpp {
                correlation_id,
                code: code.to_string(),
            },
            CppStep::ProcessLine => WorkerRequest::ProcessLineCpp {
                correlation_id,
                code: code.to_string(),
            },
        };

        // `None`: the configured timeout does not fit in an `Instant`
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => self.config.timeout,
        };
        let mut result = self.settle(self.exchange_on(slot, request, remaining).await)?;
        self.scan(&mut result);
        Ok(result)
    }
}

#[async_trait]
impl CodeExecutor for RootExecutor {
    async fn run_python(&self, code: &str) -> Result<ExecutionResult, ExecutionError> {
        let started = Instant::now();
        let mut slot = self.slot.lock().await;

        let request = WorkerRequest::ExecutePython {
            correlation_id: Uuid::new_v4(),
            code: code.to_string(),
        };
        let exchange = self
            .exchange_on(&mut slot, request, self.config.timeout)
            .await;
        let mut result = self.settle(exchange)?;

        if self.config.scan_python_stderr {
            self.scan(&mut result);
        }

        slot.record(&result);
        Ok(result.with_duration(started.elapsed()))
    }

    async fn run_cpp(
        &self,
        code: &str,
        mode: Option<CppMode>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let started = Instant::now();
        let deadline = started.checked_add(self.config.timeout);
        let mode = mode.unwrap_or(self.config.cpp_mode);
        let mut slot = self.slot.lock().await;

        let worker = self.ensure_worker(&mut slot).await?;
        if !worker.runtime().has_root() {
            let result = ExecutionResult::failure(
                "PyROOT not available. Install ROOT",
                error_types::ROOT_UNAVAILABLE,
                String::new(),
                String::new(),
            );
            slot.record(&result);
            return Ok(result.with_duration(started.elapsed()));
        }

        let result = match mode {
            CppMode::Declare => {
                self.cpp_step(&mut slot, CppStep::Declare, code, deadline)
                    .await?
            }
            CppMode::ProcessLine => {
                self.cpp_step(&mut slot, CppStep::ProcessLine, code, deadline)
                    .await?
            }
            CppMode::Auto => {
                let declared = self
                    .cpp_step(&mut slot, CppStep::Declare, code, deadline)
                    .await?;
                if declared.ok || declared.lost_worker() {
                    declared
                } else {
                    debug!(
                        "Declare failed ({}), retrying with ProcessLine",
                        declared.error.as_deref().unwrap_or("no message")
                    );
                    self.cpp_step(&mut slot, CppStep::ProcessLine, code, deadline)
                        .await?
                }
            }
        };

        slot.record(&result);
        Ok(result.with_duration(started.elapsed()))
    }

    async fn health_check(&self) -> Result<WorkerHealth, ExecutionError> {
        let mut slot = self.slot.lock().await;
        let worker = self.ensure_worker(&mut slot).await?;

        if let Err(err) = worker.ping(HEALTH_CHECK_TIMEOUT).await {
            if err.loses_worker() || worker.status == WorkerProcessStatus::Failed {
                slot.worker = None;
                slot.lost = Some(LostWorker::Crashed);
            }
            return Err(ExecutionError::WorkerError(format!(
                "Health check failed: {}",
                err
            )));
        }

        let worker_id = worker.id.clone();
        let runtime = worker.runtime().clone();
        let uptime = chrono::Utc::now() - worker.started_at;
        Ok(WorkerHealth {
            worker_id,
            pid: runtime.pid,
            python_version: runtime.python_version,
            root_version: runtime.root_version,
            uptime_seconds: uptime.num_seconds(),
            executions: slot.executions,
            failures: slot.failures,
            restarts: slot.restarts,
        })
    }

    async fn shutdown(&self) -> Result<(), ExecutionError> {
        let mut slot = self.slot.lock().await;
        if let Some(mut worker) = slot.worker.take() {
            info!("Stopping ROOT worker {}", worker.id);
            worker.stop().await?;
        }
        Ok(())
    }
}
