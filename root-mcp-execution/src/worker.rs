//! The interpreter worker process
//!
//! One worker hosts one interpreter session. Requests go down its stdin as
//! JSON lines; its stdout and stderr are split into per-request segments by
//! the boundary lines the driver writes after every reply.

use chrono::{DateTime, Utc};
use root_mcp_config::ExecutionConfig;
use root_mcp_ipc::{
    decode_reply, encode_line, MessageEnvelope, RuntimeInfo, Segment, SegmentReader, WorkerReply,
    WorkerRequest,
};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ExecutionError;

/// Python program run by every worker
const DRIVER: &str = include_str!("driver.py");

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Configuration for the worker process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub python: String,
    pub startup_timeout: Duration,
    pub graphics: bool,
    pub require_root: bool,
    pub env: HashMap<String, String>,
}

impl From<&ExecutionConfig> for WorkerConfig {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            python: config.python.clone(),
            startup_timeout: config.startup_timeout,
            graphics: config.graphics,
            require_root: config.require_root,
            env: config.env.clone(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerProcessStatus {
    Starting,
    Ready,
    Busy,
    Failed,
    Stopped,
}

/// One reply together with the output captured while producing it
#[derive(Debug, Clone)]
pub struct Exchange {
    pub reply: WorkerReply,
    pub stdout: String,
    pub stderr: String,
}

/// A running interpreter worker
#[derive(Debug)]
pub struct RootWorker {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub status: WorkerProcessStatus,
    runtime: RuntimeInfo,
    child: Option<Child>,
    stdin_tx: Option<mpsc::UnboundedSender<WorkerRequest>>,
    stdout_rx: mpsc::UnboundedReceiver<Segment>,
    stderr_rx: mpsc::UnboundedReceiver<Segment>,
}

impl RootWorker {
    /// Spawn a worker and wait until its interpreter is ready
    pub async fn spawn(config: &WorkerConfig) -> Result<Self, ExecutionError> {
        let id = Uuid::new_v4().to_string();
        let boundary = format!("@@root-mcp-{}@@", Uuid::new_v4().simple());
        debug!("Spawning ROOT worker {} using {}", id, config.python);

        let mut cmd = Command::new(&config.python);
        cmd.arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .envs(&config.env)
            .env("ROOT_MCP_BOUNDARY", &boundary)
            .env("ROOT_MCP_BATCH", if config.graphics { "0" } else { "1" })
            .env("ROOT_MCP_REQUIRE_ROOT", if config.require_root { "1" } else { "0" })
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::SpawnError(format!("Failed to run {}: {}", config.python, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionError::SpawnError("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::SpawnError("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::SpawnError("Failed to get stderr".to_string()))?;

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::stdin_writer_task(id.clone(), stdin, stdin_rx));
        tokio::spawn(Self::segment_reader_task(
            id.clone(),
            "stdout",
            SegmentReader::new(stdout, boundary.clone()),
            stdout_tx,
        ));
        tokio::spawn(Self::segment_reader_task(
            id.clone(),
            "stderr",
            SegmentReader::new(stderr, boundary),
            stderr_tx,
        ));

        let mut worker = Self {
            runtime: RuntimeInfo {
                pid: child.id().unwrap_or_default(),
                python_version: String::new(),
                root_version: None,
            },
            id,
            started_at: Utc::now(),
            status: WorkerProcessStatus::Starting,
            child: Some(child),
            stdin_tx: Some(stdin_tx),
            stdout_rx,
            stderr_rx,
        };

        let boot = match worker.read_exchange(config.startup_timeout).await {
            Ok(exchange) => exchange,
            Err(ExecutionError::Timeout { limit, stderr, .. }) => {
                return Err(ExecutionError::SpawnError(format!(
                    "worker did not become ready within {}s{}",
                    limit.as_secs(),
                    stderr_excerpt(&stderr)
                )));
            }
            Err(ExecutionError::WorkerExited { reason, stderr, .. }) => {
                return Err(ExecutionError::SpawnError(format!(
                    "{}{}",
                    reason,
                    stderr_excerpt(&stderr)
                )));
            }
            Err(other) => return Err(other),
        };

        if !boot.stdout.is_empty() || !boot.stderr.is_empty() {
            debug!(
                "Worker {} startup output: stdout={:?} stderr={:?}",
                worker.id, boot.stdout, boot.stderr
            );
        }

        match boot.reply {
            WorkerReply::Ready(runtime) => {
                info!(
                    "ROOT worker {} ready (pid {}, Python {}, ROOT {})",
                    worker.id,
                    runtime.pid,
                    runtime.python_version,
                    runtime.root_version.as_deref().unwrap_or("not available")
                );
                if runtime.root_version.is_none() {
                    warn!("PyROOT could not be imported; C++ execution is disabled");
                }
                worker.runtime = runtime;
                worker.status = WorkerProcessStatus::Ready;
                Ok(worker)
            }
            WorkerReply::Error { message, .. } => {
                worker.stop().await?;
                Err(ExecutionError::RootUnavailable(message))
            }
            other => {
                worker.kill().await;
                Err(ExecutionError::IpcError(format!(
                    "Unexpected startup reply: {:?}",
                    other
                )))
            }
        }
    }

    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    /// Whether the process is still running
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Send one request and wait for its reply and captured output
    pub async fn exchange(
        &mut self,
        request: WorkerRequest,
        limit: Duration,
    ) -> Result<Exchange, ExecutionError> {
        let expected = request.correlation_id();
        let kind = request.kind();

        debug!("Sending {} to worker {}", kind, self.id);
        self.send(request)?;
        self.status = WorkerProcessStatus::Busy;

        let exchange = self.read_exchange(limit).await?;

        let received = exchange.reply.correlation_id();
        if received.is_some() && received != expected {
            self.status = WorkerProcessStatus::Failed;
            return Err(ExecutionError::IpcError(format!(
                "Reply to {} carries correlation id {:?}, expected {:?}",
                kind, received, expected
            )));
        }

        self.status = WorkerProcessStatus::Ready;
        Ok(exchange)
    }

    /// Round-trip a ping
    pub async fn ping(&mut self, limit: Duration) -> Result<(), ExecutionError> {
        let exchange = self
            .exchange(
                WorkerRequest::Ping {
                    correlation_id: Uuid::new_v4(),
                },
                limit,
            )
            .await?;

        match exchange.reply {
            WorkerReply::Pong { .. } => Ok(()),
            other => Err(ExecutionError::IpcError(format!(
                "Unexpected reply to ping: {:?}",
                other
            ))),
        }
    }

    /// Stop the worker process gracefully
    pub async fn stop(&mut self) -> Result<(), ExecutionError> {
        debug!("Stopping worker process: {}", self.id);

        if self.status == WorkerProcessStatus::Stopped || self.child.is_none() {
            debug!("Worker {} already stopped", self.id);
            return Ok(());
        }

        // Ignore errors as the worker may have already terminated
        let _ = self.send(WorkerRequest::Shutdown);

        // Close stdin to signal shutdown
        self.stdin_tx = None;

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(_exit_status)) => {
                    debug!("Worker {} terminated gracefully", self.id);
                }
                Ok(Err(e)) => {
                    debug!("Worker {} wait failed: {}", self.id, e);
                }
                Err(_) => {
                    debug!(
                        "Worker {} didn't respond to shutdown, force killing",
                        self.id
                    );
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill worker process {}: {}", self.id, e);
                    }
                }
            }
        }

        self.status = WorkerProcessStatus::Stopped;

        Ok(())
    }

    fn send(&self, request: WorkerRequest) -> Result<(), ExecutionError> {
        match &self.stdin_tx {
            Some(stdin_tx) => stdin_tx.send(request).map_err(|e| {
                ExecutionError::WorkerError(format!("Failed to send message: {}", e))
            }),
            None => Err(ExecutionError::WorkerError(
                "Worker is not running".to_string(),
            )),
        }
    }

    /// Wait for the next segment on both streams
    async fn read_exchange(&mut self, limit: Duration) -> Result<Exchange, ExecutionError> {
        let out = &mut self.stdout_rx;
        let err = &mut self.stderr_rx;
        let waited =
            tokio::time::timeout(limit, async move { tokio::join!(out.recv(), err.recv()) })
                .await;

        let (stdout, stderr) = match waited {
            Ok((stdout, stderr)) => (stdout.unwrap_or_default(), stderr.unwrap_or_default()),
            Err(_) => {
                warn!(
                    "Worker {} exceeded {}s, killing it",
                    self.id,
                    limit.as_secs()
                );
                self.kill().await;
                let (stdout, stderr) = self.drain_output().await;
                return Err(ExecutionError::Timeout {
                    limit,
                    stdout,
                    stderr,
                });
            }
        };

        let trailer = match (&stdout.trailer, stdout.closed) {
            (Some(trailer), false) => trailer.clone(),
            _ => {
                self.status = WorkerProcessStatus::Failed;
                let reason = self.exit_reason().await;
                warn!("Worker {} lost: {}", self.id, reason);
                return Err(ExecutionError::WorkerExited {
                    reason,
                    stdout: stdout.text,
                    stderr: stderr.text,
                });
            }
        };

        let envelope = match decode_reply(&trailer) {
            Ok(envelope) => envelope,
            Err(e) => {
                if e.is_fatal() {
                    self.status = WorkerProcessStatus::Failed;
                }
                return Err(e.into());
            }
        };

        Ok(Exchange {
            reply: envelope.message,
            stdout: stdout.text,
            stderr: stderr.text,
        })
    }

    /// Collect whatever a killed worker left in its pipes
    async fn drain_output(&mut self) -> (String, String) {
        let out = &mut self.stdout_rx;
        let err = &mut self.stderr_rx;
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async move {
            tokio::join!(out.recv(), err.recv())
        })
        .await
        .unwrap_or((None, None));

        (
            drained.0.map(|s| s.text).unwrap_or_default(),
            drained.1.map(|s| s.text).unwrap_or_default(),
        )
    }

    async fn kill(&mut self) {
        self.stdin_tx = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("Failed to kill worker process {}: {}", self.id, e);
            }
        }
        self.status = WorkerProcessStatus::Failed;
    }

    async fn exit_reason(&mut self) -> String {
        match self.child.as_mut() {
            Some(child) => match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => format!("worker process exited ({})", status),
                Ok(Err(e)) => format!("failed to wait for worker process: {}", e),
                Err(_) => "worker closed its output streams".to_string(),
            },
            None => "worker process is not running".to_string(),
        }
    }

    /// Stdin writer task
    async fn stdin_writer_task(
        worker_id: String,
        mut stdin: ChildStdin,
        mut rx: mpsc::UnboundedReceiver<WorkerRequest>,
    ) {
        while let Some(message) = rx.recv().await {
            let line = match encode_line(&MessageEnvelope::new(message)) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to encode request for worker {}: {}", worker_id, e);
                    continue;
                }
            };

            let written = match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            };

            if let Err(e) = written {
                // During shutdown, broken pipe errors are expected
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    debug!("Worker {} stdin closed (worker likely terminated)", worker_id);
                } else {
                    error!("Failed to write to worker {} stdin: {}", worker_id, e);
                }
                break;
            }
        }
    }

    /// Forward segments of one captured stream until it closes
    async fn segment_reader_task<R>(
        worker_id: String,
        stream: &'static str,
        mut reader: SegmentReader<R>,
        tx: mpsc::UnboundedSender<Segment>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
    {
        loop {
            match reader.next_segment().await {
                Ok(Some(segment)) => {
                    let closed = segment.closed;
                    if tx.send(segment).is_err() || closed {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Worker {} {} closed", worker_id, stream);
                    break;
                }
                Err(e) => {
                    error!("Failed to read from worker {} {}: {}", worker_id, stream, e);
                    break;
                }
            }
        }
    }
}

/// Last few lines of stderr, for startup failure messages
fn stderr_excerpt(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(5);
    format!(": {}", lines[start..].join("\n"))
}
