//! External agent computation (screening, planning, intervention).
//!
//! Every call is synchronous and may be slow or flaky. Handlers never call an
//! [`AgentRunner`] directly; they go through [`crate::bridge`].

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use attune_core::models::{
    InterventionInput, InterventionOutput, PlanInput, PlanOutput, ScreeningInput, ScreeningOutput,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::AgentConfig;

pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseCase {
    Screening,
    Planning,
    Intervention,
}

impl UseCase {
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::Screening => "screening",
            UseCase::Planning => "planning",
            UseCase::Intervention => "intervention",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to run agent command: {0}")]
    Io(#[from] std::io::Error),
    #[error("agent exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("agent output could not be parsed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("agent reported an error: {0}")]
    Reported(String),
    #[error("agent did not finish within {0:?}")]
    Timeout(Duration),
}

/// Blocking agent boundary, one call per use case.
pub trait AgentRunner: Send + Sync {
    fn screen(&self, input: &ScreeningInput) -> Result<ScreeningOutput, AgentError>;
    fn plan(&self, input: &PlanInput) -> Result<PlanOutput, AgentError>;
    fn intervene(&self, input: &InterventionInput) -> Result<InterventionOutput, AgentError>;
}

/// Runs `<program> <args…> <use-case>` with the JSON input on stdin and reads
/// one JSON document from stdout. The child is killed once `timeout` elapses
/// and is always reaped before `invoke` returns.
pub struct CommandAgentRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAgentRunner {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout,
        }
    }

    fn invoke<I: Serialize, O: DeserializeOwned>(
        &self,
        use_case: UseCase,
        input: &I,
    ) -> Result<O, AgentError> {
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(use_case.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are serviced off this thread so an agent that writes before it
        // reads cannot block on a full pipe while its input is still pending.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || -> io::Result<()> {
                stdin.write_all(&payload)?;
                stdin.flush()
            })
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now().checked_add(self.timeout);
        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                reap(&mut child);
                tracing::warn!(
                    use_case = use_case.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "agent timed out and was killed"
                );
                return Err(AgentError::Timeout(self.timeout));
            }
            Err(e) => {
                reap(&mut child);
                return Err(e.into());
            }
        };

        let written = writer.map_or(Ok(()), join);
        let stdout = stdout.map_or(Ok(Vec::new()), join)?;
        let stderr = stderr.map_or(Ok(Vec::new()), join)?;

        if !status.success() {
            return Err(AgentError::Exit {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        written?;

        parse_agent_output(&stdout)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("agent pipe thread panicked")))
}

/// `Ok(None)` means the deadline passed with the child still running. A
/// deadline past what `Instant` can represent never expires.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill and wait so no zombie is left behind. The child may already be gone.
fn reap(child: &mut Child) {
    let _ = child.kill();
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "failed to reap agent process");
    }
}

impl AgentRunner for CommandAgentRunner {
    fn screen(&self, input: &ScreeningInput) -> Result<ScreeningOutput, AgentError> {
        self.invoke(UseCase::Screening, input)
    }

    fn plan(&self, input: &PlanInput) -> Result<PlanOutput, AgentError> {
        self.invoke(UseCase::Planning, input)
    }

    fn intervene(&self, input: &InterventionInput) -> Result<InterventionOutput, AgentError> {
        self.invoke(UseCase::Intervention, input)
    }
}

/// Agents signal failure in-band with `{"error": "..."}`.
fn parse_agent_output<O: DeserializeOwned>(stdout: &[u8]) -> Result<O, AgentError> {
    let value: serde_json::Value = serde_json::from_slice(stdout)?;
    if let Some(err) = value.get("error") {
        let message = err
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Err(AgentError::Reported(message));
    }
    Ok(serde_json::from_value(value)?)
}
