use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::debug;

/// How an external tool finished. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    pub code: Option<i32>,
}

impl ExitState {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Buffered result of a tool that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit: ExitState,
    pub stdout: String,
    pub stderr: String,
}

pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ExitState>> + Send>>;

/// A running tool whose stderr is handed to the caller. The process is
/// killed if `exit` is dropped before it resolves.
pub struct StreamingProcess {
    pub stderr: Pin<Box<dyn AsyncRead + Send>>,
    pub exit: ExitFuture,
}

#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Runs to completion, capturing stdout and stderr.
    async fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;

    /// Starts the tool and returns its live stderr stream.
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<StreamingProcess>;
}

/// Runs tools as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessInvoker;

#[async_trait]
impl ProcessInvoker for SystemProcessInvoker {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        debug!(program, ?args, "running tool");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            exit: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn(&self, program: &str, args: &[String]) -> io::Result<StreamingProcess> {
        debug!(program, ?args, "spawning tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        Ok(StreamingProcess {
            stderr: Box::pin(stderr),
            exit: Box::pin(async move { child.wait().await.map(ExitState::from) }),
        })
    }
}
