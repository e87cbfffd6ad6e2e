//! Operating-system seam.
//!
//! The pipeline never spawns a process, looks up PATH or opens a socket
//! itself; it asks a [`Host`]. [`SystemHost`] is the real implementation,
//! [`mock::MockHost`] scripts behavior for tests.

pub mod mock;
mod system;

use std::fmt;
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

use async_trait::async_trait;

pub use mock::{Call, MockHost};
pub use system::SystemHost;

/// A command line to run: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Create an invocation with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// How an external command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    code: Option<i32>,
}

impl CommandStatus {
    /// Successful exit.
    pub const SUCCESS: Self = Self { code: Some(0) };

    /// Status for a process that exited with `code`.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Status for a process terminated by a signal.
    #[must_use]
    pub const fn signaled() -> Self {
        Self { code: None }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, `None` when terminated by a signal.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for CommandStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "no exit code (terminated by signal)"),
        }
    }
}

/// Minimal HTTP response: status and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Handle to a background service we started.
///
/// The service outlives the bootstrapper: dropping the handle never kills
/// the process.
#[derive(Debug)]
pub struct ServiceHandle {
    pid: u32,
    child: Option<Child>,
    exit: Option<CommandStatus>,
}

impl ServiceHandle {
    /// Wrap a real child process.
    #[must_use]
    pub fn from_child(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
            exit: None,
        }
    }

    /// Handle with no backing process. `exit` is reported by
    /// [`try_exit`](Self::try_exit) when set.
    #[must_use]
    pub fn simulated(pid: u32, exit: Option<CommandStatus>) -> Self {
        Self {
            pid,
            child: None,
            exit,
        }
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Check without blocking whether the process has exited.
    pub fn try_exit(&mut self) -> std::io::Result<Option<CommandStatus>> {
        if let Some(status) = self.exit {
            return Ok(Some(status));
        }
        match self.child.as_mut() {
            Some(child) => {
                let status = child.try_wait()?.map(CommandStatus::from);
                self.exit = status;
                Ok(status)
            }
            None => Ok(None),
        }
    }
}

/// Everything the pipeline needs from the operating system.
#[async_trait]
pub trait Host: Send + Sync {
    /// Resolve an executable on PATH.
    fn resolve(&self, binary: &str) -> Option<PathBuf>;

    /// Whether an executable is resolvable on PATH.
    fn is_installed(&self, binary: &str) -> bool {
        self.resolve(binary).is_some()
    }

    /// Run a command to completion with inherited stdio.
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandStatus>;

    /// Start a command in the background and return immediately.
    fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<ServiceHandle>;

    /// HTTP GET with a per-request timeout. Connection-level failures are
    /// returned as `Err` with a description.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_display_quotes_whitespace() {
        let inv = Invocation::new("sh")
            .arg("-c")
            .arg("curl -fsSL https://ollama.com/install.sh | sh");
        assert_eq!(
            inv.to_string(),
            "sh -c \"curl -fsSL https://ollama.com/install.sh | sh\""
        );
    }

    #[test]
    fn invocation_builder_collects_env() {
        let inv = Invocation::new("ollama")
            .args(["serve"])
            .env("OLLAMA_HOST", "0.0.0.0:11434");
        assert_eq!(inv.args, vec!["serve"]);
        assert_eq!(
            inv.env,
            vec![("OLLAMA_HOST".to_string(), "0.0.0.0:11434".to_string())]
        );
    }

    #[test]
    fn command_status_success_only_for_zero() {
        assert!(CommandStatus::SUCCESS.success());
        assert!(!CommandStatus::from_code(1).success());
        assert!(!CommandStatus::signaled().success());
        assert_eq!(CommandStatus::from_code(127).to_string(), "exit code 127");
    }

    #[test]
    fn simulated_handle_reports_preset_exit() {
        let mut running = ServiceHandle::simulated(42, None);
        assert_eq!(running.pid(), 42);
        assert_eq!(running.try_exit().unwrap(), None);

        let mut crashed = ServiceHandle::simulated(43, Some(CommandStatus::from_code(1)));
        assert_eq!(crashed.try_exit().unwrap(), Some(CommandStatus::from_code(1)));
    }

    #[test]
    fn http_response_success_range() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let missing = HttpResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
