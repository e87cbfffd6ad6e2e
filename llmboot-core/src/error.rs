//! Error types for the bootstrap pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::host::CommandStatus;
use crate::pipeline::Step;

/// Failure of a single pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// An external command ran and exited unsuccessfully.
    #[error("`{program}` exited with {status}")]
    CommandFailed {
        program: String,
        status: CommandStatus,
    },

    /// Spawning a process or touching the filesystem failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The install script succeeded but the binary is still not on PATH.
    #[error("`{0}` is still not on PATH after running the install script")]
    NotInstalledAfterInstall(String),

    /// The service did not answer its health endpoint in time.
    #[error("runtime did not become ready within {0:?}")]
    ReadyTimeout(Duration),

    /// The spawned service process exited before it became ready.
    #[error("runtime process exited before becoming ready ({0})")]
    ServiceExited(CommandStatus),

    /// The dependency manifest does not exist.
    #[error("dependency manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// The model is not listed by the runtime after pulling it.
    #[error("model `{0}` is not available in the runtime after pulling")]
    ModelMissing(String),

    /// HTTP request to the runtime API failed.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl StepError {
    /// Exit code of the failing external command, when there is one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { status, .. } | Self::ServiceExited(status) => status.code(),
            _ => None,
        }
    }
}

/// Failure of the bootstrap procedure as a whole.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A step failed; later steps were not run.
    #[error("step '{step}' failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: StepError,
    },
}

impl BootstrapError {
    /// The step that failed.
    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            Self::Step { step, .. } => *step,
        }
    }

    /// Exit code to propagate to the caller, if the failure carried one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Step { source, .. } => source.exit_code(),
        }
    }
}

/// Result type alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;
