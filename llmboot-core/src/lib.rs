//! llmboot-core - bootstrap pipeline for a local Ollama-backed application.
//!
//! The pipeline probes for the Ollama runtime, installs it when absent,
//! starts `ollama serve`, waits for the API to answer, pulls the configured
//! model and installs the application's Python dependencies.
//!
//! All operating-system access goes through the [`Host`] trait so the
//! pipeline can be driven against [`MockHost`] in tests.

pub mod config;
pub mod error;
pub mod host;
pub mod ollama;
pub mod pipeline;

pub use config::{AppConfig, BootstrapConfig, DependencyConfig, ModelConfig, RuntimeConfig};
pub use error::{BootstrapError, Result, StepError};
pub use host::{
    Call, CommandStatus, Host, HttpResponse, Invocation, MockHost, ServiceHandle, SystemHost,
};
pub use ollama::OllamaRuntime;
pub use pipeline::{
    BootstrapReport, Bootstrapper, NoopObserver, Observer, StatusReport, Step, StepOutcome,
};
