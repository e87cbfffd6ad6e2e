//! Configuration for the bootstrap pipeline.
//!
//! Every constant of the procedure lives here so a project can pin a
//! different model or manifest without touching code. Defaults reproduce the
//! stock setup: Ollama from its official install script, `qwen2.5:7b`, and
//! `pip install -r requirements.txt`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Ollama API base URL.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Port the runtime listens on when `OLLAMA_HOST` names none.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Default model pulled during setup.
pub const DEFAULT_MODEL: &str = "qwen2.5:7b";

/// Top-level bootstrap configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub dependencies: DependencyConfig,

    #[serde(default)]
    pub app: AppConfig,
}

/// Settings for the Ollama runtime binary and service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Executable name probed on PATH.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Install script fetched and piped to `sh` when the binary is missing.
    #[serde(default = "default_install_script_url")]
    pub install_script_url: String,

    /// Custom API host. `None` means the runtime's own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Upper bound on waiting for the API after starting the service.
    #[serde(default = "default_ready_timeout", with = "humantime_serde")]
    pub ready_timeout: Duration,

    /// Interval between readiness polls.
    #[serde(default = "default_ready_interval", with = "humantime_serde")]
    pub ready_interval: Duration,
}

fn default_binary() -> String {
    "ollama".to_string()
}

fn default_install_script_url() -> String {
    "https://ollama.com/install.sh".to_string()
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_ready_interval() -> Duration {
    Duration::from_millis(200)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            install_script_url: default_install_script_url(),
            host: None,
            ready_timeout: default_ready_timeout(),
            ready_interval: default_ready_interval(),
        }
    }
}

impl RuntimeConfig {
    /// Get the configured host or the default.
    #[must_use]
    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_OLLAMA_HOST)
    }

    /// API base URL with a scheme, a port and no trailing slash.
    ///
    /// `OLLAMA_HOST` is commonly set as a bare `host`, `host:port` or
    /// `:port`. The gaps are filled the way the runtime fills them when it
    /// binds: `http`, `127.0.0.1`, and port 11434 (443 for `https`).
    #[must_use]
    pub fn base_url(&self) -> String {
        let raw = self.host_or_default().trim().trim_end_matches('/');
        let (scheme, rest) = raw.split_once("://").unwrap_or(("http", raw));
        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };

        let mut authority = if authority.is_empty() || authority.starts_with(':') {
            format!("127.0.0.1{authority}")
        } else {
            authority.to_string()
        };

        // IPv6 literals carry colons inside the brackets
        let has_port = match authority.rfind(']') {
            Some(end) => authority[end + 1..].starts_with(':'),
            None => authority.contains(':'),
        };
        if !has_port {
            let port = if scheme == "https" { 443 } else { DEFAULT_OLLAMA_PORT };
            authority = format!("{authority}:{port}");
        }

        format!("{scheme}://{authority}{path}")
    }
}

/// Which model artifact to pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier passed to `ollama pull`.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Confirm the model is listed by the runtime after pulling.
    #[serde(default = "default_true")]
    pub verify: bool,
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            verify: true,
        }
    }
}

/// Python dependency installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Package installer executable.
    #[serde(default = "default_installer")]
    pub installer: String,

    /// Manifest passed to `<installer> install -r`.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

fn default_installer() -> String {
    "pip".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            installer: default_installer(),
            manifest: default_manifest(),
        }
    }
}

/// The downstream application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directories the application expects, created relative to the
    /// working directory.
    #[serde(default = "default_data_dirs")]
    pub data_dirs: Vec<PathBuf>,

    /// Command printed at the end for the user to start the application.
    #[serde(default = "default_run_command")]
    pub run_command: String,
}

fn default_data_dirs() -> Vec<PathBuf> {
    ["data", "data/scripts", "data/logs"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_run_command() -> String {
    "streamlit run app.py".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dirs: default_data_dirs(),
            run_command: default_run_command(),
        }
    }
}
