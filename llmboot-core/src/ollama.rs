//! Ollama runtime operations.
//!
//! Probing, installing, starting and querying the Ollama server. Unlike a
//! supervisor, [`OllamaRuntime`] only launches `ollama serve`; the process is
//! left running when the bootstrapper exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::StepError;
use crate::host::{Host, Invocation, ServiceHandle};

/// Timeout for a single readiness request.
const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for listing models.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response from Ollama's `/api/tags` endpoint.
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagsModel>,
}

/// Model entry from `/api/tags`. Older servers only send `name`, newer ones
/// also send `model`.
#[derive(Debug, Deserialize)]
pub struct TagsModel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl TagsResponse {
    /// Model identifiers, preferring `name` over `model`.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.models
            .iter()
            .filter_map(|m| m.name.clone().or_else(|| m.model.clone()))
            .collect()
    }
}

/// Whether `wanted` is among `available`, treating an untagged name as
/// `:latest`. Only the last path segment can carry a tag; a colon before it
/// belongs to a registry port.
#[must_use]
pub fn model_listed(available: &[String], wanted: &str) -> bool {
    let name = wanted.rsplit('/').next().unwrap_or(wanted);
    let normalized = if name.contains(':') {
        wanted.to_string()
    } else {
        format!("{wanted}:latest")
    };
    available.iter().any(|m| m == wanted || *m == normalized)
}

/// The Ollama runtime as seen through a [`Host`].
pub struct OllamaRuntime {
    host: Arc<dyn Host>,
    config: RuntimeConfig,
}

impl OllamaRuntime {
    #[must_use]
    pub fn new(host: Arc<dyn Host>, config: RuntimeConfig) -> Self {
        Self { host, config }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// URL of the endpoint used for readiness and model listing.
    #[must_use]
    pub fn tags_url(&self) -> String {
        format!("{}/api/tags", self.config.base_url())
    }

    /// Resolved path of the runtime binary, if on PATH.
    #[must_use]
    pub fn resolve(&self) -> Option<PathBuf> {
        self.host.resolve(&self.config.binary)
    }

    /// Check if the runtime binary is on PATH.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.host.is_installed(&self.config.binary)
    }

    /// The command that installs the runtime.
    #[must_use]
    pub fn install_invocation(&self) -> Invocation {
        Invocation::new("sh").arg("-c").arg(format!(
            "curl -fsSL {} | sh",
            self.config.install_script_url
        ))
    }

    /// Run the vendor install script and confirm the binary landed on PATH.
    pub async fn install(&self) -> Result<(), StepError> {
        let invocation = self.install_invocation();
        info!(url = %self.config.install_script_url, "Installing runtime");
        run_checked(self.host.as_ref(), &invocation).await?;

        if !self.is_installed() {
            return Err(StepError::NotInstalledAfterInstall(
                self.config.binary.clone(),
            ));
        }
        info!(binary = %self.config.binary, "Runtime installed");
        Ok(())
    }

    /// Check if the runtime is serving by pinging the API.
    pub async fn is_running(&self) -> bool {
        match self.host.get(&self.tags_url(), READY_CHECK_TIMEOUT).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                debug!(error = %e, "Runtime API not reachable");
                false
            }
        }
    }

    /// Start `ollama serve` in the background unless the API already answers.
    ///
    /// Returns `None` when an existing instance was found.
    pub async fn start(&self) -> Result<Option<ServiceHandle>, StepError> {
        if self.is_running().await {
            info!(
                host = %self.config.host_or_default(),
                "Runtime is already running, skipping spawn"
            );
            return Ok(None);
        }

        let mut invocation = Invocation::new(&self.config.binary).arg("serve");
        if let Some(ref host) = self.config.host {
            invocation = invocation.env("OLLAMA_HOST", host);
        }

        info!(host = %self.config.host_or_default(), "Starting runtime service");
        let handle = self.host.spawn_detached(&invocation)?;
        info!(pid = handle.pid(), "Runtime process spawned");
        Ok(Some(handle))
    }

    /// Poll the API until it answers or `ready_timeout` elapses.
    ///
    /// When `handle` is given, a process exit during the wait fails fast.
    pub async fn wait_for_ready(
        &self,
        mut handle: Option<&mut ServiceHandle>,
    ) -> Result<Duration, StepError> {
        let start = Instant::now();
        let url = self.tags_url();

        loop {
            match self.host.get(&url, READY_CHECK_TIMEOUT).await {
                Ok(response) if response.is_success() => {
                    let elapsed = start.elapsed();
                    debug!(elapsed_ms = elapsed.as_millis() as u64, "Runtime is ready");
                    return Ok(elapsed);
                }
                Ok(response) => {
                    debug!(status = response.status, "Runtime not ready yet");
                }
                Err(e) => {
                    debug!(error = %e, "Runtime not ready yet");
                }
            }

            if let Some(handle) = handle.as_deref_mut()
                && let Some(status) = handle.try_exit()?
            {
                warn!(status = %status, "Runtime process exited unexpectedly");
                return Err(StepError::ServiceExited(status));
            }

            if start.elapsed() >= self.config.ready_timeout {
                return Err(StepError::ReadyTimeout(self.config.ready_timeout));
            }

            tokio::time::sleep(self.config.ready_interval).await;
        }
    }

    /// Pull a model with `ollama pull`, streaming its progress to the terminal.
    pub async fn pull(&self, model: &str) -> Result<(), StepError> {
        let invocation = Invocation::new(&self.config.binary).args(["pull", model]);
        info!(model = %model, "Pulling model");
        run_checked(self.host.as_ref(), &invocation).await
    }

    /// List models known to the running server.
    pub async fn list_models(&self) -> Result<Vec<String>, StepError> {
        let response = self
            .host
            .get(&self.tags_url(), LIST_TIMEOUT)
            .await
            .map_err(StepError::Http)?;

        if !response.is_success() {
            return Err(StepError::Http(format!(
                "runtime API returned status {}",
                response.status
            )));
        }

        let tags: TagsResponse = serde_json::from_str(&response.body)
            .map_err(|e| StepError::Http(format!("invalid /api/tags response: {e}")))?;
        Ok(tags.names())
    }

    /// Whether the server lists `model`.
    pub async fn has_model(&self, model: &str) -> Result<bool, StepError> {
        let models = self.list_models().await?;
        debug!(?models, "Available models");
        Ok(model_listed(&models, model))
    }
}

/// Run an invocation and turn a non-zero exit into [`StepError::CommandFailed`].
pub(crate) async fn run_checked(host: &dyn Host, invocation: &Invocation) -> Result<(), StepError> {
    let status = host.run(invocation).await?;
    if status.success() {
        Ok(())
    } else {
        warn!(command = %invocation, status = %status, "Command failed");
        Err(StepError::CommandFailed {
            program: invocation.program.clone(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandStatus, MockHost};

    fn fast_config() -> RuntimeConfig {
        RuntimeConfig {
            ready_timeout: Duration::from_millis(100),
            ready_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn runtime(host: &Arc<MockHost>) -> OllamaRuntime {
        OllamaRuntime::new(host.clone(), fast_config())
    }

    #[test]
    fn tags_response_prefers_name() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"qwen2.5:7b","model":"qwen2.5:7b","size":1},{"model":"llama3:latest"}]}"#,
        )
        .unwrap();
        assert_eq!(tags.names(), vec!["qwen2.5:7b", "llama3:latest"]);
    }

    #[test]
    fn tags_response_handles_missing_models() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.names().is_empty());
    }

    #[test]
    fn model_listed_normalizes_latest() {
        let available = vec!["llama3:latest".to_string(), "qwen2.5:7b".to_string()];
        assert!(model_listed(&available, "llama3"));
        assert!(model_listed(&available, "qwen2.5:7b"));
        assert!(!model_listed(&available, "qwen2.5:14b"));
        assert!(!model_listed(&available, "qwen2.5"));
    }

    #[test]
    fn model_listed_ignores_registry_port() {
        let available = vec![
            "localhost:5000/foo:latest".to_string(),
            "registry.local:5000/team/bar:v2".to_string(),
        ];
        assert!(model_listed(&available, "localhost:5000/foo"));
        assert!(model_listed(&available, "registry.local:5000/team/bar:v2"));
        assert!(!model_listed(&available, "registry.local:5000/team/bar"));
    }

    #[tokio::test]
    async fn has_model_matches_untagged_registry_name() {
        let host = Arc::new(
            MockHost::new()
                .with_installed("ollama")
                .already_serving()
                .with_models(&["localhost:5000/foo:latest"]),
        );
        assert!(runtime(&host).has_model("localhost:5000/foo").await.unwrap());
    }

    #[test]
    fn install_invocation_pipes_script_to_sh() {
        let host = Arc::new(MockHost::new());
        let inv = runtime(&host).install_invocation();
        assert_eq!(inv.program, "sh");
        assert_eq!(
            inv.args,
            vec!["-c", "curl -fsSL https://ollama.com/install.sh | sh"]
        );
    }

    #[tokio::test]
    async fn install_fails_when_binary_still_missing() {
        // Script exits 0 but never puts ollama on PATH
        let host = Arc::new(MockHost::new());
        let err = runtime(&host).install().await.unwrap_err();
        assert!(matches!(err, StepError::NotInstalledAfterInstall(ref b) if b == "ollama"));
    }

    #[tokio::test]
    async fn install_propagates_script_exit_code() {
        let host = Arc::new(
            MockHost::new()
                .installs_on_success("sh", "ollama")
                .with_status("sh", CommandStatus::from_code(22)),
        );
        let err = runtime(&host).install().await.unwrap_err();
        assert_eq!(err.exit_code(), Some(22));
    }

    #[tokio::test]
    async fn start_skips_spawn_when_already_running() {
        let host = Arc::new(MockHost::new().with_installed("ollama").already_serving());
        let handle = runtime(&host).start().await.unwrap();
        assert!(handle.is_none());
        assert!(!host.ran("spawn"));
    }

    #[tokio::test]
    async fn start_passes_custom_host_to_service() {
        let host = Arc::new(MockHost::new().with_installed("ollama"));
        let config = RuntimeConfig {
            host: Some("127.0.0.1:11500".to_string()),
            ..fast_config()
        };
        let runtime = OllamaRuntime::new(host.clone(), config);
        let handle = runtime.start().await.unwrap();
        assert!(handle.is_some());

        let spawned = host
            .calls()
            .into_iter()
            .find_map(|c| match c {
                crate::host::Call::Spawn(inv) => Some(inv),
                _ => None,
            })
            .unwrap();
        assert_eq!(spawned.args, vec!["serve"]);
        assert_eq!(
            spawned.env,
            vec![("OLLAMA_HOST".to_string(), "127.0.0.1:11500".to_string())]
        );
    }

    #[tokio::test]
    async fn wait_for_ready_polls_until_success() {
        let host = Arc::new(MockHost::new().with_installed("ollama").ready_after(3));
        let runtime = runtime(&host);
        let mut handle = runtime.start().await.unwrap();
        runtime.wait_for_ready(handle.as_mut()).await.unwrap();

        let gets = host
            .calls()
            .iter()
            .filter(|c| matches!(c, crate::host::Call::Get(_)))
            .count();
        // One probe from start() plus three failed polls and the successful one
        assert_eq!(gets, 5);
    }

    #[tokio::test]
    async fn wait_for_ready_times_out() {
        let host = Arc::new(MockHost::new().with_installed("ollama").never_ready());
        let runtime = runtime(&host);
        let mut handle = runtime.start().await.unwrap();
        let err = runtime.wait_for_ready(handle.as_mut()).await.unwrap_err();
        assert!(matches!(err, StepError::ReadyTimeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn wait_for_ready_detects_crashed_process() {
        let host = Arc::new(
            MockHost::new()
                .with_installed("ollama")
                .spawn_exits(CommandStatus::from_code(1)),
        );
        let runtime = runtime(&host);
        let mut handle = runtime.start().await.unwrap();
        let err = runtime.wait_for_ready(handle.as_mut()).await.unwrap_err();
        assert!(matches!(err, StepError::ServiceExited(s) if s.code() == Some(1)));
    }

    #[tokio::test]
    async fn pull_then_list_contains_model() {
        let host = Arc::new(MockHost::new().with_installed("ollama").already_serving());
        let runtime = runtime(&host);
        assert!(!runtime.has_model("qwen2.5:7b").await.unwrap());
        runtime.pull("qwen2.5:7b").await.unwrap();
        assert!(runtime.has_model("qwen2.5:7b").await.unwrap());
    }

    #[tokio::test]
    async fn list_models_fails_when_not_serving() {
        let host = Arc::new(MockHost::new());
        let err = runtime(&host).list_models().await.unwrap_err();
        assert!(matches!(err, StepError::Http(_)));
    }
}
