//! Scriptable [`Host`] for tests.
//!
//! MockHost keeps a tiny model of a machine: which binaries are on PATH,
//! whether the runtime API is answering, and which models it lists. Every
//! call is recorded in order so tests can assert on sequencing and on which
//! side effects happened.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandStatus, Host, HttpResponse, Invocation, ServiceHandle};

/// A recorded interaction with the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(String),
    Run(Invocation),
    Spawn(Invocation),
    Get(String),
}

#[derive(Debug, Default)]
struct MockState {
    installed: HashSet<String>,
    /// Program whose successful run puts a binary on PATH.
    installers: HashMap<String, String>,
    /// Queued exit statuses per program; success when the queue is empty.
    statuses: HashMap<String, VecDeque<CommandStatus>>,
    /// Whether the API answers.
    serving: bool,
    /// Whether spawning the runtime brings the API up.
    spawn_serves: bool,
    /// Polls that still fail after a spawn before the API answers.
    warmup_polls: usize,
    /// Exit reported by the next spawned handle.
    spawn_exit: Option<CommandStatus>,
    models: Vec<String>,
    /// Whether a successful `pull` adds the model to the list.
    pull_registers: bool,
    next_pid: u32,
    calls: Vec<Call>,
}

/// Scriptable host used by pipeline and CLI tests.
#[derive(Debug)]
pub struct MockHost {
    state: Mutex<MockState>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// Empty machine: nothing installed, nothing serving. Spawning a process
    /// brings the API up immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                spawn_serves: true,
                pull_registers: true,
                next_pid: 4242,
                ..Default::default()
            }),
        }
    }

    /// Put `binary` on PATH.
    #[must_use]
    pub fn with_installed(self, binary: &str) -> Self {
        self.lock().installed.insert(binary.to_string());
        self
    }

    /// A successful run of `program` puts `binary` on PATH.
    #[must_use]
    pub fn installs_on_success(self, program: &str, binary: &str) -> Self {
        self.lock()
            .installers
            .insert(program.to_string(), binary.to_string());
        self
    }

    /// Queue an exit status for the next run of `program`.
    #[must_use]
    pub fn with_status(self, program: &str, status: CommandStatus) -> Self {
        self.lock()
            .statuses
            .entry(program.to_string())
            .or_default()
            .push_back(status);
        self
    }

    /// The runtime API is already answering.
    #[must_use]
    pub fn already_serving(self) -> Self {
        self.lock().serving = true;
        self
    }

    /// Spawning never brings the API up.
    #[must_use]
    pub fn never_ready(self) -> Self {
        self.lock().spawn_serves = false;
        self
    }

    /// After a spawn, the first `polls` requests fail.
    #[must_use]
    pub fn ready_after(self, polls: usize) -> Self {
        self.lock().warmup_polls = polls;
        self
    }

    /// The next spawned process reports it has exited with `status`.
    #[must_use]
    pub fn spawn_exits(self, status: CommandStatus) -> Self {
        let mut state = self.lock();
        state.spawn_exit = Some(status);
        state.spawn_serves = false;
        drop(state);
        self
    }

    /// Whether a successful pull makes the model show up in `/api/tags`.
    #[must_use]
    pub fn pull_registers(self, registers: bool) -> Self {
        self.lock().pull_registers = registers;
        self
    }

    /// Models the runtime lists before anything is pulled.
    #[must_use]
    pub fn with_models(self, models: &[&str]) -> Self {
        self.lock()
            .models
            .extend(models.iter().map(|m| m.to_string()));
        self
    }

    /// All recorded calls, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Recorded runs and spawns rendered as command lines.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Run(inv) => Some(inv.to_string()),
                Call::Spawn(inv) => Some(format!("spawn {inv}")),
                _ => None,
            })
            .collect()
    }

    /// Position of the first recorded command starting with `prefix`.
    #[must_use]
    pub fn command_index(&self, prefix: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.starts_with(prefix))
    }

    /// Whether any recorded command starts with `prefix`.
    #[must_use]
    pub fn ran(&self, prefix: &str) -> bool {
        self.command_index(prefix).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

fn tags_body(models: &[String]) -> String {
    let entries: Vec<serde_json::Value> = models
        .iter()
        .map(|name| serde_json::json!({ "name": name, "model": name }))
        .collect();
    serde_json::json!({ "models": entries }).to_string()
}

#[async_trait]
impl Host for MockHost {
    fn resolve(&self, binary: &str) -> Option<PathBuf> {
        let mut state = self.lock();
        state.calls.push(Call::Resolve(binary.to_string()));
        state
            .installed
            .contains(binary)
            .then(|| PathBuf::from("/usr/local/bin").join(binary))
    }

    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandStatus> {
        let mut state = self.lock();
        state.calls.push(Call::Run(invocation.clone()));

        let status = state
            .statuses
            .get_mut(&invocation.program)
            .and_then(VecDeque::pop_front)
            .unwrap_or(CommandStatus::SUCCESS);

        if status.success() {
            if let Some(binary) = state.installers.get(&invocation.program).cloned() {
                state.installed.insert(binary);
            }
            if state.pull_registers
                && invocation.args.first().map(String::as_str) == Some("pull")
                && let Some(model) = invocation.args.get(1)
                && !state.models.contains(model)
            {
                state.models.push(model.clone());
            }
        }

        Ok(status)
    }

    fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<ServiceHandle> {
        let mut state = self.lock();
        state.calls.push(Call::Spawn(invocation.clone()));

        if !state.installed.contains(&invocation.program) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: command not found", invocation.program),
            ));
        }

        if state.spawn_serves {
            state.serving = true;
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        Ok(ServiceHandle::simulated(pid, state.spawn_exit.take()))
    }

    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, String> {
        let mut state = self.lock();
        state.calls.push(Call::Get(url.to_string()));

        if !state.serving {
            return Err("connection refused".to_string());
        }
        if state.warmup_polls > 0 {
            state.warmup_polls -= 1;
            return Err("connection reset".to_string());
        }
        if url.ends_with("/api/tags") {
            Ok(HttpResponse {
                status: 200,
                body: tags_body(&state.models),
            })
        } else {
            Ok(HttpResponse {
                status: 404,
                body: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_tracks_installed_binaries() {
        let host = MockHost::new().with_installed("pip");
        assert!(host.is_installed("pip"));
        assert!(!host.is_installed("ollama"));
        assert_eq!(
            host.calls(),
            vec![
                Call::Resolve("pip".to_string()),
                Call::Resolve("ollama".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn installer_puts_binary_on_path() {
        let host = MockHost::new().installs_on_success("sh", "ollama");
        let status = host.run(&Invocation::new("sh")).await.unwrap();
        assert!(status.success());
        assert!(host.is_installed("ollama"));
    }

    #[tokio::test]
    async fn failed_installer_leaves_path_untouched() {
        let host = MockHost::new()
            .installs_on_success("sh", "ollama")
            .with_status("sh", CommandStatus::from_code(1));
        let status = host.run(&Invocation::new("sh")).await.unwrap();
        assert_eq!(status.code(), Some(1));
        assert!(!host.is_installed("ollama"));
    }

    #[tokio::test]
    async fn spawn_brings_api_up_after_warmup() {
        let host = MockHost::new().with_installed("ollama").ready_after(1);
        let url = "http://localhost:11434/api/tags";
        assert!(host.get(url, Duration::from_secs(1)).await.is_err());

        host.spawn_detached(&Invocation::new("ollama").arg("serve"))
            .unwrap();
        assert!(host.get(url, Duration::from_secs(1)).await.is_err());
        let response = host.get(url, Duration::from_secs(1)).await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn pull_registers_model() {
        let host = MockHost::new().with_installed("ollama").already_serving();
        host.run(&Invocation::new("ollama").args(["pull", "qwen2.5:7b"]))
            .await
            .unwrap();
        let response = host
            .get("http://localhost:11434/api/tags", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(response.body.contains("qwen2.5:7b"));
    }

    #[tokio::test]
    async fn pull_without_registering_leaves_list_empty() {
        let host = MockHost::new()
            .with_installed("ollama")
            .already_serving()
            .pull_registers(false);
        let status = host
            .run(&Invocation::new("ollama").args(["pull", "qwen2.5:7b"]))
            .await
            .unwrap();
        assert!(status.success());
        let response = host
            .get("http://localhost:11434/api/tags", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!response.body.contains("qwen2.5:7b"));
    }

    #[test]
    fn spawn_missing_binary_fails() {
        let host = MockHost::new();
        assert!(host.spawn_detached(&Invocation::new("ollama")).is_err());
    }
}
