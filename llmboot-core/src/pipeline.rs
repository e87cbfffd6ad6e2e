//! The bootstrap pipeline.
//!
//! A linear chain of steps. Each step either produces a [`StepOutcome`] and
//! hands over to the next one, or fails and ends the run with
//! [`BootstrapError::Step`]. Nothing is rolled back; re-running the pipeline
//! picks up where a failed run stopped because every step is idempotent.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::BootstrapConfig;
use crate::error::{BootstrapError, Result, StepError};
use crate::host::{Host, Invocation, ServiceHandle};
use crate::ollama::{OllamaRuntime, run_checked};

/// A stage of the bootstrap procedure, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ProbeRuntime,
    InstallRuntime,
    StartService,
    WaitReady,
    PullModel,
    VerifyModel,
    PrepareDirs,
    InstallDependencies,
    Complete,
}

impl Step {
    /// Every step in execution order.
    pub const ALL: [Step; 9] = [
        Step::ProbeRuntime,
        Step::InstallRuntime,
        Step::StartService,
        Step::WaitReady,
        Step::PullModel,
        Step::VerifyModel,
        Step::PrepareDirs,
        Step::InstallDependencies,
        Step::Complete,
    ];

    /// Stable kebab-case identifier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProbeRuntime => "probe-runtime",
            Self::InstallRuntime => "install-runtime",
            Self::StartService => "start-service",
            Self::WaitReady => "wait-ready",
            Self::PullModel => "pull-model",
            Self::VerifyModel => "verify-model",
            Self::PrepareDirs => "prepare-dirs",
            Self::InstallDependencies => "install-dependencies",
            Self::Complete => "complete",
        }
    }

    /// Human-readable progress label.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::ProbeRuntime => "Checking for Ollama",
            Self::InstallRuntime => "Installing Ollama",
            Self::StartService => "Starting Ollama service",
            Self::WaitReady => "Waiting for Ollama to be ready",
            Self::PullModel => "Pulling model",
            Self::VerifyModel => "Verifying model",
            Self::PrepareDirs => "Preparing data directories",
            Self::InstallDependencies => "Installing Python dependencies",
            Self::Complete => "Setup complete",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and changed the machine.
    Done,
    /// The step had nothing to do.
    Skipped { reason: String },
    /// The runtime binary was found.
    Present { path: PathBuf },
    /// The runtime binary was not found.
    Absent,
    /// The service was already answering; nothing was spawned.
    AlreadyRunning,
    /// A service process was started.
    Spawned { pid: u32 },
    /// The service answered after waiting this long.
    Ready { elapsed: Duration },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Present { path } => write!(f, "found at {}", path.display()),
            Self::Absent => write!(f, "not found"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::Spawned { pid } => write!(f, "started (pid {pid})"),
            Self::Ready { elapsed } => write!(f, "ready after {}ms", elapsed.as_millis()),
        }
    }
}

/// Record of a successful bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Completed steps in order.
    pub steps: Vec<(Step, StepOutcome)>,
    /// Whether this run installed the runtime.
    pub installed_runtime: bool,
    /// Model that was pulled.
    pub model: String,
    /// Command the user runs next.
    pub run_command: String,
}

impl BootstrapReport {
    fn new(config: &BootstrapConfig) -> Self {
        Self {
            steps: Vec::new(),
            installed_runtime: false,
            model: config.model.name.clone(),
            run_command: config.app.run_command.clone(),
        }
    }

    /// Outcome of `step`, if it ran.
    #[must_use]
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }
}

/// Side-effect-free snapshot of the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub binary: String,
    pub runtime_path: Option<PathBuf>,
    pub host: String,
    pub serving: bool,
    pub model: String,
    /// `None` when the service is not reachable.
    pub model_present: Option<bool>,
    pub manifest: PathBuf,
    pub manifest_present: bool,
}

impl StatusReport {
    /// Whether a setup run would have nothing left to do.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.runtime_path.is_some()
            && self.serving
            && self.model_present == Some(true)
            && self.manifest_present
    }
}

/// Receives progress notifications while the pipeline runs.
pub trait Observer: Send + Sync {
    fn step_started(&self, _step: Step) {}
    fn step_finished(&self, _step: Step, _outcome: &StepOutcome) {}
    fn step_failed(&self, _step: Step, _error: &StepError) {}
    /// Called once, only after every step succeeded.
    fn completed(&self, _report: &BootstrapReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Runs the bootstrap steps against a [`Host`].
pub struct Bootstrapper {
    host: Arc<dyn Host>,
    config: BootstrapConfig,
    runtime: OllamaRuntime,
    workdir: Option<PathBuf>,
}

impl Bootstrapper {
    #[must_use]
    pub fn new(host: Arc<dyn Host>, config: BootstrapConfig) -> Self {
        let runtime = OllamaRuntime::new(host.clone(), config.runtime.clone());
        Self {
            host,
            config,
            runtime,
            workdir: None,
        }
    }

    /// Resolve relative manifest and data paths against `dir` instead of the
    /// process working directory.
    #[must_use]
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workdir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// The dependency install command.
    #[must_use]
    pub fn dependency_invocation(&self) -> Invocation {
        let manifest = self.resolve_path(&self.config.dependencies.manifest);
        Invocation::new(&self.config.dependencies.installer).args([
            "install".to_string(),
            "-r".to_string(),
            manifest.display().to_string(),
        ])
    }

    /// Describe every step without touching the machine.
    #[must_use]
    pub fn plan(&self) -> Vec<(Step, String)> {
        let runtime = &self.config.runtime;
        let model = &self.config.model;
        Step::ALL
            .iter()
            .map(|&step| {
                let description = match step {
                    Step::ProbeRuntime => format!("Check for `{}` on PATH", runtime.binary),
                    Step::InstallRuntime => {
                        format!("If missing, run: {}", self.runtime.install_invocation())
                    }
                    Step::StartService => format!(
                        "Run `{} serve` in the background unless {} already answers",
                        runtime.binary,
                        runtime.base_url()
                    ),
                    Step::WaitReady => format!(
                        "Poll {} every {:?} for up to {:?}",
                        self.runtime.tags_url(),
                        runtime.ready_interval,
                        runtime.ready_timeout
                    ),
                    Step::PullModel => format!("Run: {} pull {}", runtime.binary, model.name),
                    Step::VerifyModel if model.verify => {
                        format!("Confirm `{}` is listed by the runtime", model.name)
                    }
                    Step::VerifyModel => "Skip (model.verify = false)".to_string(),
                    Step::PrepareDirs if self.config.app.data_dirs.is_empty() => {
                        "Skip (no data directories configured)".to_string()
                    }
                    Step::PrepareDirs => format!(
                        "Create {}",
                        self.config
                            .app
                            .data_dirs
                            .iter()
                            .map(|d| d.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    Step::InstallDependencies => {
                        format!("Run: {}", self.dependency_invocation())
                    }
                    Step::Complete => {
                        format!("Print next step: {}", self.config.app.run_command)
                    }
                };
                (step, description)
            })
            .collect()
    }

    /// Inspect the environment without changing it.
    pub async fn status(&self) -> StatusReport {
        let runtime_path = self.runtime.resolve();
        let serving = self.runtime.is_running().await;
        let model_present = if serving {
            self.runtime.has_model(&self.config.model.name).await.ok()
        } else {
            None
        };
        let manifest = self.resolve_path(&self.config.dependencies.manifest);

        StatusReport {
            binary: self.config.runtime.binary.clone(),
            runtime_path,
            host: self.config.runtime.base_url(),
            serving,
            model: self.config.model.name.clone(),
            model_present,
            manifest_present: manifest.is_file(),
            manifest,
        }
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn run(&self, observer: &dyn Observer) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::new(&self.config);

        let probe = self
            .execute(Step::ProbeRuntime, observer, &mut report, self.probe_runtime())
            .await?;
        let present = matches!(probe, StepOutcome::Present { .. });

        self.execute(
            Step::InstallRuntime,
            observer,
            &mut report,
            self.install_runtime(present),
        )
        .await?;
        report.installed_runtime = !present;

        let mut service: Option<ServiceHandle> = None;
        self.execute(
            Step::StartService,
            observer,
            &mut report,
            self.start_service(&mut service),
        )
        .await?;

        self.execute(
            Step::WaitReady,
            observer,
            &mut report,
            self.wait_ready(service.as_mut()),
        )
        .await?;

        self.execute(Step::PullModel, observer, &mut report, self.pull_model())
            .await?;
        self.execute(Step::VerifyModel, observer, &mut report, self.verify_model())
            .await?;
        self.execute(Step::PrepareDirs, observer, &mut report, self.prepare_dirs())
            .await?;
        self.execute(
            Step::InstallDependencies,
            observer,
            &mut report,
            self.install_dependencies(),
        )
        .await?;
        self.execute(Step::Complete, observer, &mut report, async {
            Ok::<_, StepError>(StepOutcome::Done)
        })
        .await?;

        info!(model = %report.model, "Bootstrap complete");
        observer.completed(&report);
        Ok(report)
    }

    async fn execute<F>(
        &self,
        step: Step,
        observer: &dyn Observer,
        report: &mut BootstrapReport,
        work: F,
    ) -> Result<StepOutcome>
    where
        F: Future<Output = std::result::Result<StepOutcome, StepError>>,
    {
        observer.step_started(step);
        info!(step = %step, "{}", step.title());

        match work.await {
            Ok(outcome) => {
                info!(step = %step, outcome = %outcome, "Step finished");
                observer.step_finished(step, &outcome);
                report.steps.push((step, outcome.clone()));
                Ok(outcome)
            }
            Err(source) => {
                error!(step = %step, error = %source, "Step failed");
                observer.step_failed(step, &source);
                Err(BootstrapError::Step { step, source })
            }
        }
    }

    async fn probe_runtime(&self) -> std::result::Result<StepOutcome, StepError> {
        Ok(match self.runtime.resolve() {
            Some(path) => StepOutcome::Present { path },
            None => StepOutcome::Absent,
        })
    }

    async fn install_runtime(&self, present: bool) -> std::result::Result<StepOutcome, StepError> {
        if present {
            return Ok(StepOutcome::Skipped {
                reason: "already installed".to_string(),
            });
        }
        self.runtime.install().await?;
        Ok(StepOutcome::Done)
    }

    async fn start_service(
        &self,
        service: &mut Option<ServiceHandle>,
    ) -> std::result::Result<StepOutcome, StepError> {
        match self.runtime.start().await? {
            Some(handle) => {
                let pid = handle.pid();
                *service = Some(handle);
                Ok(StepOutcome::Spawned { pid })
            }
            None => Ok(StepOutcome::AlreadyRunning),
        }
    }

    async fn wait_ready(
        &self,
        service: Option<&mut ServiceHandle>,
    ) -> std::result::Result<StepOutcome, StepError> {
        let elapsed = self.runtime.wait_for_ready(service).await?;
        Ok(StepOutcome::Ready { elapsed })
    }

    async fn pull_model(&self) -> std::result::Result<StepOutcome, StepError> {
        self.runtime.pull(&self.config.model.name).await?;
        Ok(StepOutcome::Done)
    }

    async fn verify_model(&self) -> std::result::Result<StepOutcome, StepError> {
        let model = &self.config.model;
        if !model.verify {
            return Ok(StepOutcome::Skipped {
                reason: "verification disabled".to_string(),
            });
        }
        if self.runtime.has_model(&model.name).await? {
            Ok(StepOutcome::Done)
        } else {
            Err(StepError::ModelMissing(model.name.clone()))
        }
    }

    async fn prepare_dirs(&self) -> std::result::Result<StepOutcome, StepError> {
        let dirs = &self.config.app.data_dirs;
        if dirs.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no data directories configured".to_string(),
            });
        }
        for dir in dirs {
            let path = self.resolve_path(dir);
            std::fs::create_dir_all(&path)?;
        }
        Ok(StepOutcome::Done)
    }

    async fn install_dependencies(&self) -> std::result::Result<StepOutcome, StepError> {
        let manifest = self.resolve_path(&self.config.dependencies.manifest);
        if !manifest.is_file() {
            return Err(StepError::ManifestMissing(manifest));
        }
        run_checked(self.host.as_ref(), &self.dependency_invocation()).await?;
        Ok(StepOutcome::Done)
    }
}
