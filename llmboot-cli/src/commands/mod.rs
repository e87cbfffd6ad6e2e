pub mod config;
pub mod setup;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use llmboot_core::{BootstrapConfig, Bootstrapper, Host};

use crate::config::ConfigLoader;

/// Per-invocation overrides, applied on top of every config layer.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Model to pull (overrides config and OLLAMA_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Dependency manifest to install
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Ollama API host (overrides config and OLLAMA_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Directory holding the application; relative paths resolve against it
    #[arg(long)]
    pub project_dir: Option<PathBuf>,
}

impl Overrides {
    /// Apply the flags to a loaded config.
    pub fn apply(&self, config: &mut BootstrapConfig) {
        if let Some(ref model) = self.model {
            config.model.name = model.clone();
        }
        if let Some(ref manifest) = self.manifest {
            config.dependencies.manifest = manifest.clone();
        }
        if let Some(ref host) = self.host {
            config.runtime.host = Some(host.clone());
        }
    }
}

/// Load layered config and apply command-line overrides.
pub fn load_config(explicit: Option<&Path>, overrides: &Overrides) -> Result<BootstrapConfig> {
    let mut config = ConfigLoader::load(explicit)?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Build a bootstrapper rooted at `--project-dir` when given.
pub fn bootstrapper(
    host: Arc<dyn Host>,
    config: BootstrapConfig,
    overrides: &Overrides,
) -> Bootstrapper {
    let bootstrapper = Bootstrapper::new(host, config);
    match overrides.project_dir {
        Some(ref dir) => bootstrapper.with_workdir(dir),
        None => bootstrapper,
    }
}
