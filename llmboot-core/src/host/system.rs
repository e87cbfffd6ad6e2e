//! Real [`Host`] backed by the local machine.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{CommandStatus, Host, HttpResponse, Invocation, ServiceHandle};

/// Host implementation that runs real processes and HTTP requests.
#[derive(Debug, Clone, Default)]
pub struct SystemHost {
    client: reqwest::Client,
}

impl SystemHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Host for SystemHost {
    fn resolve(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandStatus> {
        debug!(command = %invocation, "Running command");

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let status = cmd.status().await?;
        Ok(status.into())
    }

    fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<ServiceHandle> {
        debug!(command = %invocation, "Spawning background process");

        let mut cmd = std::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            // The service logs to stderr; keep it off the setup output
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so Ctrl-C on the setup run leaves the service up
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn()?;
        Ok(ServiceHandle::from_child(child))
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(HttpResponse { status, body })
    }
}
