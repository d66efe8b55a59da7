//! Docker CLI lifecycle controller.
//!
//! The backend is a container addressed by name. Running state comes from
//! `docker ps` filtered to running containers with exactly that name.

use crate::lifecycle::LifecycleController;
use crate::LicenseGateError;
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Controls one container through the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerLifecycle {
    docker_binary: String,
    container: String,
}

impl DockerLifecycle {
    /// Control `container` using a specific Docker CLI binary.
    pub fn with_binary(docker_binary: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            docker_binary: docker_binary.into(),
            container: container.into(),
        }
    }

    async fn docker(&self, args: &[&str]) -> Result<Output, LicenseGateError> {
        debug!(binary = %self.docker_binary, ?args, "Running docker");
        let output = Command::new(&self.docker_binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                LicenseGateError::LifecycleControlFailed(format!(
                    "Failed to run {}: {}",
                    self.docker_binary, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LicenseGateError::LifecycleControlFailed(format!(
                "docker {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl LifecycleController for DockerLifecycle {
    async fn is_running(&self) -> Result<bool, LicenseGateError> {
        let name_filter = format!("name=^{}$", escape_name_pattern(&self.container));
        let output = self
            .docker(&[
                "ps",
                "--filter",
                &name_filter,
                "--filter",
                "status=running",
                "--format",
                "{{.Names}}",
            ])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().any(|line| line.trim() == self.container))
    }

    async fn start(&self) -> Result<(), LicenseGateError> {
        self.docker(&["start", &self.container]).await.map(|_| ())
    }

    async fn stop(&self) -> Result<(), LicenseGateError> {
        self.docker(&["stop", &self.container]).await.map(|_| ())
    }
}

/// Escape regex metacharacters so `docker ps --filter name=` matches the
/// container name literally.
fn escape_name_pattern(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
