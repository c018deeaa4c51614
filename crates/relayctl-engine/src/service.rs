//! Service-manager port and its systemd adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::EngineError;

/// Lifecycle control of the engine's unit.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Unit name, for messages.
    fn unit(&self) -> &str;

    async fn start(&self) -> Result<(), EngineError>;
    async fn stop(&self) -> Result<(), EngineError>;
    async fn restart(&self) -> Result<(), EngineError>;
    async fn enable(&self) -> Result<(), EngineError>;
    async fn disable(&self) -> Result<(), EngineError>;
    async fn is_active(&self) -> Result<bool, EngineError>;

    /// Human-readable status report.
    async fn status(&self) -> Result<String, EngineError> {
        Ok(if self.is_active().await? {
            format!("{} is active", self.unit())
        } else {
            format!("{} is inactive", self.unit())
        })
    }
}

#[async_trait]
impl<S: ServiceManager + ?Sized> ServiceManager for Arc<S> {
    fn unit(&self) -> &str {
        (**self).unit()
    }
    async fn start(&self) -> Result<(), EngineError> {
        (**self).start().await
    }
    async fn stop(&self) -> Result<(), EngineError> {
        (**self).stop().await
    }
    async fn restart(&self) -> Result<(), EngineError> {
        (**self).restart().await
    }
    async fn enable(&self) -> Result<(), EngineError> {
        (**self).enable().await
    }
    async fn disable(&self) -> Result<(), EngineError> {
        (**self).disable().await
    }
    async fn is_active(&self) -> Result<bool, EngineError> {
        (**self).is_active().await
    }
    async fn status(&self) -> Result<String, EngineError> {
        (**self).status().await
    }
}

/// `systemctl` driver for a single unit.
#[derive(Debug, Clone)]
pub struct Systemd {
    unit: String,
}

impl Systemd {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    async fn systemctl(&self, verb: &'static str) -> Result<(), EngineError> {
        debug!(unit = %self.unit, verb, "systemctl");
        let output = Command::new("systemctl")
            .arg(verb)
            .arg(&self.unit)
            .output()
            .await?;
        if output.status.success() {
            info!(unit = %self.unit, verb, "service command ok");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(EngineError::Service(format!(
            "systemctl {verb} {}: {}",
            self.unit,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl ServiceManager for Systemd {
    fn unit(&self) -> &str {
        &self.unit
    }

    async fn start(&self) -> Result<(), EngineError> {
        self.systemctl("start").await
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.systemctl("stop").await
    }

    async fn restart(&self) -> Result<(), EngineError> {
        self.systemctl("restart").await
    }

    async fn enable(&self) -> Result<(), EngineError> {
        self.systemctl("enable").await
    }

    async fn disable(&self) -> Result<(), EngineError> {
        self.systemctl("disable").await
    }

    async fn is_active(&self) -> Result<bool, EngineError> {
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet"])
            .arg(&self.unit)
            .status()
            .await?;
        Ok(status.success())
    }

    async fn status(&self) -> Result<String, EngineError> {
        let output = Command::new("systemctl")
            .args(["status", "--no-pager", "--lines=5"])
            .arg(&self.unit)
            .output()
            .await?;
        // Exit status is non-zero for inactive units; report the text regardless.
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
