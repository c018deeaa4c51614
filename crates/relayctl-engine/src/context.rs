//! Store, validator and service manager bundled into one commit path.

use std::path::Path;
use std::sync::Arc;

use relayctl_config::{Commit, ConfigDocument, ConfigError, ConfigStore, ConfigValidator};
use relayctl_core::ERROR_SERVICE;
use tracing::{error, info};

use crate::error::EngineError;
use crate::service::ServiceManager;

/// Handle every mutating subcommand goes through.
#[derive(Clone)]
pub struct RelayContext {
    store: ConfigStore,
    validator: Arc<dyn ConfigValidator>,
    service: Arc<dyn ServiceManager>,
    restart: bool,
}

impl RelayContext {
    pub fn new(
        store: ConfigStore,
        validator: Arc<dyn ConfigValidator>,
        service: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            store,
            validator,
            service,
            restart: true,
        }
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn config_path(&self) -> &Path {
        self.store.path()
    }

    pub fn service(&self) -> &dyn ServiceManager {
        self.service.as_ref()
    }

    /// Current committed document.
    pub fn read(&self) -> Result<ConfigDocument, ConfigError> {
        self.store.read()
    }

    /// Apply `mutate` through the store's commit protocol, then restart the
    /// engine if the document changed.
    ///
    /// A restart failure is reported as [`EngineError::ServiceFailure`]; the
    /// committed document is not rolled back.
    pub async fn commit<T, E, F>(&self, mutate: F) -> Result<Commit<T>, E>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<T, E>,
        E: From<ConfigError> + From<EngineError>,
    {
        let commit = self.store.transaction(&self.validator, mutate)?;
        if commit.changed {
            self.restart_after_commit().await?;
        }
        Ok(commit)
    }

    /// Commit a freshly synthesized document, enable the unit and (re)start it.
    pub async fn install(&self, doc: &ConfigDocument, overwrite: bool) -> Result<(), EngineError> {
        self.store.create(&self.validator, doc, overwrite)?;
        if self.restart {
            self.service
                .enable()
                .await
                .map_err(|e| self.service_failure("enable", e))?;
        }
        self.restart_after_commit().await
    }

    async fn restart_after_commit(&self) -> Result<(), EngineError> {
        if !self.restart {
            info!(unit = self.service.unit(), "restart skipped; changes apply on next start");
            return Ok(());
        }
        self.service
            .restart()
            .await
            .map_err(|e| self.service_failure("restart", e))?;
        info!(unit = self.service.unit(), "engine restarted");
        Ok(())
    }

    fn service_failure(&self, action: &'static str, e: EngineError) -> EngineError {
        error!(
            unit = self.service.unit(),
            action,
            error = %e,
            kind = ERROR_SERVICE,
            "service failure after commit"
        );
        EngineError::ServiceFailure {
            unit: self.service.unit().to_string(),
            action,
            detail: e.to_string(),
            config: self.store.path().to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use relayctl_config::{ListenerPorts, Rejection, build_gateway, set_log_level};

    use super::*;

    struct Accept;
    impl ConfigValidator for Accept {
        fn validate(&self, _: &ConfigDocument) -> Result<(), Rejection> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeService {
        restarts: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl ServiceManager for FakeService {
        fn unit(&self) -> &str {
            "fake"
        }
        async fn start(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn restart(&self) -> Result<(), EngineError> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EngineError::Service("unit failed".into()))
            } else {
                Ok(())
            }
        }
        async fn enable(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn disable(&self) -> Result<(), EngineError> {
            Ok(())
        }
        async fn is_active(&self) -> Result<bool, EngineError> {
            Ok(true)
        }
    }

    async fn context(dir: &Path, service: Arc<FakeService>) -> RelayContext {
        let ctx = RelayContext::new(
            ConfigStore::new(dir.join("config.json")),
            Arc::new(Accept),
            service,
        );
        let doc = build_gateway(ListenerPorts::default()).unwrap();
        ctx.install(&doc, false).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn change_restarts_once_noop_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(FakeService::default());
        let ctx = context(dir.path(), svc.clone()).await;
        assert_eq!(svc.restarts.load(Ordering::SeqCst), 1);

        let c = ctx
            .commit::<_, EngineError, _>(|d| Ok(set_log_level(d, "info")?))
            .await
            .unwrap();
        assert!(c.changed);
        assert_eq!(svc.restarts.load(Ordering::SeqCst), 2);

        let c = ctx
            .commit::<_, EngineError, _>(|d| Ok(set_log_level(d, "info")?))
            .await
            .unwrap();
        assert!(!c.changed);
        assert_eq!(svc.restarts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn service_failure_keeps_commit() {
        let dir = tempfile::tempdir().unwrap();
        let ok = Arc::new(FakeService::default());
        let ctx = context(dir.path(), ok).await;

        let failing = Arc::new(FakeService {
            fail: true,
            ..FakeService::default()
        });
        let ctx = RelayContext::new(ctx.store().clone(), Arc::new(Accept), failing);
        let err = ctx
            .commit::<_, EngineError, _>(|d| Ok(set_log_level(d, "debug")?))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ServiceFailure { action: "restart", .. }));
        assert_eq!(
            ctx.read().unwrap().log.level,
            relayctl_config::LogLevel::Debug
        );
    }

    #[tokio::test]
    async fn no_restart_skips_service() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(FakeService::default());
        let ctx = context(dir.path(), svc.clone()).await.with_restart(false);
        ctx.commit::<_, EngineError, _>(|d| Ok(set_log_level(d, "none")?))
            .await
            .unwrap();
        assert_eq!(svc.restarts.load(Ordering::SeqCst), 1);
    }
}
