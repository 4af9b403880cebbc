//! `config` module: read and patch the live configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;
use crate::hub::{NotificationLevel, StateHub};

use super::{CommandError, Module};

pub struct ConfigModule {
    store: Arc<ConfigStore>,
    hub: Arc<StateHub>,
}

impl ConfigModule {
    pub fn new(store: Arc<ConfigStore>, hub: Arc<StateHub>) -> Self {
        Self { store, hub }
    }

    fn current(&self) -> Result<Value, CommandError> {
        serde_json::to_value(self.store.snapshot()).map_err(|e| CommandError::Failed(e.to_string()))
    }

    fn update(&self, patch: Option<Value>) -> Result<Value, CommandError> {
        let patch = patch.ok_or_else(|| {
            CommandError::InvalidPayload("update needs a JSON object".into())
        })?;

        let updated = self
            .store
            .apply_patch(&patch)
            .map_err(|e| CommandError::Failed(format!("{e:#}")))?;

        self.hub.notify(
            "Configuration updated successfully",
            NotificationLevel::Success,
        );
        serde_json::to_value(updated).map_err(|e| CommandError::Failed(e.to_string()))
    }
}

#[async_trait]
impl Module for ConfigModule {
    fn name(&self) -> &'static str {
        "config"
    }

    async fn start(&self, _shutdown: CancellationToken) {
        match self.store.path() {
            Some(path) => log::info!("config: live settings backed by {}", path.display()),
            None => log::info!("config: live settings kept in memory"),
        }
    }

    async fn execute_command(
        &self,
        command: &str,
        data: Option<Value>,
    ) -> Result<Value, CommandError> {
        match command {
            "get" => self.current(),
            "update" => self.update(data),
            other => Err(CommandError::UnknownCommand(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::config::AppConfig;

    fn module_at(dir: &TempDir) -> (ConfigModule, Arc<ConfigStore>, Arc<StateHub>) {
        let store = Arc::new(ConfigStore::with_path(
            AppConfig::default(),
            dir.path().join("settings.toml"),
        ));
        let hub = Arc::new(StateHub::new(10));
        (ConfigModule::new(store.clone(), hub.clone()), store, hub)
    }

    #[tokio::test]
    async fn update_applies_flat_dashboard_keys_and_notifies() {
        let dir = TempDir::new().unwrap();
        let (module, store, hub) = module_at(&dir);

        let result = module
            .execute_command(
                "update",
                Some(json!({ "base_url": "http://vision.local", "api_key": "k-1" })),
            )
            .await
            .unwrap();

        assert_eq!(result["remote"]["base_url"], "http://vision.local");
        assert!(store.remote().is_configured());
        assert!(dir.path().join("settings.toml").exists());

        let history = hub.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].level, NotificationLevel::Success);
    }

    #[tokio::test]
    async fn get_returns_current_config() {
        let dir = TempDir::new().unwrap();
        let (module, _, _) = module_at(&dir);

        let result = module.execute_command("get", None).await.unwrap();
        assert_eq!(result["server"]["bind_addr"], "0.0.0.0:8000");
    }

    #[tokio::test]
    async fn invalid_update_leaves_config_untouched() {
        let dir = TempDir::new().unwrap();
        let (module, store, hub) = module_at(&dir);

        let err = module
            .execute_command("update", Some(json!({ "trigger": { "gpio_pin": "seventeen" } })))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Failed(_)));
        assert_eq!(store.snapshot().trigger.gpio_pin, 17);
        assert!(hub.history().is_empty());

        let err = module.execute_command("update", None).await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidPayload(_)));
    }
}
