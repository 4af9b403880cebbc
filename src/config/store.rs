//! Live, shared configuration with JSON patching.
//!
//! [`ConfigStore`] is created once at start-up and handed to every component
//! that reads settings.  Readers take a cheap clone of the section they need
//! at the moment they need it, so a patch applied from the dashboard is picked
//! up by the next workflow without restarting anything.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::settings::{AppConfig, RemoteConfig};

/// Keys the dashboard settings form posts at the top level; they belong to
/// the `remote` section.
const FLAT_REMOTE_KEYS: &[&str] = &["base_url", "api_key", "capture_url"];

pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Load from `path` (defaults when the file is missing); patches are
    /// persisted back to the same file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = AppConfig::load_from(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(config),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// A store that persists to `path` but starts from `config`.
    pub fn with_path(config: AppConfig, path: PathBuf) -> Self {
        Self {
            path: Some(path),
            current: RwLock::new(config),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.current.read().clone()
    }

    pub fn remote(&self) -> RemoteConfig {
        self.current.read().remote.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Deep-merge `patch` into the current configuration, validate, persist
    /// and swap it in.  On any error the live configuration is untouched.
    pub fn apply_patch(&self, patch: &Value) -> Result<AppConfig> {
        let Value::Object(patch) = patch else {
            bail!("configuration update must be a JSON object");
        };
        let patch = lift_flat_remote_keys(patch.clone());

        let mut current = self.current.write();
        let mut merged = serde_json::to_value(&*current)?;
        merge(&mut merged, &Value::Object(patch));

        let updated: AppConfig =
            serde_json::from_value(merged).context("invalid configuration update")?;
        updated.validate()?;

        if let Some(path) = &self.path {
            updated
                .save_to(path)
                .with_context(|| format!("writing {}", path.display()))?;
        }

        log::info!("config: update applied");
        *current = updated.clone();
        Ok(updated)
    }
}

fn lift_flat_remote_keys(mut patch: Map<String, Value>) -> Map<String, Value> {
    let mut remote = Map::new();
    for key in FLAT_REMOTE_KEYS {
        if let Some(value) = patch.remove(*key) {
            remote.insert((*key).to_string(), value);
        }
    }
    if !remote.is_empty() {
        let section = patch
            .entry("remote")
            .or_insert_with(|| Value::Object(Map::new()));
        merge(section, &Value::Object(remote));
    }
    patch
}

fn merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}
