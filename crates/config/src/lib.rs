use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Storage backend ───────────────────────────────────────────────────────────

/// Which document/blob backend the binary wires into the engine.
///
/// | Backend  | Behaviour                                                   |
/// |----------|-------------------------------------------------------------|
/// | `fs`     | One JSON file per document and one file per blob under `root`. |
/// | `memory` | Process-local maps; everything is gone when the process exits. |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Fs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend.  Overridden at runtime by the
    /// `SNIPPETS_STORAGE_ROOT` environment variable when set.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: ".snippets".to_string(),
        }
    }
}

/// The principal every storage path is namespaced under.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Empty until the user signs in (or sets `SNIPPETS_USER`).
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period after the last keystroke before the editor writes.
    pub debounce_ms: u64,
    /// Number of base32 characters in the geohash stored on location fragments.
    pub geohash_precision: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            geohash_precision: 10,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        config.apply_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Apply `SNIPPETS_USER` / `SNIPPETS_STORAGE_ROOT` style overrides.
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup("SNIPPETS_USER").filter(|v| !v.is_empty()) {
            self.identity.user = user;
        }
        if let Some(root) = lookup("SNIPPETS_STORAGE_ROOT").filter(|v| !v.is_empty()) {
            self.storage.root = root;
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// `true` when no principal has been configured yet.
    pub fn needs_sign_in(&self) -> bool {
        self.identity.user.trim().is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
