use std::{
    fs,
    io::Write,
    path::PathBuf,
    sync::RwLock,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Offer pre-release builds when checking for updates
    #[serde(default)]
    pub updates_unstable: bool,
}

/// Preferences persisted as JSON next to the rest of the app config.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn load(path: PathBuf) -> Self {
        let current = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Failed to parse settings {}: {e}. Using defaults.", path.display());
                AppSettings::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(e) => {
                warn!("Failed to read settings {}: {e}. Using defaults.", path.display());
                AppSettings::default()
            }
        };

        Self {
            path,
            current: RwLock::new(current),
        }
    }

    pub fn get(&self) -> AppSettings {
        self.current.read().expect("settings lock poisoned").clone()
    }

    pub fn update(&self, change: impl FnOnce(&mut AppSettings)) -> anyhow::Result<()> {
        let snapshot = {
            let mut current = self.current.write().expect("settings lock poisoned");
            change(&mut current);
            current.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, settings: &AppSettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let bytes = serde_json::to_vec_pretty(settings)?;
        let tmp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to save {}", self.path.display()))?;
        Ok(())
    }
}
