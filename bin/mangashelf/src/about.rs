use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::bail;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    links::{Link, LinkTargets, UrlOpener, open_link},
    settings::SettingsStore,
    update::{AppUpdateRepository, AppVersion},
    version::VersionId,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateEvent {
    Available { version: AppVersion },
    UpToDate { message: &'static str },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwitchState {
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AboutScreen {
    pub version_title: String,
    pub app_version_enabled: bool,
    pub is_loading: bool,
    pub updates_unstable: SwitchState,
}

/// State behind the "About" settings page.
pub struct AboutSettings {
    version: String,
    is_stable: bool,
    is_update_supported: bool,
    is_loading: AtomicBool,
    settings: Arc<SettingsStore>,
    updates: AppUpdateRepository,
    opener: Arc<dyn UrlOpener>,
    links: LinkTargets,
}

impl AboutSettings {
    pub fn new(
        version: &str,
        is_update_supported: bool,
        settings: Arc<SettingsStore>,
        updates: AppUpdateRepository,
        opener: Arc<dyn UrlOpener>,
        links: LinkTargets,
    ) -> Self {
        let is_stable = VersionId::parse(version).is_stable();

        // Pre-release builds always follow the unstable channel
        if !is_stable
            && !settings.get().updates_unstable
            && let Err(e) = settings.update(|s| s.updates_unstable = true)
        {
            warn!("Failed to persist forced unstable channel: {e:#}");
        }

        Self {
            version: version.to_string(),
            is_stable,
            is_update_supported,
            is_loading: AtomicBool::new(false),
            settings,
            updates,
            opener,
            links,
        }
    }

    pub fn screen(&self) -> AboutScreen {
        let is_loading = self.is_loading.load(Ordering::Relaxed);
        AboutScreen {
            version_title: format!("Version {}", self.version),
            app_version_enabled: self.is_update_supported && !is_loading,
            is_loading,
            updates_unstable: SwitchState {
                visible: self.is_update_supported,
                enabled: self.is_stable,
                checked: !self.is_stable || self.settings.get().updates_unstable,
            },
        }
    }

    pub fn set_unstable(&self, enabled: bool) -> anyhow::Result<()> {
        if !self.is_stable {
            bail!("Pre-release builds always receive unstable updates");
        }
        self.settings.update(|s| s.updates_unstable = enabled)?;
        info!("Unstable updates {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn check_for_updates(&self) -> anyhow::Result<UpdateEvent> {
        if !self.is_update_supported {
            bail!("Updates are managed outside of this app");
        }
        let Some(_loading) = Loading::enter(&self.is_loading) else {
            bail!("An update check is already running");
        };

        match self.updates.fetch_update().await? {
            Some(version) => {
                info!("⬆️ Update available: {}", version.version);
                Ok(UpdateEvent::Available { version })
            }
            None => Ok(UpdateEvent::UpToDate {
                message: "No updates available",
            }),
        }
    }

    pub fn open_link(&self, link: Link) -> bool {
        open_link(self.opener.as_ref(), &self.links, link)
    }
}

/// Holds the loading flag until the check finishes or is dropped midway.
struct Loading<'a> {
    flag: &'a AtomicBool,
}

impl<'a> Loading<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self { flag })
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
