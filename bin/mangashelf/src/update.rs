use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{settings::SettingsStore, version::VersionId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppVersion {
    pub name: String,
    pub version: String,
    pub url: Option<String>,
    pub description: String,
}

impl AppVersion {
    pub fn version_id(&self) -> VersionId {
        VersionId::parse(&self.version)
    }
}

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn releases(&self) -> anyhow::Result<Vec<AppVersion>>;
}

/// Release list of a GitHub repository.
pub struct GithubReleases {
    owner: String,
    repo: String,
}

impl GithubReleases {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Downloads the newest release and replaces the running binary.
    pub async fn perform_update(&self, bin_name: &str, current: &str) -> anyhow::Result<String> {
        let owner = self.owner.clone();
        let repo = self.repo.clone();
        let bin_name = bin_name.to_string();
        let current = current.to_string();

        let status = tokio::task::spawn_blocking(move || {
            self_update::backends::github::Update::configure()
                .repo_owner(&owner)
                .repo_name(&repo)
                .bin_name(&bin_name)
                .show_download_progress(true)
                .current_version(&current)
                .no_confirm(true)
                .build()?
                .update()
        })
        .await?
        .context("Self update failed")?;

        Ok(status.version().to_string())
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn releases(&self) -> anyhow::Result<Vec<AppVersion>> {
        let owner = self.owner.clone();
        let repo = self.repo.clone();

        let releases = tokio::task::spawn_blocking(move || {
            self_update::backends::github::ReleaseList::configure()
                .repo_owner(&owner)
                .repo_name(&repo)
                .build()?
                .fetch()
        })
        .await?
        .with_context(|| format!("Failed to fetch releases of {}/{}", self.owner, self.repo))?;

        Ok(releases
            .into_iter()
            .map(|release| AppVersion {
                url: release.assets.first().map(|asset| asset.download_url.clone()),
                description: release.body.unwrap_or_default(),
                name: release.name,
                version: release.version,
            })
            .collect())
    }
}

/// Newest release strictly above `current`, skipping pre-releases unless asked.
pub fn select_update(
    current: &VersionId,
    releases: Vec<AppVersion>,
    include_unstable: bool,
) -> Option<AppVersion> {
    releases
        .into_iter()
        .map(|release| (release.version_id(), release))
        .filter(|(id, _)| include_unstable || id.is_stable())
        .filter(|(id, _)| id > current)
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, release)| release)
}

pub struct AppUpdateRepository {
    source: Arc<dyn ReleaseSource>,
    settings: Arc<SettingsStore>,
    current: VersionId,
}

impl AppUpdateRepository {
    pub fn new(source: Arc<dyn ReleaseSource>, settings: Arc<SettingsStore>, current: &str) -> Self {
        Self {
            source,
            settings,
            current: VersionId::parse(current),
        }
    }

    pub async fn fetch_update(&self) -> anyhow::Result<Option<AppVersion>> {
        let include_unstable = self.settings.get().updates_unstable;
        let releases = self.source.releases().await?;
        info!(
            "🔍 Checked {} release(s) against {} (unstable: {include_unstable})",
            releases.len(),
            self.current
        );
        Ok(select_update(&self.current, releases, include_unstable))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn release(version: &str) -> AppVersion {
        AppVersion {
            name: format!("Release {version}"),
            version: version.to_string(),
            url: None,
            description: String::new(),
        }
    }

    fn releases() -> Vec<AppVersion> {
        vec![release("1.0.0"), release("1.2.0"), release("1.3.0-b2"), release("1.1.9")]
    }

    #[test]
    fn stable_channel_skips_prereleases() {
        let picked = select_update(&VersionId::parse("1.0.0"), releases(), false);
        assert_eq!(picked.map(|r| r.version), Some("1.2.0".to_string()));
    }

    #[test]
    fn unstable_channel_takes_newest() {
        let picked = select_update(&VersionId::parse("1.0.0"), releases(), true);
        assert_eq!(picked.map(|r| r.version), Some("1.3.0-b2".to_string()));
    }

    #[test]
    fn nothing_newer_means_no_update() {
        assert_eq!(select_update(&VersionId::parse("1.2.0"), releases(), false), None);
        assert_eq!(select_update(&VersionId::parse("2.0"), releases(), true), None);
    }
}
