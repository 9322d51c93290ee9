use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Weblate,
    Github,
    Manual,
    Telegram,
}

impl Link {
    pub fn title(self) -> &'static str {
        match self {
            Link::Weblate => "Translate this app",
            Link::Github => "Source code",
            Link::Manual => "User manual",
            Link::Telegram => "Telegram group",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LinkTargets {
    pub weblate: String,
    pub github: String,
    pub manual: String,
    pub telegram: String,
    pub telegram_web: String,
}

impl Default for LinkTargets {
    fn default() -> Self {
        Self {
            weblate: "https://hosted.weblate.org/engage/kotatsu/".to_string(),
            github: "https://github.com/KotatsuApp/Kotatsu".to_string(),
            manual: "https://kotatsu.app/manuals/guides/getting-started/".to_string(),
            telegram: "tg://resolve?domain=kotatsuapp".to_string(),
            telegram_web: "https://t.me/kotatsuapp".to_string(),
        }
    }
}

pub trait UrlOpener: Send + Sync {
    /// `title` names the target when the platform shows an app chooser.
    fn open(&self, url: &str, title: Option<&str>) -> bool;
}

/// Hands URLs to the desktop's default handler.
pub struct SystemUrlOpener;

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str, title: Option<&str>) -> bool {
        info!("🌐 Opening {} ({url})", title.unwrap_or("link"));
        match open::that(url) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to open {url}: {e}");
                false
            }
        }
    }
}

/// Returns whether any URL could be opened.
pub fn open_link(opener: &dyn UrlOpener, targets: &LinkTargets, link: Link) -> bool {
    match link {
        Link::Weblate => opener.open(&targets.weblate, Some(link.title())),
        Link::Github => opener.open(&targets.github, Some(link.title())),
        Link::Manual => opener.open(&targets.manual, Some(link.title())),
        Link::Telegram => {
            opener.open(&targets.telegram, None)
                || opener.open(&targets.telegram_web, Some(link.title()))
        }
    }
}
