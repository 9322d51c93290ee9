use std::sync::{Arc, RwLock};

use serde::Serialize;

pub const CHANNEL_ID: &str = "local_processing";
pub const NOTIFICATION_ID: u32 = 21;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Progress,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u32,
    pub channel: &'static str,
    pub kind: NotificationKind,
    pub title: String,
    pub text: Option<String>,
    /// Ongoing notifications stay until cancelled by their owner
    pub ongoing: bool,
    pub silent: bool,
}

impl Notification {
    pub fn processing() -> Self {
        Self {
            id: NOTIFICATION_ID,
            channel: CHANNEL_ID,
            kind: NotificationKind::Progress,
            title: "Processing local manga".to_string(),
            text: None,
            ongoing: true,
            silent: true,
        }
    }

    pub fn error(start_id: u32, message: String) -> Self {
        Self {
            id: NOTIFICATION_ID + start_id,
            channel: CHANNEL_ID,
            kind: NotificationKind::Error,
            title: "An error occurred".to_string(),
            text: Some(message),
            ongoing: false,
            silent: true,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn show(&self, notification: Notification);
    fn cancel(&self, id: u32);
}

/// Keeps the currently visible notifications so a frontend can poll them.
#[derive(Clone, Default)]
pub struct NotificationCenter {
    active: Arc<RwLock<Vec<Notification>>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Vec<Notification> {
        self.active.read().expect("lock poisoned").clone()
    }
}

impl Notifier for NotificationCenter {
    fn show(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Progress => {
                tracing::info!("[Notify #{}] {}", notification.id, notification.title)
            }
            NotificationKind::Error => tracing::warn!(
                "[Notify #{}] {}: {}",
                notification.id,
                notification.title,
                notification.text.as_deref().unwrap_or_default()
            ),
        }

        let mut active = self.active.write().expect("lock poisoned");
        active.retain(|n| n.id != notification.id);
        active.push(notification);
    }

    fn cancel(&self, id: u32) {
        self.active
            .write()
            .expect("lock poisoned")
            .retain(|n| n.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_ids_are_offset_by_start_id() {
        assert_eq!(Notification::error(3, "boom".to_string()).id, 24);
        assert_eq!(Notification::processing().id, NOTIFICATION_ID);
    }

    #[test]
    fn showing_same_id_replaces_previous() {
        let center = NotificationCenter::new();
        center.show(Notification::error(1, "first".to_string()));
        center.show(Notification::error(1, "second".to_string()));
        center.show(Notification::processing());

        let active = center.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].text.as_deref(), Some("second"));

        center.cancel(NOTIFICATION_ID);
        assert_eq!(center.active().len(), 1);
    }
}
