use tokio::sync::broadcast;

use crate::model::LocalManga;

const CHANGES_CAPACITY: usize = 64;

/// Stream of "local storage changed" signals. `None` asks observers to
/// reload everything.
#[derive(Clone)]
pub struct LocalStorageChanges {
    tx: broadcast::Sender<Option<LocalManga>>,
}

impl LocalStorageChanges {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGES_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, change: Option<LocalManga>) {
        // No receivers is fine, nobody is watching the library right now
        let receivers = self.tx.send(change).unwrap_or(0);
        tracing::debug!("[Changes] Emitted to {receivers} observer(s)");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Option<LocalManga>> {
        self.tx.subscribe()
    }
}

impl Default for LocalStorageChanges {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::Manga;

    #[tokio::test]
    async fn emit_without_observers_is_silent() {
        LocalStorageChanges::new().emit(None);
    }

    #[tokio::test]
    async fn every_observer_receives_the_change() {
        let changes = LocalStorageChanges::new();
        let mut first = changes.subscribe();
        let mut second = changes.subscribe();

        let manga = Manga {
            id: 7,
            title: "Blame!".to_string(),
            url: String::new(),
            source: "local".to_string(),
            chapters: None,
        };
        changes.emit(Some(LocalManga::new(manga, PathBuf::from("/library/blame"))));

        let a = first.recv().await.expect("first").expect("some");
        let b = second.recv().await.expect("second").expect("some");
        assert_eq!(a.manga.id, 7);
        assert_eq!(a, b);
    }
}
