use std::{
    collections::BTreeSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
};

use tokio::task::JoinHandle;

use crate::{
    changes::LocalStorageChanges,
    error::{LocalError, LocalResult},
    model::Manga,
    notifications::{NOTIFICATION_ID, Notification, Notifier},
    repository::LocalMangaRepository,
};

/// Deletes downloaded chapters in the background, one task per request.
#[derive(Clone)]
pub struct ChaptersRemoveService {
    repository: Arc<dyn LocalMangaRepository>,
    changes: LocalStorageChanges,
    notifier: Arc<dyn Notifier>,
    /// Running job count, locked together with showing/cancelling progress
    active_jobs: Arc<Mutex<usize>>,
    last_start_id: Arc<AtomicU32>,
}

impl ChaptersRemoveService {
    pub fn new(
        repository: Arc<dyn LocalMangaRepository>,
        changes: LocalStorageChanges,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            changes,
            notifier,
            active_jobs: Arc::new(Mutex::new(0)),
            last_start_id: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.active_jobs.lock().expect("lock poisoned") > 0
    }

    /// Returns `None` without doing anything when `chapter_ids` is empty.
    pub fn start(
        &self,
        manga: Manga,
        chapter_ids: impl IntoIterator<Item = i64>,
    ) -> Option<JoinHandle<()>> {
        let chapter_ids: BTreeSet<i64> = chapter_ids.into_iter().collect();
        if chapter_ids.is_empty() {
            return None;
        }

        let start_id = self.last_start_id.fetch_add(1, Ordering::Relaxed) + 1;
        let service = self.clone();
        let manga = manga.without_chapters();

        Some(tokio::spawn(async move {
            service.run(start_id, manga, chapter_ids).await;
        }))
    }

    async fn run(&self, start_id: u32, manga: Manga, chapter_ids: BTreeSet<i64>) {
        tracing::info!(
            "[Remove #{start_id}] Started for \"{}\" ({} chapters)",
            manga.title,
            chapter_ids.len()
        );

        let result = {
            let _foreground = Foreground::enter(self);
            self.process(&manga, &chapter_ids).await
        };

        match result {
            Ok(()) => tracing::info!("[Remove #{start_id}] Finished for \"{}\"", manga.title),
            Err(err) => self.on_error(start_id, &err),
        }
    }

    async fn process(&self, manga: &Manga, chapter_ids: &BTreeSet<i64>) -> LocalResult<()> {
        let details = self.repository.get_details(manga).await?;
        self.repository.delete_chapters(&details, chapter_ids).await?;

        let change = match self.repository.find_local(manga.id).await {
            Ok(local) => local,
            Err(err) => {
                tracing::warn!("[Remove] Could not reload \"{}\": {err}", manga.title);
                None
            }
        };
        self.changes.emit(change);
        Ok(())
    }

    fn on_error(&self, start_id: u32, error: &LocalError) {
        tracing::error!("[Remove #{start_id}] Failed: {error}");
        self.notifier
            .show(Notification::error(start_id, error.to_string()));
    }
}

/// Keeps the progress notification visible while at least one job runs.
struct Foreground<'a> {
    service: &'a ChaptersRemoveService,
}

impl<'a> Foreground<'a> {
    fn enter(service: &'a ChaptersRemoveService) -> Self {
        let mut active = service.active_jobs.lock().expect("lock poisoned");
        if *active == 0 {
            service.notifier.show(Notification::processing());
        }
        *active += 1;
        Self { service }
    }
}

impl Drop for Foreground<'_> {
    fn drop(&mut self) {
        let mut active = self
            .service
            .active_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *active -= 1;
        if *active == 0 {
            self.service.notifier.cancel(NOTIFICATION_ID);
        }
    }
}
