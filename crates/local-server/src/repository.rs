use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::{LocalError, LocalResult},
    model::{LocalManga, Manga},
    storage,
};

#[async_trait]
pub trait LocalMangaRepository: Send + Sync {
    async fn list(&self) -> LocalResult<Vec<LocalManga>>;

    async fn find_local(&self, manga_id: i64) -> LocalResult<Option<LocalManga>>;

    /// Returns the stored manga with its full chapter list.
    async fn get_details(&self, manga: &Manga) -> LocalResult<Manga> {
        self.find_local(manga.id)
            .await?
            .map(|local| local.manga)
            .ok_or(LocalError::MangaNotFound(manga.id))
    }

    /// Deleting chapters that are already gone is not an error.
    async fn delete_chapters(&self, manga: &Manga, chapter_ids: &BTreeSet<i64>) -> LocalResult<()>;
}

/// Library stored under a single root directory.
#[derive(Clone)]
pub struct FsLocalMangaRepository {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FsLocalMangaRepository {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl LocalMangaRepository for FsLocalMangaRepository {
    async fn list(&self) -> LocalResult<Vec<LocalManga>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || storage::scan_library(&root)).await?
    }

    async fn find_local(&self, manga_id: i64) -> LocalResult<Option<LocalManga>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|local| local.manga.id == manga_id))
    }

    async fn delete_chapters(&self, manga: &Manga, chapter_ids: &BTreeSet<i64>) -> LocalResult<()> {
        let _guard = self.write_lock.lock().await;

        let local = self
            .find_local(manga.id)
            .await?
            .ok_or(LocalError::MangaNotFound(manga.id))?;

        let path = local.path.clone();
        let ids = chapter_ids.clone();
        let removed = tokio::task::spawn_blocking(move || storage::delete_chapters(&path, &ids))
            .await??;

        tracing::info!(
            "[Local] Removed {removed}/{} chapter(s) of \"{}\"",
            chapter_ids.len(),
            manga.title
        );
        Ok(())
    }
}
