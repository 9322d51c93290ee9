use std::{path::PathBuf, sync::Arc};

use crate::{
    changes::LocalStorageChanges,
    notifications::NotificationCenter,
    repository::{FsLocalMangaRepository, LocalMangaRepository},
    service::ChaptersRemoveService,
};

#[derive(Clone)]
pub struct LocalState {
    pub repository: Arc<dyn LocalMangaRepository>,
    pub changes: LocalStorageChanges,
    pub notifications: NotificationCenter,
    pub remover: ChaptersRemoveService,
}

impl LocalState {
    pub fn new(library_dir: PathBuf) -> Self {
        if let Err(err) = std::fs::create_dir_all(&library_dir) {
            tracing::warn!(
                "Failed to create library dir {}: {err}",
                library_dir.display()
            );
        }
        Self::with_repository(Arc::new(FsLocalMangaRepository::new(library_dir)))
    }

    pub fn with_repository(repository: Arc<dyn LocalMangaRepository>) -> Self {
        let changes = LocalStorageChanges::new();
        let notifications = NotificationCenter::new();
        let remover = ChaptersRemoveService::new(
            repository.clone(),
            changes.clone(),
            Arc::new(notifications.clone()),
        );

        Self {
            repository,
            changes,
            notifications,
            remover,
        }
    }
}
