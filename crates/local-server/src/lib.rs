use std::path::PathBuf;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

pub mod changes;
pub mod error;
pub mod handlers;
pub mod model;
pub mod notifications;
pub mod repository;
pub mod service;
pub mod state;
pub mod storage;

pub use changes::LocalStorageChanges;
pub use error::{LocalError, LocalResult};
pub use model::{LocalManga, Manga, MangaChapter};
pub use repository::{FsLocalMangaRepository, LocalMangaRepository};
pub use service::ChaptersRemoveService;
pub use state::LocalState;

use handlers::{
    changes_handler, dismiss_notification_handler, list_manga_handler, manga_details_handler,
    notifications_handler, remove_chapters_handler, status_handler,
};

pub fn create_router(library_dir: PathBuf) -> Router {
    router(LocalState::new(library_dir))
}

pub fn router(state: LocalState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/manga", get(list_manga_handler))
        .route("/manga/{id}", get(manga_details_handler))
        .route("/chapters/remove", post(remove_chapters_handler))
        .route("/notifications", get(notifications_handler))
        .route("/notifications/{id}", delete(dismiss_notification_handler))
        .route("/changes", get(changes_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
