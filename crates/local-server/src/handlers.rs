use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    error::{LocalError, LocalResult},
    model::{LocalManga, Manga},
    notifications::{Notification, Notifier},
    state::LocalState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChaptersRequest {
    pub manga: Manga,
    #[serde(alias = "chapter_ids", default)]
    pub chapter_ids: Vec<i64>,
}

pub async fn status_handler(State(state): State<LocalState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "removing": state.remover.is_running(),
    }))
}

pub async fn remove_chapters_handler(
    State(state): State<LocalState>,
    Json(req): Json<RemoveChaptersRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.remover.start(req.manga, req.chapter_ids) {
        Some(_) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "started" })),
        ),
        None => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ignored" })),
        ),
    }
}

pub async fn list_manga_handler(
    State(state): State<LocalState>,
) -> LocalResult<Json<Vec<LocalManga>>> {
    Ok(Json(state.repository.list().await?))
}

pub async fn manga_details_handler(
    State(state): State<LocalState>,
    Path(manga_id): Path<i64>,
) -> LocalResult<Json<LocalManga>> {
    state
        .repository
        .find_local(manga_id)
        .await?
        .map(Json)
        .ok_or(LocalError::MangaNotFound(manga_id))
}

pub async fn notifications_handler(State(state): State<LocalState>) -> Json<Vec<Notification>> {
    Json(state.notifications.active())
}

pub async fn dismiss_notification_handler(
    State(state): State<LocalState>,
    Path(id): Path<u32>,
) -> StatusCode {
    state.notifications.cancel(id);
    StatusCode::NO_CONTENT
}

pub async fn changes_handler(
    State(state): State<LocalState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.changes.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let change = match rx.recv().await {
            Ok(change) => change,
            // Missed events, so ask the observer to reload everything
            Err(RecvError::Lagged(_)) => None,
            Err(RecvError::Closed) => return None,
        };
        Some((change, rx))
    })
    .filter_map(|change| async move {
        match Event::default().event("local-changed").json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                tracing::warn!("[Changes] Failed to encode event: {err}");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
