use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    APP_VERSION,
    about::{AboutScreen, AboutSettings, UpdateEvent},
    links::Link,
};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, err: &anyhow::Error) -> ApiError {
    (status, Json(serde_json::json!({ "error": format!("{err:#}") })))
}

#[derive(Serialize)]
struct VersionResponse {
    version: String,
    variant: String,
}

#[derive(Deserialize)]
struct UnstableRequest {
    enabled: bool,
}

pub fn about_router(about: Arc<AboutSettings>) -> Router {
    Router::new()
        .route("/version", get(current_version_handler))
        .route("/about", get(about_handler))
        .route("/about/unstable", put(set_unstable_handler))
        .route("/about/check-update", post(check_update_handler))
        .route("/about/links/{link}", post(open_link_handler))
        .with_state(about)
}

async fn current_version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: APP_VERSION.to_string(),
        variant: "desktop".to_string(),
    })
}

async fn about_handler(State(about): State<Arc<AboutSettings>>) -> Json<AboutScreen> {
    Json(about.screen())
}

async fn set_unstable_handler(
    State(about): State<Arc<AboutSettings>>,
    Json(req): Json<UnstableRequest>,
) -> Result<Json<AboutScreen>, ApiError> {
    about
        .set_unstable(req.enabled)
        .map_err(|e| api_error(StatusCode::CONFLICT, &e))?;
    Ok(Json(about.screen()))
}

async fn check_update_handler(
    State(about): State<Arc<AboutSettings>>,
) -> Result<Json<UpdateEvent>, ApiError> {
    about.check_for_updates().await.map(Json).map_err(|e| {
        warn!("Update check failed: {e:#}");
        api_error(StatusCode::BAD_GATEWAY, &e)
    })
}

async fn open_link_handler(
    State(about): State<Arc<AboutSettings>>,
    Path(link): Path<Link>,
) -> Json<serde_json::Value> {
    let opened = tokio::task::spawn_blocking(move || about.open_link(link))
        .await
        .unwrap_or(false);
    Json(serde_json::json!({ "opened": opened }))
}
