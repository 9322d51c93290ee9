use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type LocalResult<T> = Result<T, LocalError>;

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("Manga {0} is not stored locally")]
    MangaNotFound(i64),

    #[error("Broken index for {path}: {source}")]
    Index {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LocalError {
    fn status_code(&self) -> StatusCode {
        match self {
            LocalError::MangaNotFound(_) => StatusCode::NOT_FOUND,
            LocalError::Index { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LocalError::Archive(_) | LocalError::Io(_) | LocalError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for LocalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[Local] Request failed: {self}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
