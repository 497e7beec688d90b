use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use base_url::PublicUrl;
use json::Json;
use serde::{Deserialize, Serialize};
use snapfeed_common::model::{Id, InvalidIdError, ModelValidationError, post::PostMarker};
use snapfeed_db::{client::DbError, store::PostStore};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, error};
use uploads::{ImageStore, MAX_REQUEST_BYTES, UPLOADS_PATH, UploadError};

pub mod base_url;
mod json;
mod routes;
pub mod uploads;

#[cfg(test)]
mod test_support;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn PostStore>,
    pub images: Arc<ImageStore>,
    pub public_url: PublicUrl,
}

pub fn router(state: ServerState) -> Router {
    let uploads = ServeDir::new(state.images.dir());

    routes::routes()
        .nest_service(UPLOADS_PATH, uploads)
        .fallback(fallback)
        .method_not_allowed_fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Post id was malformed: {0}")]
    InvalidPostId(InvalidIdError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Validation(_)
            | ServerError::InvalidPostId(_) => StatusCode::BAD_REQUEST,
            ServerError::Upload(err) => err.status(),
            ServerError::JsonResponse(_) | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to clients. Server side failures stay opaque.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_owned();
        }

        match self {
            ServerError::UnknownRoute(_) => "Route not found".to_owned(),
            ServerError::PostByIdNotFound(_) => "Post not found".to_owned(),
            ServerError::InvalidPostId(_) => "Invalid post id".to_owned(),
            ServerError::PathRejection(rejection) => rejection.body_text(),
            ServerError::JsonRejection(rejection) => rejection.body_text(),
            ServerError::MultipartRejection(rejection) => rejection.body_text(),
            _ => self.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
