use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Creates the router for serving stored upload files
pub fn uploads_routes() -> Router<AppState> {
    Router::new().route("/:filename", get(serve_upload))
}

/// Serve a stored image file by its exact assigned name
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    params(("filename" = String, Path, description = "Assigned filename returned at upload time")),
    responses(
        (status = 200, description = "Raw file bytes"),
        (status = 404, description = "No such file", body = crate::errors::ErrorResponse)
    ),
    tag = "Uploads"
)]
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServiceError> {
    let (bytes, content_type) = state.services.images.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
