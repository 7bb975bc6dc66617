//! Serves stored image files.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{AppState, db::errors::DbError, errors::Error};

/// Stored files are named by random UUIDs and never rewritten, so they can be cached forever
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Get a stored file
#[utoipa::path(
    get,
    path = "/storage/{key}",
    tag = "storage",
    params(("key" = String, Path, description = "Storage key, e.g. `3f/3fa85f64-5717-4562-b3fc-2c963f66afa6.webp`")),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "No such file"),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_stored_file(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response, Error> {
    let bytes = match state.storage.retrieve(&key).await {
        Ok(bytes) => bytes,
        Err(DbError::NotFound) => {
            return Err(Error::NotFound {
                resource: "File".to_string(),
                id: key,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&key).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}
