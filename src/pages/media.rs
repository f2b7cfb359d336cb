use axum::{
    debug_handler,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{blob::{BlobError, LocalBlobStore}, res, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(super) async fn serve(
    Path(path): Path<String>,
    State(media): State<Option<LocalBlobStore>>,
) -> AppResult<Response> {
    let Some(media) = media else {
        return res::sorry("media");
    };

    match media.read(&path).await {
        Ok((bytes, content_type)) => Ok((
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "private, max-age=3600".to_owned()),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
                // uploaded svg must not run script when opened directly
                (header::CONTENT_SECURITY_POLICY, "sandbox".to_owned()),
            ],
            bytes,
        ).into_response()),
        Err(BlobError::NotFound(_) | BlobError::InvalidPath(_)) => res::sorry("media"),
        Err(e) => Err(e.into()),
    }
}
