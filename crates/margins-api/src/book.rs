use std::path::{Component, Path};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::error;

use margins_types::api::DownloadsResponse;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiPath;
use crate::state::AppState;

const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

/// True when `name` is one ordinary path component, so it cannot leave the
/// downloads directory. Quotes and control characters are refused too, since
/// the name is echoed into `Content-Disposition`.
pub fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\', '"'])
        && !name.chars().any(char::is_control)
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("epub") => EPUB_CONTENT_TYPE,
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Streams a file from disk, or `None` if it does not exist.
async fn stream_file(
    path: &Path,
    content_type: &'static str,
    disposition: String,
) -> ApiResult<Option<Response>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            return Err(ApiError::Internal(e.into()));
        }
    };
    let meta = file.metadata().await.map_err(|e| ApiError::Internal(e.into()))?;
    if !meta.is_file() {
        return Ok(None);
    }

    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let body = Body::from_stream(ReaderStream::new(file));

    Ok(Some(
        (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
                (header::CONTENT_LENGTH, HeaderValue::from(meta.len())),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            body,
        )
            .into_response(),
    ))
}

async fn download_link(state: &AppState, extension: &str) -> Option<String> {
    let name = state.config.book_file(extension);
    let meta = tokio::fs::metadata(state.config.downloads_dir().join(&name)).await.ok()?;
    meta.is_file().then(|| format!("/downloads/{name}"))
}

pub async fn downloads(State(state): State<AppState>) -> Json<DownloadsResponse> {
    Json(DownloadsResponse {
        epub: download_link(&state, "epub").await,
        pdf: download_link(&state, "pdf").await,
    })
}

pub async fn download_file(
    State(state): State<AppState>,
    ApiPath(filename): ApiPath<String>,
) -> ApiResult<Response> {
    if !is_plain_filename(&filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.config.downloads_dir().join(&filename);
    let disposition = format!("attachment; filename=\"{filename}\"");
    stream_file(&path, content_type_for(&filename), disposition)
        .await?
        .ok_or_else(ApiError::not_found)
}

/// The EPUB for the in-browser reader, served inline.
pub async fn epub(State(state): State<AppState>) -> ApiResult<Response> {
    let name = state.config.book_file("epub");
    let path = state.config.downloads_dir().join(&name);
    let disposition = format!("inline; filename=\"{name}\"");

    stream_file(&path, EPUB_CONTENT_TYPE, disposition)
        .await?
        .ok_or_else(|| ApiError::NotFound("EPUB not available".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filenames_only() {
        assert!(is_plain_filename("The_Enemy_Within.epub"));
        assert!(is_plain_filename("notes v2.pdf"));

        assert!(!is_plain_filename(""));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename("."));
        assert!(!is_plain_filename("../secret.db"));
        assert!(!is_plain_filename("sub/file.pdf"));
        assert!(!is_plain_filename("/etc/passwd"));
        assert!(!is_plain_filename("..\\windows.ini"));
        assert!(!is_plain_filename("say \"hi\".pdf"));
        assert!(!is_plain_filename("line\nbreak.pdf"));
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("book.EPUB"), EPUB_CONTENT_TYPE);
        assert_eq!(content_type_for("book.pdf"), "application/pdf");
        assert_eq!(content_type_for("book"), "application/octet-stream");
    }
}
