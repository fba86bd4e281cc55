use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use margins_types::manifest::AudioManifest;
use margins_types::synced::SyncedText;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::state::{ApiConfig, AppState};

const AUDIO_ACCEPT: &str = "audio/mpeg,audio/*;q=0.9,*/*;q=0.1";
const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";

/// Upstream headers passed through to the browser.
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
    header::CONTENT_LENGTH,
    header::CONTENT_DISPOSITION,
];

/// Parses `src` and checks it is http(s) on one of `domains` or a subdomain
/// of one.
pub fn allowed_audio_source(src: &str, domains: &[String]) -> Option<Url> {
    let url = Url::parse(src).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let allowed = domains.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    });
    allowed.then_some(url)
}

/// Chapter ids double as file names under the synced-text directory.
pub fn is_valid_chapter_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Loads the manifest. A missing file is an empty manifest.
pub async fn read_manifest(config: &ApiConfig) -> ApiResult<AudioManifest> {
    let path = config.manifest_path();
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AudioManifest::empty(&config.book_title));
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(ApiError::Server("Audio manifest is unreadable".into()));
        }
    };

    let doc: Value = serde_json::from_str(&raw).map_err(|e| {
        error!("Invalid audio manifest {}: {}", path.display(), e);
        ApiError::Server("Audio manifest is invalid".into())
    })?;
    Ok(AudioManifest::from_value(doc, &config.book_title))
}

pub async fn manifest(State(state): State<AppState>) -> ApiResult<Json<AudioManifest>> {
    Ok(Json(read_manifest(&state.config).await?))
}

/// Proxies a chapter's remote audio so the browser only ever talks to us.
/// Range requests pass through, so seeking works.
pub async fn stream(
    State(state): State<AppState>,
    ApiPath(chapter_id): ApiPath<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let manifest = read_manifest(&state.config).await?;
    let src = manifest
        .audio_url(&chapter_id)
        .ok_or_else(|| ApiError::NotFound("Unknown chapter".into()))?;
    let url = allowed_audio_source(&src, &state.config.audio_hosts).ok_or_else(|| {
        warn!(chapter_id = %chapter_id, src = %src, "Refusing audio source outside the allow-list");
        ApiError::bad_request("Audio source not allowed")
    })?;

    let mut request = state.http.get(url).header(header::ACCEPT, AUDIO_ACCEPT);
    if let Some(range) = headers.get(header::RANGE) {
        request = request.header(header::RANGE, range.clone());
    }

    let upstream = request.send().await.map_err(|e| {
        warn!(chapter_id = %chapter_id, "Audio fetch failed: {}", e);
        ApiError::BadGateway(format!("Failed to fetch audio: {e}"))
    })?;

    // Redirects are resolved by the client, so anything but 2xx is a failure.
    let status = upstream.status();
    if !status.is_success() {
        warn!(chapter_id = %chapter_id, %status, "Audio upstream returned an error");
        return Err(ApiError::BadGateway(format!(
            "Failed to fetch audio: upstream returned {status}"
        )));
    }

    let mut response_headers = HeaderMap::new();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_AUDIO_TYPE));
    response_headers.insert(header::CONTENT_TYPE, content_type);
    for name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response_headers.insert(name, value.clone());
        }
    }
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let body = Body::from_stream(upstream.bytes_stream());
    Ok((status, response_headers, body).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncedTextQuery {
    /// Playback time in seconds.
    pub at: Option<f64>,
}

/// The chapter's synced-text file as stored. With `?at=`, the response is
/// `{"lines", "activeIndex"}` instead: lines sorted by start time, with
/// `startTime`/`endTime` renamed to `start`/`end` and other cue keys kept.
pub async fn synced_text(
    State(state): State<AppState>,
    ApiPath(chapter_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<SyncedTextQuery>,
) -> ApiResult<Json<Value>> {
    if !is_valid_chapter_id(&chapter_id) {
        return Err(ApiError::bad_request("Invalid chapter"));
    }

    let path = state.config.synced_text_dir().join(format!("{chapter_id}.json"));
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("No synced text for this chapter".into()));
        }
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(ApiError::Internal(e.into()));
        }
    };

    let invalid = || ApiError::Server("Synced text file is invalid".into());
    let doc: Value = serde_json::from_str(&raw).map_err(|_| invalid())?;

    let Some(at) = query.at else {
        return Ok(Json(doc));
    };
    let synced = SyncedText::from_value(doc).map_err(|_| invalid())?;
    let active_index = synced.index_at(at);
    Ok(Json(json!({
        "lines": synced.lines,
        "activeIndex": active_index,
    })))
}
