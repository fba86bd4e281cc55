use axum::{Json, extract::State};
use chrono::Utc;
use tracing::warn;

use margins_types::api::OkResponse;
use margins_types::build_info::BuildInfo;

use crate::state::AppState;

pub async fn health() -> Json<OkResponse> {
    Json(OkResponse::ok())
}

/// Draft version and changelog for the banner. Never fails: an absent or
/// broken file yields placeholder values.
pub async fn build_info(State(state): State<AppState>) -> Json<BuildInfo> {
    let path = state.config.build_info_path();
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    };

    Json(BuildInfo::from_json(raw.as_deref(), Utc::now().date_naive()))
}
