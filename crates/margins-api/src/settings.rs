use axum::{Extension, Json, extract::State};
use tracing::debug;

use margins_types::settings::{ReaderSettings, ReaderSettingsUpdate};

use crate::error::ApiResult;
use crate::extract::Payload;
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_blocking};

fn stored_settings(current: &CurrentUser) -> ReaderSettings {
    let user = &current.user;
    ReaderSettings::from_stored(&user.reader_theme, user.reader_font_scale, user.reader_line_height)
}

pub async fn get_reader_settings(Extension(current): Extension<CurrentUser>) -> Json<ReaderSettings> {
    Json(stored_settings(&current))
}

pub async fn put_reader_settings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Payload(update): Payload<ReaderSettingsUpdate>,
) -> ApiResult<Json<ReaderSettings>> {
    let mut settings = stored_settings(&current);
    settings.apply(&update);

    let user_id = current.user.id;
    run_blocking(&state, move |db| {
        db.update_reader_settings(
            user_id,
            settings.theme.as_str(),
            settings.font_scale,
            settings.line_height,
        )
    })
    .await?;

    debug!(user_id, ?settings, "Reader settings saved");
    Ok(Json(settings))
}
