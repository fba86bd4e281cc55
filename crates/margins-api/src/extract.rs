//! Request extractors whose rejections render as `ApiError`, plus the small
//! input-cleaning helpers shared by the handlers.

use axum::extract::{FromRequest, FromRequestParts};

use margins_types::api::LooseNumber;

use crate::error::ApiError;

/// JSON body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Trims a text input. Blank becomes `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Like [`clean`] for fields where an explicit `null` is meaningful.
pub fn clean_present(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(clean)
}

/// A playback position. Absent means the start of the chapter.
pub fn position(value: Option<LooseNumber>) -> Result<f64, ApiError> {
    match value {
        None => Ok(0.0),
        Some(n) => n
            .to_f64()
            .ok_or_else(|| ApiError::bad_request("Invalid positionSeconds")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_trims_and_drops_blanks() {
        assert_eq!(clean(Some("  ch01 ".into())).as_deref(), Some("ch01"));
        assert_eq!(clean(Some("   ".into())), None);
        assert_eq!(clean(None), None);
    }

    #[test]
    fn clean_present_keeps_explicit_null() {
        assert_eq!(clean_present(None), None);
        assert_eq!(clean_present(Some(None)), Some(None));
        assert_eq!(clean_present(Some(Some(" ".into()))), Some(None));
        assert_eq!(clean_present(Some(Some("typo".into()))), Some(Some("typo".into())));
    }

    #[test]
    fn position_defaults_to_zero_and_rejects_garbage() {
        assert_eq!(position(None).unwrap(), 0.0);
        assert_eq!(position(Some(LooseNumber::Text("61.5".into()))).unwrap(), 61.5);
        assert!(position(Some(LooseNumber::Text("soon".into()))).is_err());
    }
}
