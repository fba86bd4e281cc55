use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

const FALLBACK_DRAFT_VERSION: &str = "v0";

/// Which draft the readers are looking at, so feedback can be matched to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub draft_version: String,
    pub updated_at: String,
    pub what_changed: Vec<Value>,
}

impl BuildInfo {
    pub fn fallback(today: NaiveDate) -> Self {
        Self {
            draft_version: FALLBACK_DRAFT_VERSION.to_string(),
            updated_at: today.format("%Y-%m-%d").to_string(),
            what_changed: Vec::new(),
        }
    }

    /// Reads `build_info.json` contents. Anything missing or malformed falls
    /// back field by field; a document that is not an object falls back whole.
    pub fn from_json(raw: Option<&str>, today: NaiveDate) -> Self {
        let fallback = Self::fallback(today);
        let Some(Value::Object(data)) = raw.and_then(|r| serde_json::from_str(r).ok()) else {
            return fallback;
        };

        let text = |key: &str, default: String| match data.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::String(s)) if s.is_empty() => default,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Self {
            draft_version: text("draftVersion", fallback.draft_version),
            updated_at: text("updatedAt", fallback.updated_at),
            what_changed: match data.get("whatChanged") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
        }
    }
}
