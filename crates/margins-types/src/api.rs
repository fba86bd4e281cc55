use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// -- Input helpers --

/// A number the browser may send either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// Finite value, if any. Blank strings read as zero.
    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) if s.trim().is_empty() => 0.0,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Loose truthiness for flags: `null`, `false`, `0`, empty values and the
/// strings "false", "0", "no" and "off" are false, everything else is true.
fn truthy_value(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        ),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(|v| truthy_value(&v))
}

/// Like [`truthy`], but keeps "key absent" as `None`.
fn truthy_present<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    truthy(deserializer).map(Some)
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub invite_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

// -- Generic responses --

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub ok: bool,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterFilter {
    pub chapter_id: Option<String>,
}

// -- Book files --

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub epub: Option<String>,
    pub pdf: Option<String>,
}

// -- Listening progress --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressUpdate {
    pub chapter_id: Option<String>,
    pub position_seconds: Option<LooseNumber>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    pub chapter_id: String,
    pub position_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

// -- Audio bookmarks and notes --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBookmarkRequest {
    pub chapter_id: Option<String>,
    pub position_seconds: Option<LooseNumber>,
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkItem {
    pub id: i64,
    pub chapter_id: String,
    pub position_seconds: f64,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewNoteRequest {
    pub chapter_id: Option<String>,
    pub position_seconds: Option<LooseNumber>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub severity: Option<String>,
    #[serde(deserialize_with = "truthy")]
    pub spoiler: bool,
}

/// Edit body shared by audio and e-book notes. Metadata fields only change
/// when the key is present; an explicit `null` clears them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditNoteRequest {
    pub text: Option<String>,
    #[serde(rename = "type", deserialize_with = "present")]
    pub note_type: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub severity: Option<Option<String>>,
    #[serde(deserialize_with = "truthy_present")]
    pub spoiler: Option<bool>,
    #[serde(deserialize_with = "present")]
    pub excerpt: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteItem {
    pub id: i64,
    pub chapter_id: String,
    pub position_seconds: f64,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub severity: Option<String>,
    pub spoiler: bool,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- E-book --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpubProgressUpdate {
    pub cfi: Option<String>,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubProgressResponse {
    pub cfi: Option<String>,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEpubBookmarkRequest {
    pub cfi: Option<String>,
    pub label: Option<String>,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubBookmarkItem {
    pub id: i64,
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEpubNoteRequest {
    pub cfi: Option<String>,
    pub text: Option<String>,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub severity: Option<String>,
    #[serde(deserialize_with = "truthy")]
    pub spoiler: bool,
    pub excerpt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubNoteItem {
    pub id: i64,
    pub cfi: String,
    pub chapter_href: Option<String>,
    pub chapter_title: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub severity: Option<String>,
    pub spoiler: bool,
    pub excerpt: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Feedback --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackScope {
    Chapter,
    General,
}

impl FeedbackScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chapter => "chapter",
            Self::General => "general",
        }
    }
}

impl FromStr for FeedbackScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chapter" => Ok(Self::Chapter),
            "general" => Ok(Self::General),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStatus {
    New,
    Triaged,
    Fixed,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Triaged => "triaged",
            Self::Fixed => "fixed",
        }
    }
}

impl FromStr for FeedbackStatus {
    type Err = ();

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "triaged" => Ok(Self::Triaged),
            "fixed" => Ok(Self::Fixed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackRequest {
    pub scope: Option<String>,
    pub chapter_id: Option<String>,
    pub text: Option<String>,
    pub draft_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub count: usize,
    pub latest_created_at: Option<DateTime<Utc>>,
}

// -- Admin --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewInviteRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteItem {
    pub code: String,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub id: i64,
    pub user_id: i64,
    pub scope: String,
    pub chapter_id: Option<String>,
    pub status: String,
    pub draft_version: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackStatusUpdate {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProgressItem {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub chapters_started: i64,
    pub latest: Option<ProgressItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_number_accepts_numbers_and_numeric_strings() {
        let n: LooseNumber = serde_json::from_str("12.5").unwrap();
        assert_eq!(n.to_f64(), Some(12.5));

        let n: LooseNumber = serde_json::from_str("\" 42 \"").unwrap();
        assert_eq!(n.to_f64(), Some(42.0));

        let n: LooseNumber = serde_json::from_str("\"\"").unwrap();
        assert_eq!(n.to_f64(), Some(0.0));
    }

    #[test]
    fn loose_number_rejects_garbage_and_non_finite() {
        let n: LooseNumber = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(n.to_f64(), None);

        let n: LooseNumber = serde_json::from_str("\"NaN\"").unwrap();
        assert_eq!(n.to_f64(), None);
    }

    #[test]
    fn edit_note_distinguishes_absent_from_null() {
        let req: EditNoteRequest =
            serde_json::from_str(r#"{"text": "hi", "severity": null}"#).unwrap();
        assert_eq!(req.note_type, None);
        assert_eq!(req.severity, Some(None));
        assert_eq!(req.spoiler, None);

        let req: EditNoteRequest =
            serde_json::from_str(r#"{"text": "hi", "type": "typo", "spoiler": true}"#).unwrap();
        assert_eq!(req.note_type, Some(Some("typo".into())));
        assert_eq!(req.spoiler, Some(true));

        let req: EditNoteRequest = serde_json::from_str(r#"{"text": "hi", "spoiler": null}"#).unwrap();
        assert_eq!(req.spoiler, Some(false));
    }

    #[test]
    fn spoiler_flags_are_coerced() {
        for (raw, expected) in [
            ("1", true),
            ("0", false),
            ("\"true\"", true),
            ("\"false\"", false),
            ("\"\"", false),
            ("null", false),
            ("true", true),
        ] {
            let body = format!(r#"{{"chapterId": "ch01", "text": "hi", "spoiler": {raw}}}"#);
            let req: NewNoteRequest = serde_json::from_str(&body).unwrap();
            assert_eq!(req.spoiler, expected, "spoiler: {raw}");
        }

        let req: NewEpubNoteRequest = serde_json::from_str(r#"{"cfi": "x", "text": "hi"}"#).unwrap();
        assert!(!req.spoiler);
    }

    #[test]
    fn feedback_status_is_case_insensitive() {
        assert_eq!(" Triaged ".parse::<FeedbackStatus>(), Ok(FeedbackStatus::Triaged));
        assert_eq!("FIXED".parse::<FeedbackStatus>(), Ok(FeedbackStatus::Fixed));
        assert!("done".parse::<FeedbackStatus>().is_err());
    }

    #[test]
    fn feedback_scope_is_exact() {
        assert_eq!("chapter".parse::<FeedbackScope>(), Ok(FeedbackScope::Chapter));
        assert!("Chapter".parse::<FeedbackScope>().is_err());
    }
}
