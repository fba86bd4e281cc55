use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The audio manifest document, served as stored. Only the chapter lookup
/// looks inside it; everything else is carried through untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct AudioManifest(Value);

/// The fields the audio proxy needs from one chapter entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterRef {
    id: String,
    #[serde(default)]
    audio_url: Option<String>,
}

impl AudioManifest {
    pub fn empty(book_title: &str) -> Self {
        Self(json!({ "bookTitle": book_title, "chapters": [] }))
    }

    /// Wraps a parsed manifest, filling in `bookTitle` when the document is
    /// an object without one.
    pub fn from_value(mut doc: Value, book_title: &str) -> Self {
        if let Some(map) = doc.as_object_mut() {
            let missing = match map.get("bookTitle") {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                map.insert("bookTitle".into(), Value::String(book_title.to_string()));
            }
        }
        Self(doc)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Remote audio URL for a chapter, if the chapter exists and has one.
    /// Entries without a string `id` are skipped.
    pub fn audio_url(&self, chapter_id: &str) -> Option<String> {
        self.0
            .get("chapters")?
            .as_array()?
            .iter()
            .filter_map(|entry| ChapterRef::deserialize(entry).ok())
            .find(|chapter| chapter.id == chapter_id)?
            .audio_url
            .filter(|url| !url.is_empty())
    }
}
