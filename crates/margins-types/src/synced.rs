use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line of narration text with the time span it is spoken in. Timing
/// keys are normalised to `start`/`end`; other keys are kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    #[serde(alias = "startTime")]
    pub start: f64,
    #[serde(alias = "endTime")]
    pub end: f64,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Synced text for one chapter, cues ordered by start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncedText {
    pub lines: Vec<Cue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Bare(Vec<Cue>),
    Lines { lines: Vec<Cue> },
    Cues { cues: Vec<Cue> },
}

impl SyncedText {
    pub fn new(mut lines: Vec<Cue>) -> Self {
        lines.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { lines }
    }

    /// Accepts a bare cue array or an object holding `lines` or `cues`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let lines = match serde_json::from_value(value)? {
            Document::Bare(lines) | Document::Lines { lines } | Document::Cues { cues: lines } => lines,
        };
        Ok(Self::new(lines))
    }

    /// Index of the cue being spoken at `seconds`: the last cue starting at or
    /// before that time, provided the time falls before its end.
    pub fn index_at(&self, seconds: f64) -> Option<usize> {
        let after = self.lines.partition_point(|c| c.start <= seconds);
        let idx = after.checked_sub(1)?;
        (seconds < self.lines[idx].end).then_some(idx)
    }

    pub fn line_at(&self, seconds: f64) -> Option<&Cue> {
        self.index_at(seconds).map(|i| &self.lines[i])
    }
}
