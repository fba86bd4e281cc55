use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_FONT_SCALE: f64 = 1.0;
pub const DEFAULT_LINE_HEIGHT: f64 = 1.65;

const FONT_SCALE_RANGE: (f64, f64) = (0.75, 1.6);
const LINE_HEIGHT_RANGE: (f64, f64) = (1.2, 2.4);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Paper,
    White,
    Night,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::White => "white",
            Self::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paper" => Some(Self::Paper),
            "white" => Some(Self::White),
            "night" => Some(Self::Night),
            _ => None,
        }
    }
}

/// Per-user e-book reader appearance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSettings {
    pub theme: Theme,
    pub font_scale: f64,
    pub line_height: f64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Paper,
            font_scale: DEFAULT_FONT_SCALE,
            line_height: DEFAULT_LINE_HEIGHT,
        }
    }
}

impl ReaderSettings {
    /// Builds settings from stored columns, falling back to defaults for
    /// unknown themes and unset or non-finite numbers.
    pub fn from_stored(theme: &str, font_scale: f64, line_height: f64) -> Self {
        let fallback = |v: f64, d: f64| if v.is_finite() && v != 0.0 { v } else { d };
        Self {
            theme: Theme::parse(theme).unwrap_or_default(),
            font_scale: fallback(font_scale, DEFAULT_FONT_SCALE),
            line_height: fallback(line_height, DEFAULT_LINE_HEIGHT),
        }
    }

    /// Applies a partial update. Invalid fields are ignored; numbers are
    /// clamped into their allowed range.
    pub fn apply(&mut self, update: &ReaderSettingsUpdate) {
        if let Some(theme) = update.theme.as_ref().and_then(Value::as_str).and_then(Theme::parse) {
            self.theme = theme;
        }
        if let Some(scale) = update.font_scale.as_ref().and_then(loose_f64) {
            self.font_scale = scale.clamp(FONT_SCALE_RANGE.0, FONT_SCALE_RANGE.1);
        }
        if let Some(height) = update.line_height.as_ref().and_then(loose_f64) {
            self.line_height = height.clamp(LINE_HEIGHT_RANGE.0, LINE_HEIGHT_RANGE.1);
        }
    }
}

/// Raw update body. Fields stay untyped so a bad value drops only that field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettingsUpdate {
    pub theme: Option<Value>,
    pub font_scale: Option<Value>,
    pub line_height: Option<Value>,
}

fn loose_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(v: Value) -> ReaderSettingsUpdate {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn clamps_numbers_into_range() {
        let mut s = ReaderSettings::default();
        s.apply(&update(json!({"fontScale": 5, "lineHeight": 0.5})));
        assert_eq!(s.font_scale, 1.6);
        assert_eq!(s.line_height, 1.2);

        s.apply(&update(json!({"fontScale": "0.1", "lineHeight": "3"})));
        assert_eq!(s.font_scale, 0.75);
        assert_eq!(s.line_height, 2.4);
    }

    #[test]
    fn ignores_invalid_fields_individually() {
        let mut s = ReaderSettings::default();
        s.apply(&update(json!({"theme": "sepia", "fontScale": "big", "lineHeight": 1.8})));
        assert_eq!(s.theme, Theme::Paper);
        assert_eq!(s.font_scale, DEFAULT_FONT_SCALE);
        assert_eq!(s.line_height, 1.8);
    }

    #[test]
    fn accepts_known_themes() {
        let mut s = ReaderSettings::default();
        s.apply(&update(json!({"theme": "night"})));
        assert_eq!(s.theme, Theme::Night);
        assert_eq!(serde_json::to_value(s).unwrap()["theme"], "night");
    }

    #[test]
    fn stored_values_fall_back_to_defaults() {
        let s = ReaderSettings::from_stored("mauve", 0.0, f64::NAN);
        assert_eq!(s, ReaderSettings::default());
    }
}
