//! Reader for the game's track metadata JSON.
//!
//! The game's own exporter leaves trailing commas before `}` and `]`, and files are
//! frequently saved with a UTF-8 byte-order mark. Both are removed before handing the
//! text to `serde_json`.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("Invalid trailing comma regex"));

/// Remove commas that directly precede a closing brace or bracket.
pub fn strip_trailing_commas(text: &str) -> Cow<'_, str> {
    TRAILING_COMMA.replace_all(text, "$1")
}

pub fn parse(text: &str) -> Result<Value, serde_json::Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(&strip_trailing_commas(text))
}

/// Read a non-negative integer field, accepting numbers and numeric strings.
pub fn integer_field(value: &Value, field: &str) -> Option<u32> {
    match value.get(field)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pit-box count from `ui_track.json` text; `0` when the text is malformed or the
/// field is missing.
pub fn pit_boxes(text: &str) -> u32 {
    match parse(text) {
        Ok(value) => integer_field(&value, "pitboxes").unwrap_or(0),
        Err(e) => {
            tracing::debug!("Malformed track metadata, pit boxes unknown: {}", e);
            0
        }
    }
}
