use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A word-level text fragment positioned on a page.
///
/// Coordinates are PDF points with the origin at the top-left corner of the
/// page. The center is computed once at construction and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub text: String,
    pub cx: f32,
    pub cy: f32,
}

impl TextSpan {
    /// Build a span from its bounding box. Returns `None` for blank text.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            x0,
            y0,
            x1,
            y1,
            text,
            cx: (x0 + x1) / 2.0,
            cy: (y0 + y1) / 2.0,
        })
    }

    /// Euclidean distance from the span center to `(x, y)`.
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.cx - x;
        let dy = self.cy - y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Where a set of spans came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOrigin {
    TextLayer,
    Ocr,
}

/// All spans of one page together with the page size in points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpans {
    pub page_width: f32,
    pub page_height: f32,
    pub origin: SpanOrigin,
    pub spans: Vec<TextSpan>,
}

impl PageSpans {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// One operator-placed marker.
///
/// `id` matches the reference column of a report row. Any extra JSON string
/// fields are kept in `fields` and become per-record placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balloon {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Balloon {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: None,
            fields: BTreeMap::new(),
        }
    }

    /// Every placeholder name this record provides, with its value.
    ///
    /// Always contains `id` and `text`; `type` only when present.
    pub fn placeholder_values(&self) -> BTreeMap<String, String> {
        let mut values = self.fields.clone();
        values.insert("id".to_string(), self.id.clone());
        values.insert("text".to_string(), self.text.clone());
        if let Some(kind) = &self.kind {
            values.insert("type".to_string(), kind.clone());
        }
        values
    }
}

/// The table row judged closest to a set of candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub row: String,
    /// Position of `row` in the input slice.
    pub index: usize,
    /// Confidence in `0..=100`.
    pub score: u8,
    pub numeric: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_center_is_precomputed() {
        let span = TextSpan::new(10.0, 20.0, 30.0, 40.0, "12.5").unwrap();
        assert_eq!(span.cx, 20.0);
        assert_eq!(span.cy, 30.0);
        assert_eq!(span.width(), 20.0);
        assert_eq!(span.height(), 20.0);
    }

    #[test]
    fn test_span_rejects_blank_text() {
        assert!(TextSpan::new(0.0, 0.0, 1.0, 1.0, "").is_none());
        assert!(TextSpan::new(0.0, 0.0, 1.0, 1.0, "  \t").is_none());
    }

    #[test]
    fn test_span_distance() {
        let span = TextSpan::new(0.0, 0.0, 6.0, 8.0, "x").unwrap();
        assert!((span.distance_to(0.0, 0.0) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_balloon_deserialize_with_extra_fields() {
        let json = r#"{"id":"B1","text":"14.76","type":"dim","tolerance":"0.1"}"#;
        let balloon: Balloon = serde_json::from_str(json).unwrap();
        assert_eq!(balloon.id, "B1");
        assert_eq!(balloon.kind.as_deref(), Some("dim"));
        assert_eq!(balloon.fields.get("tolerance").map(String::as_str), Some("0.1"));

        let values = balloon.placeholder_values();
        assert_eq!(values["id"], "B1");
        assert_eq!(values["text"], "14.76");
        assert_eq!(values["type"], "dim");
        assert_eq!(values["tolerance"], "0.1");
    }

    #[test]
    fn test_balloon_text_defaults_to_empty() {
        let balloon: Balloon = serde_json::from_str(r#"{"id":"7"}"#).unwrap();
        assert_eq!(balloon.text, "");
        assert!(balloon.kind.is_none());
        assert!(!balloon.placeholder_values().contains_key("type"));
    }
}
