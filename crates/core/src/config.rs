//! Tunable parameters with the values the report workflow has always used.
//!
//! Every section deserializes with `#[serde(default)]`, so a settings file
//! only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::matching::DEFAULT_NUMERIC_TOLERANCE;
use crate::placeholder::SubstitutionOptions;
use crate::proximity::{Radius, DEFAULT_FALLBACK_COUNT};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub resolve: ResolveSettings,
    pub matching: MatchSettings,
    pub ocr: OcrSettings,
    pub template: TemplateSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSettings {
    /// Search radius in points for absolute coordinates.
    pub radius_points: f32,
    /// Search radius as a fraction of the larger page side, for normalized
    /// coordinates.
    pub page_fraction: f32,
    pub fallback_count: usize,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            radius_points: 50.0,
            page_fraction: 0.03,
            fallback_count: DEFAULT_FALLBACK_COUNT,
        }
    }
}

impl ResolveSettings {
    pub fn absolute_radius(&self) -> Radius {
        Radius::Absolute(self.radius_points)
    }

    pub fn normalized_radius(&self) -> Radius {
        Radius::PageFraction(self.page_fraction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub numeric_tolerance: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub dpi: u32,
    pub timeout_secs: u64,
    pub language: String,
    /// Drop OCR words below this confidence. `None` keeps everything.
    pub min_confidence: Option<f32>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            dpi: 300,
            timeout_secs: 60,
            language: "eng".to_string(),
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub bare_keys: bool,
}

impl TemplateSettings {
    pub fn substitution_options(&self) -> SubstitutionOptions {
        SubstitutionOptions {
            bare_keys: self.bare_keys,
        }
    }
}

/// Parse settings from TOML text.
pub fn parse_settings(text: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(text)
}
