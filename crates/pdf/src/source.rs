//! Span sources: text layer and OCR behind one capability.

use std::fmt;
use std::str::FromStr;

use balloon_core::span::PageSpans;
use serde::{Deserialize, Serialize};

use crate::ocr::OcrEngine;
use crate::parser::words::SpanExtractor;
use crate::PdfError;

/// Anything that can produce word spans for one page of a PDF.
pub trait SpanSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Spans for a zero-based page of `pdf`.
    fn page_spans(&self, pdf: &[u8], page: usize) -> Result<PageSpans, PdfError>;
}

impl SpanSource for SpanExtractor {
    fn name(&self) -> &'static str {
        "text_layer"
    }

    fn page_spans(&self, pdf: &[u8], page: usize) -> Result<PageSpans, PdfError> {
        SpanExtractor::page_spans(self, pdf, page)
    }
}

impl SpanSource for OcrEngine {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn page_spans(&self, pdf: &[u8], page: usize) -> Result<PageSpans, PdfError> {
        OcrEngine::page_spans(self, pdf, page)
    }
}

/// When to fall back from the text layer to OCR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrPolicy {
    /// Text layer only.
    Never,
    /// OCR only when the text layer yields no spans.
    #[default]
    Auto,
    /// OCR only.
    Always,
}

impl FromStr for OcrPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(OcrPolicy::Never),
            "auto" => Ok(OcrPolicy::Auto),
            "always" => Ok(OcrPolicy::Always),
            other => Err(format!(
                "unknown OCR policy '{other}' (expected never, auto or always)"
            )),
        }
    }
}

impl fmt::Display for OcrPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OcrPolicy::Never => "never",
            OcrPolicy::Auto => "auto",
            OcrPolicy::Always => "always",
        };
        f.write_str(name)
    }
}

/// Chooses between a primary source and a fallback according to an
/// [`OcrPolicy`].
#[derive(Debug, Clone)]
pub struct AutoSource<P = SpanExtractor, F = OcrEngine> {
    primary: P,
    fallback: F,
    policy: OcrPolicy,
}

impl AutoSource {
    /// Text layer first, OCR with `ocr` as the fallback.
    pub fn new(ocr: OcrEngine, policy: OcrPolicy) -> Self {
        Self::with_sources(SpanExtractor::new(), ocr, policy)
    }
}

impl<P: SpanSource, F: SpanSource> AutoSource<P, F> {
    pub fn with_sources(primary: P, fallback: F, policy: OcrPolicy) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    pub fn policy(&self) -> OcrPolicy {
        self.policy
    }
}

impl<P: SpanSource, F: SpanSource> SpanSource for AutoSource<P, F> {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn page_spans(&self, pdf: &[u8], page: usize) -> Result<PageSpans, PdfError> {
        match self.policy {
            OcrPolicy::Never => self.primary.page_spans(pdf, page),
            OcrPolicy::Always => self.fallback.page_spans(pdf, page),
            OcrPolicy::Auto => {
                let spans = self.primary.page_spans(pdf, page)?;
                if !spans.is_empty() {
                    return Ok(spans);
                }
                log::info!(
                    "page {}: {} produced no spans, falling back to {}",
                    page,
                    self.primary.name(),
                    self.fallback.name()
                );
                self.fallback.page_spans(pdf, page)
            }
        }
    }
}
