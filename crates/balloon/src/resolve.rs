use crate::prelude::*;
use balloon_core::config::Settings;
use balloon_core::proximity::{denormalize, resolve_spans, Radius};
use balloon_core::span::{PageSpans, SpanOrigin};
use pdf::OcrPolicy;
use serde::Serialize;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Path to the PDF file
    pub path: std::path::PathBuf,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Horizontal position in points from the left edge
    #[arg(long, requires = "y", conflicts_with_all = ["nx", "ny"])]
    pub x: Option<f32>,

    /// Vertical position in points from the top edge
    #[arg(long, requires = "x")]
    pub y: Option<f32>,

    /// Horizontal position as a fraction of the page width
    #[arg(long, requires = "ny", conflicts_with_all = ["x", "y"])]
    pub nx: Option<f32>,

    /// Vertical position as a fraction of the page height
    #[arg(long, requires = "nx")]
    pub ny: Option<f32>,

    /// Search radius in points, overriding the configured one
    #[arg(long)]
    pub max_dist: Option<f32>,

    /// Balloon label echoed in the output
    #[arg(long)]
    pub label: Option<String>,

    /// When to use OCR: auto, never or always
    #[arg(long, env = "BALLOON_OCR", default_value_t = OcrPolicy::Auto)]
    pub ocr: OcrPolicy,
}

/// Where the balloon sits, in the form it was given.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Position {
    Points { x: f32, y: f32 },
    Normalized { nx: f32, ny: f32 },
}

impl Options {
    fn position(&self) -> Result<Position> {
        match (self.x, self.y, self.nx, self.ny) {
            (Some(x), Some(y), _, _) => Ok(Position::Points { x, y }),
            (_, _, Some(nx), Some(ny)) => Ok(Position::Normalized { nx, ny }),
            _ => Err(Error::MissingPosition.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    x: f32,
    y: f32,
    radius: f32,
    origin: SpanOrigin,
    texts: Vec<String>,
}

fn resolve_position(
    spans: &PageSpans,
    position: Position,
    max_dist: Option<f32>,
    settings: &Settings,
) -> (f32, f32, f32, Vec<String>) {
    let (x, y, radius) = match position {
        Position::Points { x, y } => {
            let radius = max_dist.map_or(settings.resolve.absolute_radius(), Radius::Absolute);
            (x, y, radius)
        }
        Position::Normalized { nx, ny } => {
            let (x, y) = denormalize(nx, ny, spans.page_width, spans.page_height);
            let radius = max_dist.map_or(settings.resolve.normalized_radius(), Radius::Absolute);
            (x, y, radius)
        }
    };
    let radius = radius.to_points(spans.page_width, spans.page_height);

    let texts = resolve_spans(
        &spans.spans,
        x,
        y,
        radius,
        settings.resolve.fallback_count,
    )
    .into_iter()
    .map(|nearby| nearby.span.text.clone())
    .collect();
    (x, y, radius, texts)
}

pub fn run(options: Options, settings: &Settings) -> Result<()> {
    let position = options.position()?;
    let bytes = read_input(&options.path)?;
    let spans = crate::spans::page_spans(&bytes, options.page, settings, options.ocr)?;

    let (x, y, radius, texts) = resolve_position(&spans, position, options.max_dist, settings);
    log::info!(
        "resolved ({:.1}, {:.1}) on page {} to {} text(s) within {:.1} pt",
        x,
        y,
        options.page,
        texts.len(),
        radius
    );

    print_json(&ResolveOutput {
        page: options.page,
        label: options.label,
        x,
        y,
        radius,
        origin: spans.origin,
        texts,
    })
}
