use crate::prelude::{println, *};
use balloon_core::config::Settings;
use pdf::{AutoSource, OcrEngine, OcrPolicy, PageSpans, SpanSource};

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Path to the PDF file
    pub path: std::path::PathBuf,

    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// When to use OCR: auto, never or always
    #[arg(long, env = "BALLOON_OCR", default_value_t = OcrPolicy::Auto)]
    pub ocr: OcrPolicy,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Text layer with OCR fallback, configured from settings.
pub fn source(settings: &Settings, policy: OcrPolicy) -> AutoSource {
    AutoSource::new(OcrEngine::new(settings.ocr.clone()), policy)
}

/// Spans of one page, warning up front when OCR may run without its tools.
pub fn page_spans(bytes: &[u8], page: usize, settings: &Settings, policy: OcrPolicy) -> Result<PageSpans> {
    if policy != OcrPolicy::Never {
        if let Err(reason) = OcrEngine::check_available() {
            log::warn!("OCR unavailable: {reason}");
        }
    }

    let spans = source(settings, policy)
        .page_spans(bytes, page)
        .map_err(|e| eyre!(e))?;
    log::debug!(
        "page {}: {} spans from {:?}",
        page,
        spans.spans.len(),
        spans.origin
    );
    Ok(spans)
}

fn spans_table(spans: &PageSpans) -> prettytable::Table {
    let mut table = new_table();
    table.add_row(prettytable::row!["Text", "x0", "y0", "x1", "y1"]);
    for span in &spans.spans {
        table.add_row(prettytable::row![
            span.text,
            f!("{:.1}", span.x0),
            f!("{:.1}", span.y0),
            f!("{:.1}", span.x1),
            f!("{:.1}", span.y1)
        ]);
    }
    table
}

pub fn run(options: Options, settings: &Settings) -> Result<()> {
    let bytes = read_input(&options.path)?;
    let spans = page_spans(&bytes, options.page, settings, options.ocr)?;

    if options.json {
        return print_json(&spans);
    }

    println!(
        "\nPage {} ({:.0} x {:.0} pt, {:?}): {} spans\n",
        options.page,
        spans.page_width,
        spans.page_height,
        spans.origin,
        spans.spans.len()
    );
    spans_table(&spans).printstd();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf::{SpanOrigin, TextSpan};

    #[test]
    fn test_spans_table_has_header_and_rows() {
        let spans = PageSpans {
            page_width: 595.0,
            page_height: 842.0,
            origin: SpanOrigin::TextLayer,
            spans: vec![
                TextSpan::new(10.0, 20.0, 30.0, 32.0, "R5").unwrap(),
                TextSpan::new(40.0, 20.0, 70.0, 32.0, "14.76").unwrap(),
            ],
        };
        let table = spans_table(&spans);
        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("14.76"));
        assert!(rendered.contains("30.0"));
    }

    #[test]
    fn test_source_keeps_policy() {
        let source = source(&Settings::default(), OcrPolicy::Never);
        assert_eq!(source.policy(), OcrPolicy::Never);
    }
}
