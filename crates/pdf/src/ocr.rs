//! OCR fallback for pages without an embedded text layer.
//!
//! The page is rasterized with `pdftoppm`, recognized with `tesseract` in TSV
//! mode, and every word box is scaled from bitmap pixels back to PDF points
//! so the result has the same shape as text-layer extraction.
//!
//! All intermediate files live in a per-call temporary directory that is
//! removed when the call returns, whichever way it returns.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use balloon_core::config::OcrSettings;
use balloon_core::span::{PageSpans, SpanOrigin, TextSpan};
use serde::{Deserialize, Serialize};

use crate::parser::backend::LopdfBackend;
use crate::PdfError;

const RASTERIZER: &str = "pdftoppm";
const RECOGNIZER: &str = "tesseract";

/// How often a running child process is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// PDF user space is defined at 72 units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// One recognized word in bitmap pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub text: String,
    /// 0-100, or -1 when the recognizer reported none.
    pub confidence: f32,
}

/// Recognition output for one page, with the sizes needed to remap it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPage {
    pub page_width: f32,
    pub page_height: f32,
    pub image_width: u32,
    pub image_height: u32,
    pub boxes: Vec<OcrBox>,
}

impl OcrPage {
    /// Convert pixel boxes into point-space spans.
    ///
    /// Boxes below `min_confidence` are dropped when a threshold is given.
    pub fn into_page_spans(self, min_confidence: Option<f32>) -> PageSpans {
        let spans = if self.image_width == 0 || self.image_height == 0 {
            Vec::new()
        } else {
            let sx = self.page_width / self.image_width as f32;
            let sy = self.page_height / self.image_height as f32;
            self.boxes
                .into_iter()
                .filter(|b| min_confidence.is_none_or(|min| b.confidence >= min))
                .filter_map(|b| {
                    TextSpan::new(
                        b.left as f32 * sx,
                        b.top as f32 * sy,
                        (b.left as f32 + b.width as f32) * sx,
                        (b.top as f32 + b.height as f32) * sy,
                        b.text,
                    )
                })
                .collect()
        };

        PageSpans {
            page_width: self.page_width,
            page_height: self.page_height,
            origin: SpanOrigin::Ocr,
            spans,
        }
    }
}

/// Parse tesseract TSV output, keeping word rows (level 5) with text.
pub fn parse_tsv(tsv: &str) -> Vec<OcrBox> {
    tsv.lines()
        .filter(|row| !row.starts_with("level"))
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0].trim() != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            Some(OcrBox {
                left: cols[6].trim().parse().ok()?,
                top: cols[7].trim().parse().ok()?,
                width: cols[8].trim().parse().ok()?,
                height: cols[9].trim().parse().ok()?,
                text: text.to_string(),
                confidence: cols[10].trim().parse().unwrap_or(-1.0),
            })
        })
        .collect()
}

/// Runs the external rasterizer and recognizer.
#[derive(Debug, Clone, Default)]
pub struct OcrEngine {
    settings: OcrSettings,
}

impl OcrEngine {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OcrSettings {
        &self.settings
    }

    /// Check that both external programs are on `PATH`.
    pub fn check_available() -> Result<(), String> {
        for program in [RASTERIZER, RECOGNIZER] {
            which::which(program).map_err(|e| format!("{program} not found: {e}"))?;
        }
        Ok(())
    }

    /// Rasterize and recognize one zero-based page.
    pub fn recognize(&self, bytes: &[u8], page: usize) -> Result<OcrPage, PdfError> {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.settings.timeout_secs);
        let (page_width, page_height) = LopdfBackend::load_bytes(bytes)?.page_dimensions(page)?;

        let workdir = scratch_dir(page)?;
        let image = rasterize(
            bytes,
            page,
            self.settings.dpi,
            workdir.path(),
            deadline,
            self.settings.timeout_secs,
        )?;
        let (image_width, image_height) =
            image::image_dimensions(&image).map_err(|e| PdfError::Rasterization {
                page,
                reason: format!("cannot read rendered bitmap: {e}"),
            })?;

        let dpi = self.settings.dpi.to_string();
        let expression = duct::cmd!(
            RECOGNIZER,
            &image,
            "stdout",
            "-l",
            &self.settings.language,
            "--dpi",
            &dpi,
            "tsv"
        );
        let output = run_until(expression, deadline)
            .map_err(|e| PdfError::Ocr {
                page,
                reason: format!("cannot run {RECOGNIZER}: {e}"),
            })?
            .ok_or(PdfError::OcrTimeout {
                page,
                stage: "recognition",
                seconds: self.settings.timeout_secs,
            })?;
        if !output.status.success() {
            return Err(PdfError::Ocr {
                page,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let boxes = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        log::info!(
            "page {}: OCR found {} words at {} dpi in {:?}",
            page,
            boxes.len(),
            self.settings.dpi,
            started.elapsed()
        );

        Ok(OcrPage {
            page_width,
            page_height,
            image_width,
            image_height,
            boxes,
        })
    }

    /// Recognize a page and remap it to point-space spans.
    pub fn page_spans(&self, bytes: &[u8], page: usize) -> Result<PageSpans, PdfError> {
        let ocr_page = self.recognize(bytes, page)?;
        Ok(ocr_page.into_page_spans(self.settings.min_confidence))
    }

    /// Render one page to PNG bytes at `zoom` (1.0 is 72 dpi).
    pub fn render_png(&self, bytes: &[u8], page: usize, zoom: f32) -> Result<Vec<u8>, PdfError> {
        // Validates the page index before spawning anything.
        LopdfBackend::load_bytes(bytes)?.page_dimensions(page)?;

        let dpi = (POINTS_PER_INCH * zoom).round().max(1.0) as u32;
        let deadline = Instant::now() + Duration::from_secs(self.settings.timeout_secs);
        let workdir = scratch_dir(page)?;
        let image = rasterize(
            bytes,
            page,
            dpi,
            workdir.path(),
            deadline,
            self.settings.timeout_secs,
        )?;
        std::fs::read(&image).map_err(|e| PdfError::Rasterization {
            page,
            reason: format!("cannot read rendered bitmap: {e}"),
        })
    }
}

/// A scratch directory for one page, removed when dropped.
fn scratch_dir(page: usize) -> Result<tempfile::TempDir, PdfError> {
    tempfile::TempDir::new().map_err(|e| PdfError::Rasterization {
        page,
        reason: format!("cannot create working directory: {e}"),
    })
}

/// Render one page to PNG bytes at `zoom` with default settings.
pub fn render_page_png(bytes: &[u8], page: usize, zoom: f32) -> Result<Vec<u8>, PdfError> {
    OcrEngine::default().render_png(bytes, page, zoom)
}

/// Write the document into `workdir` and rasterize one page there.
fn rasterize(
    bytes: &[u8],
    page: usize,
    dpi: u32,
    workdir: &Path,
    deadline: Instant,
    timeout_secs: u64,
) -> Result<PathBuf, PdfError> {
    let input = workdir.join("input.pdf");
    std::fs::write(&input, bytes).map_err(|e| PdfError::Rasterization {
        page,
        reason: format!("cannot write {}: {e}", input.display()),
    })?;
    let prefix = workdir.join("page");

    // pdftoppm numbers pages from 1.
    let number = (page + 1).to_string();
    let dpi = dpi.to_string();
    let expression = duct::cmd!(
        RASTERIZER,
        "-r",
        &dpi,
        "-f",
        &number,
        "-l",
        &number,
        "-png",
        "-singlefile",
        &input,
        &prefix
    );

    let output = run_until(expression, deadline)
        .map_err(|e| PdfError::Rasterization {
            page,
            reason: format!("cannot run {RASTERIZER}: {e}"),
        })?
        .ok_or(PdfError::OcrTimeout {
            page,
            stage: "rasterization",
            seconds: timeout_secs,
        })?;
    if !output.status.success() {
        return Err(PdfError::Rasterization {
            page,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let image = prefix.with_extension("png");
    if !image.exists() {
        return Err(PdfError::Rasterization {
            page,
            reason: format!("{RASTERIZER} produced no image"),
        });
    }
    log::debug!("page {}: rasterized to {}", page, image.display());
    Ok(image)
}

/// Run `expression` to completion, killing it once `deadline` passes.
///
/// Returns `Ok(None)` on timeout. A non-zero exit status is not an error
/// here; callers inspect `Output::status`.
fn run_until(expression: duct::Expression, deadline: Instant) -> std::io::Result<Option<Output>> {
    let handle = expression
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()?;

    loop {
        if handle.try_wait()?.is_some() {
            return handle.into_output().map(Some);
        }
        if Instant::now() >= deadline {
            handle.kill()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
