use thiserror::Error;

use parser::backend::LopdfBackend;

pub mod ocr;
pub mod parser;
pub mod source;

pub use balloon_core::span::{PageSpans, SpanOrigin, TextSpan};
pub use ocr::{OcrBox, OcrEngine, OcrPage};
pub use parser::words::SpanExtractor;
pub use source::{AutoSource, OcrPolicy, SpanSource};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Unreadable PDF: {0}")]
    UnreadablePdf(String),
    #[error("Unreadable PDF page {page}: {reason}")]
    UnreadablePage { page: usize, reason: String },
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Could not rasterize page {page}: {reason}")]
    Rasterization { page: usize, reason: String },
    #[error("OCR {stage} timed out on page {page} after {seconds}s")]
    OcrTimeout {
        page: usize,
        stage: &'static str,
        seconds: u64,
    },
    #[error("OCR failed on page {page}: {reason}")]
    Ocr { page: usize, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Attach a page index to a document-level parse failure.
    pub fn on_page(self, page: usize) -> Self {
        match self {
            PdfError::UnreadablePdf(reason) => PdfError::UnreadablePage { page, reason },
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience free functions (stateless, re-parse each call)
// ---------------------------------------------------------------------------

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfError> {
    Ok(LopdfBackend::load_bytes(bytes)?.page_count())
}

/// Page size `(width, height)` in points for a zero-based page index.
pub fn page_dimensions(bytes: &[u8], page: usize) -> Result<(f32, f32), PdfError> {
    LopdfBackend::load_bytes(bytes)?.page_dimensions(page)
}

/// Word spans from the embedded text layer of one page.
pub fn extract_spans(bytes: &[u8], page: usize) -> Result<PageSpans, PdfError> {
    SpanExtractor::new().page_spans(bytes, page)
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// `BT /F1 12 Tf x y Td (text) Tj ET`
    pub fn text_op(x: f32, y: f32, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// An A4 document with one page per entry in `pages`.
    pub fn pdf_with_pages(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("fixture content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture document saves");
        bytes
    }

    pub fn single_page_pdf(operations: Vec<Operation>) -> Vec<u8> {
        pdf_with_pages(vec![operations])
    }
}
