//! Report template population for OOXML word-processing documents.
//!
//! A [`Template`] is a `.docx` package whose first body table holds a static
//! header row followed by a pattern row with `{{id}}`-style placeholders.
//! Filling it substitutes document-wide metadata, appends one copy of the
//! pattern row per record, and removes the pattern row.

use thiserror::Error;

pub mod package;
pub mod template;
pub mod xml;

pub use package::Package;
pub use template::{FillReport, FillScope, FillWarning, ReferenceMatch, Template};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Cannot read DOCX package: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("DOCX package has no part {0}")]
    MissingPart(String),
    #[error("Malformed XML in {part}: {reason}")]
    Xml { part: String, reason: String },
    #[error("Invalid template structure: {reason}")]
    Structure { reason: String },
    #[error("Record {index} (id {id:?}) could not be expanded: {reason}")]
    RowExpansion {
        index: usize,
        id: String,
        reason: String,
    },
    #[error("Metadata field {field:?}: {reason}")]
    InvalidMetadata { field: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{Cursor, Write};

    use zip::write::FileOptions;
    use zip::ZipWriter;

    pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// `<w:p>` with one run per fragment.
    pub fn paragraph(runs: &[&str]) -> String {
        let runs: String = runs
            .iter()
            .map(|text| format!(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#))
            .collect();
        format!("<w:p><w:pPr><w:jc w:val=\"left\"/></w:pPr>{runs}</w:p>")
    }

    /// `<w:tc>` holding one paragraph per entry; each entry is a run list.
    pub fn cell(paragraphs: &[&[&str]]) -> String {
        let body: String = paragraphs.iter().map(|runs| paragraph(runs)).collect();
        format!("<w:tc><w:tcPr><w:tcW w:w=\"2000\" w:type=\"dxa\"/></w:tcPr>{body}</w:tc>")
    }

    pub fn row(cells: &[String]) -> String {
        format!("<w:tr>{}</w:tr>", cells.concat())
    }

    pub fn table(rows: &[String]) -> String {
        format!(
            "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/></w:tblPr><w:tblGrid><w:gridCol w:w=\"2000\"/><w:gridCol w:w=\"2000\"/></w:tblGrid>{}</w:tbl>",
            rows.concat()
        )
    }

    pub fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    /// Header row `Ref | Value`, pattern row `{{id}} | {{text}}`.
    pub fn report_table() -> String {
        table(&[
            row(&[cell(&[&["Ref"]]), cell(&[&["Value"]])]),
            row(&[cell(&[&["{{id}}"]]), cell(&[&["{{text}}"]])]),
        ])
    }

    /// A package with `word/document.xml` and any extra `(name, contents)`.
    pub fn docx(document: &str, extra: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
            .unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        for (name, contents) in extra {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }
}
