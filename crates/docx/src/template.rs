//! The report template: placeholder substitution and row expansion.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::time::Instant;

use balloon_core::matching::{extract_numbers, first_digit_run};
use balloon_core::placeholder::{substitute_segments, unresolved_tokens, SubstitutionOptions};
use balloon_core::span::Balloon;
use serde::Serialize;

use crate::package::Package;
use crate::xml::{self, XmlDocument, XmlElement, XmlNode};
use crate::TemplateError;

const DOCUMENT_PART: &str = "word/document.xml";

const W_BODY: &str = "w:body";
const W_TBL: &str = "w:tbl";
const W_TR: &str = "w:tr";
const W_TC: &str = "w:tc";
const W_TC_PR: &str = "w:tcPr";
const W_P: &str = "w:p";
const W_P_PR: &str = "w:pPr";
const W_R: &str = "w:r";
const W_R_PR: &str = "w:rPr";
const W_T: &str = "w:t";

/// Where a placeholder was expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillScope {
    /// Document-wide metadata (body, headers and footers).
    Document,
    /// The generated row of one record.
    Record { index: usize },
}

/// A non-fatal problem found while filling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum FillWarning {
    /// A field was supplied but no placeholder for it exists.
    MissingPlaceholder { field: String, scope: FillScope },
}

impl fmt::Display for FillWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillWarning::MissingPlaceholder {
                field,
                scope: FillScope::Document,
            } => write!(f, "no placeholder for metadata field {field:?}"),
            FillWarning::MissingPlaceholder {
                field,
                scope: FillScope::Record { index },
            } => write!(f, "record {index}: no placeholder for field {field:?}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FillReport {
    pub rows_written: usize,
    /// Metadata fields that were substituted at least once.
    pub metadata_replaced: Vec<String>,
    pub warnings: Vec<FillWarning>,
}

/// A table row whose value cell was set from a balloon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceMatch {
    /// Row position in the table, header included.
    pub row: usize,
    pub id: String,
}

/// One XML part of the package that may hold placeholders.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    doc: XmlDocument,
}

fn is_content_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

fn is_xml_char(c: char) -> bool {
    !matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

fn invalid_xml_field(values: &BTreeMap<String, String>) -> Option<&str> {
    values
        .iter()
        .find(|(_, value)| !value.chars().all(is_xml_char))
        .map(|(name, _)| name.as_str())
}

// ---------------------------------------------------------------------------
// Paragraph text
// ---------------------------------------------------------------------------

/// Paths to the `w:t` elements of a paragraph, in reading order.
///
/// Nested paragraphs and tables (text boxes, for instance) belong to
/// themselves and are skipped.
fn text_paths(el: &XmlElement, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, node) in el.children.iter().enumerate() {
        let XmlNode::Element(child) = node else {
            continue;
        };
        if child.is(W_P) || child.is(W_TBL) {
            continue;
        }
        path.push(i);
        if child.is(W_T) {
            out.push(path.clone());
        } else {
            text_paths(child, path, out);
        }
        path.pop();
    }
}

fn paragraph_text(p: &XmlElement) -> String {
    let mut paths = Vec::new();
    text_paths(p, &mut Vec::new(), &mut paths);
    paths
        .iter()
        .filter_map(|path| p.at(path))
        .map(XmlElement::text)
        .collect()
}

fn cell_text(cell: &XmlElement) -> String {
    cell.elements_named(W_P)
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn set_run_text(t: &mut XmlElement, text: &str) {
    t.set_text(text);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.set_attr("xml:space", "preserve");
    }
}

fn substitute_paragraph(
    p: &mut XmlElement,
    mapping: &BTreeMap<String, String>,
    options: SubstitutionOptions,
) -> BTreeSet<String> {
    let mut paths = Vec::new();
    text_paths(p, &mut Vec::new(), &mut paths);
    let segments: Vec<String> = paths
        .iter()
        .map(|path| p.at(path).map(XmlElement::text).unwrap_or_default())
        .collect();

    let Some(substitution) = substitute_segments(&segments, mapping, options) else {
        return BTreeSet::new();
    };

    for ((path, old), new) in paths.iter().zip(&segments).zip(&substitution.segments) {
        if old == new {
            continue;
        }
        if let Some(t) = p.at_mut(path) {
            set_run_text(t, new);
        }
    }
    substitution.replaced
}

/// Substitute in every paragraph under `el`, including `el` itself.
fn substitute_tree(
    el: &mut XmlElement,
    mapping: &BTreeMap<String, String>,
    options: SubstitutionOptions,
    replaced: &mut BTreeSet<String>,
) {
    if el.is(W_P) {
        replaced.extend(substitute_paragraph(el, mapping, options));
    }
    for node in el.children.iter_mut() {
        if let XmlNode::Element(child) = node {
            substitute_tree(child, mapping, options, replaced);
        }
    }
}

fn collect_unresolved(el: &XmlElement, out: &mut Vec<String>) {
    if el.is(W_P) {
        out.extend(unresolved_tokens(&paragraph_text(el)));
    }
    for child in el.elements() {
        collect_unresolved(child, out);
    }
}

/// Replace a cell's content with one paragraph holding `text`, keeping the
/// first paragraph's properties and the first run's formatting.
fn set_cell_text(cell: &mut XmlElement, text: &str) {
    let first = cell.elements_named(W_P).next();
    let p_pr = first.and_then(|p| p.elements_named(W_P_PR).next()).cloned();
    let r_pr = first
        .and_then(|p| p.elements_named(W_R).next())
        .and_then(|r| r.elements_named(W_R_PR).next())
        .cloned();

    cell.children
        .retain(|node| matches!(node, XmlNode::Element(el) if el.is(W_TC_PR)));

    let mut t = XmlElement::new(W_T);
    set_run_text(&mut t, text);
    let mut run = XmlElement::new(W_R);
    run.children.extend(r_pr.map(XmlNode::Element));
    run.children.push(XmlNode::Element(t));
    let mut paragraph = XmlElement::new(W_P);
    paragraph.children.extend(p_pr.map(XmlNode::Element));
    paragraph.children.push(XmlNode::Element(run));
    cell.children.push(XmlNode::Element(paragraph));
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A loaded report template.
///
/// Edits happen on the in-memory tree; nothing is written until
/// [`Template::to_bytes`] or [`Template::save`].
#[derive(Debug, Clone)]
pub struct Template {
    package: Package,
    parts: Vec<Part>,
}

impl Template {
    /// Read a `.docx` package without checking its table shape.
    ///
    /// Use this for filled output and for documents that are only read
    /// for their rows.
    pub fn read(bytes: &[u8]) -> Result<Self, TemplateError> {
        let package = Package::from_bytes(bytes)?;

        let mut parts = Vec::new();
        for name in package.names().filter(|n| is_content_part(n)) {
            let text = package.read_text(name)?;
            let doc = xml::parse(&text).map_err(|reason| TemplateError::Xml {
                part: name.to_string(),
                reason,
            })?;
            parts.push(Part {
                name: name.to_string(),
                doc,
            });
        }
        if !parts.iter().any(|p| p.name == DOCUMENT_PART) {
            return Err(TemplateError::MissingPart(DOCUMENT_PART.to_string()));
        }

        log::debug!("read document with {} content parts", parts.len());
        Ok(Self { package, parts })
    }

    /// Read a `.docx` package and check the shape of its first table.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let template = Self::read(bytes)?;
        template.validate()?;
        Ok(template)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// [`Template::read`] from a file.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let bytes = std::fs::read(path)?;
        Self::read(&bytes)
    }

    fn body(&self) -> Option<&XmlElement> {
        self.parts
            .iter()
            .find(|p| p.name == DOCUMENT_PART)
            .and_then(|p| p.doc.root.elements_named(W_BODY).next())
    }

    /// Check that the first table has at least two rows of at least two
    /// cells each.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let body = self.body().ok_or_else(|| TemplateError::Structure {
            reason: "document has no body".to_string(),
        })?;
        let path = body.find_path(W_TBL).ok_or_else(|| TemplateError::Structure {
            reason: "document has no table".to_string(),
        })?;
        let table = body.at(&path).ok_or_else(|| TemplateError::Structure {
            reason: "document has no table".to_string(),
        })?;

        let rows: Vec<&XmlElement> = table.elements_named(W_TR).collect();
        if rows.len() < 2 {
            return Err(TemplateError::Structure {
                reason: format!(
                    "first table has {} row(s), a header and a pattern row are required",
                    rows.len()
                ),
            });
        }
        for (index, row) in rows.iter().enumerate() {
            let cells = row.elements_named(W_TC).count();
            if cells < 2 {
                return Err(TemplateError::Structure {
                    reason: format!("row {index} has {cells} cell(s), at least 2 are required"),
                });
            }
        }
        Ok(())
    }

    /// Substitute `mapping` in every paragraph of the body, headers and
    /// footers. Returns the keys that were replaced.
    pub fn substitute(
        &mut self,
        mapping: &BTreeMap<String, String>,
        options: SubstitutionOptions,
    ) -> BTreeSet<String> {
        let mut replaced = BTreeSet::new();
        for part in &mut self.parts {
            substitute_tree(&mut part.doc.root, mapping, options, &mut replaced);
        }
        replaced
    }

    /// Fill the template: metadata everywhere, one generated row per
    /// record, pattern row removed.
    ///
    /// Either every record is written or the template is left untouched.
    pub fn fill(
        &mut self,
        metadata: &BTreeMap<String, String>,
        records: &[Balloon],
        options: SubstitutionOptions,
    ) -> Result<FillReport, TemplateError> {
        let started = Instant::now();
        self.validate()?;

        if let Some(field) = invalid_xml_field(metadata) {
            return Err(TemplateError::InvalidMetadata {
                field: field.to_string(),
                reason: "value contains a character not allowed in XML".to_string(),
            });
        }

        let mut draft = self.clone();
        let mut warnings = Vec::new();

        // Metadata
        let metadata_replaced = draft.substitute(metadata, options);
        for field in metadata.keys().filter(|k| !metadata_replaced.contains(*k)) {
            warnings.push(FillWarning::MissingPlaceholder {
                field: field.clone(),
                scope: FillScope::Document,
            });
        }

        // Rows
        let table = draft.first_table_mut()?;
        let (pattern_index, pattern) = table
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node {
                XmlNode::Element(el) if el.is(W_TR) => Some((i, el)),
                _ => None,
            })
            .nth(1)
            .map(|(i, el)| (i, el.clone()))
            .ok_or_else(|| TemplateError::Structure {
                reason: "first table has no pattern row".to_string(),
            })?;

        // Record fields never use bare keys: `id` or `text` would otherwise
        // match ordinary words in the row.
        let record_options = SubstitutionOptions::default();
        for (index, record) in records.iter().enumerate() {
            let expansion_error = |reason: &str| TemplateError::RowExpansion {
                index,
                id: record.id.clone(),
                reason: reason.to_string(),
            };

            if record.id.trim().is_empty() {
                return Err(expansion_error("record has an empty id"));
            }
            let values = record.placeholder_values();
            if let Some(field) = invalid_xml_field(&values) {
                return Err(expansion_error(&format!(
                    "field {field:?} contains a character not allowed in XML"
                )));
            }

            let mut row = pattern.clone();
            let mut replaced = BTreeSet::new();
            substitute_tree(&mut row, &values, record_options, &mut replaced);
            for field in values.keys().filter(|k| !replaced.contains(*k)) {
                warnings.push(FillWarning::MissingPlaceholder {
                    field: field.clone(),
                    scope: FillScope::Record { index },
                });
            }
            table.children.push(XmlNode::Element(row));
        }
        table.children.remove(pattern_index);

        for warning in &warnings {
            log::warn!("{warning}");
        }

        *self = draft;
        log::info!(
            "filled template with {} record(s) and {} metadata field(s) in {:?}",
            records.len(),
            metadata_replaced.len(),
            started.elapsed()
        );

        Ok(FillReport {
            rows_written: records.len(),
            metadata_replaced: metadata_replaced.into_iter().collect(),
            warnings,
        })
    }

    /// Write balloon texts into the second cell of every row whose first
    /// cell names a balloon id, either exactly or by its first digit run.
    ///
    /// Rows without a matching balloon are left as they are.
    pub fn fill_by_reference(
        &mut self,
        balloons: &[Balloon],
    ) -> Result<Vec<ReferenceMatch>, TemplateError> {
        let by_id: BTreeMap<&str, &str> = balloons
            .iter()
            .map(|b| (b.id.as_str(), b.text.as_str()))
            .collect();
        if let Some(b) = balloons.iter().find(|b| !b.text.chars().all(is_xml_char)) {
            return Err(TemplateError::InvalidMetadata {
                field: b.id.clone(),
                reason: "balloon text contains a character not allowed in XML".to_string(),
            });
        }

        let table = self.first_table_mut()?;
        let mut matches = Vec::new();

        for (position, row) in table.elements_named_mut(W_TR).enumerate().skip(1) {
            let mut cells = row.elements_named_mut(W_TC);
            let (Some(id_cell), Some(value_cell)) = (cells.next(), cells.next()) else {
                log::warn!("row {position} has fewer than 2 cells, skipping");
                continue;
            };

            let id_text = cell_text(id_cell).trim().to_string();
            let matched = by_id
                .get_key_value(id_text.as_str())
                .or_else(|| first_digit_run(&id_text).and_then(|d| by_id.get_key_value(d)));

            match matched {
                Some((id, text)) => {
                    set_cell_text(value_cell, text);
                    log::debug!("row {position}: {id_text:?} matched balloon {id}");
                    matches.push(ReferenceMatch {
                        row: position,
                        id: id.to_string(),
                    });
                }
                None => log::info!("row {position}: no balloon for {id_text:?}"),
            }
        }

        Ok(matches)
    }

    fn first_table_mut(&mut self) -> Result<&mut XmlElement, TemplateError> {
        let no_table = || TemplateError::Structure {
            reason: "document has no table".to_string(),
        };
        let part = self
            .parts
            .iter_mut()
            .find(|p| p.name == DOCUMENT_PART)
            .ok_or_else(|| TemplateError::MissingPart(DOCUMENT_PART.to_string()))?;
        let body = part
            .doc
            .root
            .elements_named_mut(W_BODY)
            .next()
            .ok_or_else(no_table)?;
        let path = body.find_path(W_TBL).ok_or_else(no_table)?;
        body.at_mut(&path).ok_or_else(no_table)
    }

    /// Every row of every top-level table as `"cell | cell"`, followed by
    /// the top-level paragraphs that contain a number.
    pub fn table_rows(&self) -> Vec<String> {
        let Some(body) = self.body() else {
            return Vec::new();
        };

        let mut rows: Vec<String> = body
            .elements_named(W_TBL)
            .flat_map(|table| table.elements_named(W_TR))
            .map(|row| {
                row.elements_named(W_TC)
                    .map(|cell| cell_text(cell).trim().to_string())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect();

        rows.extend(
            body.elements_named(W_P)
                .map(paragraph_text)
                .filter(|text| !extract_numbers(&[text.as_str()]).is_empty())
                .map(|text| text.trim().to_string()),
        );
        rows
    }

    /// `${...}` / `{{...}}` tokens still present in any part.
    pub fn unresolved_placeholders(&self) -> Vec<String> {
        let mut out = Vec::new();
        for part in &self.parts {
            collect_unresolved(&part.doc.root, &mut out);
        }
        out
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        let mut replacements = BTreeMap::new();
        for part in &self.parts {
            let bytes = xml::to_bytes(&part.doc).map_err(|e| TemplateError::Xml {
                part: part.name.clone(),
                reason: e.to_string(),
            })?;
            replacements.insert(part.name.clone(), bytes);
        }
        self.package.write(&replacements)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
