//! The zip container around an OOXML document.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::TemplateError;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
}

/// Every file of a package, in archive order.
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry { name, data });
        }

        log::debug!("read package with {} parts", entries.len());
        Ok(Self { entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// A part decoded as UTF-8, without a byte-order mark.
    pub fn read_text(&self, name: &str) -> Result<String, TemplateError> {
        let data = self
            .get(name)
            .ok_or_else(|| TemplateError::MissingPart(name.to_string()))?;
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        String::from_utf8(data.to_vec()).map_err(|e| TemplateError::Xml {
            part: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Repackage, swapping in `replacements` and copying every other part
    /// verbatim.
    pub fn write(&self, replacements: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, TemplateError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            let data = replacements.get(&entry.name).unwrap_or(&entry.data);
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{docx, document_xml};

    #[test]
    fn test_reads_entries_in_order() {
        let bytes = docx(&document_xml(""), &[("word/header1.xml", "<w:hdr/>")]);
        let package = Package::from_bytes(&bytes).unwrap();
        let names: Vec<&str> = package.names().collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "word/document.xml", "word/header1.xml"]
        );
        assert_eq!(package.get("word/header1.xml"), Some(&b"<w:hdr/>"[..]));
    }

    #[test]
    fn test_read_text_strips_bom() {
        let bytes = docx("\u{FEFF}<w:document/>", &[]);
        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(package.read_text("word/document.xml").unwrap(), "<w:document/>");
    }

    #[test]
    fn test_missing_part() {
        let bytes = docx(&document_xml(""), &[]);
        let package = Package::from_bytes(&bytes).unwrap();
        assert!(matches!(
            package.read_text("word/styles.xml"),
            Err(TemplateError::MissingPart(name)) if name == "word/styles.xml"
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::from_bytes(b"plain text"),
            Err(TemplateError::Package(_))
        ));
    }

    #[test]
    fn test_write_replaces_only_named_parts() {
        let bytes = docx(&document_xml(""), &[("word/styles.xml", "<w:styles/>")]);
        let package = Package::from_bytes(&bytes).unwrap();

        let replacements =
            BTreeMap::from([("word/document.xml".to_string(), b"<new/>".to_vec())]);
        let written = package.write(&replacements).unwrap();

        let reread = Package::from_bytes(&written).unwrap();
        assert_eq!(reread.get("word/document.xml"), Some(&b"<new/>"[..]));
        assert_eq!(reread.get("word/styles.xml"), Some(&b"<w:styles/>"[..]));
        assert_eq!(reread.names().count(), 3);
    }
}
