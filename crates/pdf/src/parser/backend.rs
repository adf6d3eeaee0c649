use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// A simplified, lopdf-independent representation of a PDF value.
///
/// This enum decouples higher-level logic from the concrete `lopdf::Object`
/// type so that the functional core can work with pure data.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// The visible area of a page in default user space.
///
/// Stored as the MediaBox corners `[llx, lly, urx, ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Map a user-space point to top-left page coordinates.
    pub fn to_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.llx, self.ury - y)
    }
}

/// A Form XObject referenced from a page's resources.
#[derive(Debug, Clone)]
pub struct FormXObject {
    pub content: Vec<u8>,
    /// Form space to user space, `[a, b, c, d, e, f]`.
    pub matrix: [f32; 6],
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// References are preserved as `PdfValue::Reference`.  Stream dictionaries
/// are converted but the raw stream bytes are discarded.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => {
            let entries = dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Stream(stream) => {
            let entries = stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect();
            PdfValue::Dict(entries)
        }
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// Handles three cases in order:
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix) -- strips BOM and decodes.
/// 2. Valid UTF-8 -- returned as-is.
/// 3. Fallback to Latin-1 (ISO 8859-1) -- each byte mapped to its Unicode
///    code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let payload = &bytes[2..];
        let code_units: Vec<u16> = payload
            .chunks(2)
            .filter_map(|chunk| {
                if chunk.len() == 2 {
                    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// Lets the word extractor be tested against hand-written content streams
/// without building a full document.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the (decompressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;

    /// Decode raw string bytes found in a text-showing operator, using any
    /// font-specific encoding information the backend can find for the given
    /// page and font name.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;

    /// The page's MediaBox, inherited from ancestors when absent.
    fn page_box(&self, page: PageId) -> Result<PageBox, PdfError>;

    /// Look up a Form XObject by resource name. Image XObjects yield `None`.
    fn form_xobject(&self, page: PageId, name: &[u8]) -> Option<FormXObject>;

    /// Resolve a zero-based page index to its [`PageId`].
    fn page_id(&self, index: usize) -> Result<PageId, PdfError> {
        let pages = self.pages();
        let page_count = pages.len();
        pages
            .values()
            .nth(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                page: index,
                page_count,
            })
    }
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| PdfError::UnreadablePdf(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page size `(width, height)` in points for a zero-based page index.
    pub fn page_dimensions(&self, index: usize) -> Result<(f32, f32), PdfError> {
        let page = self.page_id(index)?;
        let page_box = self.page_box(page).map_err(|e| e.on_page(index))?;
        Ok((page_box.width(), page_box.height()))
    }

    // -- private helpers ----------------------------------------------------

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .map_err(|e| PdfError::UnreadablePdf(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| PdfError::UnreadablePdf(format!("page object is not a dictionary: {}", e)))
    }

    /// Walk up the page tree to find an inheritable entry such as MediaBox
    /// or Resources.
    fn find_inherited<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        if let Ok(obj) = dict.get(key) {
            return Some(self.resolve_object(obj));
        }

        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.find_inherited(parent, key)
    }

    /// Resolve a `lopdf::Object` that might be a `Reference` to the actual object.
    fn resolve_object<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    /// Convert a slice of lopdf objects to `f32` values.
    fn array_to_f32s(&self, objects: &[lopdf::Object]) -> Result<Vec<f32>, PdfError> {
        objects
            .iter()
            .map(|obj| match self.resolve_object(obj) {
                lopdf::Object::Integer(i) => Ok(*i as f32),
                lopdf::Object::Real(f) => Ok(*f),
                other => Err(PdfError::UnreadablePdf(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }

    /// Look up the encoding name for a font on a page.
    ///
    /// Returns the encoding name (e.g. `"WinAnsiEncoding"`, `"Identity-H"`)
    /// if declared in the font dictionary, or `None` if no encoding entry
    /// exists or the font cannot be found.
    fn font_encoding_name(&self, page: PageId, font_name: &[u8]) -> Option<String> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        let font_dict = fonts.get(font_name)?;
        let enc_obj = font_dict.get(b"Encoding").ok()?;
        match enc_obj {
            lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::UnreadablePdf(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::UnreadablePdf(format!("content stream decode error: {}", e)))?;

        let ops = content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect();

        Ok(ops)
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        if let Some(enc_name) = self.font_encoding_name(page, font_name) {
            // Identity-H / Identity-V fonts typically use 2-byte CID codes
            // that map to Unicode.  Try UTF-16BE decoding.
            if enc_name.contains("Identity") && bytes.len() >= 2 && bytes.len().is_multiple_of(2) {
                let code_units: Vec<u16> = bytes
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                let decoded = String::from_utf16_lossy(&code_units);
                if !decoded.is_empty() && !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                    return decoded;
                }
            }
        }

        decode_text_simple(bytes)
    }

    fn page_box(&self, page: PageId) -> Result<PageBox, PdfError> {
        let dict = self.page_dict(page)?;
        let media_box = self
            .find_inherited(dict, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .ok_or_else(|| PdfError::UnreadablePdf("MediaBox not found for page".into()))?;

        let nums = self.array_to_f32s(media_box)?;
        if nums.len() < 4 {
            return Err(PdfError::UnreadablePdf(format!(
                "MediaBox has {} elements, expected 4",
                nums.len()
            )));
        }

        // Some producers write the corners in the wrong order.
        Ok(PageBox {
            llx: nums[0].min(nums[2]),
            lly: nums[1].min(nums[3]),
            urx: nums[0].max(nums[2]),
            ury: nums[1].max(nums[3]),
        })
    }

    fn form_xobject(&self, page: PageId, name: &[u8]) -> Option<FormXObject> {
        let dict = self.page_dict(page).ok()?;
        let resources = self.find_inherited(dict, b"Resources")?.as_dict().ok()?;
        let xobjects = self
            .resolve_object(resources.get(b"XObject").ok()?)
            .as_dict()
            .ok()?;
        let lopdf::Object::Stream(stream) = self.resolve_object(xobjects.get(name).ok()?) else {
            return None;
        };

        let is_form = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Form");
        if !is_form {
            return None;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| self.array_to_f32s(arr).ok())
            .filter(|nums| nums.len() == 6)
            .map(|n| [n[0], n[1], n[2], n[3], n[4], n[5]])
            .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        Some(FormXObject { content, matrix })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{single_page_pdf, text_op};

    // -- decode_text_simple -------------------------------------------------

    #[test]
    fn decode_text_simple_utf8() {
        assert_eq!(decode_text_simple("Ø14.76".as_bytes()), "Ø14.76");
    }

    #[test]
    fn decode_text_simple_latin1() {
        // 0xB1 is the plus-minus sign in Latin-1 but not valid standalone UTF-8.
        let input: &[u8] = &[0xB1, 0x30, 0x2E, 0x31];
        assert_eq!(decode_text_simple(input), "\u{00B1}0.1");
    }

    #[test]
    fn decode_text_simple_utf16be_basic() {
        let input: &[u8] = &[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42];
        assert_eq!(decode_text_simple(input), "AB");
    }

    #[test]
    fn decode_text_simple_utf16be_odd_trailing_byte() {
        let input: &[u8] = &[0xFE, 0xFF, 0x00, 0x41, 0x00];
        assert_eq!(decode_text_simple(input), "A");
    }

    #[test]
    fn decode_text_simple_empty() {
        assert_eq!(decode_text_simple(&[]), "");
    }

    // -- get_number_from_value ----------------------------------------------

    #[test]
    fn get_number_integer_and_real() {
        assert_eq!(get_number_from_value(&PdfValue::Integer(42)), Some(42.0));
        assert_eq!(get_number_from_value(&PdfValue::Real(2.5)), Some(2.5));
    }

    #[test]
    fn get_number_from_non_numeric() {
        assert_eq!(get_number_from_value(&PdfValue::Null), None);
        assert_eq!(
            get_number_from_value(&PdfValue::Name(b"Foo".to_vec())),
            None
        );
        assert_eq!(get_number_from_value(&PdfValue::Reference((1, 0))), None);
    }

    // -- convert_object -----------------------------------------------------

    #[test]
    fn convert_string_literal() {
        assert_eq!(
            convert_object(&lopdf::Object::String(
                b"hello".to_vec(),
                lopdf::StringFormat::Literal,
            )),
            PdfValue::Str(b"hello".to_vec()),
        );
    }

    #[test]
    fn convert_array() {
        let arr = lopdf::Object::Array(vec![lopdf::Object::Integer(1), lopdf::Object::Real(2.0)]);
        assert_eq!(
            convert_object(&arr),
            PdfValue::Array(vec![PdfValue::Integer(1), PdfValue::Real(2.0)]),
        );
    }

    #[test]
    fn convert_reference() {
        let obj = lopdf::Object::Reference((7, 0));
        assert_eq!(convert_object(&obj), PdfValue::Reference((7, 0)));
    }

    // -- PageBox ------------------------------------------------------------

    #[test]
    fn page_box_flips_to_top_left() {
        let page_box = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        };
        assert_eq!(page_box.to_top_left(100.0, 700.0), (100.0, 92.0));
        assert_eq!(page_box.width(), 612.0);
        assert_eq!(page_box.height(), 792.0);
    }

    #[test]
    fn page_box_with_offset_origin() {
        let page_box = PageBox {
            llx: 10.0,
            lly: 20.0,
            urx: 110.0,
            ury: 220.0,
        };
        assert_eq!(page_box.to_top_left(10.0, 220.0), (0.0, 0.0));
    }

    // -- LopdfBackend -------------------------------------------------------

    #[test]
    fn load_rejects_garbage() {
        let result = LopdfBackend::load_bytes(b"not a pdf");
        assert!(matches!(result, Err(PdfError::UnreadablePdf(_))));
    }

    #[test]
    fn page_dimensions_inherited_from_parent() {
        let bytes = single_page_pdf(vec![]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        assert_eq!(backend.page_count(), 1);
        assert_eq!(backend.page_dimensions(0).unwrap(), (595.0, 842.0));
    }

    #[test]
    fn page_id_out_of_range() {
        let bytes = single_page_pdf(vec![]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        assert!(backend.page_id(0).is_ok());
        match backend.page_id(3) {
            Err(PdfError::PageOutOfRange { page, page_count }) => {
                assert_eq!(page, 3);
                assert_eq!(page_count, 1);
            }
            other => panic!("expected PageOutOfRange, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn decode_content_roundtrips_operators() {
        let bytes = single_page_pdf(text_op(72.0, 700.0, "R5"));
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        let page = backend.page_id(0).unwrap();
        let raw = backend.page_content(page).unwrap();
        let ops = backend.decode_content(&raw).unwrap();
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["BT", "Tf", "Td", "Tj", "ET"]);
    }

    #[test]
    fn form_xobject_missing_name() {
        let bytes = single_page_pdf(vec![]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        let page = backend.page_id(0).unwrap();
        assert!(backend.form_xobject(page, b"Fm1").is_none());
    }
}
