//! A small owned XML tree, read and written with `quick-xml`.
//!
//! Qualified names and attribute keys are kept verbatim (`w:p`, `xml:space`),
//! so a part serializes back with the same prefixes it was read with.
//! Comments, processing instructions and CDATA sections are carried as raw
//! markup.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

pub const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Direct child elements named `name`.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.is(name))
    }

    /// Mutable direct child elements named `name`.
    pub fn elements_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> {
        self.children.iter_mut().filter_map(move |node| match node {
            XmlNode::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    /// Child-index path to the first descendant named `name`, depth first.
    pub fn find_path(&self, name: &str) -> Option<Vec<usize>> {
        for (i, node) in self.children.iter().enumerate() {
            if let XmlNode::Element(el) = node {
                if el.is(name) {
                    return Some(vec![i]);
                }
                if let Some(mut rest) = el.find_path(name) {
                    rest.insert(0, i);
                    return Some(rest);
                }
            }
        }
        None
    }

    pub fn at(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &i in path {
            current = match current.children.get(i)? {
                XmlNode::Element(el) => el,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &i in path {
            current = match current.children.get_mut(i)? {
                XmlNode::Element(el) => el,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// A parsed part: markup before the root element, then the root.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: Vec<String>,
    pub root: XmlElement,
}

fn start_element(e: &BytesStart<'_>) -> Result<XmlElement, String> {
    let mut el = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| err.to_string())?
            .into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

/// Parse an XML document into an owned tree.
pub fn parse(xml: &str) -> Result<XmlDocument, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut prolog: Vec<String> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;

        let node = match event {
            Event::Start(e) => {
                stack.push(start_element(&e)?);
                continue;
            }
            Event::Empty(e) => XmlNode::Element(start_element(&e)?),
            Event::End(_) => match stack.pop() {
                Some(el) => XmlNode::Element(el),
                None => return Err("closing tag without an open element".to_string()),
            },
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| err.to_string())?.into_owned();
                if stack.is_empty() {
                    // Whitespace between the declaration and the root.
                    continue;
                }
                XmlNode::Text(text)
            }
            Event::CData(e) => {
                XmlNode::Raw(format!("<![CDATA[{}]]>", String::from_utf8_lossy(&e)))
            }
            Event::Comment(e) => XmlNode::Raw(format!("<!--{}-->", String::from_utf8_lossy(&e))),
            Event::PI(e) => XmlNode::Raw(format!("<?{}?>", String::from_utf8_lossy(&e))),
            Event::DocType(e) => {
                XmlNode::Raw(format!("<!DOCTYPE {}>", String::from_utf8_lossy(&e)))
            }
            Event::Eof => break,
            _ => continue,
        };

        match (stack.last_mut(), node) {
            (Some(parent), node) => parent.children.push(node),
            (None, XmlNode::Element(el)) => {
                if root.is_some() {
                    return Err(format!("second root element <{}>", el.name));
                }
                root = Some(el);
            }
            (None, XmlNode::Raw(raw)) => {
                if root.is_none() {
                    prolog.push(raw);
                }
            }
            (None, XmlNode::Text(_)) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("element <{}> is never closed", open.name));
    }
    let root = root.ok_or_else(|| "document has no root element".to_string())?;
    Ok(XmlDocument { prolog, root })
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &XmlElement) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::Raw(raw) => writer.get_mut().extend_from_slice(raw.as_bytes()),
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

/// Serialize with the standard OOXML declaration.
pub fn to_bytes(doc: &XmlDocument) -> quick_xml::Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.get_mut().extend_from_slice(XML_DECLARATION.as_bytes());
    writer.get_mut().extend_from_slice(b"\r\n");
    for raw in &doc.prolog {
        writer.get_mut().extend_from_slice(raw.as_bytes());
    }
    write_element(&mut writer, &doc.root)?;
    Ok(writer.into_inner())
}
