//! Owned XML element tree.
//!
//! WordprocessingML parts are small enough to hold in memory, and the substitution engine
//! needs to rewrite run contents in place, so each editable part is parsed into an
//! [`XmlTree`] with `quick-xml` and serialised back after editing. Element and attribute
//! names are kept exactly as written in the source, prefix included (`w:p`, `w:val`).

use crate::{xml_error, DocxError, DocxResult};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its attributes (in source order) and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// The `<?xml ...?>` declaration of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A parsed XML part: optional declaration plus the single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    pub declaration: Option<XmlDeclaration>,
    pub root: XmlElement,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing the value in place if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| k != name);
    }

    /// Iterates over the child elements, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.name == name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|el| el.name == name)
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &XmlElement, out: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(child) => collect_text(child, out),
            XmlNode::Comment(_) => {}
        }
    }
}

impl XmlTree {
    /// Parses a complete XML document.
    ///
    /// # Errors
    ///
    /// Returns `DocxError::Xml` if the input is not well formed, has no root element or has
    /// more than one.
    pub fn parse(xml: &str) -> DocxResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Decl(decl) => declaration = Some(declaration_from_event(&decl)?),
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let el = element_from_start(&start)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| DocxError::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    // Whitespace between the declaration and the root is dropped.
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape().map_err(xml_error)?;
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8_lossy(&data).into_owned();
                        parent.children.push(XmlNode::CData(data));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let comment = String::from_utf8_lossy(&comment).into_owned();
                        parent.children.push(XmlNode::Comment(comment));
                    }
                }
                Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(DocxError::Xml("unclosed element at end of input".into()));
        }

        let root = root.ok_or_else(|| DocxError::Xml("document has no root element".into()))?;
        Ok(Self { declaration, root })
    }

    /// Serialises the tree back to UTF-8 bytes.
    pub fn to_bytes(&self) -> DocxResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(xml_error)?;
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> DocxResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
        return Ok(());
    }
    if root.is_some() {
        return Err(DocxError::Xml("document has more than one root element".into()));
    }
    *root = Some(el);
    Ok(())
}

fn element_from_start(start: &BytesStart<'_>) -> DocxResult<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn declaration_from_event(decl: &BytesDecl<'_>) -> DocxResult<XmlDeclaration> {
    let version = String::from_utf8_lossy(&decl.version().map_err(xml_error)?).into_owned();
    let encoding = decl
        .encoding()
        .transpose()
        .map_err(xml_error)?
        .map(|e| String::from_utf8_lossy(&e).into_owned());
    let standalone = decl
        .standalone()
        .transpose()
        .map_err(xml_error)?
        .map(|s| String::from_utf8_lossy(&s).into_owned());
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &XmlElement) -> DocxResult<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &el.children {
        match child {
            XmlNode::Element(inner) => write_element(writer, inner)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?,
            XmlNode::CData(data) => writer
                .write_event(Event::CData(BytesCData::new(data.as_str())))
                .map_err(xml_error)?,
            XmlNode::Comment(comment) => writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(xml_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(xml_error)?;
    Ok(())
}
