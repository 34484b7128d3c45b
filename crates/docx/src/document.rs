//! Loaded Word document.
//!
//! [`DocxDocument`] keeps every entry of the package. The body, header and footer parts are
//! parsed into [`XmlTree`]s; a part is re-serialised on save only if it was edited, so a
//! document that went through substitution without any match is written back byte for
//! byte.

use crate::package::{read_entries, PackageEntry, ZipBundle};
use crate::wordml;
use crate::xml::{XmlElement, XmlTree};
use crate::{DocxError, DocxResult};
use std::fs;
use std::path::Path;

/// Name of the main document part.
pub const BODY_PART: &str = "word/document.xml";

/// Which region of the document a text part belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Body,
    Header,
    Footer,
}

impl PartKind {
    /// Classifies a package entry name; `None` for parts the engine does not edit.
    pub fn from_entry_name(name: &str) -> Option<Self> {
        if name == BODY_PART {
            return Some(Self::Body);
        }
        let file = name.strip_prefix("word/")?;
        if file.contains('/') || !file.ends_with(".xml") {
            return None;
        }
        if file.starts_with("header") {
            Some(Self::Header)
        } else if file.starts_with("footer") {
            Some(Self::Footer)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TextPart {
    pub(crate) kind: PartKind,
    pub(crate) tree: XmlTree,
    original: Vec<u8>,
    pub(crate) modified: bool,
}

#[derive(Debug, Clone)]
enum Entry {
    Raw(PackageEntry),
    Text { name: String, part: TextPart },
}

/// A `.docx` package held in memory.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    entries: Vec<Entry>,
}

impl DocxDocument {
    /// Reads and parses a `.docx` file.
    ///
    /// # Errors
    ///
    /// Returns `DocxError` if the file cannot be read, is not a zip archive, lacks
    /// `word/document.xml`, or one of its text parts is not well-formed XML.
    pub fn open(path: &Path) -> DocxResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses a `.docx` package from memory.
    pub fn from_bytes(bytes: &[u8]) -> DocxResult<Self> {
        Self::from_entries(read_entries(bytes)?)
    }

    /// Builds a document from already extracted package entries.
    pub fn from_entries(package: Vec<PackageEntry>) -> DocxResult<Self> {
        let mut entries = Vec::with_capacity(package.len());
        let mut has_body = false;

        for entry in package {
            match PartKind::from_entry_name(&entry.name) {
                Some(kind) => {
                    has_body |= kind == PartKind::Body;
                    let xml = std::str::from_utf8(&entry.data)
                        .map_err(|_| DocxError::Encoding(entry.name.clone()))?;
                    let tree = XmlTree::parse(xml)?;
                    entries.push(Entry::Text {
                        name: entry.name,
                        part: TextPart {
                            kind,
                            tree,
                            original: entry.data,
                            modified: false,
                        },
                    });
                }
                None => entries.push(Entry::Raw(entry)),
            }
        }

        if !has_body {
            return Err(DocxError::MissingPart(BODY_PART.into()));
        }

        Ok(Self { entries })
    }

    /// Serialises the package to `.docx` bytes.
    pub fn to_bytes(&self) -> DocxResult<Vec<u8>> {
        let mut bundle = ZipBundle::new();
        for entry in &self.entries {
            match entry {
                Entry::Raw(raw) => bundle.add(&raw.name, &raw.data)?,
                Entry::Text { name, part } if part.modified => {
                    bundle.add(name, &part.tree.to_bytes()?)?
                }
                Entry::Text { name, part } => bundle.add(name, &part.original)?,
            }
        }
        bundle.finish()
    }

    /// Writes the package to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> DocxResult<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Names of the parsed text parts and their kind, in package order.
    pub fn text_parts(&self) -> Vec<(&str, PartKind)> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Text { name, part } => Some((name.as_str(), part.kind)),
                Entry::Raw(_) => None,
            })
            .collect()
    }

    /// Visible text of every paragraph of the given kind, in package order.
    pub fn paragraph_texts(&self, kind: PartKind) -> Vec<String> {
        let mut texts = Vec::new();
        for part in self.parts().filter(|part| part.kind == kind) {
            wordml::for_each_paragraph(&part.tree.root, &mut |p| {
                texts.push(wordml::paragraph_text(p))
            });
        }
        texts
    }

    /// Root element of a parsed text part.
    pub fn part_root(&self, name: &str) -> Option<&XmlElement> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Text { name: n, part } if n == name => Some(&part.tree.root),
            _ => None,
        })
    }

    /// True if any text part was edited since loading.
    pub fn is_modified(&self) -> bool {
        self.parts().any(|part| part.modified)
    }

    fn parts(&self) -> impl Iterator<Item = &TextPart> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Text { part, .. } => Some(part),
            Entry::Raw(_) => None,
        })
    }

    pub(crate) fn parts_mut(&mut self) -> impl Iterator<Item = &mut TextPart> {
        self.entries.iter_mut().filter_map(|entry| match entry {
            Entry::Text { part, .. } => Some(part),
            Entry::Raw(_) => None,
        })
    }
}
