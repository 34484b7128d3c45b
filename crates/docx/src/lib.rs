//! medidocs Word document engine
//!
//! This crate loads Word (`.docx`) packages, rewrites placeholder tokens inside their text
//! runs and writes them back. It also provides the zip bundle writer used to ship several
//! generated documents as one archive.
//!
//! ## Package model
//!
//! A `.docx` file is a zip archive of XML parts. Only the parts that carry visible text the
//! substitution engine edits are parsed:
//!
//! ```text
//! word/document.xml      # body: paragraphs and tables
//! word/header1.xml ...   # one part per section header
//! word/footer1.xml ...   # one part per section footer
//! ```
//!
//! Every other entry (styles, media, relationships) is kept as raw bytes and written back
//! unchanged, in its original order.
//!
//! ## Example Usage
//!
//! ```no_run
//! use medidocs_docx::{replace_placeholders, DocxDocument, SubstitutionOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut document = DocxDocument::open(Path::new("PLANTILLAS/Recetas/Receta.docx"))?;
//! let mapping = [("{{NOMBRE_COMPLETO}}", "Ana Gomez")];
//! replace_placeholders(&mut document, mapping, &SubstitutionOptions::default());
//! document.save(Path::new("Receta - Ana Gomez.docx"))?;
//! # Ok(())
//! # }
//! ```

mod document;
mod package;
mod substitute;
pub mod wordml;
pub mod xml;

pub use document::{DocxDocument, PartKind};
pub use package::{read_entries, PackageEntry, ZipBundle};
pub use substitute::{
    replace_placeholders, FontSpec, SubstitutionOptions, SubstitutionReport,
};

/// Errors that can occur while reading, editing or writing documents
#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be read or written
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An XML part is malformed or could not be serialised
    #[error("XML error: {0}")]
    Xml(String),

    /// An XML part is not valid UTF-8
    #[error("part {0} is not valid UTF-8")]
    Encoding(String),

    /// A part every Word document must contain is absent
    #[error("missing document part: {0}")]
    MissingPart(String),

    /// A font specification could not be parsed
    #[error("invalid font specification: {0}")]
    InvalidFont(String),
}

/// Result type for document operations.
pub type DocxResult<T> = Result<T, DocxError>;

pub(crate) fn xml_error(e: impl std::fmt::Display) -> DocxError {
    DocxError::Xml(e.to_string())
}
