//! Placeholder substitution.
//!
//! Tokens are matched run by run. A paragraph is only scanned for a token when its full
//! text contains it, and inside the paragraph every run whose own text contains the token
//! has all occurrences replaced. A token that Word split across two runs (for example
//! because half of it was retyped) is therefore not replaced.

use crate::document::DocxDocument;
use crate::wordml;
use crate::xml::XmlElement;
use crate::{DocxError, DocxResult};
use medidocs_types::NonEmptyText;
use std::fmt;
use std::str::FromStr;

/// Font face and size applied to rewritten runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    face: String,
    /// Size in half-points, the unit of `w:sz`.
    half_points: u32,
}

impl FontSpec {
    /// Creates a font specification from a face name and a size in points.
    ///
    /// Sizes are stored in half-points, so `10.5` is accepted and `10.25` is rounded.
    ///
    /// # Errors
    ///
    /// Returns `DocxError::InvalidFont` if the face is blank or the size is not a positive
    /// number below 1639 pt (Word's limit).
    pub fn new(face: &str, points: f64) -> DocxResult<Self> {
        let face = NonEmptyText::new(face)
            .map_err(|_| DocxError::InvalidFont("font face cannot be empty".into()))?
            .into_inner();
        if !points.is_finite() || points <= 0.0 || points > 1638.0 {
            return Err(DocxError::InvalidFont(format!("invalid font size: {points}")));
        }
        let half_points = (points * 2.0).round() as u32;
        Ok(Self { face, half_points })
    }

    pub fn face(&self) -> &str {
        &self.face
    }

    pub fn half_points(&self) -> u32 {
        self.half_points
    }

    pub fn points(&self) -> f64 {
        f64::from(self.half_points) / 2.0
    }
}

impl Default for FontSpec {
    /// Arial 10 pt.
    fn default() -> Self {
        Self {
            face: "Arial".to_string(),
            half_points: 20,
        }
    }
}

impl FromStr for FontSpec {
    type Err = DocxError;

    /// Parses `Face:size`, e.g. `Arial:10` or `Times New Roman:11.5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (face, size) = s
            .rsplit_once(':')
            .ok_or_else(|| DocxError::InvalidFont(format!("expected Face:size, got '{s}'")))?;
        let points: f64 = size
            .trim()
            .parse()
            .map_err(|_| DocxError::InvalidFont(format!("invalid font size: '{}'", size.trim())))?;
        Self::new(face, points)
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.face, self.points())
    }
}

/// How rewritten runs are formatted.
///
/// The default keeps each run's formatting; front-ends that want the usual Arial 10 pt
/// output pass `normalize_font: Some(FontSpec::default())`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionOptions {
    pub normalize_font: Option<FontSpec>,
}

/// Outcome of a substitution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    /// Number of run rewrites; a run holding two different tokens counts twice.
    pub runs_rewritten: usize,
}

/// Replaces placeholder tokens throughout the document body, tables, headers and footers.
///
/// Empty tokens are ignored. Parts where nothing matched are left untouched and are saved
/// with their original bytes.
pub fn replace_placeholders<I, K, V>(
    document: &mut DocxDocument,
    mapping: I,
    options: &SubstitutionOptions,
) -> SubstitutionReport
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mapping: Vec<(K, V)> = mapping
        .into_iter()
        .filter(|(token, _)| !token.as_ref().is_empty())
        .collect();

    let mut report = SubstitutionReport::default();
    for part in document.parts_mut() {
        let mut rewritten = 0;
        wordml::for_each_paragraph_mut(&mut part.tree.root, &mut |paragraph| {
            rewritten += replace_in_paragraph(paragraph, &mapping, options);
        });
        if rewritten > 0 {
            part.modified = true;
            tracing::debug!(kind = ?part.kind, runs = rewritten, "placeholders replaced");
        }
        report.runs_rewritten += rewritten;
    }
    report
}

fn replace_in_paragraph<K, V>(
    paragraph: &mut XmlElement,
    mapping: &[(K, V)],
    options: &SubstitutionOptions,
) -> usize
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let paragraph_text = wordml::paragraph_text(paragraph);
    if !mapping
        .iter()
        .any(|(token, _)| paragraph_text.contains(token.as_ref()))
    {
        return 0;
    }

    let mut rewritten = 0;
    for run in wordml::runs_mut(paragraph) {
        let Some((text, tokens)) = substitute_text(&wordml::run_text(run), mapping) else {
            continue;
        };
        wordml::set_run_text(run, &text);
        if let Some(font) = &options.normalize_font {
            apply_font(run, font);
        }
        rewritten += tokens;
    }
    rewritten
}

/// Replaces tokens in one left-to-right pass over `text`.
///
/// Inserted values are never scanned again, so the result does not depend on the order of
/// `mapping`. Where tokens overlap at a position the longest one wins. Returns the new text
/// and the number of distinct tokens found, or `None` when nothing matched.
fn substitute_text<K, V>(text: &str, mapping: &[(K, V)]) -> Option<(String, usize)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::with_capacity(text.len());
    let mut matched = vec![false; mapping.len()];
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        let hit = mapping
            .iter()
            .enumerate()
            .filter(|(_, (token, _))| rest.starts_with(token.as_ref()))
            .max_by_key(|(_, (token, _))| token.as_ref().len());
        match hit {
            Some((index, (token, value))) => {
                out.push_str(value.as_ref());
                matched[index] = true;
                rest = &rest[token.as_ref().len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    let tokens = matched.iter().filter(|m| **m).count();
    (tokens > 0).then_some((out, tokens))
}

fn apply_font(run: &mut XmlElement, font: &FontSpec) {
    let Some(rpr) = wordml::ensure_run_properties(run) else {
        return;
    };

    let face = font.face();
    wordml::upsert_run_property(
        rpr,
        "w:rFonts",
        &[("w:ascii", face), ("w:hAnsi", face), ("w:cs", face)],
    );
    // Theme fonts take precedence over explicit faces.
    if let Some(fonts) = rpr.find_child_mut("w:rFonts") {
        for theme in ["w:asciiTheme", "w:hAnsiTheme", "w:cstheme"] {
            fonts.remove_attribute(theme);
        }
    }

    let size = font.half_points().to_string();
    wordml::upsert_run_property(rpr, "w:sz", &[("w:val", size.as_str())]);
    wordml::upsert_run_property(rpr, "w:szCs", &[("w:val", size.as_str())]);
}
