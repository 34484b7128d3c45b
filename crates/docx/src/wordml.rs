//! WordprocessingML paragraph and run helpers.
//!
//! Word always writes the main namespace with the `w` prefix, and the helpers here match
//! element names literally (`w:p`, `w:r`, `w:t`).
//!
//! Text model of a run, as Word displays it:
//! - `w:t` contributes its text,
//! - `w:tab` contributes `\t`,
//! - `w:br` and `w:cr` contribute `\n`.

use crate::xml::{XmlElement, XmlNode};

pub const PARAGRAPH: &str = "w:p";
pub const RUN: &str = "w:r";
pub const RUN_PROPERTIES: &str = "w:rPr";
pub const TEXT: &str = "w:t";
pub const TAB: &str = "w:tab";
pub const BREAK: &str = "w:br";
pub const CARRIAGE_RETURN: &str = "w:cr";
pub const HYPERLINK: &str = "w:hyperlink";

const XML_SPACE: &str = "xml:space";

/// Schema order of the children of `w:rPr` (ECMA-376 `CT_RPr`).
///
/// New run properties are inserted at their schema position so the part stays valid.
const RUN_PROPERTY_ORDER: [&str; 40] = [
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
    "w:rPrChange",
];

/// Calls `f` for every paragraph under `el`, in document order.
///
/// Table cells hold ordinary paragraphs, so tables at any nesting depth are covered. The
/// walk does not descend into a paragraph it has already reported, which leaves text-box
/// content (paragraphs nested inside a run's drawing) untouched.
pub fn for_each_paragraph_mut(el: &mut XmlElement, f: &mut dyn FnMut(&mut XmlElement)) {
    if el.name == PARAGRAPH {
        f(el);
        return;
    }
    for child in el.child_elements_mut() {
        for_each_paragraph_mut(child, f);
    }
}

/// Read-only counterpart of [`for_each_paragraph_mut`].
pub fn for_each_paragraph(el: &XmlElement, f: &mut dyn FnMut(&XmlElement)) {
    if el.name == PARAGRAPH {
        f(el);
        return;
    }
    for child in el.child_elements() {
        for_each_paragraph(child, f);
    }
}

/// The runs of a paragraph: its direct `w:r` children plus the runs of its hyperlinks.
pub fn runs(paragraph: &XmlElement) -> Vec<&XmlElement> {
    let mut out = Vec::new();
    for el in paragraph.child_elements() {
        if el.name == RUN {
            out.push(el);
        } else if el.name == HYPERLINK {
            out.extend(el.child_elements().filter(|r| r.name == RUN));
        }
    }
    out
}

pub fn runs_mut(paragraph: &mut XmlElement) -> Vec<&mut XmlElement> {
    let mut out = Vec::new();
    for el in paragraph.child_elements_mut() {
        if el.name == RUN {
            out.push(el);
        } else if el.name == HYPERLINK {
            out.extend(el.child_elements_mut().filter(|r| r.name == RUN));
        }
    }
    out
}

/// Full visible text of a paragraph.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    runs(paragraph).into_iter().map(run_text).collect()
}

/// Visible text of a single run.
pub fn run_text(run: &XmlElement) -> String {
    let mut out = String::new();
    for el in run.child_elements() {
        match el.name.as_str() {
            TEXT => out.push_str(&el.text_content()),
            TAB => out.push('\t'),
            BREAK | CARRIAGE_RETURN => out.push('\n'),
            _ => {}
        }
    }
    out
}

fn is_text_content(name: &str) -> bool {
    matches!(name, TEXT | TAB | BREAK | CARRIAGE_RETURN)
}

/// Replaces the visible text of a run.
///
/// Existing `w:t`, `w:tab`, `w:br` and `w:cr` children are removed; run properties and any
/// other content stay where they are. `\r\n` and lone `\r` count as line breaks.
pub fn set_run_text(run: &mut XmlElement, text: &str) {
    run.children
        .retain(|node| !matches!(node, XmlNode::Element(el) if is_text_content(&el.name)));

    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
    for (line_index, line) in normalised.split('\n').enumerate() {
        if line_index > 0 {
            run.children.push(XmlNode::Element(XmlElement::new(BREAK)));
        }
        for (segment_index, segment) in line.split('\t').enumerate() {
            if segment_index > 0 {
                run.children.push(XmlNode::Element(XmlElement::new(TAB)));
            }
            if !segment.is_empty() {
                let t = XmlElement::new(TEXT)
                    .with_attribute(XML_SPACE, "preserve")
                    .with_text(segment);
                run.children.push(XmlNode::Element(t));
            }
        }
    }
}

/// Returns the run's `w:rPr`, creating it as the first child when absent.
pub fn ensure_run_properties(run: &mut XmlElement) -> Option<&mut XmlElement> {
    if run.find_child(RUN_PROPERTIES).is_none() {
        run.children
            .insert(0, XmlNode::Element(XmlElement::new(RUN_PROPERTIES)));
    }
    run.find_child_mut(RUN_PROPERTIES)
}

/// Sets attributes on a run property, inserting the property at its schema position when
/// it does not exist yet.
pub fn upsert_run_property(rpr: &mut XmlElement, name: &str, attributes: &[(&str, &str)]) {
    if let Some(existing) = rpr.find_child_mut(name) {
        for (key, value) in attributes {
            existing.set_attribute(*key, *value);
        }
        return;
    }

    let mut property = XmlElement::new(name);
    for (key, value) in attributes {
        property.set_attribute(*key, *value);
    }

    let rank = property_rank(name);
    let insert_at = rpr
        .children
        .iter()
        .position(|node| matches!(node, XmlNode::Element(el) if property_rank(&el.name) > rank))
        .unwrap_or(rpr.children.len());
    rpr.children.insert(insert_at, XmlNode::Element(property));
}

fn property_rank(name: &str) -> usize {
    RUN_PROPERTY_ORDER
        .iter()
        .position(|candidate| *candidate == name)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlTree;

    fn parse(xml: &str) -> XmlElement {
        XmlTree::parse(xml).unwrap().root
    }

    #[test]
    fn run_text_reads_tabs_and_breaks() {
        let run = parse("<w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r>");
        assert_eq!(run_text(&run), "a\tb\nc");
    }

    #[test]
    fn paragraph_text_includes_hyperlink_runs() {
        let p = parse(
            "<w:p><w:r><w:t>Dr. </w:t></w:r><w:hyperlink><w:r><w:t>House</w:t></w:r></w:hyperlink></w:p>",
        );
        assert_eq!(paragraph_text(&p), "Dr. House");
        assert_eq!(runs(&p).len(), 2);
    }

    #[test]
    fn set_run_text_keeps_properties_first() {
        let mut run = parse("<w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t></w:r>");
        set_run_text(&mut run, "line one\nline\ttwo");

        let names: Vec<&str> = run.child_elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["w:rPr", "w:t", "w:br", "w:t", "w:tab", "w:t"]);
        assert_eq!(run_text(&run), "line one\nline\ttwo");
    }

    #[test]
    fn set_run_text_preserves_leading_spaces() {
        let mut run = parse("<w:r><w:t>x</w:t></w:r>");
        set_run_text(&mut run, "  indented");
        let t = run.find_child(TEXT).unwrap();
        assert_eq!(t.attribute("xml:space"), Some("preserve"));
        assert_eq!(t.text_content(), "  indented");
    }

    #[test]
    fn upsert_inserts_in_schema_order() {
        let mut rpr = parse("<w:rPr><w:b/><w:color w:val=\"FF0000\"/><w:lang w:val=\"es-BO\"/></w:rPr>");
        upsert_run_property(&mut rpr, "w:sz", &[("w:val", "20")]);
        upsert_run_property(&mut rpr, "w:rFonts", &[("w:ascii", "Arial")]);

        let names: Vec<&str> = rpr.child_elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["w:rFonts", "w:b", "w:color", "w:sz", "w:lang"]);
    }

    #[test]
    fn upsert_updates_existing_property() {
        let mut rpr = parse("<w:rPr><w:sz w:val=\"24\"/></w:rPr>");
        upsert_run_property(&mut rpr, "w:sz", &[("w:val", "20")]);
        assert_eq!(rpr.child_elements().count(), 1);
        assert_eq!(rpr.find_child("w:sz").unwrap().attribute("w:val"), Some("20"));
    }

    #[test]
    fn paragraphs_inside_nested_tables_are_visited() {
        let mut body = parse(
            "<w:body><w:p/><w:tbl><w:tr><w:tc><w:p/><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl></w:body>",
        );
        let mut count = 0;
        for_each_paragraph_mut(&mut body, &mut |_| count += 1);
        assert_eq!(count, 3);
    }
}
