//! Template catalog and selection.
//!
//! Templates live one level below the templates root, in a fixed set of category folders:
//!
//! ```text
//! PLANTILLAS/
//!   Consulta/  Interconsulta/  Recetas/  Laboratorios/  Procedimientos/  Informes/
//! ```
//!
//! [`TemplateCatalog`] is a snapshot of that tree; [`TemplateSelection`] is the set of
//! checkboxes shown for it.

use crate::constants::{DOCX_EXTENSION, LOCK_FILE_PREFIX};
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Consulta,
    Interconsulta,
    Recetas,
    Laboratorios,
    Procedimientos,
    Informes,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 6] = [
        Category::Consulta,
        Category::Interconsulta,
        Category::Recetas,
        Category::Laboratorios,
        Category::Procedimientos,
        Category::Informes,
    ];

    /// Folder name under the templates root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Consulta => "Consulta",
            Category::Interconsulta => "Interconsulta",
            Category::Recetas => "Recetas",
            Category::Laboratorios => "Laboratorios",
            Category::Procedimientos => "Procedimientos",
            Category::Informes => "Informes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidInput(format!("unknown template category: '{s}'")))
    }
}

/// One template file, identified by its category and file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateRef {
    pub category: Category,
    pub filename: String,
}

impl TemplateRef {
    pub fn new(category: Category, filename: impl Into<String>) -> Self {
        Self {
            category,
            filename: filename.into(),
        }
    }

    /// File name without the `.docx` extension.
    pub fn label(&self) -> &str {
        self.filename
            .strip_suffix(DOCX_EXTENSION)
            .unwrap_or(&self.filename)
    }

    /// `templates_root/{category}/{filename}`.
    pub fn path_in(&self, templates_root: &Path) -> PathBuf {
        templates_root
            .join(self.category.dir_name())
            .join(&self.filename)
    }
}

/// Renders as `Category:filename`.
impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.filename)
    }
}

impl FromStr for TemplateRef {
    type Err = CoreError;

    /// Parses `Category:filename`. The file name must be a bare name, not a path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, filename) = s.split_once(':').ok_or_else(|| {
            CoreError::InvalidInput(format!("expected Category:filename, got '{s}'"))
        })?;
        let filename = filename.trim();
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(CoreError::InvalidInput(format!(
                "invalid template file name: '{filename}'"
            )));
        }
        Ok(Self::new(category.parse()?, filename))
    }
}

/// Creates the templates root and its category folders when missing.
pub fn ensure_layout(templates_root: &Path) -> CoreResult<()> {
    for category in Category::ALL {
        fs::create_dir_all(templates_root.join(category.dir_name()))?;
    }
    Ok(())
}

/// Templates found on disk, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCatalog {
    entries: Vec<TemplateRef>,
}

impl TemplateCatalog {
    /// Lists `.docx` files per category, sorted by name within each category.
    ///
    /// Word lock files (`~$...`) are skipped. A missing category folder, or a missing
    /// root, contributes nothing.
    pub fn scan(templates_root: &Path) -> CoreResult<Self> {
        let mut entries = Vec::new();
        for category in Category::ALL {
            let dir = templates_root.join(category.dir_name());
            let read_dir = match fs::read_dir(&dir) {
                Ok(it) => it,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let mut names = Vec::new();
            for entry in read_dir {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    tracing::warn!("skipping template with non UTF-8 name in {}", dir.display());
                    continue;
                };
                if name.ends_with(DOCX_EXTENSION) && !name.starts_with(LOCK_FILE_PREFIX) {
                    names.push(name);
                }
            }
            names.sort();
            entries.extend(names.into_iter().map(|name| TemplateRef::new(category, name)));
        }

        tracing::debug!(
            templates = entries.len(),
            "scanned templates in {}",
            templates_root.display()
        );
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<TemplateRef>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TemplateRef] {
        &self.entries
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &TemplateRef> {
        self.entries.iter().filter(move |t| t.category == category)
    }

    pub fn contains(&self, template: &TemplateRef) -> bool {
        self.entries.contains(template)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One selection flag per catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSelection {
    entries: Vec<(TemplateRef, bool)>,
}

impl TemplateSelection {
    /// Everything unselected.
    pub fn new(catalog: &TemplateCatalog) -> Self {
        Self {
            entries: catalog
                .entries()
                .iter()
                .map(|t| (t.clone(), false))
                .collect(),
        }
    }

    /// Flips one template. Returns the new state, or `None` if it is not in the catalog.
    pub fn toggle(&mut self, template: &TemplateRef) -> Option<bool> {
        let (_, selected) = self.entries.iter_mut().find(|(t, _)| t == template)?;
        *selected = !*selected;
        Some(*selected)
    }

    /// Sets one template. Returns `false` if it is not in the catalog.
    pub fn set(&mut self, template: &TemplateRef, selected: bool) -> bool {
        match self.entries.iter_mut().find(|(t, _)| t == template) {
            Some(entry) => {
                entry.1 = selected;
                true
            }
            None => false,
        }
    }

    /// The "select all" checkbox of a category: sets every member.
    pub fn set_category(&mut self, category: Category, selected: bool) {
        for (t, flag) in &mut self.entries {
            if t.category == category {
                *flag = selected;
            }
        }
    }

    /// True when the category has members and all of them are selected.
    pub fn category_all_selected(&self, category: Category) -> bool {
        let mut members = self
            .entries
            .iter()
            .filter(|(t, _)| t.category == category)
            .peekable();
        members.peek().is_some() && members.all(|(_, selected)| *selected)
    }

    pub fn is_selected(&self, template: &TemplateRef) -> bool {
        self.entries
            .iter()
            .any(|(t, selected)| *selected && t == template)
    }

    /// Selected templates, in catalog order.
    pub fn selected(&self) -> Vec<TemplateRef> {
        self.entries
            .iter()
            .filter(|(_, selected)| *selected)
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        for (_, selected) in &mut self.entries {
            *selected = false;
        }
    }

    /// Rebuilds the entries from a fresh catalog, keeping the flags of templates that are
    /// still present.
    pub fn refresh(&mut self, catalog: &TemplateCatalog) {
        let previous = std::mem::take(&mut self.entries);
        self.entries = catalog
            .entries()
            .iter()
            .map(|t| {
                let selected = previous.iter().any(|(p, s)| *s && p == t);
                (t.clone(), selected)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, category: &str, name: &str) {
        fs::write(root.join(category).join(name), b"").unwrap();
    }

    fn sample_catalog() -> TemplateCatalog {
        TemplateCatalog::from_entries(vec![
            TemplateRef::new(Category::Consulta, "Nota.docx"),
            TemplateRef::new(Category::Recetas, "Receta A.docx"),
            TemplateRef::new(Category::Recetas, "Receta B.docx"),
        ])
    }

    #[test]
    fn ensure_layout_creates_all_categories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("PLANTILLAS");
        ensure_layout(&root).unwrap();
        ensure_layout(&root).unwrap();

        for category in Category::ALL {
            assert!(root.join(category.dir_name()).is_dir());
        }
    }

    #[test]
    fn scan_filters_and_sorts_per_category() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        ensure_layout(root).unwrap();
        touch(root, "Recetas", "Receta B.docx");
        touch(root, "Recetas", "Receta A.docx");
        touch(root, "Recetas", "~$ceta A.docx");
        touch(root, "Recetas", "notas.txt");
        touch(root, "Consulta", "Nota.docx");
        fs::create_dir(root.join("Informes").join("viejos.docx")).unwrap();

        let catalog = TemplateCatalog::scan(root).unwrap();
        assert_eq!(catalog, sample_catalog());
        assert_eq!(catalog.in_category(Category::Recetas).count(), 2);
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = TemplateCatalog::scan(&temp.path().join("nope")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn template_key_round_trip_and_label() {
        let template: TemplateRef = "Recetas:Receta A.docx".parse().unwrap();
        assert_eq!(template, TemplateRef::new(Category::Recetas, "Receta A.docx"));
        assert_eq!(template.to_string(), "Recetas:Receta A.docx");
        assert_eq!(template.label(), "Receta A");
        assert_eq!(
            template.path_in(Path::new("PLANTILLAS")),
            Path::new("PLANTILLAS").join("Recetas").join("Receta A.docx")
        );
    }

    #[test]
    fn template_key_rejects_bad_input() {
        assert!("Recetas".parse::<TemplateRef>().is_err());
        assert!("Cardiologia:x.docx".parse::<TemplateRef>().is_err());
        assert!("Recetas:../secret.docx".parse::<TemplateRef>().is_err());
        assert!("Recetas:".parse::<TemplateRef>().is_err());
    }

    #[test]
    fn category_select_all_follows_members() {
        let catalog = sample_catalog();
        let mut selection = TemplateSelection::new(&catalog);
        let a = TemplateRef::new(Category::Recetas, "Receta A.docx");
        let b = TemplateRef::new(Category::Recetas, "Receta B.docx");

        assert!(!selection.category_all_selected(Category::Recetas));
        selection.toggle(&a);
        assert!(!selection.category_all_selected(Category::Recetas));
        selection.toggle(&b);
        assert!(selection.category_all_selected(Category::Recetas));

        selection.set_category(Category::Recetas, false);
        assert!(selection.selected().is_empty());

        selection.set_category(Category::Recetas, true);
        assert_eq!(selection.selected(), vec![a, b]);

        assert!(!selection.category_all_selected(Category::Informes));
    }

    #[test]
    fn selected_is_in_catalog_order() {
        let catalog = sample_catalog();
        let mut selection = TemplateSelection::new(&catalog);
        let receta = TemplateRef::new(Category::Recetas, "Receta B.docx");
        let nota = TemplateRef::new(Category::Consulta, "Nota.docx");

        assert_eq!(selection.toggle(&receta), Some(true));
        assert!(selection.set(&nota, true));
        assert_eq!(selection.selected(), vec![nota, receta]);

        let unknown = TemplateRef::new(Category::Informes, "x.docx");
        assert_eq!(selection.toggle(&unknown), None);
        assert!(!selection.set(&unknown, true));
    }

    #[test]
    fn refresh_keeps_flags_of_surviving_templates() {
        let mut selection = TemplateSelection::new(&sample_catalog());
        let nota = TemplateRef::new(Category::Consulta, "Nota.docx");
        let receta_a = TemplateRef::new(Category::Recetas, "Receta A.docx");
        selection.set(&nota, true);
        selection.set(&receta_a, true);

        let refreshed = TemplateCatalog::from_entries(vec![
            nota.clone(),
            TemplateRef::new(Category::Informes, "Alta.docx"),
        ]);
        selection.refresh(&refreshed);

        assert_eq!(selection.selected(), vec![nota]);
        assert!(!selection.is_selected(&receta_a));

        selection.clear();
        assert!(selection.selected().is_empty());
    }
}
