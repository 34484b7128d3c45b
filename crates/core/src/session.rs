//! Per-user session context.
//!
//! A [`Session`] holds what one clinician is currently editing: the patient form and the
//! template checkboxes. Front-ends create one per interactive session or per request and
//! drive it through the event methods below; nothing here is global.

use crate::patient::PatientForm;
use crate::templates::{Category, TemplateCatalog, TemplateRef, TemplateSelection};
use crate::CoreResult;
use chrono::NaiveDate;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Session {
    pub form: PatientForm,
    pub selection: TemplateSelection,
}

impl Session {
    /// A fresh form and every template of `catalog` unselected.
    pub fn new(catalog: &TemplateCatalog, today: NaiveDate) -> Self {
        Self {
            form: PatientForm::new(today),
            selection: TemplateSelection::new(catalog),
        }
    }

    /// Birth-date field changed: derived fields follow.
    pub fn set_birth_date(&mut self, birth_date: impl Into<String>, today: NaiveDate) {
        self.form.set_birth_date(birth_date, today);
    }

    /// Returns the new state, or `None` for a template that is not listed.
    pub fn toggle_template(&mut self, template: &TemplateRef) -> Option<bool> {
        self.selection.toggle(template)
    }

    /// The category's "select all" checkbox was clicked: if every member is selected they
    /// are all cleared, otherwise they are all selected. Returns the new aggregate state.
    pub fn toggle_category(&mut self, category: Category) -> bool {
        let select = !self.selection.category_all_selected(category);
        self.selection.set_category(category, select);
        self.selection.category_all_selected(category)
    }

    /// Rescans the templates root, keeping the selection of templates that still exist.
    pub fn refresh_templates(&mut self, templates_root: &Path) -> CoreResult<()> {
        let catalog = TemplateCatalog::scan(templates_root)?;
        self.selection.refresh(&catalog);
        Ok(())
    }

    /// Back to an empty form with nothing selected.
    pub fn clear(&mut self, today: NaiveDate) {
        self.form.reset(today);
        self.selection.clear();
    }

    pub fn selected_templates(&self) -> Vec<TemplateRef> {
        self.selection.selected()
    }
}
