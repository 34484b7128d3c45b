//! # medidocs core
//!
//! Business logic of the medical document generator.
//!
//! This crate contains the patient form, the fields derived from it, the template catalog,
//! the generation orchestrator and the patient log:
//! - [`birth_date`]: age and registration code from a typed birth date
//! - [`placeholders`]: `{{TOKEN}}` -> value mapping for a form
//! - [`templates`]: category folders, catalog scan and checkbox selection
//! - [`generation`]: fills templates into a patient folder or a zip archive
//! - [`patient_log`]: the CSV history of generation batches
//!
//! **No presentation concerns**: argument parsing, HTTP handling and output formatting belong
//! in the CLI and server binaries.

pub mod birth_date;
pub mod config;
pub mod constants;
pub mod error;
pub mod generation;
pub mod patient;
pub mod patient_log;
pub mod placeholders;
pub mod session;
pub mod templates;
pub mod validation;

pub use config::{CoreConfig, RenderOptions};
pub use error::{CoreError, CoreResult, ValidationError};
pub use generation::{
    DocumentGenerator, GeneratedDocument, GenerationFailure, GenerationOutput, GenerationReport,
    OutputTarget,
};
pub use patient::{Gender, PatientForm, Service};
pub use patient_log::{LogRow, LogTable, PatientLog};
pub use session::Session;
pub use templates::{Category, TemplateCatalog, TemplateRef, TemplateSelection};

pub use medidocs_docx::FontSpec;
pub use medidocs_types::{NonEmptyText, SafeFileName};

use std::fs;
use std::path::Path;

/// Prepares a working directory: the templates layout and an empty patient log.
///
/// Safe to call on every start; existing templates and log rows are left alone.
pub fn initialise_workspace(cfg: &CoreConfig) -> CoreResult<()> {
    templates::ensure_layout(cfg.templates_dir())?;
    PatientLog::new(cfg.log_file(), cfg.render().extended_fields).ensure_exists()?;
    if !cfg.output_dir().as_os_str().is_empty() {
        fs::create_dir_all(cfg.output_dir())?;
    }
    tracing::info!("workspace ready: templates in {}", cfg.templates_dir().display());
    Ok(())
}

/// Reads a patient form from a YAML file and recomputes its derived fields.
pub fn load_form(path: &Path, today: chrono::NaiveDate) -> CoreResult<PatientForm> {
    let contents = fs::read_to_string(path)?;
    let mut form: PatientForm = serde_yaml::from_str(&contents)?;
    form.refresh_derived(today);
    Ok(form)
}
