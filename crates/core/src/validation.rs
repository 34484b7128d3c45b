//! Input validation utilities.
//!
//! Checks that must pass before any template is opened or any file is written.

use crate::error::ValidationError;
use crate::patient::PatientForm;
use crate::templates::TemplateRef;
use medidocs_types::NonEmptyText;

/// Validates a generation request.
///
/// Checks run in a fixed order and the first failure is returned: given names, paternal
/// surname, diagnoses, then the template selection. Blank (whitespace-only) fields count as
/// missing.
///
/// # Arguments
///
/// * `form` - The patient form to check.
/// * `templates` - The templates selected for generation.
///
/// # Errors
///
/// Returns the first `ValidationError` encountered.
pub fn validate_generation_request(
    form: &PatientForm,
    templates: &[TemplateRef],
) -> Result<(), ValidationError> {
    if NonEmptyText::new(&form.given_names).is_err() {
        return Err(ValidationError::MissingGivenNames);
    }
    if NonEmptyText::new(&form.paternal_surname).is_err() {
        return Err(ValidationError::MissingPaternalSurname);
    }
    if NonEmptyText::new(&form.diagnoses).is_err() {
        return Err(ValidationError::MissingDiagnoses);
    }
    if templates.is_empty() {
        return Err(ValidationError::NoTemplateSelected);
    }
    Ok(())
}
