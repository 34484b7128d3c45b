use medidocs_docx::DocxError;

/// A precondition of document generation that was not met.
///
/// Checked in declaration order; only the first failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("given names are required")]
    MissingGivenNames,
    #[error("paternal surname is required")]
    MissingPaternalSurname,
    #[error("diagnoses are required")]
    MissingDiagnoses,
    #[error("select at least one template")]
    NoTemplateSelected,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("no documents were generated: {}", .errors.join("; "))]
    NothingGenerated { errors: Vec<String> },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("patient log error: {0}")]
    LogStore(#[from] csv::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(#[from] serde_yaml::Error),
    #[error("document error: {0}")]
    Docx(#[from] DocxError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
