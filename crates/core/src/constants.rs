//! Constants used throughout the medidocs core crate.
//!
//! This module contains path, file name and format constants to ensure consistency across
//! the codebase.

/// Default templates root, relative to the working directory.
pub const DEFAULT_TEMPLATES_DIR: &str = "PLANTILLAS";

/// Default patient log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "pacientes.csv";

/// Default directory under which per-patient output folders are created.
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Extension of template and generated documents.
pub const DOCX_EXTENSION: &str = ".docx";

/// Prefix of the lock files Word leaves next to open documents.
pub const LOCK_FILE_PREFIX: &str = "~";

/// Extension of the archive produced by the web front-end.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Date format of birth, admission and other dates shown to the user.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Timestamp format of the `Fecha_Registro` log column.
pub const LOG_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Residence value (compared case-insensitively) that marks a local patient.
pub const LOCAL_RESIDENCE: &str = "la paz";
