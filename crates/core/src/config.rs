//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as
//! an `Arc<CoreConfig>`. Front-ends read environment variables or flags and hand the raw
//! values to the `*_from_env_value` helpers below; nothing in the core reads the process
//! environment during generation.

use crate::constants::{DEFAULT_LOG_FILE, DEFAULT_OUTPUT_DIR, DEFAULT_TEMPLATES_DIR};
use crate::{CoreError, CoreResult};
use medidocs_docx::{FontSpec, SubstitutionOptions};
use std::path::{Path, PathBuf};

/// How documents are rendered.
///
/// Covers the differences between the desktop and web variants of the generator: the
/// extended placeholder set and log columns, and whether rewritten runs are forced to a
/// single font.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub extended_fields: bool,
    pub normalize_font: Option<FontSpec>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            extended_fields: false,
            normalize_font: Some(FontSpec::default()),
        }
    }
}

impl RenderOptions {
    pub fn substitution(&self) -> SubstitutionOptions {
        SubstitutionOptions {
            normalize_font: self.normalize_font.clone(),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    templates_dir: PathBuf,
    log_file: PathBuf,
    output_dir: PathBuf,
    render: RenderOptions,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if any of the paths is empty.
    pub fn new(
        templates_dir: PathBuf,
        log_file: PathBuf,
        output_dir: PathBuf,
        render: RenderOptions,
    ) -> CoreResult<Self> {
        for (label, path) in [
            ("templates_dir", &templates_dir),
            ("log_file", &log_file),
            ("output_dir", &output_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(CoreError::InvalidInput(format!("{label} cannot be empty")));
            }
        }

        Ok(Self {
            templates_dir,
            log_file,
            output_dir,
            render,
        })
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn render(&self) -> &RenderOptions {
        &self.render
    }
}

/// Resolve a path setting, falling back to `default` when unset or blank.
pub fn path_from_env_value(value: Option<String>, default: &str) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

pub fn templates_dir_from_env_value(value: Option<String>) -> PathBuf {
    path_from_env_value(value, DEFAULT_TEMPLATES_DIR)
}

pub fn log_file_from_env_value(value: Option<String>) -> PathBuf {
    path_from_env_value(value, DEFAULT_LOG_FILE)
}

pub fn output_dir_from_env_value(value: Option<String>) -> PathBuf {
    path_from_env_value(value, DEFAULT_OUTPUT_DIR)
}

/// Parse the extended-fields switch.
///
/// Unset or blank means `false`. Accepts `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`
/// in any case.
pub fn extended_fields_from_env_value(value: Option<String>) -> CoreResult<bool> {
    let Some(value) = value.map(|v| v.trim().to_ascii_lowercase()) else {
        return Ok(false);
    };
    match value.as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(CoreError::InvalidInput(format!(
            "invalid extended fields flag: '{other}'"
        ))),
    }
}

/// Parse the font normalisation setting.
///
/// Unset or blank gives the default Arial 10 pt; `none` disables normalisation so rewritten
/// runs keep the template's formatting; anything else must be `Face:size`.
pub fn normalize_font_from_env_value(value: Option<String>) -> CoreResult<Option<FontSpec>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(Some(FontSpec::default())),
        Some(v) if v.eq_ignore_ascii_case("none") => Ok(None),
        Some(v) => Ok(Some(v.parse::<FontSpec>()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_fall_back_to_defaults() {
        assert_eq!(templates_dir_from_env_value(None), PathBuf::from("PLANTILLAS"));
        assert_eq!(
            log_file_from_env_value(Some("  ".into())),
            PathBuf::from("pacientes.csv")
        );
        assert_eq!(
            output_dir_from_env_value(Some("/srv/salida".into())),
            PathBuf::from("/srv/salida")
        );
    }

    #[test]
    fn extended_fields_flag_values() {
        assert!(!extended_fields_from_env_value(None).unwrap());
        assert!(extended_fields_from_env_value(Some("TRUE".into())).unwrap());
        assert!(extended_fields_from_env_value(Some("1".into())).unwrap());
        assert!(!extended_fields_from_env_value(Some("off".into())).unwrap());
        assert!(extended_fields_from_env_value(Some("maybe".into())).is_err());
    }

    #[test]
    fn normalize_font_values() {
        assert_eq!(
            normalize_font_from_env_value(None).unwrap(),
            Some(FontSpec::default())
        );
        assert_eq!(normalize_font_from_env_value(Some("None".into())).unwrap(), None);

        let font = normalize_font_from_env_value(Some("Calibri:11".into()))
            .unwrap()
            .unwrap();
        assert_eq!(font.face(), "Calibri");
        assert_eq!(font.half_points(), 22);

        assert!(matches!(
            normalize_font_from_env_value(Some("Calibri".into())),
            Err(CoreError::Docx(_))
        ));
    }

    #[test]
    fn empty_paths_are_rejected() {
        let result = CoreConfig::new(
            PathBuf::new(),
            PathBuf::from("pacientes.csv"),
            PathBuf::from("."),
            RenderOptions::default(),
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn default_render_options_normalise_to_arial_10() {
        let options = RenderOptions::default().substitution();
        assert_eq!(options.normalize_font, Some(FontSpec::default()));
    }
}
