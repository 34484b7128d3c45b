//! Document generation.
//!
//! [`DocumentGenerator::generate`] is the whole "generate documents" action: validate the
//! request, fill every selected template, place the results in a per-patient folder or in
//! a zip archive, and record the batch in the patient log.
//!
//! Failures of individual templates are collected and do not stop the batch. The batch as a
//! whole fails only when validation fails (nothing is touched) or when no document at all
//! could be produced (no log row is written).

use crate::config::CoreConfig;
use crate::constants::ARCHIVE_EXTENSION;
use crate::patient::PatientForm;
use crate::patient_log::{LogRow, PatientLog};
use crate::placeholders::build_mapping;
use crate::templates::{Category, TemplateRef};
use crate::validation::validate_generation_request;
use crate::{CoreError, CoreResult};
use chrono::{Local, NaiveDateTime};
use medidocs_docx::{replace_placeholders, DocxDocument, SubstitutionOptions, ZipBundle};
use medidocs_types::SafeFileName;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where generated documents go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// `{output_dir}/{container}/` on disk.
    Folder,
    /// An in-memory zip whose entries are prefixed with `{container}/`.
    Archive,
}

/// The produced output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    Folder(PathBuf),
    Archive { name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub category: Category,
    pub filename: String,
}

/// A template that could not be turned into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub template: TemplateRef,
    pub message: String,
}

/// Outcome of a batch that produced at least one document.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub container: SafeFileName,
    pub generated: Vec<GeneratedDocument>,
    pub failures: Vec<GenerationFailure>,
    pub output: GenerationOutput,
    /// Set when the documents were produced but the patient log could not be updated.
    pub log_warning: Option<String>,
}

impl GenerationReport {
    pub fn errors(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.message.clone()).collect()
    }

    /// Human-readable summary: documents grouped by category, the output location and any
    /// errors.
    pub fn summary(&self) -> String {
        let mut by_category: Vec<(Category, Vec<&str>)> = Vec::new();
        for doc in &self.generated {
            match by_category.iter_mut().find(|(c, _)| *c == doc.category) {
                Some((_, files)) => files.push(&doc.filename),
                None => by_category.push((doc.category, vec![doc.filename.as_str()])),
            }
        }

        let mut out = format!("Generated {} document(s):\n", self.generated.len());
        for (category, files) in by_category {
            out.push_str(&format!("\n{category}\n"));
            for file in files {
                out.push_str(&format!(" • {file}\n"));
            }
        }
        match &self.output {
            GenerationOutput::Folder(path) => {
                out.push_str(&format!("\nFolder: {}", path.display()))
            }
            GenerationOutput::Archive { name, .. } => out.push_str(&format!("\nArchive: {name}")),
        }
        if !self.failures.is_empty() {
            out.push_str("\n\nErrors:\n");
            out.push_str(&self.errors().join("\n"));
        }
        if let Some(warning) = &self.log_warning {
            out.push_str(&format!("\n\nWarning: {warning}"));
        }
        out
    }
}

/// Folder / archive-prefix name for a patient:
/// `"{full name} - {history number} - {trimmed diagnoses}"`, filesystem-safe.
pub fn container_name(form: &PatientForm) -> SafeFileName {
    SafeFileName::sanitise(format!(
        "{} - {} - {}",
        form.full_name(),
        form.history_number,
        form.diagnoses.trim()
    ))
}

/// `"{template label} - {full name}.docx"`, filesystem-safe.
pub fn output_file_name(template: &TemplateRef, full_name: &str) -> String {
    SafeFileName::sanitise(format!("{} - {}.docx", template.label(), full_name)).to_string()
}

/// [`output_file_name`], with the category added when another template of the batch
/// already took that name (same file name in two categories). Names are compared
/// case-insensitively. `None` if even the qualified name is taken.
fn unique_file_name(
    template: &TemplateRef,
    full_name: &str,
    used: &mut BTreeSet<String>,
) -> Option<String> {
    let plain = output_file_name(template, full_name);
    if used.insert(plain.to_lowercase()) {
        return Some(plain);
    }
    let qualified = SafeFileName::sanitise(format!(
        "{} ({}) - {}.docx",
        template.label(),
        template.category,
        full_name
    ))
    .to_string();
    used.insert(qualified.to_lowercase()).then_some(qualified)
}

enum Sink {
    Folder { path: PathBuf, created: bool },
    Archive { bundle: ZipBundle, prefix: String },
}

impl Sink {
    fn store(&mut self, filename: &str, document: &DocxDocument) -> CoreResult<()> {
        match self {
            Sink::Folder { path, created } => {
                if !*created {
                    fs::create_dir_all(path.as_path())?;
                    *created = true;
                }
                document.save(&path.join(filename))?;
            }
            Sink::Archive { bundle, prefix } => {
                let bytes = document.to_bytes()?;
                bundle.add(&format!("{prefix}/{filename}"), &bytes)?;
            }
        }
        Ok(())
    }

    fn finish(self, container: &SafeFileName) -> CoreResult<GenerationOutput> {
        Ok(match self {
            Sink::Folder { path, .. } => GenerationOutput::Folder(path),
            Sink::Archive { bundle, .. } => GenerationOutput::Archive {
                name: format!("{container}{ARCHIVE_EXTENSION}"),
                bytes: bundle.finish()?,
            },
        })
    }
}

/// Runs generation batches against one configuration.
#[derive(Clone, Debug)]
pub struct DocumentGenerator {
    cfg: Arc<CoreConfig>,
}

impl DocumentGenerator {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Generates one document per template and logs the batch.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` if a required field is blank or `templates` is empty; no
    ///   file is read or written.
    /// - `CoreError::NothingGenerated` if every template failed; carries the per-template
    ///   messages.
    /// - `CoreError::Docx` or `CoreError::Io` only if the finished archive cannot be
    ///   assembled.
    pub fn generate(
        &self,
        form: &PatientForm,
        templates: &[TemplateRef],
        target: OutputTarget,
    ) -> CoreResult<GenerationReport> {
        self.generate_at(form, templates, target, Local::now().naive_local())
    }

    /// [`generate`](Self::generate) with an explicit log timestamp.
    pub fn generate_at(
        &self,
        form: &PatientForm,
        templates: &[TemplateRef],
        target: OutputTarget,
        now: NaiveDateTime,
    ) -> CoreResult<GenerationReport> {
        validate_generation_request(form, templates)?;

        let render = self.cfg.render();
        let mapping: BTreeMap<String, String> = build_mapping(form, render.extended_fields);
        let options = render.substitution();
        let full_name = form.full_name();
        let container = container_name(form);

        tracing::info!(
            templates = templates.len(),
            ?target,
            "generating documents into {container}"
        );

        let mut sink = match target {
            OutputTarget::Folder => Sink::Folder {
                path: self.cfg.output_dir().join(container.as_str()),
                created: false,
            },
            OutputTarget::Archive => Sink::Archive {
                bundle: ZipBundle::new(),
                prefix: container.to_string(),
            },
        };

        let mut generated = Vec::new();
        let mut failures = Vec::new();
        let mut used_names = BTreeSet::new();
        for template in templates {
            let source = template.path_in(self.cfg.templates_dir());
            if !source.is_file() {
                tracing::warn!("template not found: {}", source.display());
                failures.push(GenerationFailure {
                    template: template.clone(),
                    message: format!("Template not found: {}", template.filename),
                });
                continue;
            }

            let Some(filename) = unique_file_name(template, &full_name, &mut used_names) else {
                failures.push(GenerationFailure {
                    template: template.clone(),
                    message: format!("{}: selected more than once", template.filename),
                });
                continue;
            };
            match render_one(&source, &mapping, &options, &filename, &mut sink) {
                Ok(()) => generated.push(GeneratedDocument {
                    category: template.category,
                    filename,
                }),
                Err(e) => {
                    tracing::warn!("failed to generate {template}: {e}");
                    failures.push(GenerationFailure {
                        template: template.clone(),
                        message: format!("{}: {e}", template.filename),
                    });
                }
            }
        }

        if generated.is_empty() {
            return Err(CoreError::NothingGenerated {
                errors: failures.into_iter().map(|f| f.message).collect(),
            });
        }

        let output = sink.finish(&container)?;
        let location = match &output {
            GenerationOutput::Folder(path) => path.display().to_string(),
            GenerationOutput::Archive { .. } => container.to_string(),
        };

        let log = PatientLog::new(self.cfg.log_file(), render.extended_fields);
        let row = LogRow::from_form(form, &location, now, render.extended_fields);
        let log_warning = match log.append(&row) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("failed to update patient log: {e}");
                Some(format!("patient log was not updated: {e}"))
            }
        };

        tracing::info!(
            generated = generated.len(),
            failed = failures.len(),
            "generation finished for {container}"
        );

        Ok(GenerationReport {
            container,
            generated,
            failures,
            output,
            log_warning,
        })
    }
}

fn render_one(
    source: &Path,
    mapping: &BTreeMap<String, String>,
    options: &SubstitutionOptions,
    filename: &str,
    sink: &mut Sink,
) -> CoreResult<()> {
    let mut document = DocxDocument::open(source)?;
    replace_placeholders(&mut document, mapping, options);
    sink.store(filename, &document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderOptions;
    use crate::error::ValidationError;
    use crate::templates::ensure_layout;
    use chrono::NaiveDate;
    use medidocs_docx::{read_entries, PartKind};
    use tempfile::TempDir;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn template_bytes(text: &str) -> Vec<u8> {
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p></w:body></w:document>"#
        );
        let mut bundle = ZipBundle::new();
        bundle.add("[Content_Types].xml", b"<Types/>").unwrap();
        bundle.add("word/document.xml", body.as_bytes()).unwrap();
        bundle.finish().unwrap()
    }

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        generator: DocumentGenerator,
    }

    impl Fixture {
        fn new(extended: bool) -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path().to_path_buf();
            ensure_layout(&root.join("PLANTILLAS")).unwrap();
            let cfg = CoreConfig::new(
                root.join("PLANTILLAS"),
                root.join("pacientes.csv"),
                root.join("salida"),
                RenderOptions {
                    extended_fields: extended,
                    ..RenderOptions::default()
                },
            )
            .unwrap();
            Self {
                _temp: temp,
                root,
                generator: DocumentGenerator::new(Arc::new(cfg)),
            }
        }

        fn add_template(&self, category: Category, name: &str, text: &str) -> TemplateRef {
            let path = self
                .root
                .join("PLANTILLAS")
                .join(category.dir_name())
                .join(name);
            fs::write(path, template_bytes(text)).unwrap();
            TemplateRef::new(category, name)
        }

        fn log(&self) -> PatientLog {
            PatientLog::new(self.root.join("pacientes.csv"), false)
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn form() -> PatientForm {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut form = PatientForm::new(today);
        form.given_names = "Ana".into();
        form.paternal_surname = "Gomez".into();
        form.history_number = "123".into();
        form.diagnoses = " Anemia ".into();
        form.set_birth_date("05/03/2000", today);
        form
    }

    #[test]
    fn container_name_is_sanitised() {
        let mut form = form();
        form.diagnoses = "LLA <B/T> \"alto\" riesgo? a|b*c:d\\e".into();
        assert_eq!(
            container_name(&form).as_str(),
            "Ana Gomez - 123 - LLA _B_T_ _alto_ riesgo_ a_b_c_d_e"
        );
    }

    #[test]
    fn missing_and_valid_template_gives_one_document_one_error_one_log_row() {
        let fixture = Fixture::new(false);
        let receta = fixture.add_template(Category::Recetas, "Receta.docx", "Paciente: {{NOMBRE_COMPLETO}}");
        let missing = TemplateRef::new(Category::Informes, "Alta.docx");

        let report = fixture
            .generator
            .generate_at(&form(), &[missing, receta], OutputTarget::Folder, now())
            .unwrap();

        assert_eq!(report.generated.len(), 1);
        assert_eq!(report.generated[0].filename, "Receta - Ana Gomez.docx");
        assert_eq!(report.errors(), vec!["Template not found: Alta.docx"]);
        assert!(report.log_warning.is_none());

        let folder = fixture.root.join("salida").join("Ana Gomez - 123 - Anemia");
        assert_eq!(report.output, GenerationOutput::Folder(folder.clone()));
        let document = DocxDocument::open(&folder.join("Receta - Ana Gomez.docx")).unwrap();
        assert_eq!(
            document.paragraph_texts(PartKind::Body),
            vec!["Paciente: Ana Gomez"]
        );

        let table = fixture.log().read_all().unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.value(0, "Fecha_Registro"), Some("05/03/2024 09:30"));
        assert_eq!(
            table.value(0, "Ruta_Carpeta"),
            Some(folder.display().to_string().as_str())
        );
    }

    #[test]
    fn empty_given_names_rejected_before_any_io() {
        let fixture = Fixture::new(false);
        let nota = fixture.add_template(Category::Consulta, "Nota.docx", "x");
        let mut form = form();
        form.given_names = "  ".into();

        let result = fixture
            .generator
            .generate_at(&form, &[nota], OutputTarget::Folder, now());

        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::MissingGivenNames))
        ));
        assert!(!fixture.root.join("salida").exists());
        assert!(!fixture.root.join("pacientes.csv").exists());
    }

    #[test]
    fn no_templates_selected_is_rejected_without_log_row() {
        let fixture = Fixture::new(false);
        let result = fixture
            .generator
            .generate_at(&form(), &[], OutputTarget::Archive, now());

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NoTemplateSelected)
        ));
        assert_eq!(err.to_string(), "select at least one template");
        assert!(!fixture.root.join("pacientes.csv").exists());
    }

    #[test]
    fn nothing_generated_reports_errors_and_skips_log() {
        let fixture = Fixture::new(false);
        let broken = TemplateRef::new(Category::Consulta, "Rota.docx");
        fs::write(
            fixture.root.join("PLANTILLAS").join("Consulta").join("Rota.docx"),
            b"not a zip",
        )
        .unwrap();
        let missing = TemplateRef::new(Category::Recetas, "Nada.docx");

        let result = fixture
            .generator
            .generate_at(&form(), &[broken, missing], OutputTarget::Folder, now());

        match result {
            Err(CoreError::NothingGenerated { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].starts_with("Rota.docx: "));
                assert_eq!(errors[1], "Template not found: Nada.docx");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!fixture.root.join("salida").exists());
        assert!(!fixture.root.join("pacientes.csv").exists());
    }

    #[test]
    fn archive_output_prefixes_entries_with_container() {
        let fixture = Fixture::new(true);
        let nota = fixture.add_template(Category::Consulta, "Nota.docx", "{{ES_RESIDENTE_LA_PAZ}}");
        let receta = fixture.add_template(Category::Recetas, "Receta.docx", "{{EDAD}} años");

        let report = fixture
            .generator
            .generate_at(&form(), &[nota, receta], OutputTarget::Archive, now())
            .unwrap();

        let GenerationOutput::Archive { name, bytes } = &report.output else {
            panic!("expected archive output");
        };
        assert_eq!(name, "Ana Gomez - 123 - Anemia.zip");

        let entries = read_entries(bytes).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Ana Gomez - 123 - Anemia/Nota - Ana Gomez.docx",
                "Ana Gomez - 123 - Anemia/Receta - Ana Gomez.docx"
            ]
        );
        let receta = DocxDocument::from_bytes(&entries[1].data).unwrap();
        assert_eq!(receta.paragraph_texts(PartKind::Body), vec!["24 años"]);
        let nota = DocxDocument::from_bytes(&entries[0].data).unwrap();
        assert_eq!(nota.paragraph_texts(PartKind::Body), vec!["No"]);

        assert!(!fixture.root.join("salida").exists());
        let table = PatientLog::new(fixture.root.join("pacientes.csv"), true)
            .read_all()
            .unwrap();
        assert_eq!(table.value(0, "Ruta_Carpeta"), Some("Ana Gomez - 123 - Anemia"));
        assert_eq!(table.value(0, "Genero"), Some("Masculino"));
    }

    #[test]
    fn same_file_name_in_two_categories_gets_category_suffix() {
        let fixture = Fixture::new(false);
        let consulta = fixture.add_template(Category::Consulta, "Nota.docx", "consulta");
        let informe = fixture.add_template(Category::Informes, "Nota.docx", "informe");
        let templates = [consulta.clone(), informe, consulta];

        let report = fixture
            .generator
            .generate_at(&form(), &templates, OutputTarget::Folder, now())
            .unwrap();
        let names: Vec<&str> = report.generated.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["Nota - Ana Gomez.docx", "Nota (Informes) - Ana Gomez.docx"]
        );
        assert_eq!(report.errors(), vec!["Nota.docx: selected more than once"]);

        let folder = fixture.root.join("salida").join("Ana Gomez - 123 - Anemia");
        let informe_doc = DocxDocument::open(&folder.join(names[1])).unwrap();
        assert_eq!(informe_doc.paragraph_texts(PartKind::Body), vec!["informe"]);
        let consulta_doc = DocxDocument::open(&folder.join(names[0])).unwrap();
        assert_eq!(consulta_doc.paragraph_texts(PartKind::Body), vec!["consulta"]);

        let report = fixture
            .generator
            .generate_at(&form(), &templates[..2], OutputTarget::Archive, now())
            .unwrap();
        let GenerationOutput::Archive { bytes, .. } = &report.output else {
            panic!("expected archive output");
        };
        assert_eq!(read_entries(bytes).unwrap().len(), 2);
    }

    #[test]
    fn output_file_name_is_sanitised() {
        let template = TemplateRef::new(Category::Recetas, "Receta.docx");
        assert_eq!(
            output_file_name(&template, "Ana/María\nGomez"),
            "Receta - Ana_María Gomez.docx"
        );
    }

    #[test]
    fn log_failure_is_a_warning() {
        let fixture = Fixture::new(false);
        // A directory where the log file should be makes the write fail.
        fs::create_dir(fixture.root.join("pacientes.csv")).unwrap();
        let nota = fixture.add_template(Category::Consulta, "Nota.docx", "{{NOMBRES}}");

        let report = fixture
            .generator
            .generate_at(&form(), &[nota], OutputTarget::Folder, now())
            .unwrap();

        assert_eq!(report.generated.len(), 1);
        assert!(report.log_warning.is_some());
        assert!(report.summary().contains("Warning: patient log was not updated"));
    }

    #[test]
    fn summary_groups_by_category() {
        let fixture = Fixture::new(false);
        let a = fixture.add_template(Category::Recetas, "A.docx", "x");
        let nota = fixture.add_template(Category::Consulta, "Nota.docx", "x");
        let b = fixture.add_template(Category::Recetas, "B.docx", "x");
        let missing = TemplateRef::new(Category::Informes, "Alta.docx");

        let report = fixture
            .generator
            .generate_at(&form(), &[a, nota, b, missing], OutputTarget::Archive, now())
            .unwrap();

        let summary = report.summary();
        assert!(summary.starts_with("Generated 3 document(s):\n"));
        assert!(summary.contains(
            "\nRecetas\n • A - Ana Gomez.docx\n • B - Ana Gomez.docx\n\nConsulta\n • Nota - Ana Gomez.docx\n"
        ));
        assert!(summary.contains("Archive: Ana Gomez - 123 - Anemia.zip"));
        assert!(summary.ends_with("Errors:\nTemplate not found: Alta.docx"));
    }
}
