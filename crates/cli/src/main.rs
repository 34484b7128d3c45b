use chrono::Local;
use clap::{Parser, Subcommand};
use medidocs_core::config::{
    log_file_from_env_value, normalize_font_from_env_value, output_dir_from_env_value,
    templates_dir_from_env_value,
};
use medidocs_core::{
    initialise_workspace, load_form, Category, CoreConfig, CoreError, DocumentGenerator,
    GenerationOutput, OutputTarget, PatientLog, RenderOptions, Session, TemplateCatalog,
    TemplateRef,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "medidocs")]
#[command(about = "Fill medical document templates with patient data")]
struct Cli {
    /// Templates root with one folder per category
    #[arg(long, global = true, env = "MEDIDOCS_TEMPLATES_DIR")]
    templates_dir: Option<String>,
    /// Patient log (CSV)
    #[arg(long, global = true, env = "MEDIDOCS_LOG_FILE")]
    log_file: Option<String>,
    /// Directory in which patient folders are created
    #[arg(long, global = true, env = "MEDIDOCS_OUTPUT_DIR")]
    output_dir: Option<String>,
    /// Fill the extended placeholder set and log columns
    #[arg(long, global = true)]
    extended: bool,
    /// Keep the template's formatting instead of forcing the configured font
    #[arg(long, global = true)]
    keep_formatting: bool,
    /// Font for rewritten runs, as Face:size
    #[arg(long, global = true, env = "MEDIDOCS_NORMALIZE_FONT")]
    font: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the templates folders and the patient log
    Init,
    /// List available templates by category
    Templates,
    /// Show age and registration code for a birth date
    Derive {
        /// Birth date, DD/MM/YY or DD/MM/YYYY
        birth_date: String,
    },
    /// Generate documents for the patient described in a YAML form
    Generate {
        /// Patient form (YAML)
        form: PathBuf,
        /// Template to fill, as Category:file.docx (repeatable)
        #[arg(long = "template", short = 't')]
        templates: Vec<String>,
        /// Fill every available template
        #[arg(long)]
        all: bool,
        /// Write a zip archive to this path instead of a folder
        #[arg(long)]
        archive: Option<PathBuf>,
        /// Open the patient folder when done
        #[arg(long)]
        open: bool,
    },
    /// Print the patient log
    History,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("medidocs=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Arc::new(config_from_cli(&cli)?);
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init => {
            initialise_workspace(&cfg)?;
            println!("Templates folder: {}", cfg.templates_dir().display());
            println!("Patient log: {}", cfg.log_file().display());
        }
        Commands::Templates => {
            let catalog = TemplateCatalog::scan(cfg.templates_dir())?;
            if catalog.is_empty() {
                println!("No templates found in {}", cfg.templates_dir().display());
            }
            for category in Category::ALL {
                let templates: Vec<&TemplateRef> = catalog.in_category(category).collect();
                if templates.is_empty() {
                    continue;
                }
                println!("{}", category);
                for template in templates {
                    println!("  {:<40} {}", template.label(), template);
                }
            }
        }
        Commands::Derive { birth_date } => {
            let derived = medidocs_core::birth_date::derive(&birth_date, today);
            if derived.registration_code.is_empty() {
                println!("Could not read birth date: {}", birth_date);
            } else {
                println!("Age: {}", display_or_dash(&derived.age));
                println!("Registration code: {}", derived.registration_code);
            }
        }
        Commands::Generate {
            form,
            templates,
            all,
            archive,
            open,
        } => {
            let catalog = TemplateCatalog::scan(cfg.templates_dir())?;
            let mut session = Session::new(&catalog, today);
            session.form = load_form(&form, today)?;
            let selected = select_templates(&mut session, &templates, all)?;

            let target = if archive.is_some() {
                OutputTarget::Archive
            } else {
                OutputTarget::Folder
            };
            let generator = DocumentGenerator::new(cfg.clone());
            let report = match generator.generate(&session.form, &selected, target) {
                Ok(report) => report,
                Err(CoreError::NothingGenerated { errors }) => {
                    eprintln!("No documents were generated.");
                    for error in &errors {
                        eprintln!("  {}", error);
                    }
                    return Err("generation failed".into());
                }
                Err(e) => return Err(e.into()),
            };

            match (&report.output, archive) {
                (GenerationOutput::Archive { bytes, .. }, Some(path)) => {
                    std::fs::write(&path, bytes)?;
                    println!("{}", report.summary());
                    println!("Saved to {}", path.display());
                }
                (GenerationOutput::Folder(path), _) => {
                    println!("{}", report.summary());
                    if open {
                        open_in_file_browser(path);
                    }
                }
                (GenerationOutput::Archive { .. }, None) => println!("{}", report.summary()),
            }
        }
        Commands::History => {
            let table = PatientLog::new(cfg.log_file(), cfg.render().extended_fields).read_all()?;
            if table.rows.is_empty() {
                println!("No entries in {}", cfg.log_file().display());
            } else {
                println!("{}", table.columns.join(" | "));
                for row in &table.rows {
                    println!("{}", row.join(" | "));
                }
            }
        }
    }

    Ok(())
}

fn config_from_cli(cli: &Cli) -> Result<CoreConfig, CoreError> {
    let normalize_font = if cli.keep_formatting {
        None
    } else {
        normalize_font_from_env_value(cli.font.clone())?
    };
    CoreConfig::new(
        templates_dir_from_env_value(cli.templates_dir.clone()),
        log_file_from_env_value(cli.log_file.clone()),
        output_dir_from_env_value(cli.output_dir.clone()),
        RenderOptions {
            extended_fields: cli.extended,
            normalize_font,
        },
    )
}

/// Applies `--template` and `--all` to the session's checkboxes.
///
/// Templates named on the command line that are not in the catalog are still returned so the
/// batch reports them as not found.
fn select_templates(
    session: &mut Session,
    keys: &[String],
    all: bool,
) -> Result<Vec<TemplateRef>, CoreError> {
    if all {
        for category in Category::ALL {
            session.selection.set_category(category, true);
        }
    }

    let mut unknown = Vec::new();
    for key in keys {
        let template: TemplateRef = key.parse()?;
        if !session.selection.set(&template, true) && !unknown.contains(&template) {
            unknown.push(template);
        }
    }

    let mut selected = session.selected_templates();
    selected.extend(unknown);
    Ok(selected)
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn open_in_file_browser(path: &Path) {
    #[cfg(target_os = "windows")]
    let program = "explorer";
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let program = "xdg-open";

    if let Err(e) = std::process::Command::new(program).arg(path).spawn() {
        tracing::warn!("could not open {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session() -> Session {
        let catalog = TemplateCatalog::from_entries(vec![
            TemplateRef::new(Category::Consulta, "Nota.docx"),
            TemplateRef::new(Category::Recetas, "Receta.docx"),
        ]);
        Session::new(&catalog, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
    }

    #[test]
    fn parses_generate_with_global_flags() {
        let cli = Cli::try_parse_from([
            "medidocs",
            "generate",
            "paciente.yaml",
            "-t",
            "Recetas:Receta.docx",
            "--extended",
            "--keep-formatting",
            "--templates-dir",
            "/srv/PLANTILLAS",
        ])
        .unwrap();

        let cfg = config_from_cli(&cli).unwrap();
        assert_eq!(cfg.templates_dir(), Path::new("/srv/PLANTILLAS"));
        assert!(cfg.render().extended_fields);
        assert_eq!(cfg.render().normalize_font, None);
        match cli.command {
            Commands::Generate { templates, all, .. } => {
                assert_eq!(templates, vec!["Recetas:Receta.docx"]);
                assert!(!all);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn select_templates_keeps_catalog_order_and_unknowns() {
        let mut session = session();
        let selected = select_templates(
            &mut session,
            &[
                "Informes:Alta.docx".to_string(),
                "Recetas:Receta.docx".to_string(),
                "Consulta:Nota.docx".to_string(),
            ],
            false,
        )
        .unwrap();

        assert_eq!(
            selected,
            vec![
                TemplateRef::new(Category::Consulta, "Nota.docx"),
                TemplateRef::new(Category::Recetas, "Receta.docx"),
                TemplateRef::new(Category::Informes, "Alta.docx"),
            ]
        );
    }

    #[test]
    fn select_all_and_bad_keys() {
        let mut session = session();
        assert_eq!(select_templates(&mut session, &[], true).unwrap().len(), 2);
        assert!(select_templates(&mut session, &["Receta.docx".to_string()], false).is_err());
    }
}
