//! Patient record log.
//!
//! A single CSV file with one row per generation batch. The log is append-only from the
//! user's point of view, but each append rewrites the whole file: existing rows are read,
//! the new row is added and the result is written to a sibling temporary file that then
//! replaces the log. The log assumes a single writer. Cells a spreadsheet would evaluate as
//! formulas are stored with a leading `'`.

use crate::constants::LOG_TIMESTAMP_FORMAT;
use crate::patient::PatientForm;
use crate::CoreResult;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Columns written by every front-end.
pub const BASE_COLUMNS: [&str; 9] = [
    "Fecha_Registro",
    "Nombre_Completo",
    "Num_Historia",
    "Num_Registro",
    "Edad",
    "Servicio",
    "Diagnostico",
    "Fecha_Internacion",
    "Ruta_Carpeta",
];

/// Columns added when extended fields are enabled.
pub const EXTENDED_COLUMNS: [&str; 5] = ["Genero", "Residencia", "Procedencia", "Domicilio", "CIE10"];

/// One log row, as column -> value pairs in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    values: Vec<(&'static str, String)>,
}

impl LogRow {
    /// Builds the row recorded after a successful batch.
    ///
    /// `output_location` is the patient folder or the archive name.
    pub fn from_form(
        form: &PatientForm,
        output_location: &str,
        recorded_at: NaiveDateTime,
        extended: bool,
    ) -> Self {
        let mut values = vec![
            (
                "Fecha_Registro",
                recorded_at.format(LOG_TIMESTAMP_FORMAT).to_string(),
            ),
            ("Nombre_Completo", form.full_name()),
            ("Num_Historia", form.history_number.clone()),
            ("Num_Registro", form.registration_code.clone()),
            ("Edad", form.age.clone()),
            ("Servicio", form.service.to_string()),
            ("Diagnostico", form.diagnoses.clone()),
            ("Fecha_Internacion", form.admission_date_text()),
            ("Ruta_Carpeta", output_location.to_string()),
        ];
        if extended {
            values.extend([
                ("Genero", form.gender.to_string()),
                ("Residencia", form.residence.clone()),
                ("Procedencia", form.origin.clone()),
                ("Domicilio", form.domicile.clone()),
                ("CIE10", form.icd10.clone()),
            ]);
        }
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.as_str())
    }
}

/// Contents of the log: header plus rows, each padded to the header's width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LogTable {
    /// Value of `column` in row `index`.
    pub fn value(&self, index: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(col).map(String::as_str)
    }

    /// Adds any of `columns` not already present, padding existing rows.
    fn add_missing_columns(&mut self, columns: &[&str]) {
        for column in columns {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push((*column).to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
    }
}

/// Handle on the CSV log file.
#[derive(Debug, Clone)]
pub struct PatientLog {
    path: PathBuf,
    extended: bool,
}

impl PatientLog {
    pub fn new(path: impl Into<PathBuf>, extended: bool) -> Self {
        Self {
            path: path.into(),
            extended,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema columns for this log, base first.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.extended {
            columns.extend(EXTENDED_COLUMNS);
        }
        columns
    }

    /// Creates the log with just the header row when it does not exist yet.
    pub fn ensure_exists(&self) -> CoreResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        let table = LogTable {
            columns: self.columns().into_iter().map(str::to_string).collect(),
            rows: Vec::new(),
        };
        self.write(&table)
    }

    /// Reads every row. A missing log reads as an empty table with no columns.
    pub fn read_all(&self) -> CoreResult<LogTable> {
        if !self.path.exists() {
            return Ok(LogTable::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(LogTable { columns, rows })
    }

    /// Appends one row, keeping any columns the file already has.
    pub fn append(&self, row: &LogRow) -> CoreResult<()> {
        let mut table = self.read_all()?;
        table.add_missing_columns(&self.columns());

        let values = table
            .columns
            .iter()
            .map(|column| spreadsheet_safe(row.get(column).unwrap_or_default()))
            .collect();
        table.rows.push(values);

        self.write(&table)?;
        tracing::info!(rows = table.rows.len(), "patient log updated: {}", self.path.display());
        Ok(())
    }

    fn write(&self, table: &LogTable) -> CoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        if let Err(e) = write_csv(&tmp, table) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pacientes.csv".into());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

/// Prefixes `'` to a cell that a spreadsheet would read as a formula.
fn spreadsheet_safe(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_string(),
    }
}

fn write_csv(path: &Path, table: &LogTable) -> CoreResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
