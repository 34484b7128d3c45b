//! Patient form state.
//!
//! [`PatientForm`] is the record the clinician fills in. It deserialises from YAML (the
//! CLI's form files) and JSON (the HTTP API) with every field optional, so a partial form is
//! always loadable; whether it is complete enough to generate documents is checked later by
//! [`crate::validation`].

use crate::birth_date;
use crate::constants::DATE_FORMAT;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hospital service the patient is admitted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    #[default]
    #[serde(rename = "Hematología")]
    Hematologia,
    #[serde(rename = "Medicina Interna")]
    MedicinaInterna,
    #[serde(rename = "Oncología Clínica")]
    OncologiaClinica,
    #[serde(rename = "Oncología Quirúrgica")]
    OncologiaQuirurgica,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::Hematologia,
        Service::MedicinaInterna,
        Service::OncologiaClinica,
        Service::OncologiaQuirurgica,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Hematologia => "Hematología",
            Service::MedicinaInterna => "Medicina Interna",
            Service::OncologiaClinica => "Oncología Clínica",
            Service::OncologiaQuirurgica => "Oncología Quirúrgica",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s.trim())
            .ok_or_else(|| format!("unknown service: '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Masculino,
    Femenino,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Masculino => "Masculino",
            Gender::Femenino => "Femenino",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the clinician enters for one patient.
///
/// `age` and `registration_code` are derived from `birth_date`; use
/// [`PatientForm::set_birth_date`] or [`PatientForm::refresh_derived`] rather than setting
/// them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub given_names: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    /// As typed, `DD/MM/YY` or `DD/MM/YYYY`.
    pub birth_date: String,
    pub age: String,
    pub registration_code: String,
    pub history_number: String,
    pub occupation: String,
    pub marital_status: String,

    pub gender: Gender,
    pub residence: String,
    pub domicile: String,
    pub origin: String,
    /// Free-text referral references.
    pub referral_1: String,
    pub referral_2: String,
    pub referrer_1_name: String,
    pub referrer_1_phone: String,
    pub referrer_2_name: String,
    pub referrer_2_phone: String,

    pub diagnoses: String,
    /// Diagnoses printed on prescriptions and lab orders.
    pub prescription_diagnoses: String,
    pub icd10: String,
    pub service: Service,
    pub observations: String,
    pub instructions: String,
    #[serde(with = "dmy_date")]
    pub admission_date: NaiveDate,
}

impl PatientForm {
    /// An empty form whose admission date is `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            given_names: String::new(),
            paternal_surname: String::new(),
            maternal_surname: String::new(),
            birth_date: String::new(),
            age: String::new(),
            registration_code: String::new(),
            history_number: String::new(),
            occupation: String::new(),
            marital_status: String::new(),
            gender: Gender::default(),
            residence: String::new(),
            domicile: String::new(),
            origin: String::new(),
            referral_1: String::new(),
            referral_2: String::new(),
            referrer_1_name: String::new(),
            referrer_1_phone: String::new(),
            referrer_2_name: String::new(),
            referrer_2_phone: String::new(),
            diagnoses: String::new(),
            prescription_diagnoses: String::new(),
            icd10: String::new(),
            service: Service::default(),
            observations: String::new(),
            instructions: String::new(),
            admission_date: today,
        }
    }

    /// Given names, paternal and maternal surname, each trimmed, joined by single spaces.
    /// Empty parts are skipped.
    pub fn full_name(&self) -> String {
        [
            &self.given_names,
            &self.paternal_surname,
            &self.maternal_surname,
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Updates the birth date and recomputes age and registration code.
    pub fn set_birth_date(&mut self, birth_date: impl Into<String>, today: NaiveDate) {
        self.birth_date = birth_date.into();
        self.refresh_derived(today);
    }

    /// Recomputes age and registration code from the current birth date.
    ///
    /// Forms loaded from a file or request body carry whatever derived values the sender
    /// wrote; front-ends call this before generating.
    pub fn refresh_derived(&mut self, today: NaiveDate) {
        let derived = birth_date::derive(&self.birth_date, today);
        self.age = derived.age;
        self.registration_code = derived.registration_code;
    }

    /// `Sí` when the residence is La Paz, `No` otherwise.
    pub fn is_local_resident(&self) -> bool {
        self.residence
            .trim()
            .eq_ignore_ascii_case(crate::constants::LOCAL_RESIDENCE)
    }

    pub fn admission_date_text(&self) -> String {
        self.admission_date.format(DATE_FORMAT).to_string()
    }

    /// Clears every field; the admission date goes back to `today`.
    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::new(today);
    }
}

impl Default for PatientForm {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

/// `DD/MM/YYYY` (de)serialisation for dates shown to the user.
pub(crate) mod dmy_date {
    use crate::constants::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
