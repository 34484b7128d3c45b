//! Placeholder mapping built from the patient form.
//!
//! Templates carry `{{TOKEN}}` markers. The base set is always filled; the extended set adds
//! demographic and referral tokens used by the newer templates.

use crate::patient::PatientForm;
use std::collections::BTreeMap;

/// Tokens filled for every template.
pub const BASE_TOKENS: [&str; 19] = [
    "NOMBRE_COMPLETO",
    "NOMBRES",
    "APELLIDO_PATERNO",
    "APELLIDO_MATERNO",
    "FECHA_NACIMIENTO",
    "EDAD",
    "FECHA_INTERNACION",
    "NUM_HISTORIA",
    "NUM_REGISTRO",
    "OCUPACION",
    "ESTADO_CIVIL",
    "REFERENCIA1",
    "REFERENCIA2",
    "DIAGNOSTICOS",
    "DIAG_RECETAS_LABS",
    "CIE10",
    "SERVICIO",
    "OBSERVACIONES",
    "INDICACIONES",
];

/// Tokens added when extended fields are enabled.
pub const EXTENDED_TOKENS: [&str; 9] = [
    "RESIDENCIA",
    "GENERO",
    "PROCEDENCIA",
    "DOMICILIO",
    "ES_RESIDENTE_LA_PAZ",
    "N_REFERENCIA1",
    "TELEFONO_REFERENCIA1",
    "N_REFERENCIA2",
    "TELEFONO_REFERENCIA2",
];

/// Wraps an identifier in the template marker, `EDAD` -> `{{EDAD}}`.
pub fn token(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

/// Token -> replacement text for one form.
///
/// Names are trimmed; the other free-text fields are inserted as entered so multi-line
/// observations keep their layout.
pub fn build_mapping(form: &PatientForm, extended: bool) -> BTreeMap<String, String> {
    let mut values: Vec<(&str, String)> = vec![
        ("NOMBRE_COMPLETO", form.full_name()),
        ("NOMBRES", form.given_names.trim().to_string()),
        ("APELLIDO_PATERNO", form.paternal_surname.trim().to_string()),
        ("APELLIDO_MATERNO", form.maternal_surname.trim().to_string()),
        ("FECHA_NACIMIENTO", form.birth_date.clone()),
        ("EDAD", form.age.clone()),
        ("FECHA_INTERNACION", form.admission_date_text()),
        ("NUM_HISTORIA", form.history_number.clone()),
        ("NUM_REGISTRO", form.registration_code.clone()),
        ("OCUPACION", form.occupation.clone()),
        ("ESTADO_CIVIL", form.marital_status.clone()),
        ("REFERENCIA1", form.referral_1.clone()),
        ("REFERENCIA2", form.referral_2.clone()),
        ("DIAGNOSTICOS", form.diagnoses.clone()),
        ("DIAG_RECETAS_LABS", form.prescription_diagnoses.clone()),
        ("CIE10", form.icd10.clone()),
        ("SERVICIO", form.service.to_string()),
        ("OBSERVACIONES", form.observations.clone()),
        ("INDICACIONES", form.instructions.clone()),
    ];

    if extended {
        let resident = if form.is_local_resident() { "Sí" } else { "No" };
        values.extend([
            ("RESIDENCIA", form.residence.clone()),
            ("GENERO", form.gender.to_string()),
            ("PROCEDENCIA", form.origin.clone()),
            ("DOMICILIO", form.domicile.clone()),
            ("ES_RESIDENTE_LA_PAZ", resident.to_string()),
            ("N_REFERENCIA1", form.referrer_1_name.clone()),
            ("TELEFONO_REFERENCIA1", form.referrer_1_phone.clone()),
            ("N_REFERENCIA2", form.referrer_2_name.clone()),
            ("TELEFONO_REFERENCIA2", form.referrer_2_phone.clone()),
        ]);
    }

    values
        .into_iter()
        .map(|(name, value)| (token(name), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn form() -> PatientForm {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut form = PatientForm::new(today);
        form.given_names = " Ana ".into();
        form.paternal_surname = "Gomez".into();
        form.set_birth_date("05/03/2000", today);
        form.history_number = "HC-77".into();
        form.residence = "La Paz".into();
        form
    }

    #[test]
    fn base_mapping_has_every_base_token() {
        let mapping = build_mapping(&form(), false);
        assert_eq!(mapping.len(), BASE_TOKENS.len());
        for name in BASE_TOKENS {
            assert!(mapping.contains_key(&token(name)), "{name}");
        }
        assert_eq!(mapping["{{NOMBRE_COMPLETO}}"], "Ana Gomez");
        assert_eq!(mapping["{{NOMBRES}}"], "Ana");
        assert_eq!(mapping["{{EDAD}}"], "24");
        assert_eq!(mapping["{{NUM_REGISTRO}}"], "050300");
        assert_eq!(mapping["{{FECHA_INTERNACION}}"], "05/03/2024");
        assert_eq!(mapping["{{SERVICIO}}"], "Hematología");
        assert!(!mapping.contains_key("{{RESIDENCIA}}"));
    }

    #[test]
    fn extended_mapping_adds_demographics() {
        let mapping = build_mapping(&form(), true);
        assert_eq!(mapping.len(), BASE_TOKENS.len() + EXTENDED_TOKENS.len());
        for name in EXTENDED_TOKENS {
            assert!(mapping.contains_key(&token(name)), "{name}");
        }
        assert_eq!(mapping["{{ES_RESIDENTE_LA_PAZ}}"], "Sí");
        assert_eq!(mapping["{{GENERO}}"], "Masculino");
    }

    #[test]
    fn token_wraps_name_in_braces() {
        assert_eq!(token("CIE10"), "{{CIE10}}");
    }
}
