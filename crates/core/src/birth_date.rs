//! Fields derived from the birth date.
//!
//! The birth date is typed by hand as `D/M/Y`: day and month with one or two digits, the
//! year with two or four (one to four are accepted). Two-digit years are expanded with a
//! pivot on the current year: `yy <= today.year % 100` is read as `20yy`, anything later
//! as `19yy`. On 2024-03-05, `24` means 2024 and `25` means 1925.
//!
//! Unparseable input never produces an error; the derived fields are simply left empty.

use chrono::{Datelike, NaiveDate};

/// Age and registration code derived from one birth date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedFields {
    /// Completed years, as text; empty when the date cannot be used.
    pub age: String,
    /// `DDMMYY`; empty when the date cannot be parsed.
    pub registration_code: String,
}

struct BirthDate {
    date: NaiveDate,
    year_text: String,
}

/// Computes both derived fields.
///
/// `today` is passed in rather than read from the clock so the result is reproducible.
pub fn derive(birth_date: &str, today: NaiveDate) -> DerivedFields {
    DerivedFields {
        age: age(birth_date, today)
            .map(|years| years.to_string())
            .unwrap_or_default(),
        registration_code: registration_code(birth_date, today).unwrap_or_default(),
    }
}

/// Completed years between the birth date and `today`.
///
/// Returns `None` for malformed input, an impossible calendar date, or a date after
/// `today`.
pub fn age(birth_date: &str, today: NaiveDate) -> Option<u32> {
    let birth = parse(birth_date, today)?.date;
    if birth > today {
        return None;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Six-digit `DDMMYY` code: zero-padded day and month plus the last two digits of the year
/// as typed (`5/3/98` and `05/03/1998` both give `050398`).
///
/// Only the calendar date is checked, so a date later this year still has a code.
pub fn registration_code(birth_date: &str, today: NaiveDate) -> Option<String> {
    let parsed = parse(birth_date, today)?;
    let year_text = parsed.year_text;
    let yy = if year_text.len() >= 2 {
        &year_text[year_text.len() - 2..]
    } else {
        year_text.as_str()
    };
    Some(format!(
        "{:02}{:02}{:0>2}",
        parsed.date.day(),
        parsed.date.month(),
        yy
    ))
}

fn parse(birth_date: &str, today: NaiveDate) -> Option<BirthDate> {
    let parts: Vec<&str> = birth_date.trim().split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    let day = number(day, 2)?;
    let month = number(month, 2)?;
    let year_text = year.to_string();
    let mut year = number(year, 4)?;
    if year_text.len() < 3 {
        let pivot = u32::try_from(today.year() % 100).ok()?;
        year += if year <= pivot { 2000 } else { 1900 };
    }

    let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
    Some(BirthDate { date, year_text })
}

fn number(text: &str, max_digits: usize) -> Option<u32> {
    if text.is_empty() || text.len() > max_digits || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
