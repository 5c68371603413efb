//! Wikidata time values and age arithmetic

use chrono::{Datelike, NaiveDate};

/// Parse a Wikidata time string such as `+1950-06-15T00:00:00Z`.
///
/// The leading sign is stripped. Year- or month-precision values carry
/// `00` for the unknown parts; those default to `01` rather than failing.
pub fn parse_wikidata_time(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let unsigned = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix('-'))
        .unwrap_or(trimmed);
    let date_part = unsigned.split('T').next()?;

    let mut parts = date_part.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next().unwrap_or("1").parse().ok()?;
    let day: u32 = parts.next().unwrap_or("1").parse().ok()?;

    NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
}

/// Whole years from `birth` to `end`, never negative
pub fn calculate_age(birth: NaiveDate, end: NaiveDate) -> u32 {
    let mut age = end.year() - birth.year();
    if (end.month(), end.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Age at death if known, otherwise as of `today`
pub fn age_on(birth: NaiveDate, death: Option<NaiveDate>, today: NaiveDate) -> u32 {
    calculate_age(birth, death.unwrap_or(today))
}
