//! Change detection for person records.
//!
//! A fingerprint is SHA-256 over a canonical projection of the record's
//! identity-bearing fields. The projection is a `BTreeMap` so key order is
//! fixed; volatile fields (`Age`, `BirthDate`, `DeathDate`) are left out, so
//! recomputing an age or re-reading a date never counts as a change on its
//! own.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{PersonRecord, ATTR_NAME, ATTR_WIKI_ID, ATTR_WIKI_PAGE};

/// Hex-encoded SHA-256 of a record's non-volatile fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical_projection(record: &PersonRecord) -> BTreeMap<&'static str, Value> {
    let mut projection = BTreeMap::new();
    projection.insert(ATTR_NAME, Value::String(record.name.clone()));
    projection.insert(
        ATTR_WIKI_PAGE,
        record
            .page_title
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    projection.insert(
        ATTR_WIKI_ID,
        record
            .entity_id
            .as_ref()
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null),
    );
    projection
}

/// Compute the fingerprint of a record
pub fn fingerprint(record: &PersonRecord) -> Fingerprint {
    let mut hasher = Sha256::new();
    for (key, value) in canonical_projection(record) {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        // Value's Display is compact JSON, so strings are quoted and nulls
        // cannot collide with the string "null"
        hasher.update(value.to_string().as_bytes());
        hasher.update([0u8]);
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

/// True when enrichment altered an identity-bearing field
pub fn has_changed(before: &PersonRecord, after: &PersonRecord) -> bool {
    fingerprint(before) != fingerprint(after)
}

/// True when a vital date went from absent to present
pub fn gained_vital_dates(before: &PersonRecord, after: &PersonRecord) -> bool {
    (before.birth_date.is_none() && after.birth_date.is_some())
        || (before.death_date.is_none() && after.death_date.is_some())
}

/// Whether an enriched record should be written back.
///
/// Identity changes always qualify. Newly discovered vital dates qualify too,
/// otherwise a record whose entity id was already known could never persist
/// its death date. Age drift alone does not.
pub fn needs_write(before: &PersonRecord, after: &PersonRecord) -> bool {
    has_changed(before, after) || gained_vital_dates(before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn sample() -> PersonRecord {
        PersonRecord::new("1", "Forest Whitaker").with_page_title("Forest_Whitaker")
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(&sample());
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn resolving_entity_id_is_a_change() {
        let before = sample();
        let after = before.clone().with_entity_id(EntityId::parse("Q1").unwrap());
        assert!(has_changed(&before, &after));
        assert!(needs_write(&before, &after));
    }

    #[test]
    fn age_drift_alone_is_not_written() {
        let mut before = sample().with_entity_id(EntityId::parse("Q1").unwrap());
        before.birth_date = NaiveDate::from_ymd_opt(1961, 7, 15);
        before.age = Some(62);
        let mut after = before.clone();
        after.age = Some(63);
        assert!(!has_changed(&before, &after));
        assert!(!needs_write(&before, &after));
    }

    #[test]
    fn new_death_date_is_written_even_with_known_entity() {
        let before = sample().with_entity_id(EntityId::parse("Q1").unwrap());
        let after = before
            .clone()
            .with_death_date(NaiveDate::from_ymd_opt(2024, 7, 13).unwrap());
        assert!(!has_changed(&before, &after));
        assert!(gained_vital_dates(&before, &after));
        assert!(needs_write(&before, &after));
    }

    #[test]
    fn null_and_literal_null_differ() {
        let a = PersonRecord::new("1", "x");
        let b = PersonRecord::new("1", "x").with_page_title("null");
        assert!(has_changed(&a, &b));
    }

    proptest! {
        #[test]
        fn fingerprint_is_reflexive(name in ".{0,40}", page in proptest::option::of("[A-Za-z_]{1,30}")) {
            let mut r = PersonRecord::new("id", name);
            r.page_title = page;
            prop_assert!(!has_changed(&r, &r.clone()));
        }

        #[test]
        fn volatile_fields_do_not_move_fingerprint(
            age in proptest::option::of(0u32..130),
            birth in proptest::option::of(0i32..30000),
            death in proptest::option::of(0i32..30000),
        ) {
            let base = PersonRecord::new("id", "Someone")
                .with_entity_id(EntityId::parse("Q99").unwrap());
            let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
            let mut mutated = base.clone();
            mutated.age = age;
            mutated.birth_date = birth.map(|d| epoch + chrono::Duration::days(d as i64));
            mutated.death_date = death.map(|d| epoch + chrono::Duration::days(d as i64));
            prop_assert_eq!(fingerprint(&base), fingerprint(&mutated));
        }
    }
}
