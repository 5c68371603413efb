//! Per-record enrichment from the knowledge source

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fingerprint::needs_write;
use crate::knowledge::{age_on, KnowledgeSource, TitleCandidates};
use crate::model::{DateProperty, EntityId, PersonRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    /// No entity id could be resolved; the record is left alone
    Unresolved,
    /// Nothing worth writing
    Unchanged,
    Changed {
        record: PersonRecord,
        /// Set when this enrichment discovered the death
        death_discovered: Option<NaiveDate>,
    },
}

pub struct Enricher {
    knowledge: Arc<dyn KnowledgeSource>,
    titles: Arc<dyn TitleCandidates>,
}

impl Enricher {
    pub fn new(knowledge: Arc<dyn KnowledgeSource>, titles: Arc<dyn TitleCandidates>) -> Self {
        Self { knowledge, titles }
    }

    pub async fn enrich(&self, record: &PersonRecord, today: NaiveDate) -> EnrichOutcome {
        let mut updated = record.clone();

        if updated.entity_id.is_none() {
            match self.resolve(record).await {
                Some((title, id)) => {
                    info!(person_id = %record.id, name = %record.name, entity = %id, "Resolved entity id");
                    updated.page_title.get_or_insert(title);
                    updated.entity_id = Some(id);
                }
                None => {
                    warn!(person_id = %record.id, name = %record.name, "No entity id available");
                    return EnrichOutcome::Unresolved;
                }
            }
        }
        let Some(entity) = updated.entity_id.clone() else {
            return EnrichOutcome::Unresolved;
        };

        let birth = self
            .knowledge
            .fetch_date_property(&entity, DateProperty::Birth)
            .await;
        let death = self
            .knowledge
            .fetch_date_property(&entity, DateProperty::Death)
            .await;

        if let Some(birth) = birth {
            updated.birth_date = Some(birth);
            updated.age = Some(age_on(birth, death, today));
        }
        if let Some(death) = death {
            updated.death_date = Some(death);
        }

        if !needs_write(record, &updated) {
            debug!(person_id = %record.id, "No changes needed");
            return EnrichOutcome::Unchanged;
        }

        let death_discovered = match (record.death_date, updated.death_date) {
            (None, Some(date)) => {
                info!(person_id = %record.id, name = %record.name, death_date = %date, "Found death date");
                Some(date)
            }
            _ => None,
        };
        EnrichOutcome::Changed {
            record: updated,
            death_discovered,
        }
    }

    /// Try the stored page title, then generated candidates, stopping at the
    /// first one that resolves
    async fn resolve(&self, record: &PersonRecord) -> Option<(String, EntityId)> {
        let mut tried: Vec<String> = Vec::new();
        let candidates = record
            .page_title
            .iter()
            .cloned()
            .chain(self.titles.candidates(&record.name));

        for title in candidates {
            if tried.contains(&title) {
                continue;
            }
            if let Some(id) = self.knowledge.resolve_entity_id(&title).await {
                return Some((title, id));
            }
            tried.push(title);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{FixtureKnowledge, NameVariantTitles, UnderscoreTitles};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2024, 6, 1)
    }

    fn knowledge() -> FixtureKnowledge {
        FixtureKnowledge::new()
            .with_title("Jane_Doe", "Q1")
            .with_entity("Q1", Some(d(1950, 1, 1)), Some(d(2024, 3, 5)))
            .with_title("John_Smith", "Q2")
            .with_entity("Q2", Some(d(1950, 6, 15)), None)
    }

    fn enricher(titles: Arc<dyn TitleCandidates>) -> Enricher {
        Enricher::new(Arc::new(knowledge()), titles)
    }

    #[tokio::test]
    async fn derives_title_and_discovers_death() {
        let record = PersonRecord::new("1", "Jane Doe");
        let outcome = enricher(Arc::new(UnderscoreTitles))
            .enrich(&record, today())
            .await;
        match outcome {
            EnrichOutcome::Changed {
                record,
                death_discovered,
            } => {
                assert_eq!(record.page_title.as_deref(), Some("Jane_Doe"));
                assert_eq!(record.entity_id.unwrap().as_str(), "Q1");
                assert_eq!(record.age, Some(74));
                assert_eq!(death_discovered, Some(d(2024, 3, 5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_person_is_unresolved() {
        let record = PersonRecord::new("3", "Nobody Known");
        let outcome = enricher(Arc::new(UnderscoreTitles))
            .enrich(&record, today())
            .await;
        assert_eq!(outcome, EnrichOutcome::Unresolved);
    }

    #[tokio::test]
    async fn age_drift_alone_is_unchanged() {
        let record = PersonRecord {
            birth_date: Some(d(1950, 6, 15)),
            age: Some(70),
            ..PersonRecord::new("2", "John Smith")
                .with_page_title("John_Smith")
                .with_entity_id(EntityId::parse("Q2").unwrap())
        };
        let outcome = enricher(Arc::new(UnderscoreTitles))
            .enrich(&record, today())
            .await;
        assert_eq!(outcome, EnrichOutcome::Unchanged);
    }

    #[tokio::test]
    async fn known_entity_gaining_death_date_is_written() {
        let record = PersonRecord {
            birth_date: Some(d(1950, 1, 1)),
            ..PersonRecord::new("1", "Jane Doe")
                .with_page_title("Jane_Doe")
                .with_entity_id(EntityId::parse("Q1").unwrap())
        };
        let outcome = enricher(Arc::new(UnderscoreTitles))
            .enrich(&record, today())
            .await;
        assert!(matches!(
            outcome,
            EnrichOutcome::Changed {
                death_discovered: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn name_variants_resolve_lowercase_names() {
        let record = PersonRecord::new("2", "john smith");
        let plain = enricher(Arc::new(UnderscoreTitles))
            .enrich(&record, today())
            .await;
        assert_eq!(plain, EnrichOutcome::Unresolved);

        let variant = enricher(Arc::new(NameVariantTitles))
            .enrich(&record, today())
            .await;
        match variant {
            EnrichOutcome::Changed { record, .. } => {
                assert_eq!(record.page_title.as_deref(), Some("John_Smith"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
