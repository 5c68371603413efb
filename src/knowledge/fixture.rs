//! In-memory knowledge source
//!
//! Serves titles and dates from a fixed table, for offline runs
//! (`--fixtures` on the CLI) and for tests. Lookups are counted so callers
//! can assert how often the source was consulted.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::KnowledgeSource;
use crate::error::ConfigError;
use crate::model::{DateProperty, EntityId};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FixtureEntity {
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
}

/// YAML layout: `titles: {Page_Title: Q1}` and `entities: {Q1: {birth_date: ..}}`
#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    titles: HashMap<String, String>,
    #[serde(default)]
    entities: HashMap<String, FixtureEntity>,
}

#[derive(Debug, Default)]
pub struct FixtureKnowledge {
    titles: HashMap<String, EntityId>,
    entities: HashMap<EntityId, FixtureEntity>,
    resolve_calls: AtomicUsize,
    date_calls: AtomicUsize,
}

impl FixtureKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: &str, entity: &str) -> Self {
        if let Some(id) = EntityId::parse(entity) {
            self.titles.insert(title.to_string(), id);
        }
        self
    }

    pub fn with_entity(
        mut self,
        entity: &str,
        birth_date: Option<NaiveDate>,
        death_date: Option<NaiveDate>,
    ) -> Self {
        if let Some(id) = EntityId::parse(entity) {
            self.entities.insert(
                id,
                FixtureEntity {
                    birth_date,
                    death_date,
                },
            );
        }
        self
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: FixtureFile = serde_yaml::from_str(&content)?;

        let mut fixture = Self::new();
        for (title, raw) in file.titles {
            let id = EntityId::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: format!("titles.{title}"),
                value: raw.clone(),
            })?;
            fixture.titles.insert(title, id);
        }
        for (raw, entity) in file.entities {
            let id = EntityId::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "entities".to_string(),
                value: raw.clone(),
            })?;
            fixture.entities.insert(id, entity);
        }
        Ok(fixture)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn date_calls(&self) -> usize {
        self.date_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for FixtureKnowledge {
    async fn resolve_entity_id(&self, page_title: &str) -> Option<EntityId> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.titles.get(page_title).cloned()
    }

    async fn fetch_date_property(
        &self,
        entity_id: &EntityId,
        property: DateProperty,
    ) -> Option<NaiveDate> {
        self.date_calls.fetch_add(1, Ordering::SeqCst);
        let entity = self.entities.get(entity_id)?;
        match property {
            DateProperty::Birth => entity.birth_date,
            DateProperty::Death => entity.death_date,
        }
    }
}
