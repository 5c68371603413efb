//! External knowledge base integration
//!
//! This module provides:
//! - `KnowledgeSource`, the lookup seam the reconciler depends on
//! - `WikidataClient`, the HTTP implementation (Wikipedia title resolution
//!   plus Wikidata date claims)
//! - `FixtureKnowledge`, an in-memory source for local runs and tests
//! - Date parsing, retry policy, date cache and title candidate helpers

pub mod cache;
pub mod client;
pub mod dates;
pub mod fixture;
pub mod retry;
pub mod titles;
pub mod types;

pub use client::WikidataClient;
pub use dates::{age_on, calculate_age, parse_wikidata_time};
pub use fixture::FixtureKnowledge;
pub use retry::RetryPolicy;
pub use titles::{NameVariantTitles, TitleCandidates, UnderscoreTitles};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{DateProperty, EntityId};

/// Entity and date lookups. Both operations fail soft: upstream trouble is
/// logged by the implementation and reported as `None`.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Resolve a (possibly non-canonical) page title to an entity id
    async fn resolve_entity_id(&self, page_title: &str) -> Option<EntityId>;

    /// Read a single date-valued property of an entity
    async fn fetch_date_property(
        &self,
        entity_id: &EntityId,
        property: DateProperty,
    ) -> Option<NaiveDate>;
}
