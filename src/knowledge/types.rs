//! MediaWiki / Wikibase API response types
//!
//! Only the fields the checker reads are modelled. Wikipedia queries use
//! `formatversion=2`, so `pages` is an array and `missing` a boolean.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::dates::parse_wikidata_time;
use chrono::NaiveDate;

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub query: Option<QueryBody>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub normalized: Vec<TitleMapping>,
    #[serde(default)]
    pub redirects: Vec<TitleMapping>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleMapping {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub pageprops: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
pub struct PageProps {
    #[serde(default)]
    pub wikibase_item: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub info: String,
}

impl QueryBody {
    /// Follow normalisation then redirects starting at `requested`
    pub fn canonical_title(&self, requested: &str) -> String {
        let mut title = requested.to_string();
        if let Some(m) = self.normalized.iter().find(|m| m.from == title) {
            title = m.to.clone();
        }
        // redirect chains are reported hop by hop; bound the walk
        for _ in 0..=self.redirects.len() {
            match self.redirects.iter().find(|m| m.from == title) {
                Some(m) if m.to != title => title = m.to.clone(),
                _ => break,
            }
        }
        title
    }

    /// The existing page with the given title, if any
    pub fn existing_page(&self, title: &str) -> Option<&Page> {
        self.pages
            .iter()
            .find(|p| p.title == title)
            .or_else(|| self.pages.first())
            .filter(|p| !p.missing && !p.invalid)
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimsResponse {
    #[serde(default)]
    pub claims: HashMap<String, Vec<Claim>>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Claim {
    pub mainsnak: Snak,
    #[serde(default)]
    pub rank: Rank,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

#[derive(Debug, Deserialize)]
pub struct Snak {
    pub snaktype: String,
    #[serde(default)]
    pub datavalue: Option<DataValue>,
}

#[derive(Debug, Deserialize)]
pub struct DataValue {
    pub value: Value,
}

impl Claim {
    fn time(&self) -> Option<&str> {
        if self.mainsnak.snaktype != "value" {
            return None;
        }
        self.mainsnak.datavalue.as_ref()?.value.get("time")?.as_str()
    }
}

impl ClaimsResponse {
    /// Pick the preferred-rank claim if there is one, otherwise the first
    /// non-deprecated claim, and return its raw time string.
    pub fn best_time(&self, property_id: &str) -> Option<&str> {
        let claims = self.claims.get(property_id)?;
        let usable = || {
            claims
                .iter()
                .filter(|c| c.rank != Rank::Deprecated)
                .filter_map(|c| c.time().map(|t| (c.rank, t)))
        };
        usable()
            .find(|(rank, _)| *rank == Rank::Preferred)
            .or_else(|| usable().next())
            .map(|(_, t)| t)
    }

    /// The chosen claim parsed to a calendar date
    pub fn best_date(&self, property_id: &str) -> Option<NaiveDate> {
        self.best_time(property_id).and_then(parse_wikidata_time)
    }
}
