//! Wikipedia / Wikidata API client
//!
//! Rate-limited HTTP client that resolves page titles to Wikidata entity ids
//! and reads date claims. Every request goes through the retry policy; the
//! public lookups fail soft and log instead of returning errors.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::cache::DateCache;
use super::retry::RetryPolicy;
use super::types::{ApiError, ClaimsResponse, QueryResponse};
use super::KnowledgeSource;
use crate::config::KnowledgeConfig;
use crate::error::KnowledgeError;
use crate::model::{DateProperty, EntityId};

const MIN_REQUEST_INTERVAL_MS: u64 = 100; // 10 req/sec

/// Wikibase error codes meaning the entity has nothing to offer
const ABSENT_ENTITY_CODES: &[&str] = &["no-such-entity", "invalid-entity-id"];

/// Error codes Wikimedia sends with HTTP 200 when the caller should back off
const BACKOFF_CODES: &[&str] = &["ratelimited", "maxlag", "readonly"];

fn api_error(err: &ApiError) -> KnowledgeError {
    if BACKOFF_CODES.contains(&err.code.as_str()) {
        KnowledgeError::RateLimited {
            retry_after_secs: None,
        }
    } else {
        KnowledgeError::Api {
            code: err.code.clone(),
            info: err.info.clone(),
        }
    }
}

/// `Retry-After` carries either delta-seconds or an HTTP-date
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (at.with_timezone(&Utc) - now).num_seconds().max(0);
    u64::try_from(secs).ok()
}

pub struct WikidataClient {
    http: Client,
    wikipedia_api: Url,
    wikidata_api: Url,
    retry: RetryPolicy,
    cache: DateCache,
    last_request: Mutex<Option<Instant>>,
}

impl WikidataClient {
    pub fn new(config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            wikipedia_api: Url::parse(&config.wikipedia_api_url)?,
            wikidata_api: Url::parse(&config.wikidata_api_url)?,
            retry: config.retry.clone(),
            cache: DateCache::new(config.date_cache_capacity),
            last_request: Mutex::new(None),
        })
    }

    /// Cached date lookups so far
    pub fn cached_dates(&self) -> usize {
        self.cache.len()
    }

    /// Enforce a minimum gap between requests
    async fn rate_limit(&self) {
        let wait = {
            let last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            last.map(|at| at.elapsed())
                .and_then(|elapsed| {
                    Duration::from_millis(MIN_REQUEST_INTERVAL_MS).checked_sub(elapsed)
                })
        };

        if let Some(wait) = wait {
            sleep(wait).await;
        }

        let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(Instant::now());
    }

    /// One GET attempt, mapping status codes onto retry semantics
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, KnowledgeError> {
        self.rate_limit().await;

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            return Err(KnowledgeError::RateLimited { retry_after_secs });
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(KnowledgeError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            KnowledgeError::Malformed(format!(
                "{}; first 200 chars: {}",
                e,
                text.chars().take(200).collect::<String>()
            ))
        })
    }

    /// Wikipedia query with in-body API errors surfaced inside the retry loop
    async fn query(&self, what: &str, url: Url) -> Result<QueryResponse, KnowledgeError> {
        let url = &url;
        self.retry
            .run(what, || async move {
                let response: QueryResponse = self.get_json(url).await?;
                if let Some(err) = &response.error {
                    return Err(api_error(err));
                }
                Ok(response)
            })
            .await
    }

    fn wikipedia_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.wikipedia_api.clone();
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("format", "json")
            .append_pair("formatversion", "2");
        url
    }

    /// Resolve normalisation and redirects; `None` if the page does not exist
    pub async fn canonical_title(&self, title: &str) -> Result<Option<String>, KnowledgeError> {
        let url = self.wikipedia_url(&[
            ("action", "query"),
            ("titles", title),
            ("redirects", "1"),
        ]);
        let response = self.query("title resolution", url).await?;
        let Some(query) = response.query else {
            return Ok(None);
        };
        let canonical = query.canonical_title(title);
        Ok(query
            .existing_page(&canonical)
            .map(|page| page.title.clone()))
    }

    /// Look up the Wikidata item linked from a canonical page title
    pub async fn wikibase_item(&self, canonical: &str) -> Result<Option<EntityId>, KnowledgeError> {
        let url = self.wikipedia_url(&[
            ("action", "query"),
            ("prop", "pageprops"),
            ("ppprop", "wikibase_item"),
            ("titles", canonical),
        ]);
        let response = self.query("entity lookup", url).await?;
        Ok(response
            .query
            .as_ref()
            .and_then(|q| q.existing_page(canonical))
            .and_then(|page| page.pageprops.as_ref())
            .and_then(|props| props.wikibase_item.as_deref())
            .and_then(EntityId::parse))
    }

    /// Read one date claim; `Ok(None)` when the entity has no usable claim
    /// or does not exist. Any other API error is returned and never cached.
    pub async fn date_claim(
        &self,
        entity_id: &EntityId,
        property: DateProperty,
    ) -> Result<Option<NaiveDate>, KnowledgeError> {
        let mut url = self.wikidata_api.clone();
        url.query_pairs_mut()
            .append_pair("action", "wbgetclaims")
            .append_pair("entity", entity_id.as_str())
            .append_pair("property", property.property_id())
            .append_pair("format", "json");

        let url = &url;
        let response = self
            .retry
            .run("date claim", || async move {
                let response: ClaimsResponse = self.get_json(url).await?;
                if let Some(err) = &response.error {
                    if !ABSENT_ENTITY_CODES.contains(&err.code.as_str()) {
                        return Err(api_error(err));
                    }
                }
                Ok(response)
            })
            .await?;
        if let Some(err) = response.error {
            debug!(entity = %entity_id, code = %err.code, "Wikibase has no such entity");
            return Ok(None);
        }

        let raw = response.best_time(property.property_id());
        let parsed = raw.and_then(super::dates::parse_wikidata_time);
        if let (Some(raw), None) = (raw, parsed) {
            warn!(entity = %entity_id, %property, raw, "Unparseable Wikidata time");
        }
        Ok(parsed)
    }
}

#[async_trait]
impl KnowledgeSource for WikidataClient {
    async fn resolve_entity_id(&self, page_title: &str) -> Option<EntityId> {
        let canonical = match self.canonical_title(page_title).await {
            Ok(Some(title)) => title,
            Ok(None) => {
                debug!(page_title, "No Wikipedia page for title");
                return None;
            }
            Err(e) => {
                warn!(page_title, error = %e, "Title resolution failed");
                return None;
            }
        };

        match self.wikibase_item(&canonical).await {
            Ok(Some(id)) => {
                info!(page_title, canonical = %canonical, entity = %id, "Resolved Wikidata id");
                Some(id)
            }
            Ok(None) => {
                debug!(canonical = %canonical, "Page has no Wikidata item");
                None
            }
            Err(e) => {
                warn!(canonical = %canonical, error = %e, "Entity lookup failed");
                None
            }
        }
    }

    async fn fetch_date_property(
        &self,
        entity_id: &EntityId,
        property: DateProperty,
    ) -> Option<NaiveDate> {
        if let Some(hit) = self.cache.get(entity_id, property) {
            return hit;
        }

        match self.date_claim(entity_id, property).await {
            Ok(value) => {
                if !self.cache.insert(entity_id, property, value) {
                    debug!(entity = %entity_id, "Date cache full, result not cached");
                }
                value
            }
            Err(e) => {
                warn!(entity = %entity_id, %property, error = %e, "Date lookup failed");
                None
            }
        }
    }
}
