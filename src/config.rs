//! Checker configuration
//!
//! Values come from built-in defaults, optionally overlaid by a YAML file,
//! then by environment variables (after `.env` is loaded by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::knowledge::retry::RetryPolicy;

/// Hard per-call item limit of the batch-write API
pub const STORE_BATCH_WRITE_LIMIT: usize = 25;

pub const DEFAULT_WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = "DeadpoolStatusChecker/1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Pending records fetched per scan page
    pub page_size: usize,
    /// Records enriched and flushed together
    pub sub_batch_size: usize,
    /// Upper bound on records handled by one invocation
    pub max_items_per_invocation: usize,
    /// Soft wall-clock budget per invocation
    pub time_budget_secs: u64,
    pub auto_continue: bool,
    pub max_auto_invocations: u32,
    /// Chunk size for batch writes (never above the store limit)
    pub max_store_batch_size: usize,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub knowledge: KnowledgeConfig,
    pub notify: NotifyConfig,
    /// JSON document backing the local store
    pub table_path: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub user_agent: String,
    pub wikipedia_api_url: String,
    pub wikidata_api_url: String,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub date_cache_capacity: usize,
    /// Also try title-cased name variants when resolving pages
    pub name_variants: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Topic identifier messages are published to
    pub topic: Option<String>,
    /// HTTP endpoint accepting publish requests; log-only when unset
    pub endpoint: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            sub_batch_size: 10,
            max_items_per_invocation: 100,
            time_budget_secs: 240,
            auto_continue: false,
            max_auto_invocations: 10,
            max_store_batch_size: STORE_BATCH_WRITE_LIMIT,
            pacing_min_ms: 500,
            pacing_max_ms: 1500,
            knowledge: KnowledgeConfig::default(),
            notify: NotifyConfig::default(),
            table_path: PathBuf::from("deadpool.json"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            wikipedia_api_url: DEFAULT_WIKIPEDIA_API.to_string(),
            wikidata_api_url: DEFAULT_WIKIDATA_API.to_string(),
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
            date_cache_capacity: 10_000,
            name_variants: false,
        }
    }
}

impl CheckerConfig {
    /// Defaults, then the optional YAML file, then process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid by process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading checker configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Overlay values from an environment lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        set_parsed(&lookup, "SCAN_BATCH_SIZE", &mut self.page_size)?;
        set_parsed(&lookup, "BATCH_SIZE", &mut self.sub_batch_size)?;
        set_parsed(&lookup, "MAX_ITEMS_PER_RUN", &mut self.max_items_per_invocation)?;
        set_parsed(&lookup, "TIME_BUDGET_SECS", &mut self.time_budget_secs)?;
        set_bool(&lookup, "AUTO_CONTINUE", &mut self.auto_continue)?;
        set_parsed(&lookup, "MAX_AUTO_INVOCATIONS", &mut self.max_auto_invocations)?;
        set_parsed(&lookup, "MAX_STORE_BATCH_SIZE", &mut self.max_store_batch_size)?;
        set_parsed(&lookup, "PACING_MIN_MS", &mut self.pacing_min_ms)?;
        set_parsed(&lookup, "PACING_MAX_MS", &mut self.pacing_max_ms)?;

        let k = &mut self.knowledge;
        set_string(&lookup, "USER_AGENT", &mut k.user_agent);
        set_string(&lookup, "WIKIPEDIA_API_URL", &mut k.wikipedia_api_url);
        set_string(&lookup, "WIKIDATA_API_URL", &mut k.wikidata_api_url);
        set_parsed(&lookup, "REQUEST_TIMEOUT_SECS", &mut k.request_timeout_secs)?;
        set_parsed(&lookup, "MAX_RETRIES", &mut k.retry.max_retries)?;
        set_parsed(&lookup, "RETRY_BASE_MS", &mut k.retry.base_delay_ms)?;
        set_parsed(&lookup, "RETRY_MAX_MS", &mut k.retry.max_delay_ms)?;
        set_parsed(&lookup, "DATE_CACHE_CAPACITY", &mut k.date_cache_capacity)?;
        set_bool(&lookup, "NAME_VARIANTS", &mut k.name_variants)?;

        if let Some(topic) = lookup("SNS_TOPIC_ARN").filter(|v| !v.is_empty()) {
            self.notify.topic = Some(topic);
        }
        if let Some(endpoint) = lookup("NOTIFY_ENDPOINT").filter(|v| !v.is_empty()) {
            self.notify.endpoint = Some(endpoint);
        }
        if let Some(path) = lookup("TABLE_PATH").filter(|v| !v.is_empty()) {
            self.table_path = PathBuf::from(path);
        }
        set_string(&lookup, "LOG_LEVEL", &mut self.log_level);
        Ok(())
    }

    /// Reject unusable values; clamp the batch-write size to the store limit
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("page_size", self.page_size),
            ("sub_batch_size", self.sub_batch_size),
            ("max_items_per_invocation", self.max_items_per_invocation),
            ("max_store_batch_size", self.max_store_batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.max_store_batch_size > STORE_BATCH_WRITE_LIMIT {
            warn!(
                requested = self.max_store_batch_size,
                limit = STORE_BATCH_WRITE_LIMIT,
                "Clamping batch-write size to store limit"
            );
            self.max_store_batch_size = STORE_BATCH_WRITE_LIMIT;
        }
        if self.pacing_min_ms > self.pacing_max_ms {
            return Err(ConfigError::Invalid(format!(
                "pacing_min_ms ({}) exceeds pacing_max_ms ({})",
                self.pacing_min_ms, self.pacing_max_ms
            )));
        }
        if self.knowledge.retry.base_delay_ms > self.knowledge.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry base delay exceeds max delay".to_string(),
            ));
        }
        url::Url::parse(&self.knowledge.wikipedia_api_url).map_err(|_| {
            ConfigError::InvalidValue {
                key: "WIKIPEDIA_API_URL".to_string(),
                value: self.knowledge.wikipedia_api_url.clone(),
            }
        })?;
        url::Url::parse(&self.knowledge.wikidata_api_url).map_err(|_| {
            ConfigError::InvalidValue {
                key: "WIKIDATA_API_URL".to_string(),
                value: self.knowledge.wikidata_api_url.clone(),
            }
        })?;
        Ok(())
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    /// Records requested from one scan
    pub fn fetch_limit(&self) -> usize {
        self.page_size.min(self.max_items_per_invocation)
    }
}

impl KnowledgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn set_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &F, key: &str, slot: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                })
            }
        };
    }
    Ok(())
}

fn set_string<F>(lookup: &F, key: &str, slot: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) {
        *slot = raw;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = CheckerConfig::default();
        config
            .apply_env_with(env(&[
                ("BATCH_SIZE", "5"),
                ("MAX_ITEMS_PER_RUN", "100"),
                ("SCAN_BATCH_SIZE", "50"),
                ("AUTO_CONTINUE", "true"),
                ("USER_AGENT", "Tester/0.1"),
                ("SNS_TOPIC_ARN", "arn:aws:sns:us-east-1:1:deaths"),
            ]))
            .unwrap();
        assert_eq!(config.sub_batch_size, 5);
        assert_eq!(config.page_size, 50);
        assert!(config.auto_continue);
        assert_eq!(config.knowledge.user_agent, "Tester/0.1");
        assert_eq!(
            config.notify.topic.as_deref(),
            Some("arn:aws:sns:us-east-1:1:deaths")
        );
        assert_eq!(config.fetch_limit(), 50);
    }

    #[test]
    fn bad_number_is_reported_with_key() {
        let mut config = CheckerConfig::default();
        let err = config
            .apply_env_with(env(&[("BATCH_SIZE", "ten")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for BATCH_SIZE: \"ten\"");
    }

    #[test]
    fn validate_clamps_batch_write_size() {
        let mut config = CheckerConfig {
            max_store_batch_size: 100,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.max_store_batch_size, STORE_BATCH_WRITE_LIMIT);
    }

    #[test]
    fn validate_rejects_zero_sizes_and_inverted_pacing() {
        let mut zero = CheckerConfig {
            sub_batch_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let mut inverted = CheckerConfig {
            pacing_min_ms: 10,
            pacing_max_ms: 5,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn yaml_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "page_size: 100\nknowledge:\n  retry:\n    max_retries: 2\nnotify:\n  topic: deaths"
        )
        .unwrap();
        let config = CheckerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.sub_batch_size, 10);
        assert_eq!(config.knowledge.retry.max_retries, 2);
        assert_eq!(config.knowledge.retry.base_delay_ms, 1000);
        assert_eq!(config.notify.topic.as_deref(), Some("deaths"));
    }
}
