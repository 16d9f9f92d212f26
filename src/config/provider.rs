// src/config/provider.rs
use serde::{Deserialize, Serialize};

fn default_actor_id() -> String {
    "easyapi/google-news-scraper".to_string()
}
fn default_token() -> String {
    "ENV".to_string()
}
fn default_language() -> String {
    "es-419".to_string()
}
fn default_lang_restrict() -> String {
    "lang_es".to_string()
}
fn default_max_items() -> u32 {
    5000
}
fn default_time_period() -> String {
    "last_hour".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u8 {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google News scraper actor on Apify.
    #[default]
    Apify,
    /// Google News RSS search feed.
    GoogleRss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,
    /// Apify API token. "ENV" means: read from APIFY_TOKEN.
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default = "default_actor_id")]
    pub actor_id: String,
    /// Interface language (`hl`), e.g. "es-419".
    #[serde(default = "default_language")]
    pub language: String,
    /// Result language restriction (`lr`), Apify only.
    #[serde(default = "default_lang_restrict")]
    pub lang_restrict: String,
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// "last_hour" | "last_day" | "last_week" ...
    #[serde(default = "default_time_period")]
    pub time_period: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Override the API base URL (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            token: default_token(),
            actor_id: default_actor_id(),
            language: default_language(),
            lang_restrict: default_lang_restrict(),
            max_items: default_max_items(),
            time_period: default_time_period(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_url: None,
        }
    }
}
