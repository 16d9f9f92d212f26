// src/ingest/providers/apify.rs
//! Google News scraper actor on Apify: start a run, wait for it to finish, then page
//! through the run's default dataset.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::send_with_retry;
use crate::config::provider::ProviderSettings;
use crate::ingest::types::{parse_published, NewsProvider, RawArticle};
use crate::record::Region;

const DEFAULT_BASE_URL: &str = "https://api.apify.com";
const PAGE_SIZE: usize = 1000;
/// Apify caps `waitForFinish` at 60 seconds per request.
const WAIT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRun {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

impl ActorRun {
    fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "SUCCEEDED" | "FAILED" | "ABORTED" | "TIMED-OUT"
        )
    }
}

/// One dataset item as the scraper emits it. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    date_utc: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl From<Item> for RawArticle {
    fn from(it: Item) -> Self {
        RawArticle {
            title: it.title.unwrap_or_default(),
            link: it.link.unwrap_or_default(),
            source: it
                .source
                .filter(|s| !s.trim().is_empty())
                .or(it.domain.filter(|s| !s.trim().is_empty())),
            published_at: it.date_utc.as_deref().and_then(parse_published),
            snippet: it.snippet,
        }
    }
}

/// Parse a dataset items page (JSON array).
pub fn parse_items(body: &str) -> Result<Vec<RawArticle>> {
    let items: Vec<Item> = serde_json::from_str(body).context("parsing apify dataset items")?;
    Ok(items.into_iter().map(RawArticle::from).collect())
}

pub struct ApifyProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
    actor_id: String,
    language: String,
    lang_restrict: String,
    max_items: u32,
    time_period: String,
    timeout: Duration,
    max_retries: u8,
}

impl ApifyProvider {
    pub fn from_settings(cfg: &ProviderSettings, client: reqwest::Client) -> Result<Self> {
        if cfg.token.trim().is_empty() || cfg.token.eq_ignore_ascii_case("env") {
            bail!("apify token is not resolved");
        }
        Ok(Self {
            client,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: cfg.token.clone(),
            // "user/actor" is addressed as "user~actor" in the API path.
            actor_id: cfg.actor_id.replace('/', "~"),
            language: cfg.language.clone(),
            lang_restrict: cfg.lang_restrict.clone(),
            max_items: cfg.max_items,
            time_period: cfg.time_period.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs.max(WAIT_SECS)),
            max_retries: cfg.max_retries,
        })
    }

    async fn start_run(&self, query: &str, region: Region) -> Result<ActorRun> {
        let url = format!(
            "{}/v2/acts/{}/runs?waitForFinish={WAIT_SECS}",
            self.base_url, self.actor_id
        );
        let input = serde_json::json!({
            "query": query,
            "cr": region.code(),
            "gl": region.code(),
            "hl": self.language,
            "lr": self.lang_restrict,
            "maxItems": self.max_items,
            "time_period": self.time_period,
        });
        let rsp = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .timeout(Duration::from_secs(WAIT_SECS + 30))
                    .json(&input)
            },
            self.max_retries,
            "apify start run",
        )
        .await?;
        let env: Envelope<ActorRun> = rsp.json().await.context("apify run response")?;
        Ok(env.data)
    }

    async fn wait_run(&self, mut run: ActorRun) -> Result<ActorRun> {
        let deadline = Instant::now() + self.timeout;
        while !run.is_terminal() {
            if Instant::now() >= deadline {
                bail!("apify run {} still {} after {:?}", run.id, run.status, self.timeout);
            }
            let url = format!(
                "{}/v2/actor-runs/{}?waitForFinish={WAIT_SECS}",
                self.base_url, run.id
            );
            let rsp = send_with_retry(
                || {
                    self.client
                        .get(&url)
                        .bearer_auth(&self.token)
                        .timeout(Duration::from_secs(WAIT_SECS + 30))
                },
                self.max_retries,
                "apify poll run",
            )
            .await?;
            let env: Envelope<ActorRun> = rsp.json().await.context("apify poll response")?;
            run = env.data;
        }
        if run.status != "SUCCEEDED" {
            bail!("apify run {} ended with status {}", run.id, run.status);
        }
        Ok(run)
    }

    async fn list_all_items(&self, dataset_id: &str) -> Result<Vec<RawArticle>> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let url = format!(
                "{}/v2/datasets/{dataset_id}/items?format=json&clean=true&offset={offset}&limit={PAGE_SIZE}",
                self.base_url
            );
            let rsp = send_with_retry(
                || self.client.get(&url).bearer_auth(&self.token),
                self.max_retries,
                "apify dataset items",
            )
            .await?;
            let body = rsp.text().await.context("apify items body")?;
            let page = parse_items(&body)?;
            let n = page.len();
            out.extend(page);
            if n < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(out)
    }
}

#[async_trait]
impl NewsProvider for ApifyProvider {
    async fn search(&self, query: &str, region: Region) -> Result<Vec<RawArticle>> {
        let t0 = Instant::now();
        let run = self.start_run(query, region).await?;
        let run = self.wait_run(run).await?;
        let dataset_id = run
            .default_dataset_id
            .ok_or_else(|| anyhow!("apify run {} produced no dataset", run.id))?;
        let items = self.list_all_items(&dataset_id).await?;
        histogram!("collector_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("collector_provider_items_total", "provider" => "apify")
            .increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "apify"
    }
}
