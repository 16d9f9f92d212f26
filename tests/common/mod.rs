// tests/common/mod.rs
// Local HTTP doubles for the provider APIs, served by mockito.
#![allow(dead_code)]

use mockito::{Matcher, Mock, ServerGuard};

use news_digest::config::provider::{ProviderKind, ProviderSettings};
use news_digest::ingest::providers::apify::ApifyProvider;
use news_digest::ingest::providers::google_rss::GoogleRssProvider;

pub const RUN_ID: &str = "run-1";
pub const DATASET_ID: &str = "ds-1";

pub fn provider_settings(server: &ServerGuard, kind: ProviderKind) -> ProviderSettings {
    ProviderSettings {
        kind,
        token: "test-token".into(),
        base_url: Some(server.url()),
        max_retries: 3,
        ..ProviderSettings::default()
    }
}

pub fn apify(server: &ServerGuard) -> ApifyProvider {
    ApifyProvider::from_settings(
        &provider_settings(server, ProviderKind::Apify),
        reqwest::Client::new(),
    )
    .expect("token is set")
}

pub fn google_rss(server: &ServerGuard) -> GoogleRssProvider {
    GoogleRssProvider::from_settings(
        &provider_settings(server, ProviderKind::GoogleRss),
        reqwest::Client::new(),
    )
}

/// `{"data": ActorRun}` as returned by the start and poll endpoints.
pub fn run_body(status: &str) -> String {
    serde_json::json!({
        "data": { "id": RUN_ID, "status": status, "defaultDatasetId": DATASET_ID }
    })
    .to_string()
}

fn json_mock(mock: Mock, status: usize, body: &str) -> Mock {
    mock.with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
}

/// `POST /v2/acts/{actor}/runs`
pub fn start_run(server: &mut ServerGuard, status: usize, body: &str) -> Mock {
    let m = server
        .mock("POST", Matcher::Regex(r"^/v2/acts/[^/]+/runs".into()))
        .match_query(Matcher::Any);
    json_mock(m, status, body)
}

/// `GET /v2/actor-runs/{id}`
pub fn poll_run(server: &mut ServerGuard, run_status: &str) -> Mock {
    let m = server
        .mock("GET", Matcher::Regex(format!("^/v2/actor-runs/{RUN_ID}")))
        .match_query(Matcher::Any);
    json_mock(m, 200, &run_body(run_status))
}

/// `GET /v2/datasets/{id}/items`, any page.
pub fn dataset_items(server: &mut ServerGuard, body: &str) -> Mock {
    let m = server
        .mock("GET", Matcher::Regex(format!("^/v2/datasets/{DATASET_ID}/items")))
        .match_query(Matcher::Any);
    json_mock(m, 200, body)
}

/// `GET /v2/datasets/{id}/items` for one `offset`.
pub fn dataset_page(server: &mut ServerGuard, offset: usize, body: &str) -> Mock {
    let m = server
        .mock("GET", Matcher::Regex(format!("^/v2/datasets/{DATASET_ID}/items")))
        .match_query(Matcher::UrlEncoded("offset".into(), offset.to_string()));
    json_mock(m, 200, body)
}

/// A finished run whose dataset holds `items_json`, for every region.
pub async fn serve_apify_items(server: &mut ServerGuard, items_json: &str) -> (Mock, Mock) {
    let start = start_run(server, 201, &run_body("SUCCEEDED"))
        .create_async()
        .await;
    let items = dataset_items(server, items_json).create_async().await;
    (start, items)
}

/// `GET /rss/search` answering `xml` for every query.
pub async fn serve_google_rss(server: &mut ServerGuard, xml: &str) -> Mock {
    server
        .mock("GET", Matcher::Regex("^/rss/search".into()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/rss+xml; charset=utf-8")
        .with_body(xml)
        .create_async()
        .await
}
