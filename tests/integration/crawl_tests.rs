//! End-to-end crawl tests
//!
//! These tests use wiremock to serve a small site and run the coordinator
//! with the real HTTP fetcher and JSON index.

use crate::common::{follow_only, test_config, ScriptedChat};
use async_trait::async_trait;
use crawl_agent::config::Config;
use crawl_agent::crawler::{CrawlOptions, FetchError, PageFetcher};
use crawl_agent::gateway::{CrawlIntent, DecisionGateway};
use crawl_agent::storage::{CrawlHistory, FileRecord};
use crawl_agent::{normalize_url, CancelFlag, Coordinator, CrawlPhase, DatasetIndex, JsonIndexStore};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAMPLE_CSV: &str = "source,target\n1,2\n2,3\n3,1\n";

const ROOT_HTML: &str = r#"<html><head><title>Data</title></head><body>
<nav><a href="/nav-only">Navigation</a></nav>
<main>
  <h1>Root catalog</h1>
  <p>A sample graph with 100 nodes.</p>
  <a href="/files/sample.csv">sample.csv</a>
  <a href="/data/more">More datasets</a>
</main>
</body></html>"#;

const MORE_HTML: &str = r#"<html><body><main>
  <h1>More datasets page</h1>
  <a href="/data/deeper">Even more</a>
</main></body></html>"#;

/// Serves `/data`, `/data/more` and `/files/sample.csv`; `/data/deeper`
/// must never be requested
async fn start_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ROOT_HTML, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/more"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(MORE_HTML, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/deeper"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>deep</p>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/sample.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SAMPLE_CSV, "text/csv"))
        .mount(&server)
        .await;

    server
}

/// Chat script for the mock site: the root offers `sample.csv` and follows
/// `/data/more`, which in turn asks to follow `/data/deeper`
fn site_chat(base: &str, max_depth: u32) -> ScriptedChat {
    ScriptedChat::new(json!({
        "url": format!("{}/data", base),
        "criteria": "csv graph data",
        "max_depth": max_depth,
    }))
    .route(
        "Root catalog",
        json!({
            "resources": [{
                "name": "Sample",
                "description": "A sample graph",
                "download_urls": [format!("{}/files/sample.csv", base)],
                "properties": {"nodes": 100}
            }],
            "follow_links": [format!("{}/data/more", base)]
        }),
    )
    .route(
        "More datasets page",
        follow_only(&[format!("{}/data/deeper", base)]),
    )
}

fn coordinator(config: &Config, chat: &ScriptedChat) -> Coordinator {
    Coordinator::from_config(config, Box::new(chat.clone()), CancelFlag::new())
        .expect("Failed to build coordinator")
}

fn history(config: &Config) -> CrawlHistory {
    CrawlHistory::load(&config.storage.history_path).expect("Failed to load history")
}

fn normalized(url: &str) -> String {
    normalize_url(url).expect("Failed to normalize URL")
}

#[tokio::test]
async fn test_crawl_downloads_sample_dataset() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let summary = coordinator(&config, &site_chat(&base, 1))
        .run("get the csv graph data from the example site, depth 1")
        .await
        .expect("Crawl failed");

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.resources_found, 1);
    assert_eq!(summary.resources_downloaded, 1);
    assert_eq!(summary.datasets_added, 1);
    assert!(!summary.interrupted);
    assert!(summary.errors.is_empty(), "errors: {:?}", summary.errors);

    let index = JsonIndexStore::new(config.storage.index_path.clone());
    let datasets = index.get_all().unwrap();
    assert_eq!(datasets.len(), 1);

    let dataset = &datasets[0];
    assert_eq!(dataset.name, "Sample");
    assert_eq!(dataset.properties["nodes"], 100);
    assert_eq!(
        dataset.files,
        vec![FileRecord {
            name: "sample.csv".to_string(),
            size: SAMPLE_CSV.len() as u64,
        }]
    );
    assert_eq!(dataset.source_url, format!("{}/data", base));
    assert!(dataset.local_path.starts_with(&config.storage.datasets_dir));

    let downloaded = std::fs::read_to_string(dataset.local_path.join("sample.csv")).unwrap();
    assert_eq!(downloaded, SAMPLE_CSV);

    let sidecar: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dataset.local_path.join("meta.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(sidecar["properties"]["nodes"], 100);
}

#[tokio::test]
async fn test_depth_bound_is_respected() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    // /data/more is at depth 1 == max_depth; its follow link is never queued
    coordinator(&config, &site_chat(&base, 1))
        .run("crawl example")
        .await
        .unwrap();

    let visited = history(&config).visited_urls;
    assert!(visited.contains(&normalized(&format!("{}/data/more", base))));
    assert!(!visited.contains(&normalized(&format!("{}/data/deeper", base))));
    // the wiremock expectation on /data/deeper is verified when the server drops
}

#[tokio::test]
async fn test_depth_zero_fetches_only_root() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let summary = coordinator(&config, &site_chat(&base, 0))
        .run("only the landing page")
        .await
        .unwrap();

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.datasets_added, 1);
    assert_eq!(history(&config).visited_urls.len(), 1);
}

#[tokio::test]
async fn test_repeated_crawl_is_idempotent() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let chat = site_chat(&base, 1);

    coordinator(&config, &chat).run("crawl example").await.unwrap();
    let first_visited = history(&config).visited_urls;
    let index = JsonIndexStore::new(config.storage.index_path.clone());
    let first_ids: Vec<String> = index.get_all().unwrap().into_iter().map(|d| d.id).collect();

    let second = coordinator(&config, &chat).run("crawl example").await.unwrap();

    // everything was visited in the first session, so nothing is refetched
    assert_eq!(second.pages_visited, 0);
    assert_eq!(history(&config).visited_urls, first_visited);

    let second_ids: Vec<String> = index.get_all().unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(second_ids, first_ids);
}

#[tokio::test]
async fn test_recrawl_after_history_reset_updates_entry() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let chat = site_chat(&base, 1);

    let first = coordinator(&config, &chat).run("crawl example").await.unwrap();
    assert_eq!(first.datasets_added, 1);

    // forgetting the visited set makes the next session fetch the same pages
    std::fs::remove_file(&config.storage.history_path).unwrap();

    let second = coordinator(&config, &chat).run("crawl example").await.unwrap();
    assert_eq!(second.pages_visited, 2);
    assert_eq!(second.resources_found, 1);
    assert_eq!(second.datasets_added, 0);
    assert_eq!(second.datasets_updated, 1);
    assert!(second.errors.is_empty(), "errors: {:?}", second.errors);

    let index = JsonIndexStore::new(config.storage.index_path.clone());
    let datasets = index.get_all().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].name, "Sample");
}

#[tokio::test]
async fn test_unoffered_follow_links_are_dropped() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let chat = ScriptedChat::new(json!({"url": format!("{}/data", base), "max_depth": 2}))
        .route(
            "Root catalog",
            follow_only(&[
                format!("{}/data/more/", base),
                "https://elsewhere.example.org/data".to_string(),
            ]),
        )
        .route("More datasets page", follow_only(&[]));

    let summary = coordinator(&config, &chat).run("crawl").await.unwrap();

    assert_eq!(summary.pages_visited, 2);
    let visited = history(&config).visited_urls;
    assert!(visited.contains(&normalized(&format!("{}/data/more", base))));
    assert!(!visited
        .iter()
        .any(|u| u.contains("elsewhere.example.org")));
}

#[tokio::test]
async fn test_malformed_analysis_is_retried_once() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let valid = json!({
        "resources": [{
            "name": "Sample",
            "download_urls": [format!("{}/files/sample.csv", base)]
        }],
        "follow_links": []
    });
    let chat = ScriptedChat::new(json!({"url": format!("{}/data", base), "max_depth": 1}))
        .route_raw(
            "Root catalog",
            vec!["Sorry, here is my answer: resources are none".to_string(), valid.to_string()],
        );

    let summary = coordinator(&config, &chat).run("crawl").await.unwrap();
    assert_eq!(summary.datasets_added, 1);

    let root_prompts: Vec<String> = chat
        .analysis_prompts()
        .into_iter()
        .filter(|p| p.contains("Root catalog"))
        .collect();
    assert_eq!(root_prompts.len(), 2);
    assert_eq!(root_prompts[0], root_prompts[1]);
}

#[tokio::test]
async fn test_twice_malformed_analysis_skips_page() {
    let server = start_site().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let chat = ScriptedChat::new(json!({"url": format!("{}/data", base), "max_depth": 1}))
        .route_raw("Root catalog", vec!["not json at all".to_string()]);

    let summary = coordinator(&config, &chat).run("crawl").await.unwrap();

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.datasets_added, 0);
    assert!(summary.errors.iter().any(|e| e.starts_with("analyze")));
    // the page still counts as visited
    assert!(history(&config)
        .visited_urls
        .contains(&normalized(&format!("{}/data", base))));
}

#[tokio::test]
async fn test_failed_fetch_does_not_stop_session() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<main><h1>Root catalog</h1><a href="/gone">Gone</a><a href="/ok">Ok</a></main>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>fine</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let chat = ScriptedChat::new(json!({"url": format!("{}/data", base), "max_depth": 1}))
        .route(
            "Root catalog",
            follow_only(&[format!("{}/gone", base), format!("{}/ok", base)]),
        );

    let summary = coordinator(&config, &chat).run("crawl").await.unwrap();

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("fetch"));
}

/// In-memory site that raises the cancel flag once `cancel_after` pages
/// have been fetched
struct CancellingFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<usize>,
    cancel_after: usize,
    cancel: CancelFlag,
}

#[async_trait]
impl PageFetcher for CancellingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut fetched = self.fetched.lock().unwrap();
        *fetched += 1;
        if *fetched >= self.cancel_after {
            self.cancel.cancel();
        }

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        std::fs::write(dest, url).map_err(|source| FetchError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        Ok(url.len() as u64)
    }
}

#[tokio::test]
async fn test_interrupt_persists_progress() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let cancel = CancelFlag::new();

    let children: Vec<String> = (1..=5).map(|i| format!("https://example.com/p{}", i)).collect();
    let mut root_html = String::from("<main><h1>Root catalog</h1>");
    for (i, child) in children.iter().enumerate() {
        root_html.push_str(&format!("<a href=\"{}\">page {}</a>", child, i + 1));
    }
    root_html.push_str("</main>");

    let mut pages = HashMap::new();
    pages.insert("https://example.com/data".to_string(), root_html);
    for (i, child) in children.iter().enumerate() {
        pages.insert(child.clone(), format!("<main><h1>Child {}</h1></main>", i + 1));
    }

    let fetcher = CancellingFetcher {
        pages,
        fetched: Mutex::new(0),
        cancel_after: 3,
        cancel: cancel.clone(),
    };

    let chat = ScriptedChat::new(json!({})).route(
        "Root catalog",
        json!({
            "resources": [{
                "name": "Early",
                "download_urls": ["https://example.com/files/early.csv"]
            }],
            "follow_links": children
        }),
    );

    let mut coordinator = Coordinator::new(
        Box::new(fetcher),
        DecisionGateway::new(Box::new(chat)),
        Box::new(JsonIndexStore::new(config.storage.index_path.clone())),
        CrawlOptions::from_config(&config),
        cancel,
    );

    let summary = coordinator
        .run_intent(CrawlIntent {
            url: "https://example.com/data".to_string(),
            save_path: config.storage.datasets_dir.join("example"),
            criteria: "all datasets".to_string(),
            max_depth: 1,
        })
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.pages_visited, 3);
    assert_eq!(coordinator.phase(), CrawlPhase::Done);

    let visited = history(&config).visited_urls;
    assert_eq!(visited.len(), 3);
    for url in ["https://example.com/data", "https://example.com/p1", "https://example.com/p2"] {
        assert!(visited.contains(&normalized(url)), "missing {}", url);
    }

    // resources found before the interrupt are committed
    let index = JsonIndexStore::new(config.storage.index_path.clone());
    let datasets = index.get_all().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].name, "Early");
}
