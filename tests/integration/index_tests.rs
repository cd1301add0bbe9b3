//! Dataset index, crawl history and management flows on disk

use crate::common::ScriptedChat;
use chrono::Utc;
use crawl_agent::commands::{extract_keywords, run_manage, ManageOutcome};
use crawl_agent::gateway::DecisionGateway;
use crawl_agent::storage::{canonical_path, dataset_id, CrawlHistory, FileRecord, StorageError};
use crawl_agent::{DatasetEntry, DatasetIndex, JsonIndexStore};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn entry(local_path: &Path, name: &str, description: &str) -> DatasetEntry {
    DatasetEntry {
        id: dataset_id(local_path),
        name: name.to_string(),
        source_url: "https://snap.stanford.edu/data/".to_string(),
        local_path: local_path.to_path_buf(),
        description: description.to_string(),
        properties: Default::default(),
        tags: ["snap.stanford.edu".to_string()].into_iter().collect(),
        crawl_time: Utc::now(),
        files: vec![FileRecord {
            name: "edges.txt.gz".to_string(),
            size: 42,
        }],
    }
}

#[test]
fn test_index_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");

    let mut writer = JsonIndexStore::new(path.clone());
    writer
        .add(entry(Path::new("data/datasets/snap/dblp"), "com-DBLP", ""))
        .unwrap();
    writer
        .add(entry(Path::new("data/datasets/snap/amazon"), "com-Amazon", ""))
        .unwrap();

    let reader = JsonIndexStore::new(path.clone());
    let names: Vec<String> = reader.get_all().unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["com-DBLP", "com-Amazon"]);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["datasets"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_duplicate_add_rejected() {
    let dir = TempDir::new().unwrap();
    let mut index = JsonIndexStore::new(dir.path().join("index.json"));
    let dblp = entry(Path::new("data/datasets/snap/dblp"), "com-DBLP", "");

    index.add(dblp.clone()).unwrap();
    assert!(matches!(index.add(dblp), Err(StorageError::DuplicateId(_))));
    assert_eq!(index.get_all().unwrap().len(), 1);
}

#[test]
fn test_search_ranks_name_over_description() {
    let dir = TempDir::new().unwrap();
    let mut index = JsonIndexStore::new(dir.path().join("index.json"));

    index
        .add(entry(
            Path::new("data/datasets/snap/coauthor"),
            "Coauthorship",
            "derived from dblp records",
        ))
        .unwrap();
    index
        .add(entry(
            Path::new("data/datasets/snap/dblp"),
            "com-DBLP",
            "collaboration network",
        ))
        .unwrap();
    index
        .add(entry(Path::new("data/datasets/snap/roads"), "roadNet-CA", "roads"))
        .unwrap();

    let keywords = extract_keywords("How many nodes does DBLP have?");
    let first: Vec<String> = index.search(&keywords).unwrap().into_iter().map(|d| d.name).collect();
    let second: Vec<String> = index.search(&keywords).unwrap().into_iter().map(|d| d.name).collect();

    assert_eq!(first, vec!["com-DBLP", "Coauthorship"]);
    assert_eq!(first, second);
}

#[test]
fn test_corrupt_index_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, "{\"datasets\": [").unwrap();

    let index = JsonIndexStore::new(path);
    assert!(matches!(index.get_all(), Err(StorageError::Corrupt { .. })));
}

#[test]
fn test_history_accumulates_across_sessions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crawl_history.json");

    let mut first = CrawlHistory::load(&path).unwrap();
    assert!(first.visited_urls.is_empty());
    first.merge(["https://example.com/a".to_string()]);
    first.save(&path).unwrap();

    let mut second = CrawlHistory::load(&path).unwrap();
    second.merge([
        "https://example.com/a".to_string(),
        "https://example.com/b".to_string(),
    ]);
    second.save(&path).unwrap();

    let reloaded = CrawlHistory::load(&path).unwrap();
    assert_eq!(reloaded.visited_urls.len(), 2);
    assert!(reloaded.last_updated.is_some());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["visited_urls"].is_array());
    assert!(raw["last_updated"].is_string());
}

#[tokio::test]
async fn test_manage_move_keeps_index_in_step() {
    let dir = TempDir::new().unwrap();
    let datasets = dir.path().join("datasets");
    let dblp_dir = datasets.join("snap").join("dblp");
    std::fs::create_dir_all(&dblp_dir).unwrap();
    std::fs::write(dblp_dir.join("edges.txt.gz"), [0u8; 42]).unwrap();

    let mut index = JsonIndexStore::new(dir.path().join("index.json"));
    index.add(entry(&dblp_dir, "com-DBLP", "")).unwrap();

    let chat = ScriptedChat::new(json!({
        "action": "move",
        "source": datasets.join("snap").display().to_string(),
        "target": datasets.join("archive").display().to_string(),
    }));
    let gateway = DecisionGateway::new(Box::new(chat));

    let outcome = run_manage(
        &gateway,
        &mut index,
        &datasets,
        "move the snap data into archive",
        &mut |_: &str| true,
    )
    .await
    .unwrap();

    assert!(matches!(outcome, ManageOutcome::Moved { reindexed: 1, .. }));

    let moved: PathBuf = datasets.join("archive").join("dblp");
    assert!(moved.join("edges.txt.gz").exists());
    assert!(!dblp_dir.exists());

    let stored = index.get_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].local_path, canonical_path(&moved));
    assert_eq!(index.find_by_path(&datasets.join("archive")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_manage_delete_removes_entries() {
    let dir = TempDir::new().unwrap();
    let datasets = dir.path().join("datasets");
    let dblp_dir = datasets.join("snap").join("dblp");
    std::fs::create_dir_all(&dblp_dir).unwrap();
    std::fs::write(dblp_dir.join("edges.txt.gz"), "x").unwrap();

    let mut index = JsonIndexStore::new(dir.path().join("index.json"));
    index.add(entry(&dblp_dir, "com-DBLP", "")).unwrap();

    let chat = ScriptedChat::new(json!({"action": "delete", "source": "snap"}));
    let gateway = DecisionGateway::new(Box::new(chat));

    let outcome = run_manage(&gateway, &mut index, &datasets, "delete snap", &mut |_: &str| true)
        .await
        .unwrap();

    assert!(matches!(outcome, ManageOutcome::Deleted { unindexed: 1, .. }));
    assert!(!datasets.join("snap").exists());
    assert!(index.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_manage_delete_through_dot_segments() {
    let dir = TempDir::new().unwrap();
    let datasets = dir.path().join("datasets");
    let dblp_dir = datasets.join("snap").join("dblp");
    let roads_dir = datasets.join("snap").join("roads");
    for path in [&dblp_dir, &roads_dir] {
        std::fs::create_dir_all(path).unwrap();
        std::fs::write(path.join("edges.txt.gz"), "x").unwrap();
    }

    let mut index = JsonIndexStore::new(dir.path().join("index.json"));
    index.add(entry(&dblp_dir, "com-DBLP", "")).unwrap();
    index.add(entry(&roads_dir, "roadNet-CA", "")).unwrap();

    let spelled = datasets.join("snap").join("..").join("snap").join("dblp");
    let chat = ScriptedChat::new(json!({
        "action": "delete",
        "source": spelled.display().to_string(),
    }));
    let gateway = DecisionGateway::new(Box::new(chat));

    let outcome = run_manage(&gateway, &mut index, &datasets, "delete dblp", &mut |_: &str| true)
        .await
        .unwrap();

    assert!(matches!(outcome, ManageOutcome::Deleted { unindexed: 1, .. }));
    assert!(!dblp_dir.exists());
    let names: Vec<String> = index.get_all().unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["roadNet-CA"]);
}

#[tokio::test]
async fn test_manage_refuses_paths_outside_datasets() {
    let dir = TempDir::new().unwrap();
    let datasets = dir.path().join("datasets");
    std::fs::create_dir_all(datasets.join("snap")).unwrap();
    let notes = dir.path().join("notes");
    std::fs::create_dir_all(&notes).unwrap();

    let mut index = JsonIndexStore::new(dir.path().join("index.json"));
    let chat = ScriptedChat::new(json!({
        "action": "delete",
        "source": notes.display().to_string(),
    }));
    let gateway = DecisionGateway::new(Box::new(chat));

    let result =
        run_manage(&gateway, &mut index, &datasets, "delete my notes", &mut |_: &str| true).await;

    assert!(matches!(result, Err(crawl_agent::AgentError::Manage(_))));
    assert!(notes.exists());
}
