use agentflow::memory::{EntryContent, EntryKind, MemoryConfig, MemoryStore, NewEntry};
use agentflow::mode::AgentMode;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn store_at(path: &PathBuf, config: MemoryConfig) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(path, config))
}

fn text_entry(agent_id: &str, content: &str, tags: &[&str]) -> NewEntry {
    NewEntry {
        agent_id: agent_id.to_string(),
        kind: EntryKind::Result,
        content: EntryContent::Text(content.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn store_flush_reload_search_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");

    let store = store_at(&path, MemoryConfig::default());
    store.initialize().await;
    let written = store
        .store(text_entry("A1", "Persistent data", &["test"]))
        .await;
    store.flush().await;

    // Fresh store over the same file.
    let reloaded = store_at(&path, MemoryConfig::default());
    reloaded.initialize().await;

    let hits = reloaded.search("Persistent data", None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, written.id);
    assert_eq!(hits[0].content, EntryContent::Text("Persistent data".into()));
    assert_eq!(hits[0].timestamp, written.timestamp);
}

#[tokio::test]
async fn context_summaries_truncate_long_content() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());

    store
        .store(text_entry("A1", &"A".repeat(300), &["coder"]))
        .await;

    let context = store.get_context(AgentMode::Coder).await;
    assert_eq!(context.len(), 1);
    let summary = &context[0].summary;
    assert!(summary.chars().count() <= 203);
    assert!(summary.ends_with("..."));
}

#[tokio::test]
async fn context_is_newest_first_and_capped_at_ten() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());

    for i in 0..12 {
        store
            .store(text_entry("A1", &format!("entry {}", i), &["tester"]))
            .await;
    }

    let context = store.get_context(AgentMode::Tester).await;
    assert_eq!(context.len(), 10);
    assert_eq!(context[0].summary, "entry 11");
    assert_eq!(context[9].summary, "entry 2");
}

#[tokio::test]
async fn context_for_unseen_mode_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());
    store.store(text_entry("A1", "something", &["coder"])).await;

    assert!(store.get_context(AgentMode::Security).await.is_empty());
}

#[tokio::test]
async fn search_is_case_insensitive_and_honors_tags() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());

    store
        .store(text_entry("A1", "The Parser Design", &["architect"]))
        .await;
    store
        .store(text_entry("A2", "parser implementation", &["coder"]))
        .await;

    assert_eq!(store.search("PARSER", None).await.len(), 2);

    let tagged = store
        .search("parser", Some(&["coder".to_string()]))
        .await;
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].agent_id, "A2");
}

#[tokio::test]
async fn search_results_come_back_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());

    for (agent, text) in [("A1", "needle one"), ("A2", "needle two"), ("A1", "needle three")] {
        store.store(text_entry(agent, text, &["x"])).await;
    }

    let hits = store.search("needle", None).await;
    let texts: Vec<String> = hits.iter().map(|e| e.content.render()).collect();
    assert_eq!(texts, vec!["needle one", "needle two", "needle three"]);
}

#[tokio::test]
async fn empty_query_matches_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());
    store.store(text_entry("A1", "anything", &["x"])).await;

    assert!(store.search("", None).await.is_empty());
}

#[tokio::test]
async fn structured_content_is_searchable_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");

    let store = store_at(&path, MemoryConfig::default());
    store
        .store(NewEntry {
            agent_id: "A1".into(),
            kind: EntryKind::Knowledge,
            content: EntryContent::Structured(serde_json::json!({"finding": "latency spike"})),
            tags: vec!["monitor".into()],
        })
        .await;
    store.flush().await;

    let reloaded = store_at(&path, MemoryConfig::default());
    reloaded.initialize().await;

    let hits = reloaded.search("latency spike", None).await;
    assert_eq!(hits.len(), 1);
    assert!(matches!(hits[0].content, EntryContent::Structured(_)));
}

#[tokio::test]
async fn missing_file_initializes_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("never_written.json"), MemoryConfig::default());
    store.initialize().await;

    assert_eq!(store.total_entries().await, 0);
}

#[tokio::test]
async fn malformed_file_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");
    tokio::fs::write(&path, "{ this is not json ]").await.unwrap();

    let store = store_at(&path, MemoryConfig::default());
    store.initialize().await;
    assert_eq!(store.total_entries().await, 0);

    // The store still works after the bad load.
    store.store(text_entry("A1", "fresh start", &["x"])).await;
    assert_eq!(store.search("fresh", None).await.len(), 1);
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");

    let store = store_at(&path, MemoryConfig::default());
    store.store(text_entry("A1", "kept", &["x"])).await;
    store.flush().await;

    let reloaded = store_at(&path, MemoryConfig::default());
    reloaded.initialize().await;
    reloaded.initialize().await;
    assert_eq!(reloaded.total_entries().await, 1);
}

#[tokio::test]
async fn timestamps_strictly_increase_within_an_agent() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("memory.json"), MemoryConfig::default());

    let mut previous = None;
    for i in 0..20 {
        let entry = store
            .store(text_entry("A1", &format!("entry {}", i), &["x"]))
            .await;
        if let Some(prev) = previous {
            assert!(entry.timestamp > prev);
        }
        previous = Some(entry.timestamp);
    }
}

#[tokio::test]
async fn soft_cap_evicts_oldest_entries_first() {
    let dir = TempDir::new().unwrap();
    let store = store_at(
        &dir.path().join("memory.json"),
        MemoryConfig {
            soft_max_entries: 1_000,
            ..MemoryConfig::default()
        },
    );

    for i in 0..1_000 {
        store.store(text_entry("A1", &format!("entry {}", i), &["x"])).await;
    }
    // At the cap: nothing evicted yet.
    assert_eq!(store.total_entries().await, 1_000);

    store.store(text_entry("A1", "entry 1000", &["x"])).await;

    // One over the cap triggered eviction of the oldest entry.
    assert_eq!(store.total_entries().await, 1_000);
    assert!(store.search("entry 0", None).await.is_empty());
    assert_eq!(store.search("entry 1000", None).await.len(), 1);
}

#[tokio::test]
async fn aged_out_entries_are_evicted_on_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memory.json");

    // Hand-write a file holding an entry far older than the age cap.
    let stale = serde_json::json!({
        "old-agent": [{
            "id": "deadbeefdeadbeef",
            "agent_id": "old-agent",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "result",
            "content": "ancient result",
            "tags": ["coder"]
        }]
    });
    tokio::fs::write(&path, serde_json::to_string(&stale).unwrap())
        .await
        .unwrap();

    let store = store_at(&path, MemoryConfig::default());
    store.initialize().await;
    assert_eq!(store.search("ancient", None).await.len(), 1);

    store.store(text_entry("A1", "new result", &["coder"])).await;

    assert!(store.search("ancient", None).await.is_empty());
    assert_eq!(store.search("new result", None).await.len(), 1);
}
