//! Persistence round-trips through a real temporary directory.

use starling::{EntryKind, MemoryConfig, MemoryStore, NewEntry};
use tempfile::tempdir;

fn new_entry(agent_id: &str, content: &str, tags: &[&str]) -> NewEntry {
    NewEntry {
        agent_id: agent_id.to_string(),
        kind: EntryKind::Result,
        content: content.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn stored_entries_survive_a_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");

    let store = MemoryStore::new(MemoryConfig::new(&path));
    store.initialize().await;
    let written = store
        .store(new_entry("A1", "Persistent data", &["test"]))
        .await;
    store.flush().await.unwrap();

    let reloaded = MemoryStore::new(MemoryConfig::new(&path));
    reloaded.initialize().await;

    let hits = reloaded.search("Persistent data", None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, written.id);
    assert_eq!(hits[0].agent_id, "A1");
    assert_eq!(hits[0].content.render(), "Persistent data");
    assert_eq!(hits[0].timestamp, written.timestamp);
    assert_eq!(hits[0].kind, EntryKind::Result);
    assert!(hits[0].has_tag("test"));
}

#[tokio::test]
async fn file_is_created_on_first_flush_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");

    let store = MemoryStore::new(MemoryConfig::new(&path));
    store.initialize().await;
    store.store(new_entry("A1", "unflushed", &[])).await;
    assert!(!path.exists(), "file must not exist before a flush");

    store.flush().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn persisted_layout_is_agent_keyed_with_iso_timestamps() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");

    let store = MemoryStore::new(MemoryConfig::new(&path));
    store.initialize().await;
    store.store(new_entry("A1", "one", &["coder"])).await;
    store.store(new_entry("A2", "two", &[])).await;
    store.flush().await.unwrap();

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let map = json.as_object().unwrap();
    assert_eq!(map.len(), 2);
    let a1 = map["A1"].as_array().unwrap();
    assert_eq!(a1.len(), 1);
    assert_eq!(a1[0]["type"], "result");
    assert_eq!(a1[0]["content"], "one");

    let stamp = a1[0]["timestamp"].as_str().unwrap();
    assert!(
        chrono::DateTime::parse_from_rfc3339(stamp).is_ok(),
        "timestamp {stamp} is not ISO-8601"
    );
}

#[tokio::test]
async fn repeated_flushes_rewrite_the_file_in_full() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memory.json");

    let store = MemoryStore::new(MemoryConfig::new(&path));
    store.initialize().await;
    store.store(new_entry("A1", "first", &[])).await;
    store.flush().await.unwrap();
    store.store(new_entry("A1", "second", &[])).await;
    store.flush().await.unwrap();

    let reloaded = MemoryStore::new(MemoryConfig::new(&path));
    reloaded.initialize().await;
    assert_eq!(reloaded.entry_count().await, 2);
    assert_eq!(reloaded.search("first", None).await.len(), 1);
    assert_eq!(reloaded.search("second", None).await.len(), 1);
}
