//! Persistent memory store with indexed context retrieval.
//!
//! The in-memory map (`agent_id -> ordered entry list`) mirrors a single
//! JSON file on disk. Writes are debounced into an asynchronous flush; the
//! file is rewritten in full each time. Eviction is recency-preserving and
//! off the hot path.

pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::StorageError;
use crate::core::task::AgentMode;
use types::{ContextSummary, MemoryEntry, NewEntry};

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub path: PathBuf,
    /// Soft cap on total entries across all agents.
    pub soft_max_entries: usize,
    pub max_age: Duration,
    /// Debounce interval between a store and its asynchronous flush.
    pub auto_flush: Duration,
    pub context_limit: usize,
    pub summary_chars: usize,
}

impl MemoryConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            soft_max_entries: 1_000,
            max_age: Duration::from_millis(7 * 86_400_000),
            auto_flush: Duration::from_millis(5_000),
            context_limit: 10,
            summary_chars: 200,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, Vec<MemoryEntry>>,
    /// Last timestamp handed out; assignment clamps non-decreasing.
    last_timestamp: Option<DateTime<Utc>>,
    flush_scheduled: bool,
    loaded: bool,
}

impl StoreInner {
    fn total_entries(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Drop entries past the age cap, then oldest-first until under the
    /// count cap. Per-agent lists are timestamp-ordered, so each list's
    /// front is its oldest entry.
    fn evict(&mut self, config: &MemoryConfig) {
        if let Ok(age) = chrono::Duration::from_std(config.max_age) {
            let cutoff = Utc::now() - age;
            for list in self.entries.values_mut() {
                list.retain(|e| e.timestamp >= cutoff);
            }
            self.entries.retain(|_, list| !list.is_empty());
        }

        let mut total = self.total_entries();
        while total > config.soft_max_entries {
            let oldest_agent = self
                .entries
                .iter()
                .filter_map(|(agent, list)| list.first().map(|e| (agent.clone(), e.timestamp)))
                .min_by_key(|(_, ts)| *ts)
                .map(|(agent, _)| agent);
            let Some(agent) = oldest_agent else { break };

            if let Some(list) = self.entries.get_mut(&agent) {
                list.remove(0);
                if list.is_empty() {
                    self.entries.remove(&agent);
                }
            }
            total -= 1;
        }
    }

    fn needs_eviction(&self, config: &MemoryConfig) -> bool {
        if self.total_entries() > config.soft_max_entries {
            return true;
        }
        let Ok(age) = chrono::Duration::from_std(config.max_age) else {
            return false;
        };
        let cutoff = Utc::now() - age;
        self.entries
            .values()
            .filter_map(|list| list.first())
            .any(|e| e.timestamp < cutoff)
    }
}

/// Shared handle to the memory store. Cloning is cheap; all clones observe
/// the same map. Ids and timestamps are assigned under the store's lock, so
/// concurrent stores always produce distinct entries.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    config: Arc<MemoryConfig>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Load the persisted map, once. A missing file leaves the map empty
    /// and defers file creation to the first flush; a malformed file is
    /// logged and ignored. Never fails.
    pub async fn initialize(&self) {
        let mut inner = self.inner.lock().await;
        if inner.loaded {
            return;
        }
        inner.loaded = true;

        let bytes = match tokio::fs::read(&self.config.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no memory file at {:?}, starting empty", self.config.path);
                return;
            }
            Err(e) => {
                warn!("could not read memory file {:?}: {e}", self.config.path);
                return;
            }
        };

        match serde_json::from_slice::<HashMap<String, Vec<MemoryEntry>>>(&bytes) {
            Ok(map) => {
                inner.last_timestamp = map
                    .values()
                    .flatten()
                    .map(|e| e.timestamp)
                    .max();
                let total: usize = map.values().map(Vec::len).sum();
                info!("loaded {} memory entries from {:?}", total, self.config.path);
                inner.entries = map;
            }
            Err(e) => {
                warn!(
                    "memory file {:?} is malformed ({e}), starting empty",
                    self.config.path
                );
            }
        }
    }

    /// Append an entry for an agent. Assigns a fresh id and a timestamp
    /// clamped non-decreasing, schedules a debounced flush, and evicts when
    /// over the count or age caps.
    pub async fn store(&self, new: NewEntry) -> MemoryEntry {
        let (entry, schedule_flush) = {
            let mut inner = self.inner.lock().await;

            let now = Utc::now();
            let timestamp = match inner.last_timestamp {
                Some(last) if last > now => last,
                _ => now,
            };
            inner.last_timestamp = Some(timestamp);

            let entry = MemoryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                agent_id: new.agent_id.clone(),
                timestamp,
                kind: new.kind,
                content: new.content,
                tags: new.tags,
            };
            inner
                .entries
                .entry(new.agent_id)
                .or_default()
                .push(entry.clone());

            if inner.needs_eviction(&self.config) {
                inner.evict(&self.config);
            }

            let schedule_flush = !inner.flush_scheduled;
            inner.flush_scheduled = true;
            (entry, schedule_flush)
        };

        if schedule_flush {
            let store = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(store.config.auto_flush).await;
                store.inner.lock().await.flush_scheduled = false;
                if let Err(e) = store.flush().await {
                    warn!("scheduled memory flush failed: {e}");
                }
            });
        }

        entry
    }

    /// Up to `context_limit` summaries of the newest entries tagged with
    /// the mode name, newest first. Content is truncated to
    /// `summary_chars` characters with an ellipsis suffix.
    pub async fn get_context(&self, mode: AgentMode) -> Vec<ContextSummary> {
        let inner = self.inner.lock().await;
        let mut hits: Vec<&MemoryEntry> = inner
            .entries
            .values()
            .flatten()
            .filter(|e| e.has_tag(mode.as_str()))
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(self.config.context_limit);

        hits.iter()
            .map(|e| ContextSummary {
                kind: e.kind,
                summary: summarize(&e.content.render(), self.config.summary_chars),
            })
            .collect()
    }

    /// Case-insensitive substring search over stringified content, in
    /// insertion order. When `tags` is given the entry's tag set must
    /// intersect it. An empty query matches nothing.
    pub async fn search(&self, query: &str, tags: Option<&[String]>) -> Vec<MemoryEntry> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let inner = self.inner.lock().await;
        let mut hits: Vec<MemoryEntry> = inner
            .entries
            .values()
            .flatten()
            .filter(|e| e.content.render().to_lowercase().contains(&needle))
            .filter(|e| match tags {
                Some(wanted) => wanted.iter().any(|t| e.has_tag(t)),
                None => true,
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        hits
    }

    /// Rewrite the persisted file from the in-memory map. The write goes to
    /// a sibling temp file first and is renamed into place. On failure the
    /// in-memory state is retained for the next attempt.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let snapshot = {
            let inner = self.inner.lock().await;
            inner.entries.clone()
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let path = &self.config.path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Write {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: tmp.display().to_string(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;

        debug!("flushed memory map to {:?}", path);
        Ok(())
    }

    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.total_entries()
    }
}

fn summarize(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}
