use crate::util::format_size;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Last access, epoch milliseconds.
    pub timestamp: i64,
}

/// Key/value store persisted as a single JSON object.
///
/// Every `get` refreshes the entry's timestamp, so the oldest timestamp is the
/// least recently used entry. When `max_size_bytes` is non-zero, `save` evicts
/// least recently used entries until the serialized file fits. Persistence is
/// best effort: load and save failures are logged and the in-memory map stays
/// authoritative for the current process.
pub struct PersistentCache<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    dirty: bool,
    path: Option<PathBuf>,
    max_size_bytes: u64,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<V> PersistentCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn new(path: Option<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            entries: IndexMap::new(),
            dirty: false,
            path,
            max_size_bytes,
        }
    }

    /// In-memory cache that is never written to disk.
    pub fn ephemeral() -> Self {
        Self::new(None, 0)
    }

    /// Build a cache for `path` and load whatever is already stored there.
    pub async fn open(path: Option<PathBuf>, max_size_bytes: u64) -> Self {
        let mut cache = Self::new(path, max_size_bytes);
        cache.load().await;
        cache
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the in-memory contents with the backing file, if there is one.
    pub async fn load(&mut self) {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => return,
        };
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("No cache file at {}; starting empty", path.display());
                return;
            }
            Err(e) => {
                log::warn!("Failed to stat cache file {}: {}", path.display(), e);
                return;
            }
        }

        log::info!("Loading cache from {}...", path.display());
        match read_entries::<V>(&path).await {
            Ok((entries, size)) => {
                self.entries = entries;
                self.dirty = false;
                log::info!(
                    "Loaded {} cache entries ({})",
                    self.entries.len(),
                    format_size(size)
                );
            }
            Err(e) => {
                log::warn!("Failed to load cache from {}: {:#}", path.display(), e);
                self.entries.clear();
            }
        }
    }

    /// Return the stored value and mark the entry as just used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.get_mut(key)?;
        entry.timestamp = now_ms();
        self.dirty = true;
        Some(entry.value.clone())
    }

    pub fn set(&mut self, key: &str, value: V) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                timestamp: now_ms(),
            },
        );
        self.dirty = true;
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|e| &e.value)
    }

    /// Exact byte length of the JSON document `save` would write.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(&self.entries).map(|v| v.len()).unwrap_or(0)
    }

    /// Write the cache to its backing file if anything changed since the last
    /// load or save. Never fails; problems are logged.
    pub async fn save(&mut self) {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => return,
        };
        if !self.dirty {
            return;
        }

        if self.max_size_bytes > 0 {
            self.prune();
        }

        match write_entries(&path, &self.entries).await {
            Ok(size) => {
                self.dirty = false;
                log::info!(
                    "Saved {} cache entries to {} ({})",
                    self.entries.len(),
                    path.display(),
                    format_size(size)
                );
            }
            Err(e) => log::warn!("Failed to save cache to {}: {:#}", path.display(), e),
        }
    }

    /// Evict least recently used entries until the serialized size is within
    /// `max_size_bytes`. Returns the number of evicted entries.
    pub fn prune(&mut self) -> usize {
        if self.max_size_bytes == 0 {
            return 0;
        }
        let limit = self.max_size_bytes as usize;
        let mut size = self.serialized_size();
        if size <= limit {
            return 0;
        }

        log::info!(
            "Cache size ({}) exceeds limit ({}), pruning...",
            format_size(size as u64),
            format_size(self.max_size_bytes)
        );

        let mut removed = 0;
        while size > limit {
            let oldest = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(idx, (_, e))| (e.timestamp, *idx))
                .map(|(idx, _)| idx);
            let idx = match oldest {
                Some(i) => i,
                None => break,
            };
            if let Some((key, _)) = self.entries.shift_remove_index(idx) {
                removed += 1;
                let new_size = self.serialized_size();
                log::debug!(
                    "Evicted cache entry {:?}, saved {}",
                    key,
                    format_size(size.saturating_sub(new_size) as u64)
                );
                size = new_size;
            }
        }

        if size > limit {
            log::warn!(
                "Removed all {} entries, but cache size ({}) still exceeds limit ({})",
                removed,
                format_size(size as u64),
                format_size(self.max_size_bytes)
            );
        } else {
            log::info!(
                "Pruned {} oldest entries, new size: {}",
                removed,
                format_size(size as u64)
            );
        }
        self.dirty = true;
        removed
    }
}

async fn read_entries<V: DeserializeOwned>(path: &Path) -> Result<(IndexMap<String, CacheEntry<V>>, u64)> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let entries = serde_json::from_slice(&raw).context("parsing cache JSON")?;
    Ok((entries, raw.len() as u64))
}

async fn write_entries<V: Serialize>(path: &Path, entries: &IndexMap<String, CacheEntry<V>>) -> Result<u64> {
    let json = serde_json::to_vec(entries).context("serializing cache")?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, &json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(json.len() as u64)
}
