use super::Provider;
use crate::models::RemotePlaylist;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone)]
struct StoredPlaylist {
    id: String,
    name: String,
    description: String,
    tracks: Vec<String>,
}

/// In-memory destination used by tests and local experiments.
///
/// Search results come from a fixed catalog keyed by `"<title>|<artist1>, <artist2>"`;
/// unknown tracks are reported as not found. Every remote-like call is counted.
#[derive(Default)]
pub struct MemoryProvider {
    catalog: HashMap<String, String>,
    playlists: Mutex<Vec<StoredPlaylist>>,
    next_id: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub mutation_calls: AtomicUsize,
}

fn catalog_key(title: &str, artists: &[String]) -> String {
    format!("{}|{}", title, artists.join(", "))
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a search result for `title` by `artists`.
    pub fn with_track(mut self, title: &str, artists: &[&str], uri: &str) -> Self {
        let artists: Vec<String> = artists.iter().map(|a| a.to_string()).collect();
        self.catalog.insert(catalog_key(title, &artists), uri.to_string());
        self
    }

    /// Seed an existing playlist; returns its id.
    pub fn insert_playlist(&self, name: &str, description: &str, tracks: Vec<String>) -> String {
        let id = format!("mem-playlist-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock().push(StoredPlaylist {
            id: id.clone(),
            name: name.to_string(),
            description: description.to_string(),
            tracks,
        });
        id
    }

    /// Tracks of the playlist named `name` (first match).
    pub fn playlist_tracks(&self, name: &str) -> Option<Vec<String>> {
        self.lock().iter().find(|p| p.name == name).map(|p| p.tracks.clone())
    }

    pub fn playlist_description(&self, name: &str) -> Option<String> {
        self.lock().iter().find(|p| p.name == name).map(|p| p.description.clone())
    }

    pub fn playlist_count(&self) -> usize {
        self.lock().len()
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredPlaylist>> {
        // a poisoned lock only means a test panicked mid-call
        self.playlists.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_playlist<T>(&self, playlist_id: &str, f: impl FnOnce(&mut StoredPlaylist) -> T) -> Result<T> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.lock();
        let pl = guard
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| anyhow!("no playlist with id {}", playlist_id))?;
        Ok(f(pl))
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search_track(&self, title: &str, artists: &[String]) -> Result<Option<String>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let hit = self.catalog.get(&catalog_key(title, artists)).cloned();
        info!("MemoryProvider: search {} - {} -> {:?}", title, artists.join(", "), hit);
        Ok(hit)
    }

    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        Ok(self
            .lock()
            .iter()
            .map(|p| RemotePlaylist {
                id: p.id.clone(),
                name: p.name.clone(),
                track_count: p.tracks.len(),
            })
            .collect())
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        info!("MemoryProvider: create_playlist {}", name);
        Ok(self.insert_playlist(name, description, Vec::new()))
    }

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()> {
        info!("MemoryProvider: update_description {}", playlist_id);
        self.with_playlist(playlist_id, |p| p.description = description.to_string())
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        let guard = self.lock();
        guard
            .iter()
            .find(|p| p.id == playlist_id)
            .map(|p| p.tracks.clone())
            .ok_or_else(|| anyhow!("no playlist with id {}", playlist_id))
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        info!("MemoryProvider: remove_tracks {} -> {} tracks", playlist_id, uris.len());
        self.with_playlist(playlist_id, |p| p.tracks.retain(|t| !uris.contains(t)))
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        info!("MemoryProvider: add_tracks {} -> {} tracks", playlist_id, uris.len());
        self.with_playlist(playlist_id, |p| p.tracks.extend_from_slice(uris))
    }
}
