mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use common::{quiet_retry, track, ScriptedFeed};
use station_playlist_sync::api::memory::MemoryProvider;
use station_playlist_sync::api::Provider;
use station_playlist_sync::cache::PersistentCache;
use station_playlist_sync::config::Config;
use station_playlist_sync::models::{RemotePlaylist, ResolvedTrack, StationType};
use station_playlist_sync::worker::run_once_at;
use tempfile::tempdir;

fn config(usernames: &[&str], separate: bool, blend: bool) -> Config {
    let mut cfg = Config::from_toml(&format!(
        "usernames = [{}]\nstation_types = [\"library\"]\namount = 4\ncache_path = \"\"\n",
        usernames.iter().map(|u| format!("{:?}", u)).collect::<Vec<_>>().join(", ")
    ))
    .unwrap();
    cfg.enable_separate = separate;
    cfg.enable_blend = blend;
    cfg.retry = quiet_retry();
    cfg
}

fn provider() -> MemoryProvider {
    let mut p = MemoryProvider::new();
    for prefix in ["a", "b"] {
        for i in 0..5 {
            let title = format!("{}{}", prefix, i);
            p = p.with_track(&title, &["Artist"], &format!("spotify:track:{}", title));
        }
    }
    p
}

fn feed() -> ScriptedFeed {
    ScriptedFeed::new()
        .with_pages("alice", vec![(0..5).map(|i| track(&format!("a{}", i), "Artist")).collect()])
        .with_pages("bob", vec![(0..2).map(|i| track(&format!("b{}", i), "Artist")).collect()])
}

#[tokio::test]
async fn separate_playlists_per_user() {
    let cfg = config(&["alice", "bob"], true, false);
    let provider = provider();
    let mut cache: PersistentCache<ResolvedTrack> = PersistentCache::ephemeral();
    let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

    let report = run_once_at(&cfg, &feed(), &provider, &mut cache, now).await;

    assert!(report.is_success());
    assert_eq!(report.synced.len(), 2);
    assert_eq!(
        provider.playlist_tracks("alice's library").unwrap(),
        vec!["spotify:track:a0", "spotify:track:a1", "spotify:track:a2", "spotify:track:a3"]
    );
    assert_eq!(provider.playlist_tracks("bob's library").unwrap().len(), 2);
    assert!(provider
        .playlist_description("alice's library")
        .unwrap()
        .ends_with("on 3/1/24, 9:30 AM"));
}

#[tokio::test]
async fn blended_playlist_interleaves_users() {
    let cfg = config(&["bob", "alice"], false, true);
    let provider = provider();
    let mut cache: PersistentCache<ResolvedTrack> = PersistentCache::ephemeral();

    let report = run_once_at(&cfg, &feed(), &provider, &mut cache, Local::now()).await;

    assert!(report.is_success());
    // configured order drives the interleave; the name uses sorted users
    assert_eq!(
        provider.playlist_tracks("alice & bob library blend").unwrap(),
        vec!["spotify:track:b0", "spotify:track:a0", "spotify:track:b1", "spotify:track:a1"]
    );
}

#[tokio::test]
async fn second_run_reuses_cache_and_replaces_playlists() {
    let dir = tempdir().unwrap();
    let mut cfg = config(&["alice"], true, true);
    cfg.cache_path = dir.path().join("tracks.json");
    let provider = provider();
    let feed = feed();

    let mut cache = PersistentCache::open(cfg.cache_file(), 0).await;
    run_once_at(&cfg, &feed, &provider, &mut cache, Local::now()).await;
    let searches = provider.searches();
    assert!(cfg.cache_path.exists());

    let mut cache = PersistentCache::open(cfg.cache_file(), 0).await;
    let report = run_once_at(&cfg, &feed, &provider, &mut cache, Local::now()).await;

    assert!(report.is_success());
    assert_eq!(provider.searches(), searches);
    assert_eq!(provider.playlist_count(), 2);
    assert_eq!(provider.playlist_tracks("alice's library").unwrap().len(), 4);
}

/// Fails to create any playlist whose name mentions bob.
struct PickyProvider(MemoryProvider);

#[async_trait]
impl Provider for PickyProvider {
    async fn search_track(&self, title: &str, artists: &[String]) -> Result<Option<String>> {
        self.0.search_track(title, artists).await
    }
    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        self.0.list_playlists().await
    }
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        if name.contains("bob") {
            return Err(anyhow!("forbidden"));
        }
        self.0.create_playlist(name, description).await
    }
    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()> {
        self.0.update_description(playlist_id, description).await
    }
    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        self.0.list_playlist_tracks(playlist_id).await
    }
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.0.remove_tracks(playlist_id, uris).await
    }
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.0.add_tracks(playlist_id, uris).await
    }
    fn name(&self) -> &str {
        "picky"
    }
}

#[tokio::test]
async fn failed_job_does_not_stop_the_run() {
    let cfg = config(&["bob", "alice"], true, false);
    let provider = PickyProvider(provider());
    let mut cache: PersistentCache<ResolvedTrack> = PersistentCache::ephemeral();

    let report = run_once_at(&cfg, &feed(), &provider, &mut cache, Local::now()).await;

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "bob's library");
    assert!(provider.0.playlist_tracks("alice's library").is_some());
}

#[tokio::test]
async fn station_types_each_get_a_playlist() {
    let mut cfg = config(&["alice"], true, false);
    cfg.station_types = vec![StationType::Library, StationType::Mix];
    let provider = provider();
    let mut cache: PersistentCache<ResolvedTrack> = PersistentCache::ephemeral();

    let report = run_once_at(&cfg, &feed(), &provider, &mut cache, Local::now()).await;

    assert_eq!(report.synced.len(), 2);
    assert!(provider.playlist_tracks("alice's mix").is_some());
    // mix resolves entirely from the cache filled by the library job
    assert_eq!(provider.searches(), 4);
}
