#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use station_playlist_sync::feed::StationFeed;
use station_playlist_sync::models::{StationType, TrackCandidate};
use station_playlist_sync::retry::RetryOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Station feed serving fixed pages per user. Pages past the end are empty;
/// a page listed in `failing` returns an error instead.
#[derive(Default)]
pub struct ScriptedFeed {
    pages: HashMap<String, Vec<Vec<TrackCandidate>>>,
    failing: Vec<(String, u32)>,
    pub fetches: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, user: &str, pages: Vec<Vec<TrackCandidate>>) -> Self {
        self.pages.insert(user.to_string(), pages);
        self
    }

    pub fn failing_at(mut self, user: &str, page: u32) -> Self {
        self.failing.push((user.to_string(), page));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StationFeed for ScriptedFeed {
    async fn fetch_page(&self, username: &str, _station: StationType, page: u32) -> Result<Vec<TrackCandidate>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|(u, p)| u == username && *p == page) {
            return Err(anyhow!("station returned 500"));
        }
        Ok(self
            .pages
            .get(username)
            .and_then(|p| p.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn track(title: &str, artist: &str) -> TrackCandidate {
    TrackCandidate {
        title: title.to_string(),
        artists: vec![artist.to_string()],
        source_url: format!("https://www.last.fm/music/{}/_/{}", artist, title),
    }
}

pub fn quiet_retry() -> RetryOptions {
    RetryOptions {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..RetryOptions::default()
    }
    .quiet()
}
