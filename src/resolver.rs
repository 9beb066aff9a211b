use crate::api::Provider;
use crate::cache::PersistentCache;
use crate::feed::StationFeed;
use crate::models::{ResolvedTrack, StationType, TrackKey};
use crate::retry::{self, RetryOptions};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Counters for one resolution pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveStats {
    pub pages: u32,
    pub searched: usize,
    pub cached: usize,
    pub not_found: usize,
}

enum Status {
    Found,
    Cached,
    NotFound,
    CachedNotFound,
}

impl Status {
    fn label(&self) -> &'static str {
        match self {
            Status::Found => "found",
            Status::Cached => "cached",
            Status::NotFound => "not found",
            Status::CachedNotFound => "not found (cached)",
        }
    }
}

/// Turns a user's station into an ordered list of destination track URIs.
pub struct TrackResolver<'a> {
    feed: &'a dyn StationFeed,
    provider: &'a dyn Provider,
    retry: RetryOptions,
}

impl<'a> TrackResolver<'a> {
    pub fn new(feed: &'a dyn StationFeed, provider: &'a dyn Provider, retry: RetryOptions) -> Self {
        Self { feed, provider, retry }
    }

    /// Resolve up to `target` distinct tracks from `username`'s `station`.
    /// `None` means no limit: keep paging until the station runs dry.
    pub async fn resolve(
        &self,
        username: &str,
        station: StationType,
        target: Option<usize>,
        cache: &mut PersistentCache<ResolvedTrack>,
    ) -> Result<Vec<String>> {
        self.resolve_with_stats(username, station, target, cache)
            .await
            .map(|(tracks, _)| tracks)
    }

    pub async fn resolve_with_stats(
        &self,
        username: &str,
        station: StationType,
        target: Option<usize>,
        cache: &mut PersistentCache<ResolvedTrack>,
    ) -> Result<(Vec<String>, ResolveStats)> {
        let limit = target.unwrap_or(usize::MAX);
        let width = target.map(|t| t.to_string().len()).unwrap_or(0);
        let mut stats = ResolveStats::default();

        // key -> uri, in resolution order
        let mut found: IndexMap<TrackKey, String> = IndexMap::new();
        let mut found_uris: HashSet<String> = HashSet::new();
        let mut not_found: HashSet<TrackKey> = HashSet::new();

        let mut page: u32 = 1;
        while found.len() < limit {
            let candidates = match self.feed.fetch_page(username, station, page).await {
                Ok(c) => c,
                Err(e) => {
                    log::warn!(
                        "Stopping {}'s {} station at page {}: {:#}",
                        username,
                        station,
                        page,
                        e
                    );
                    break;
                }
            };
            if candidates.is_empty() {
                log::debug!("{}'s {} station exhausted at page {}", username, station, page);
                break;
            }
            stats.pages += 1;

            let mut seen_urls: HashSet<&str> = HashSet::new();
            for candidate in &candidates {
                if found.len() >= limit {
                    break;
                }
                if !candidate.source_url.is_empty() && !seen_urls.insert(candidate.source_url.as_str()) {
                    continue;
                }

                let key = candidate.key();
                if not_found.contains(&key) || found.contains_key(&key) {
                    continue;
                }

                let (resolved, status) = match cache.get(key.as_str()) {
                    Some(cached) => {
                        stats.cached += 1;
                        let status = if cached.is_some() { Status::Cached } else { Status::CachedNotFound };
                        (cached, status)
                    }
                    None => {
                        stats.searched += 1;
                        let provider = self.provider;
                        let resolved = retry::execute(
                            || provider.search_track(&candidate.title, &candidate.artists),
                            &self.retry,
                        )
                        .await
                        .with_context(|| format!("searching for {}", key))?;
                        cache.set(key.as_str(), resolved.clone());
                        let status = if resolved.is_some() { Status::Found } else { Status::NotFound };
                        (resolved, status)
                    }
                };

                match resolved {
                    Some(uri) => {
                        if !found_uris.insert(uri.clone()) {
                            log::debug!("{} resolves to already collected {}; skipping", key, uri);
                            continue;
                        }
                        found.insert(key.clone(), uri);
                        log::info!(
                            "[{:>w$}/{}] {} {}",
                            found.len(),
                            target.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
                            status.label(),
                            key,
                            w = width
                        );
                    }
                    None => {
                        stats.not_found += 1;
                        log::info!("[{:>w$}] {} {}", "", status.label(), key, w = width + 2);
                        not_found.insert(key);
                    }
                }
            }
            page += 1;
        }

        let mut tracks: Vec<String> = found.into_values().collect();
        tracks.truncate(limit);
        log::info!(
            "Resolved {} tracks for {}'s {} station ({} pages, {} searched, {} cached, {} not found)",
            tracks.len(),
            username,
            station,
            stats.pages,
            stats.searched,
            stats.cached,
            stats.not_found
        );
        Ok((tracks, stats))
    }
}
