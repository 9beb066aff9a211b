use crate::models::{FeedPage, StationType, TrackCandidate};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::time::Duration;

/// Source of station pages. Pages are 1-based; an empty page means the
/// station has nothing more to offer.
#[async_trait]
pub trait StationFeed: Send + Sync {
    async fn fetch_page(&self, username: &str, station: StationType, page: u32) -> Result<Vec<TrackCandidate>>;
}

/// Last.fm player station endpoint.
/// The base URL may be overridden by the LASTFM_BASE env var (useful for tests).
pub struct LastFmFeed {
    client: Client,
    base: String,
}

impl LastFmFeed {
    pub fn new() -> Self {
        let base = env::var("LASTFM_BASE").unwrap_or_else(|_| "https://www.last.fm".into());
        Self::with_base(base)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn page_url(&self, username: &str, station: StationType, page: u32) -> Result<url::Url> {
        let mut u = url::Url::parse(&self.base).with_context(|| format!("invalid feed base {}", self.base))?;
        u.path_segments_mut()
            .map_err(|_| anyhow!("feed base cannot be a base URL: {}", self.base))?
            .pop_if_empty()
            .extend(["player", "station", "user", username, station.as_str()]);
        u.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(u)
    }
}

impl Default for LastFmFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StationFeed for LastFmFeed {
    async fn fetch_page(&self, username: &str, station: StationType, page: u32) -> Result<Vec<TrackCandidate>> {
        let url = self.page_url(username, station, page)?;
        log::debug!("Fetching station page {}", url);
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("station page {} failed: {}", url, status));
        }
        let page: FeedPage = resp
            .json()
            .await
            .with_context(|| format!("parsing station page {}", url))?;
        Ok(page.into_candidates())
    }
}
