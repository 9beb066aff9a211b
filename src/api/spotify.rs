use super::Provider;
use crate::error::ApiError;
use crate::models::RemotePlaylist;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Token file written by the external OAuth helper. Only `access_token` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Spotify provider backed by the Spotify Web API.
/// The API base may be overridden by the SPOTIFY_API_BASE env var (useful for tests).
pub struct SpotifyProvider {
    client: Client,
    access_token: String,
    api_base: String,
    user_id: tokio::sync::Mutex<Option<String>>,
}

/// Turn a non-success response into an `ApiError`, keeping any
/// `Retry-After` hint (seconds) for the retry executor.
async fn check(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::new(status.as_u16(), format!("{} failed: {} => {}", what, status, body))
        .with_retry_after(retry_after)
        .into())
}

impl SpotifyProvider {
    pub fn new(access_token: String) -> Self {
        let base = env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into());
        Self::with_api_base(access_token, base)
    }

    pub fn with_api_base(access_token: String, api_base: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            access_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            user_id: tokio::sync::Mutex::new(None),
        }
    }

    /// Build a provider from a token JSON file.
    pub fn from_token_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading Spotify token file {}", path.display()))?;
        let st: StoredToken =
            serde_json::from_str(&s).map_err(|e| anyhow!("parse token json: {}", e))?;
        if let Some(exp) = st.expires_at {
            if exp <= chrono::Utc::now().timestamp() {
                log::warn!("Spotify token in {} looks expired; requests may fail", path.display());
            }
        }
        Ok(Self::new(st.access_token))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn get_json(&self, url: &str, what: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = check(resp, what).await?;
        Ok(resp.json().await?)
    }

    async fn get_user_id(&self) -> Result<String> {
        let mut g = self.user_id.lock().await;
        if let Some(u) = g.as_ref() {
            return Ok(u.clone());
        }
        let j = self.get_json(&format!("{}/me", self.api_base), "fetch /me").await?;
        let id = j["id"].as_str().ok_or_else(|| anyhow!("no id"))?.to_string();
        *g = Some(id.clone());
        Ok(id)
    }

    /// Build the search query: `track:<title> artist:<a1> artist:<a2>`.
    pub fn search_query(title: &str, artists: &[String]) -> String {
        let mut q = format!("track:{}", title);
        for a in artists {
            q.push_str(" artist:");
            q.push_str(a);
        }
        q
    }
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn search_track(&self, title: &str, artists: &[String]) -> Result<Option<String>> {
        let q = Self::search_query(title, artists);
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.api_base,
            urlencoding::encode(&q)
        );
        let j = self.get_json(&url, "search").await?;
        if let Some(first) = j["tracks"]["items"].as_array().and_then(|a| a.first()) {
            if let Some(uri) = first["uri"].as_str() {
                return Ok(Some(uri.to_string()));
            }
        }
        Ok(None)
    }

    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        let mut playlists = Vec::new();
        let mut next_url = Some(format!("{}/me/playlists?limit=50", self.api_base));
        while let Some(url) = next_url {
            let j = self.get_json(&url, "list playlists").await?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    // the endpoint occasionally returns null entries
                    if pl.is_null() {
                        continue;
                    }
                    playlists.push(RemotePlaylist {
                        id: pl["id"].as_str().unwrap_or("").to_string(),
                        name: pl["name"].as_str().unwrap_or("").to_string(),
                        track_count: pl["tracks"]["total"].as_u64().unwrap_or(0) as usize,
                    });
                }
            }
            next_url = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(playlists)
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let user_id = self.get_user_id().await?;
        let url = format!(
            "{}/users/{}/playlists",
            self.api_base,
            url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect::<String>()
        );
        let body = json!({
            "name": name,
            "description": description,
            "public": false
        });
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        let resp = check(resp, "create playlist").await?;
        let j: serde_json::Value = resp.json().await?;
        let id = j["id"].as_str().ok_or_else(|| anyhow!("no id"))?.to_string();
        debug!("Created Spotify playlist {} ({})", name, id);
        Ok(id)
    }

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()> {
        let url = format!("{}/playlists/{}", self.api_base, playlist_id);
        let resp = self
            .client
            .put(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "description": description }))
            .send()
            .await?;
        check(resp, "change playlist details").await?;
        Ok(())
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        let mut uris = Vec::new();
        let mut next: Option<String> = Some(format!(
            "{}/playlists/{}/tracks?fields=items(track(uri)),next&limit=100",
            self.api_base, playlist_id
        ));
        let mut skipped = 0usize;
        while let Some(url) = next {
            let j = self.get_json(&url, "list playlist tracks").await?;
            if let Some(items) = j["items"].as_array() {
                for it in items {
                    match it["track"]["uri"].as_str() {
                        Some(uri) => uris.push(uri.to_string()),
                        None => skipped += 1,
                    }
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        if skipped > 0 {
            log::warn!(
                "Playlist {} has {} unavailable items without a track URI; they cannot be removed and will stay in the playlist",
                playlist_id,
                skipped
            );
        }
        Ok(uris)
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let tracks: Vec<serde_json::Value> = uris.iter().map(|u| json!({ "uri": u })).collect();
        let resp = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "tracks": tracks }))
            .send()
            .await?;
        check(resp, "remove tracks").await?;
        Ok(())
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "uris": uris }))
            .send()
            .await?;
        check(resp, "add tracks").await?;
        Ok(())
    }
}
