use crate::models::StationType;
use crate::playlist::PlaylistNaming;
use crate::retry::RetryOptions;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Last.fm usernames whose stations are mirrored.
    pub usernames: Vec<String>,
    #[serde(default = "default_station_types")]
    pub station_types: Vec<StationType>,

    /// Tracks per playlist. 0 means no limit (page until the station is exhausted).
    #[serde(default = "default_amount")]
    pub amount: usize,

    #[serde(default = "default_true")]
    pub enable_separate: bool,
    #[serde(default)]
    pub enable_blend: bool,

    /// Track lookup cache file. Empty string keeps the cache in memory only.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Human readable ceiling for the cache file ("10 MB"); "0" disables pruning.
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: String,

    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub playlist: PlaylistNaming,
    #[serde(default)]
    pub retry: RetryOptions,
}

fn default_station_types() -> Vec<StationType> { StationType::all() }
fn default_amount() -> usize { 30 }
fn default_true() -> bool { true }
fn default_cache_max_size() -> String { "10 MB".into() }
fn default_token_file() -> PathBuf { "token.json".into() }

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("station-playlist-sync")
        .join("tracks.json")
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("station-playlist-sync")
        .join("logs")
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.usernames.is_empty() {
            bail!("no Last.fm usernames configured");
        }
        if let Some(i) = self.usernames.iter().position(|u| u.trim().is_empty()) {
            bail!("usernames[{}] is blank", i);
        }
        if self.station_types.is_empty() {
            bail!("no station types configured");
        }
        if !self.enable_separate && !self.enable_blend {
            bail!("both enable_separate and enable_blend are off; nothing to do");
        }
        let factor = self.retry.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            bail!("retry.backoff_factor must be a finite number >= 1, got {}", factor);
        }
        self.cache_max_size_bytes()?;
        Ok(())
    }

    /// Target track count, `None` when unlimited.
    pub fn target(&self) -> Option<usize> {
        if self.amount == 0 {
            None
        } else {
            Some(self.amount)
        }
    }

    pub fn cache_file(&self) -> Option<PathBuf> {
        if self.cache_path.as_os_str().is_empty() {
            None
        } else {
            Some(self.cache_path.clone())
        }
    }

    pub fn cache_max_size_bytes(&self) -> anyhow::Result<u64> {
        crate::util::parse_byte_size(&self.cache_max_size)
            .with_context(|| format!("cache_max_size {:?}", self.cache_max_size))
    }
}
