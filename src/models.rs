use serde::{Deserialize, Serialize};
use std::fmt;

/// Station modes offered by the Last.fm player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    Library,
    Mix,
    Recommended,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Library => "library",
            StationType::Mix => "mix",
            StationType::Recommended => "recommended",
        }
    }

    pub fn all() -> Vec<StationType> {
        vec![StationType::Library, StationType::Mix, StationType::Recommended]
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "library" => Ok(StationType::Library),
            "mix" => Ok(StationType::Mix),
            "recommended" => Ok(StationType::Recommended),
            other => Err(anyhow::anyhow!("unknown station type: {}", other)),
        }
    }
}

/// One item of a station feed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCandidate {
    pub title: String,
    pub artists: Vec<String>,
    pub source_url: String,
}

impl TrackCandidate {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(&self.title, &self.artists)
    }
}

/// Raw page shape returned by the station endpoint. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub playlist: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
pub struct FeedItem {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<FeedArtist>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedArtist {
    pub name: String,
}

impl From<FeedItem> for TrackCandidate {
    fn from(item: FeedItem) -> Self {
        TrackCandidate {
            title: item.name,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
            source_url: item.url,
        }
    }
}

impl FeedPage {
    pub fn into_candidates(self) -> Vec<TrackCandidate> {
        self.playlist.into_iter().map(TrackCandidate::from).collect()
    }
}

/// Identity of a track for dedup and caching: `"<title> - <artist1>, <artist2>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey(String);

impl TrackKey {
    pub fn new(title: &str, artists: &[String]) -> Self {
        TrackKey(format!("{} - {}", title, artists.join(", ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination track URI, or `None` when the track is confirmed absent.
pub type ResolvedTrack = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDetails {
    pub name: String,
    pub description: String,
}

/// A playlist as listed in the destination account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    pub track_count: usize,
}
