pub mod memory;
pub mod spotify;

use crate::models::RemotePlaylist;
use anyhow::Result;

/// Provider trait: the destination-service operations the resolver and
/// synchronizer need. Implementations: spotify::SpotifyProvider and
/// memory::MemoryProvider.
///
/// Errors that should be retried after a server-chosen delay carry an
/// `ApiError` with `retry_after` set.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Search by title and the full ordered artist list. Return the best
    /// match's URI, or None when there are no results.
    async fn search_track(&self, title: &str, artists: &[String]) -> Result<Option<String>>;

    /// List the current user's playlists in the order the service returns them.
    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>>;

    /// Create a playlist and return its remote id.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    async fn update_description(&self, playlist_id: &str, description: &str) -> Result<()>;

    /// All track URIs currently in the playlist, in order.
    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Remove tracks (URIs) from playlist (batching done by caller)
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Append tracks (URIs) to playlist (batching done by caller)
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
