use crate::api::Provider;
use crate::models::{PlaylistDetails, StationType};
use crate::retry::{self, RetryOptions};
use crate::util::expand_template;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;

/// Largest number of items the destination accepts per add/remove call.
pub const MAX_BATCH: usize = 100;

/// Name and description templates for generated playlists.
///
/// Placeholders: `${username}` (separate playlists), `${usernames}` (blends,
/// sorted and joined as "a, b & c"), `${station}` and `${date}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaylistNaming {
    pub name_template: String,
    pub description_template: String,
    pub blend_name_template: String,
    pub blend_description_template: String,
}

impl Default for PlaylistNaming {
    fn default() -> Self {
        Self {
            name_template: "${username}'s ${station}".into(),
            description_template:
                "A playlist generated from ${username}'s ${station} station on Last.fm on ${date}".into(),
            blend_name_template: "${usernames} ${station} blend".into(),
            blend_description_template:
                "A blended playlist generated from the ${station} stations of ${usernames} on Last.fm on ${date}"
                    .into(),
        }
    }
}

/// en-US short date and time, e.g. "1/5/24, 3:04 PM".
pub fn format_date(now: &DateTime<Local>) -> String {
    now.format("%-m/%-d/%y, %-I:%M %p").to_string()
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} & {}", init.join(", "), last),
    }
}

impl PlaylistNaming {
    pub fn separate(&self, username: &str, station: StationType, now: &DateTime<Local>) -> PlaylistDetails {
        let date = format_date(now);
        let vars = [("username", username), ("station", station.as_str()), ("date", date.as_str())];
        PlaylistDetails {
            name: expand_template(&self.name_template, &vars),
            description: expand_template(&self.description_template, &vars),
        }
    }

    /// Details for a blend; the result does not depend on the order of `usernames`.
    pub fn blended(&self, usernames: &[String], station: StationType, now: &DateTime<Local>) -> PlaylistDetails {
        let mut sorted = usernames.to_vec();
        sorted.sort();
        sorted.dedup();
        let names = join_names(&sorted);
        let date = format_date(now);
        let vars = [("usernames", names.as_str()), ("station", station.as_str()), ("date", date.as_str())];
        PlaylistDetails {
            name: expand_template(&self.blend_name_template, &vars),
            description: expand_template(&self.blend_description_template, &vars),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { id: String, added: usize },
    Updated { id: String, removed: usize, added: usize },
    /// The playlist exists (created or cleared) but there was nothing to add.
    Empty { id: String },
}

impl SyncOutcome {
    pub fn playlist_id(&self) -> &str {
        match self {
            SyncOutcome::Created { id, .. } | SyncOutcome::Updated { id, .. } | SyncOutcome::Empty { id } => id,
        }
    }
}

/// Writes a track list into a named playlist, creating it if needed.
///
/// Existing contents are replaced wholesale. Each remote call is retried on
/// its own; the sequence is not atomic, so a failure between clearing and
/// adding leaves the playlist empty until the next run.
pub struct PlaylistSynchronizer<'a> {
    provider: &'a dyn Provider,
    retry: RetryOptions,
}

impl<'a> PlaylistSynchronizer<'a> {
    pub fn new(provider: &'a dyn Provider, retry: RetryOptions) -> Self {
        Self { provider, retry }
    }

    pub async fn sync(&self, details: &PlaylistDetails, tracks: &[String]) -> Result<SyncOutcome> {
        let provider = self.provider;
        log::info!("Syncing playlist {:?} ({} tracks)", details.name, tracks.len());

        let playlists = retry::execute(|| provider.list_playlists(), &self.retry)
            .await
            .context("listing playlists")?;
        let matches: Vec<_> = playlists.iter().filter(|p| p.name == details.name).collect();
        if matches.len() > 1 {
            log::warn!(
                "{} playlists are named {:?}; updating the first one ({})",
                matches.len(),
                details.name,
                matches[0].id
            );
        }

        let (id, removed, created) = match matches.first() {
            Some(existing) => {
                let id = existing.id.clone();
                retry::execute(|| provider.update_description(&id, &details.description), &self.retry)
                    .await
                    .with_context(|| format!("updating description of {}", id))?;

                let mut removed = 0;
                if existing.track_count > 0 {
                    let current = retry::execute(|| provider.list_playlist_tracks(&id), &self.retry)
                        .await
                        .with_context(|| format!("listing tracks of {}", id))?;
                    let mut unique = current.clone();
                    let mut seen = std::collections::HashSet::new();
                    unique.retain(|u| seen.insert(u.clone()));
                    for chunk in unique.chunks(MAX_BATCH) {
                        retry::execute(|| provider.remove_tracks(&id, chunk), &self.retry)
                            .await
                            .with_context(|| format!("removing tracks from {}", id))?;
                    }
                    removed = current.len();
                    log::info!("Removed {} existing tracks from {:?}", removed, details.name);
                }
                (id, removed, false)
            }
            None => {
                let id = retry::execute(
                    || provider.create_playlist(&details.name, &details.description),
                    &self.retry,
                )
                .await
                .with_context(|| format!("creating playlist {:?}", details.name))?;
                log::info!("Created playlist {:?} ({})", details.name, id);
                (id, 0, true)
            }
        };

        if tracks.is_empty() {
            log::info!("No tracks to add to {:?}", details.name);
            return Ok(SyncOutcome::Empty { id });
        }

        for chunk in tracks.chunks(MAX_BATCH) {
            retry::execute(|| provider.add_tracks(&id, chunk), &self.retry)
                .await
                .with_context(|| format!("adding tracks to {}", id))?;
        }
        log::info!("Added {} tracks to {:?}", tracks.len(), details.name);

        Ok(if created {
            SyncOutcome::Created { id, added: tracks.len() }
        } else {
            SyncOutcome::Updated { id, removed, added: tracks.len() }
        })
    }
}
