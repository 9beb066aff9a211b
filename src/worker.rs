use crate::api::Provider;
use crate::blend::blend;
use crate::cache::PersistentCache;
use crate::config::Config;
use crate::feed::StationFeed;
use crate::models::{PlaylistDetails, ResolvedTrack, StationType};
use crate::playlist::{PlaylistSynchronizer, SyncOutcome};
use crate::resolver::TrackResolver;
use anyhow::Result;
use chrono::{DateTime, Local};
use uuid::Uuid;

/// Summary of one run.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub synced: Vec<(PlaylistDetails, SyncOutcome)>,
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every configured job once: one playlist per (user, station) when
/// `enable_separate` is set, then one blended playlist per station when
/// `enable_blend` is set.
///
/// Jobs run one after another against the same cache. A failing job is
/// logged and recorded in the report; the remaining jobs still run. The cache
/// is saved at the end regardless.
pub async fn run_once(
    cfg: &Config,
    feed: &dyn StationFeed,
    provider: &dyn Provider,
    cache: &mut PersistentCache<ResolvedTrack>,
) -> RunReport {
    run_once_at(cfg, feed, provider, cache, Local::now()).await
}

pub async fn run_once_at(
    cfg: &Config,
    feed: &dyn StationFeed,
    provider: &dyn Provider,
    cache: &mut PersistentCache<ResolvedTrack>,
    now: DateTime<Local>,
) -> RunReport {
    let run_id = Uuid::new_v4().to_string();
    log::info!(
        "Run {} starting: {} users, stations {:?}, provider {}",
        run_id,
        cfg.usernames.len(),
        cfg.station_types,
        provider.name()
    );

    let resolver = TrackResolver::new(feed, provider, cfg.retry.clone());
    let synchronizer = PlaylistSynchronizer::new(provider, cfg.retry.clone());
    let target = cfg.target();
    let mut report = RunReport::default();

    if cfg.enable_separate {
        for username in &cfg.usernames {
            for &station in &cfg.station_types {
                let details = cfg.playlist.separate(username, station, &now);
                log::info!("Job {:?}: {}'s {} station", details.name, username, station);
                let res: Result<SyncOutcome> = async {
                    let tracks = resolver.resolve(username, station, target, cache).await?;
                    synchronizer.sync(&details, &tracks).await
                }
                .await;
                record(&mut report, details, res);
            }
        }
    }

    if cfg.enable_blend {
        for &station in &cfg.station_types {
            let details = cfg.playlist.blended(&cfg.usernames, station, &now);
            log::info!("Job {:?}: blend of {} users' {} stations", details.name, cfg.usernames.len(), station);
            let res = blend_job(&resolver, &synchronizer, &cfg.usernames, station, target, cache, &details).await;
            record(&mut report, details, res);
        }
    }

    cache.save().await;

    log::info!(
        "Run {} finished: {} playlists synced, {} failed",
        run_id,
        report.synced.len(),
        report.failed.len()
    );
    report
}

async fn blend_job(
    resolver: &TrackResolver<'_>,
    synchronizer: &PlaylistSynchronizer<'_>,
    usernames: &[String],
    station: StationType,
    target: Option<usize>,
    cache: &mut PersistentCache<ResolvedTrack>,
    details: &PlaylistDetails,
) -> Result<SyncOutcome> {
    let mut per_user: Vec<(String, Vec<String>)> = Vec::with_capacity(usernames.len());
    for username in usernames {
        let tracks = resolver.resolve(username, station, target, cache).await?;
        per_user.push((username.clone(), tracks));
    }
    let blended = blend(&per_user, target);
    synchronizer.sync(details, &blended).await
}

fn record(report: &mut RunReport, details: PlaylistDetails, res: Result<SyncOutcome>) {
    match res {
        Ok(outcome) => {
            log::info!("Synced {:?} -> {:?}", details.name, outcome);
            report.synced.push((details, outcome));
        }
        Err(e) => {
            log::error!("Job {:?} failed: {:#}", details.name, e);
            report.failed.push((details.name, format!("{:#}", e)));
        }
    }
}
