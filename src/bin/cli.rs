use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use station_playlist_sync as lib;
use lib::api::spotify::SpotifyProvider;
use lib::cache::PersistentCache;
use lib::config::Config;
use lib::feed::LastFmFeed;
use lib::models::{ResolvedTrack, StationType};
use lib::resolver::TrackResolver;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "station-playlist-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every configured station and sync the playlists (one-shot)
    Run,
    /// Resolve one user's station and print the track URIs without touching playlists
    Resolve {
        #[arg(long)]
        user: String,
        #[arg(long)]
        station: StationType,
        /// Override the configured amount (0 = no limit)
        #[arg(long)]
        amount: Option<usize>,
    },
    /// Validate config file and exit
    ConfigValidate,
    /// Show what the track cache currently holds
    CacheStats,
}

fn init_logging(log_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Library code logs through the `log` facade; bridge it into tracing.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(log_dir, "station-sync.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;
    Ok(guard)
}

async fn open_cache(cfg: &Config) -> Result<PersistentCache<ResolvedTrack>> {
    let max = cfg.cache_max_size_bytes()?;
    Ok(PersistentCache::open(cfg.cache_file(), max).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Explicit --config wins; otherwise prefer the system-wide file and fall
    // back to ./config.toml for local usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/station-sync/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    if let Commands::ConfigValidate = cli.command {
        match cfg.validate() {
            Ok(()) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let _guard = init_logging(&cfg.log_dir)?;

    match cli.command {
        Commands::Run => {
            cfg.validate().context("validating config")?;
            let provider = SpotifyProvider::from_token_file(&cfg.token_file)?;
            let feed = LastFmFeed::new();
            let mut cache = open_cache(&cfg).await?;
            let report = lib::worker::run_once(&cfg, &feed, &provider, &mut cache).await;
            if !report.is_success() {
                for (name, err) in &report.failed {
                    eprintln!("{}: {}", name, err);
                }
                std::process::exit(1);
            }
        }
        Commands::Resolve { user, station, amount } => {
            let provider = SpotifyProvider::from_token_file(&cfg.token_file)?;
            let feed = LastFmFeed::new();
            let mut cache = open_cache(&cfg).await?;
            let target = match amount {
                Some(0) => None,
                Some(n) => Some(n),
                None => cfg.target(),
            };
            let resolver = TrackResolver::new(&feed, &provider, cfg.retry.clone());
            let res = resolver.resolve(&user, station, target, &mut cache).await;
            // keep whatever was looked up even if the run failed part way
            cache.save().await;
            for uri in res.with_context(|| format!("resolving {}'s {} station", user, station))? {
                println!("{}", uri);
            }
        }
        Commands::CacheStats => {
            let cache = open_cache(&cfg).await?;
            let found = cache.values().filter(|v| v.is_some()).count();
            println!("Cache file:    {}", cfg.cache_file().map(|p| p.display().to_string()).unwrap_or_else(|| "(memory only)".into()));
            println!("Entries:       {}", cache.len());
            println!("  found:       {}", found);
            println!("  not found:   {}", cache.len() - found);
            println!("Size:          {}", lib::util::format_size(cache.serialized_size() as u64));
            println!("Limit:         {}", lib::util::format_size(cfg.cache_max_size_bytes()?));
        }
        Commands::ConfigValidate => unreachable!("handled before logging setup"),
    }
    Ok(())
}
