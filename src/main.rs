mod cli;

use upnext::config::{self, Config};
use upnext::continue_watching::{ContinueWatchingEngine, EngineSettings, Phase};
use upnext::history::{HistoryClient, TraktClient};
use upnext::metadata::providers::CinemetaProvider;
use upnext::metadata::{MetadataResolver, ResolverSettings};
use upnext::refresh::{RefreshScheduler, SchedulerSettings};
use upnext::store::{ProgressStore, SqliteProgressStore};
use upnext_common::{
    ContentId, ContentType, ContinueWatchingRow, ProgressKey, ProgressPatch, RowKind, SetOptions,
};
use upnext_db::pool::init_pool;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ProgressAction};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "upnext=trace,upnext_db=debug".to_string()
        } else {
            "upnext=info,upnext_db=info".to_string()
        }
    });

    // Logs go to stderr so `--json` output stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { json } => block_on(list(cli.config.as_deref(), json)),
        Commands::Watch => block_on(watch(cli.config.as_deref())),
        Commands::Progress { action } => block_on(progress(cli.config.as_deref(), action)),
        Commands::Remove {
            content_type,
            content_id,
        } => block_on(remove(cli.config.as_deref(), &content_type, &content_id)),
        Commands::ParseKey { key } => parse_key(&key),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("upnext {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

fn open_store(config: &Config, events: bool) -> Result<Arc<SqliteProgressStore>> {
    let db_path = config::resolve_db_path(config);
    tracing::debug!("Opening progress database at {:?}", db_path);
    let pool = init_pool(&db_path.to_string_lossy())?;

    let store = if events {
        SqliteProgressStore::new(pool)
    } else {
        SqliteProgressStore::without_events(pool)
    };
    Ok(Arc::new(store))
}

fn build_engine(config: &Config, store: Arc<dyn ProgressStore>) -> Result<ContinueWatchingEngine> {
    let provider = CinemetaProvider::new(
        config.metadata.base_url.clone(),
        config.metadata.requests_per_second,
        config.engine.request_timeout(),
    )?;
    let resolver = MetadataResolver::new(Arc::new(provider), ResolverSettings::from(&config.engine));

    let history: Option<Arc<dyn HistoryClient>> = if config.trakt.enabled {
        let client = TraktClient::new(&config.trakt, config.engine.request_timeout())?;
        tracing::info!("Trakt history sync enabled");
        Some(Arc::new(client))
    } else {
        None
    };

    Ok(ContinueWatchingEngine::new(
        store,
        resolver,
        history,
        EngineSettings::from(&config.engine),
    ))
}

async fn list(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = open_store(&config, true)?;
    let engine = build_engine(&config, store)?;

    engine.refresh(true).await;
    let state = engine.state();
    engine.teardown();

    if let Some(error) = state.last_error {
        anyhow::bail!("Failed to build continue-watching list: {}", error);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.rows)?);
    } else {
        print_rows(&state.rows);
    }
    Ok(())
}

async fn watch(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    // Other processes write the database, so only polling sees their updates
    let store = open_store(&config, false)?;
    let engine = Arc::new(build_engine(&config, store)?);

    let handle = RefreshScheduler::spawn(
        Arc::clone(&engine),
        engine.store_updates(),
        SchedulerSettings::from(&config.engine),
    );

    handle.mount().await;
    let mut state = handle.state();
    print_rows(&state.borrow_and_update().rows);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.phase != Phase::Idle {
                    continue;
                }
                match &snapshot.last_error {
                    Some(error) => tracing::warn!("Refresh failed: {}", error),
                    None => {
                        println!();
                        print_rows(&snapshot.rows);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn progress(config_path: Option<&Path>, action: ProgressAction) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = open_store(&config, false)?;

    match action {
        ProgressAction::Set {
            content_type,
            content_id,
            episode_key,
            position,
            duration,
            at,
            force,
        } => {
            let key = ProgressKey::new(
                content_type.parse::<ContentType>()?,
                ContentId::new(content_id)?,
                episode_key,
            );
            let mut patch = ProgressPatch::playback(position, duration);
            if let Some(at) = at {
                patch = patch.at(at);
            }

            let written = store
                .set(key.clone(), patch, SetOptions { force_write: force })
                .await?;
            if written {
                println!("Saved {}", key);
            } else {
                println!("Kept existing record for {} (it is newer)", key);
            }
        }
        ProgressAction::Remove { key } => {
            let key: ProgressKey = key.parse()?;
            if store.remove(&key).await? {
                println!("Removed {}", key);
            } else {
                println!("No record for {}", key);
            }
        }
        ProgressAction::Dump { json } => {
            let records: Vec<_> = store.get_all().await?.into_values().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No stored progress");
            } else {
                for record in &records {
                    println!(
                        "{}  {:>5.1}%  {}  {}",
                        record.key(),
                        record.progress_percent(),
                        record.last_updated,
                        record.origin
                    );
                }
            }
        }
    }

    Ok(())
}

async fn remove(config_path: Option<&Path>, content_type: &str, content_id: &str) -> Result<()> {
    let content_type: ContentType = content_type.parse()?;
    let content_id = ContentId::new(content_id)?;

    let config = config::load_config_or_default(config_path)?;
    let store = open_store(&config, true)?;
    let engine = build_engine(&config, Arc::clone(&store) as Arc<dyn ProgressStore>)?;

    engine.refresh(true).await;
    let row = engine
        .state()
        .rows
        .into_iter()
        .find(|r| r.title_key() == (content_type, &content_id));

    match row {
        Some(row) => {
            engine.remove_row(&row).await?;
            println!("Removed {} from continue watching", row.name);
        }
        None => {
            let removed = store.remove_all(content_type, &content_id).await?;
            println!(
                "{} is not in continue watching; removed {} stored record(s)",
                content_id, removed
            );
        }
    }

    engine.teardown();
    Ok(())
}

fn parse_key(key: &str) -> Result<()> {
    match upnext_parser::parse_episode_key_tagged(key) {
        Some(parsed) => {
            println!(
                "season {} episode {} ({:?})",
                parsed.episode.season, parsed.episode.episode, parsed.format
            );
            Ok(())
        }
        None => anyhow::bail!("Unrecognized episode key: {}", key),
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Database: {}", config::resolve_db_path(&config).display());
    println!("  Metadata: {}", config.metadata.base_url);
    println!(
        "  Completion threshold: {}%",
        config.engine.completion_threshold
    );
    println!("  Trakt enabled: {}", config.trakt.enabled);

    Ok(())
}

fn print_rows(rows: &[ContinueWatchingRow]) {
    if rows.is_empty() {
        println!("Nothing to continue");
        return;
    }

    for row in rows {
        let kind = match row.kind {
            RowKind::Continue => "continue",
            RowKind::UpNext => "up next",
        };
        print!("{:<9} {}", kind, row.name);
        if let (Some(season), Some(episode)) = (row.season, row.episode) {
            print!(" S{:02}E{:02}", season, episode);
        }
        if let Some(title) = &row.episode_title {
            print!(" - {}", title);
        }
        println!(" ({:.0}%)", row.progress);
    }
}
