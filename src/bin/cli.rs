//! kinowatch CLI
//!
//! Entry point for the scheduled monitoring cycle and the interactive bot.
//! The monitoring cycle is meant to be invoked by an external scheduler
//! (cron or similar); the bot runs long polling until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use teloxide::Bot;

use kinowatch::{
    bot::{BotContext, run_bot},
    error::{AppError, Result},
    models::Config,
    pipeline::{NotificationDispatcher, SourceOutcome, run_monitor},
    services::{FilmCache, SourceRegistry},
    storage::{JsonSnapshotStore, JsonSubscriberStore, SnapshotStore, SubscriberStore},
};

/// kinowatch - Cinema Program Monitor
#[derive(Parser, Debug)]
#[command(
    name = "kinowatch",
    version,
    about = "Nuremberg cinema program monitor and Telegram notifier"
)]
struct Cli {
    /// Path to the state directory containing config and persisted data
    #[arg(short, long, default_value = "state")]
    state_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one monitoring cycle across all configured sources
    Monitor {
        /// Compute and persist diffs without sending notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Run the interactive bot with long polling
    Bot,

    /// List configured cinema sources
    Sources,

    /// Validate configuration
    Validate,

    /// Show persisted snapshot info per source
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// The bot credential is configuration-class: missing means fatal startup.
fn bot_from_env() -> Result<Bot> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| AppError::config("TELEGRAM_BOT_TOKEN environment variable not set"))?;
    Ok(Bot::new(token))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("kinowatch starting...");

    let config_path = cli.state_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let registry = SourceRegistry::from_config(&config);

    match cli.command {
        Command::Monitor { no_notify } => {
            let snapshots = JsonSnapshotStore::new(&cli.state_dir);
            let subscribers =
                JsonSubscriberStore::open(&cli.state_dir, config.bot.default_lang()).await?;

            let dispatcher = if no_notify {
                log::info!("Notifications disabled for this cycle");
                None
            } else {
                Some(NotificationDispatcher::new(
                    bot_from_env()?,
                    config.notify.clone(),
                ))
            };

            let delay = Duration::from_millis(config.http.request_delay_ms);
            let report = run_monitor(
                &registry,
                &snapshots,
                &subscribers,
                dispatcher.as_ref(),
                delay,
            )
            .await;

            for outcome in &report.outcomes {
                match outcome {
                    SourceOutcome::Completed {
                        source_id,
                        film_count,
                        new,
                        removed,
                        updated,
                        sent,
                        failed,
                    } => log::info!(
                        "{source_id}: {film_count} film(s), {new} new, {updated} updated, \
                         {removed} removed; {sent} notified, {failed} failed"
                    ),
                    SourceOutcome::Failed {
                        source_id,
                        stage,
                        message,
                    } => log::error!("{source_id}: failed during {stage}: {message}"),
                }
            }

            if !report.outcomes.is_empty() && report.failed_count() == report.outcomes.len() {
                return Err(AppError::validation("All sources failed this cycle"));
            }
            log::info!("Monitoring cycle complete");
        }

        Command::Bot => {
            config.validate()?;
            let store: Arc<dyn SubscriberStore> = Arc::new(
                JsonSubscriberStore::open(&cli.state_dir, config.bot.default_lang()).await?,
            );
            let cache = FilmCache::new(Duration::from_secs(config.cache.ttl_secs));

            let ctx = Arc::new(BotContext {
                registry,
                cache,
                store,
                config,
            });
            run_bot(bot_from_env()?, ctx).await?;
        }

        Command::Sources => {
            for source in registry.list() {
                log::info!("{} - {} ({})", source.id, source.name, source.url);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {e}");
                return Err(e);
            }
            log::info!("✓ Config OK ({} source(s))", config.sources.len());
        }

        Command::Info => {
            let snapshots = JsonSnapshotStore::new(&cli.state_dir);
            for source in registry.list() {
                match snapshots.load(&source.id).await? {
                    Some(snapshot) => log::info!(
                        "{}: {} film(s), captured {}",
                        source.id,
                        snapshot.films.len(),
                        snapshot.timestamp
                    ),
                    None => log::info!("{}: no snapshot yet", source.id),
                }
            }

            let subscribers =
                JsonSubscriberStore::open(&cli.state_dir, config.bot.default_lang()).await?;
            log::info!(
                "Subscribers: {}",
                subscribers.subscriber_count(None).await?
            );
        }
    }

    log::info!("Done!");
    Ok(())
}
