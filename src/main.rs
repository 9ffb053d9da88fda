use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::time::Duration;
use tracing::{error, info, warn};

use feedrelay::feed::{Dispatcher, HttpFeedFetcher, WebhookMessenger};
use feedrelay::{AddFeedResult, Config, Database, FeedService};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll subscribed feeds and deliver new items until interrupted
    Run,

    /// Subscribe a channel to a feed
    Add {
        /// Group (server) ID
        group: i64,

        /// Channel ID within the group
        channel: i64,

        /// Feed URL
        url: String,
    },

    /// Remove a group's subscription by its position in `list`
    Remove {
        /// Group (server) ID
        group: i64,

        /// 0-based subscription index
        index: i64,
    },

    /// List a group's subscriptions
    List {
        /// Group (server) ID
        group: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Only the long-running relay writes to the log file
    match cli.command {
        Commands::Run => {
            if let Err(e) = feedrelay::logging::init(&config.logging) {
                eprintln!("Failed to initialize logging: {e}");
                feedrelay::logging::init_console_only(&config.logging.level);
            }
        }
        _ => feedrelay::logging::init_console_only(&config.logging.level),
    }

    match execute(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Commands, config: &Config) -> feedrelay::Result<()> {
    let db = Arc::new(Database::open(&config.database.path).await?);

    match command {
        Commands::Run => run(db, config).await,
        Commands::Add {
            group,
            channel,
            url,
        } => {
            let service = service(db, config);
            match service.add_feed(group, channel, &url).await? {
                AddFeedResult::Added(sub) => {
                    println!("Subscribed channel {} to {}", sub.channel_id, sub.url)
                }
                AddFeedResult::Duplicate => println!("Group {group} already follows {url}"),
                AddFeedResult::LimitReached => println!(
                    "Group {group} has reached its limit of {} feeds",
                    config.feeds.max_subscriptions_per_group
                ),
                AddFeedResult::InvalidUrl => println!("Not a valid feed URL: {url}"),
            }
            Ok(())
        }
        Commands::Remove { group, index } => {
            let service = service(db, config);
            if service.remove_feed(group, index).await? {
                println!("Removed subscription {index}");
            } else {
                println!("Group {group} has no subscription at index {index}");
            }
            Ok(())
        }
        Commands::List { group } => {
            let feeds = service(db, config).list_feeds(group).await?;
            if feeds.is_empty() {
                println!("Group {group} has no subscriptions");
            }
            for (index, sub) in feeds.iter().enumerate() {
                println!("{index:>3}  #{:<20} {}", sub.channel_id, sub.url);
            }
            Ok(())
        }
    }
}

fn service(db: Arc<Database>, config: &Config) -> FeedService {
    FeedService::new(db).with_max_subscriptions(config.feeds.max_subscriptions_per_group)
}

async fn run(db: Arc<Database>, config: &Config) -> feedrelay::Result<()> {
    info!("feedrelay {}", env!("CARGO_PKG_VERSION"));

    let service = FeedService::load(db)
        .await?
        .with_max_subscriptions(config.feeds.max_subscriptions_per_group);

    let messenger = Arc::new(WebhookMessenger::new(&config.channels, &config.delivery)?);
    if messenger.channel_count() == 0 {
        warn!("No channels configured; new items will not be delivered");
    }
    let fetcher = Arc::new(HttpFeedFetcher::new(&config.feeds)?);
    let dispatcher = Dispatcher::new(messenger.clone(), messenger);

    let handle = service.start(
        fetcher,
        dispatcher,
        Duration::from_secs(config.feeds.poll_interval_secs),
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.stop().await;

    Ok(())
}
