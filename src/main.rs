//! chubindex CLI entry point.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use clap::{Parser, Subcommand};
use reqwest::Client;
use tokio::sync::Mutex;

use chubindex::domain::models::Config;
use chubindex::infrastructure::config::ConfigLoader;
use chubindex::infrastructure::http::{build_router, AppState};
use chubindex::infrastructure::http_clients::{
    HttpAccountsClient, HttpRepositoryClient, HttpTripleStoreClient,
};
use chubindex::infrastructure::logging::Logger;
use chubindex::infrastructure::sqlite_registry::SqliteRegistry;
use chubindex::DatabaseConnection;
use chubindex::services::accounts_poller::AccountsPoller;
use chubindex::services::fetch_manager::{FetchManager, FetchManagerConfig};
use chubindex::services::index_store::IndexStore;
use chubindex::services::notification_intake::{NotificationDrain, NotificationQueue};
use chubindex::services::query_planner::QueryPlanner;
use chubindex::services::scheduler::{Scheduler, SystemClock};

#[derive(Parser)]
#[command(name = "chubindex")]
#[command(about = "Entity/repository index crawl service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file, skipping the environment override layer.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl subsystem and HTTP front-end.
    Serve,

    /// Apply pending SQLite migrations for the durable registry and exit.
    Migrate,

    /// Load and validate configuration, printing it as YAML, then exit.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the effective configuration.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config {
            action: ConfigAction::Check,
        } => {
            let yaml = serde_yaml::to_string(&config).context("failed to serialize config")?;
            println!("{yaml}");
            return Ok(());
        }
        Commands::Migrate => {
            ensure_parent_dir(&config.local_db)?;
            let db = DatabaseConnection::new(&local_db_url(&config)).await?;
            db.migrate().await.context("failed to run migrations")?;
            println!("migrations applied");
            return Ok(());
        }
        Commands::Serve => {}
    }

    let _logger = Logger::init(&config.logging)?;

    ensure_parent_dir(&config.local_db)?;
    let db = DatabaseConnection::new(&local_db_url(&config)).await?;
    db.migrate().await.context("failed to run migrations")?;
    let registry = Arc::new(SqliteRegistry::new(db.pool().clone()));

    let http_client = Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let accounts_client = Arc::new(HttpAccountsClient::new(
        http_client.clone(),
        config.url_accounts.clone(),
    ));
    let repository_client = Arc::new(HttpRepositoryClient::new(http_client.clone()));
    let triple_store_client = Arc::new(HttpTripleStoreClient::new(
        http_client,
        index_db_url(&config),
        namespace_admin_url(&config),
        config.index_db.index_schema.clone(),
    ));

    let index_store = Arc::new(IndexStore::new(triple_store_client.clone()));
    index_store
        .create_namespace()
        .await
        .context("failed to bootstrap triple store namespace")?;

    let query_planner = Arc::new(QueryPlanner::new(
        triple_store_client,
        config.max_related_depth,
    ));

    let default_poll_interval = ChronoDuration::seconds(config.default_poll_interval_secs as i64);
    let scheduler = Arc::new(Mutex::new(Scheduler::with_clock(
        default_poll_interval,
        SystemClock,
    )));

    // Re-enqueue every known repository on startup; ScheduleEntry is
    // in-process only, so the heap starts empty after every restart.
    for id in registry
        .get_all_ids()
        .await
        .context("failed to list known repositories at startup")?
    {
        scheduler.lock().await.schedule(id, None);
    }

    let (notification_queue, notification_receiver) =
        NotificationQueue::bounded(config.notifications_queue_max_size);
    let notification_queue = Arc::new(notification_queue);

    let notification_drain = NotificationDrain::new(
        notification_receiver,
        ChronoDuration::seconds(config.notify_min_delay_secs as i64),
        config.notify_queue_overload_warning,
    );
    tokio::spawn(notification_drain.run_forever(
        scheduler.clone(),
        StdDuration::from_millis(config.notification_poll_interval_ms),
    ));

    let accounts_poller = AccountsPoller::new(accounts_client.clone(), registry.clone());
    tokio::spawn(accounts_poller.run_forever(
        scheduler.clone(),
        StdDuration::from_secs(config.accounts_poll_interval_secs),
    ));

    let fetch_manager = Arc::new(FetchManager::new(
        registry,
        accounts_client,
        repository_client,
        index_store.clone(),
        FetchManagerConfig {
            concurrency: config.concurrency,
            default_poll_interval,
            max_poll_error_delay_factor: config.max_poll_error_delay_factor,
            max_repository_pages: config.max_repository_pages,
            open_service: config.open_service,
            idle_sleep: StdDuration::from_millis(config.notification_poll_interval_ms)
                .min(StdDuration::from_secs(1)),
        },
    ));
    let fetch_manager_scheduler = scheduler.clone();
    tokio::spawn(async move {
        fetch_manager.fetch_forever(fetch_manager_scheduler).await;
    });

    let app_state = Arc::new(AppState {
        query_planner,
        index_store,
        notifier: notification_queue,
        max_related_depth: config.max_related_depth,
    });
    let router = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.bind_addr))?;
    tracing::info!(addr = %config.http.bind_addr, "listening");
    axum::serve(listener, router)
        .await
        .context("http server error")?;

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load config file"),
        None => ConfigLoader::load().context("failed to load configuration"),
    }
}

fn ensure_parent_dir(local_db: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(local_db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn local_db_url(config: &Config) -> String {
    format!("sqlite:{}", config.local_db)
}

/// The bare namespace-collection endpoint, e.g. `http://host:port/bigdata/namespace/`.
fn index_db_collection_url(config: &Config) -> String {
    format!(
        "{}:{}{}",
        config.index_db.url_index_db, config.index_db.index_db_port, config.index_db.index_db_path
    )
}

/// The per-namespace SPARQL endpoint (query/update/Turtle-ingest target),
/// e.g. `http://host:port/bigdata/namespace/kb`.
fn index_db_url(config: &Config) -> String {
    format!(
        "{}{}",
        index_db_collection_url(config),
        config.index_db.index_schema
    )
}

/// The namespace-administration endpoint used to create a namespace, e.g.
/// `http://host:port/bigdata/namespace/?property`. Namespace creation POSTs
/// to the collection endpoint, not the per-namespace endpoint.
fn namespace_admin_url(config: &Config) -> String {
    format!("{}?property", index_db_collection_url(config))
}
