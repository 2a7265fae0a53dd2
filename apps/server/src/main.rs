//! Qubic balance tracker - headless server.
//!
//! Polls ledger account balances, detects changes, and fans notifications
//! out to websocket clients, email and Telegram.

mod api;
mod config;
mod state;
mod ws_server;

use clap::Parser;
use config::AppConfig;
use state::{AppState, SharedState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tracker_alerts::{
    ChatChannel, Dispatcher, EmailChannel, LivePush, MailRelayChannel, TelegramChannel,
};
use tracker_engine::{
    ChangeSink, JsonFileStore, MonitorLog, Poller, PollerConfig, Registry, TrackedStore,
};
use tracker_feeds::{BalanceFetcher, BalanceSource, FetcherConfig};
use ws_server::ConnectionTable;

/// Balance tracker CLI
#[derive(Parser, Debug)]
#[command(name = "qubic-tracker")]
#[command(about = "Ledger balance tracker with multi-channel notifications", long_about = None)]
struct Args {
    /// HTTP/WebSocket port
    #[arg(short, long, default_value_t = 3112)]
    port: u16,

    /// Data directory for the tracked id set and monitor logs
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    /// Balance poll interval in seconds
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Qubic balance tracker starting...");
    info!("  Port: {}", args.port);
    info!("  Data dir: {}", args.data_dir);
    info!("  Poll interval: {}s", args.poll_interval_secs);

    let config = AppConfig::from_env();
    info!("  Ledger RPC: {}", config.rpc_url);

    let fetcher = match BalanceFetcher::new(FetcherConfig {
        base_url: config.rpc_url.clone(),
    }) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to build the balance fetcher: {}", e);
            return;
        }
    };
    let source: Arc<dyn BalanceSource> = fetcher.clone();

    let store = match JsonFileStore::open(&args.data_dir).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open the data directory: {}", e);
            return;
        }
    };

    let registry = Arc::new(Registry::new(source.clone(), store.clone()));
    match store.load().await {
        Ok(ids) => {
            let restored = registry.restore(ids).await;
            info!("Restored {} tracked accounts from disk", restored);
        }
        Err(e) => warn!("Failed to load the tracked id set: {}", e),
    }

    // Delivery channels.
    let connections = Arc::new(ConnectionTable::new());
    let telegram = Arc::new(TelegramChannel::new(config.telegram_bot_token.as_deref()));
    if telegram.is_configured() {
        info!("Telegram delivery enabled");
    }
    let email: Option<Arc<dyn EmailChannel>> = config.mail_relay_url.as_deref().map(|url| {
        info!("Email delivery enabled via {}", url);
        Arc::new(MailRelayChannel::new(url, config.mail_from.clone())) as Arc<dyn EmailChannel>
    });

    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        connections.clone() as Arc<dyn LivePush>,
        email,
        telegram as Arc<dyn ChatChannel>,
    ));

    // Background balance sweep.
    let poller = Arc::new(Poller::new(
        registry.clone(),
        source,
        dispatcher.clone() as Arc<dyn ChangeSink>,
        MonitorLog::new(&args.data_dir),
        PollerConfig {
            interval: Duration::from_secs(args.poll_interval_secs),
            ..PollerConfig::default()
        },
    ));
    let poll_handle = {
        let poller = poller.clone();
        tokio::spawn(async move { poller.run().await })
    };

    let app_state: SharedState = Arc::new(AppState {
        config,
        registry,
        fetcher,
        connections,
        dispatcher,
        poller,
    });
    let app = ws_server::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind port {}: {}", args.port, e);
            return;
        }
    };
    info!("Listening on http://0.0.0.0:{}", args.port);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
    poll_handle.abort();
}
