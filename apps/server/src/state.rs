//! Shared application state.

use crate::config::AppConfig;
use crate::ws_server::ConnectionTable;
use std::sync::Arc;
use tracker_alerts::Dispatcher;
use tracker_engine::{Poller, Registry};
use tracker_feeds::BalanceFetcher;

pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<Registry>,
    pub fetcher: Arc<BalanceFetcher>,
    pub connections: Arc<ConnectionTable>,
    pub dispatcher: Arc<Dispatcher>,
    pub poller: Arc<Poller>,
}

pub type SharedState = Arc<AppState>;
