pub mod config;
pub mod export;
pub mod kv;
pub mod rest;
pub mod waitlist;

use std::sync::Arc;

use config::DaemonConfig;
use kv::KvStore;
use waitlist::WaitlistService;

/// Shared application state passed to every REST handler.
///
/// Deliberately thin: requests hold no in-process state beyond the store
/// handle itself — initialize once at startup, reuse across requests, no
/// teardown beyond process exit.
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub waitlist: WaitlistService,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: Arc<DaemonConfig>, store: Arc<dyn KvStore>) -> Self {
        Self {
            config,
            waitlist: WaitlistService::new(store),
            started_at: std::time::Instant::now(),
        }
    }
}
