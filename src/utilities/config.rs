use std::env;

use crate::utilities::constants::{
    CANCEL_WAIT_SECS, COLLECTIONS_FILE, IMAGE_CACHE_DIR, PRICE_REFRESH_INTERVAL_SECS,
    PRICE_REQUEST_PACING_MS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub collections_file: String,
    pub image_cache_dir: String,
    pub refresh_interval_secs: u64,
    pub request_pacing_ms: u64,
    pub cancel_wait_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collections_file: COLLECTIONS_FILE.to_string(),
            image_cache_dir: IMAGE_CACHE_DIR.to_string(),
            refresh_interval_secs: PRICE_REFRESH_INTERVAL_SECS,
            request_pacing_ms: PRICE_REQUEST_PACING_MS,
            cancel_wait_secs: CANCEL_WAIT_SECS,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.update_from_env();
        config
    }

    fn update_from_env(&mut self) {
        if let Ok(collections_file) = env::var("COLLECTIONS_FILE") {
            if !collections_file.is_empty() {
                self.collections_file = collections_file;
            }
        }
        if let Ok(image_cache_dir) = env::var("IMAGE_CACHE_DIR") {
            if !image_cache_dir.is_empty() {
                self.image_cache_dir = image_cache_dir;
            }
        }
        if let Ok(interval) = env::var("REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = interval.parse().unwrap_or(PRICE_REFRESH_INTERVAL_SECS);
        }
        if let Ok(pacing) = env::var("REQUEST_PACING_MS") {
            self.request_pacing_ms = pacing.parse().unwrap_or(PRICE_REQUEST_PACING_MS);
        }
        if let Ok(cancel_wait) = env::var("CANCEL_WAIT_SECS") {
            self.cancel_wait_secs = cancel_wait.parse().unwrap_or(CANCEL_WAIT_SECS);
        }
    }
}

lazy_static::lazy_static! {
    pub static ref CONFIG: Config = Config::new();
}
