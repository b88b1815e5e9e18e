pub const SCRYFALL_API_URL: &str = "https://api.scryfall.com";

pub const COLLECTIONS_FILE: &str = "collections.json";
pub const IMAGE_CACHE_DIR: &str = "images";

pub const PRICE_REFRESH_INTERVAL_SECS: u64 = 3600;
pub const PRICE_REQUEST_PACING_MS: u64 = 50;
pub const CANCEL_WAIT_SECS: u64 = 5;

pub const LOOKUP_TIMEOUT_SECS: u64 = 3;
pub const CARD_REQUEST_TIMEOUT_SECS: u64 = 5;
pub const IMAGE_REQUEST_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_COLLECTION_COLOR: &str = "#444444";
