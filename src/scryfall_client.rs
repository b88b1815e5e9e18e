use std::time::Duration;

use log::debug;

use crate::cards::lookup_card::{LookupCard, SearchPage, SetInfo};
use crate::utilities::constants::{
    CARD_REQUEST_TIMEOUT_SECS, LOOKUP_TIMEOUT_SECS, SCRYFALL_API_URL,
};

/// REST client for the card lookup service. The base URL is injectable so
/// tests can point it at a local mock server.
#[derive(Clone)]
pub struct ScryfallClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScryfallClient {
    pub fn new(base_url: Option<&str>, client: reqwest::Client) -> Self {
        ScryfallClient {
            client,
            base_url: base_url.unwrap_or(SCRYFALL_API_URL).to_string(),
        }
    }

    fn setup_http_headers() -> reqwest::header::HeaderMap {
        let mut header_map = reqwest::header::HeaderMap::new();
        header_map.insert(reqwest::header::ACCEPT, "application/json".parse().unwrap());
        header_map.insert(
            reqwest::header::USER_AGENT,
            "mtg-collection-manager/0.1".parse().unwrap(),
        );
        header_map
    }

    async fn get(&self, url: &str, timeout_secs: u64) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(url)
            .headers(Self::setup_http_headers())
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
    }

    /// Fuzzy lookup by name. The service answers with a single card only
    /// when the name is unambiguous; any other status means the caller
    /// should fall back to a full search.
    pub async fn named_fuzzy(
        &self,
        name: &str,
    ) -> Result<Option<LookupCard>, Box<dyn std::error::Error>> {
        let url = format!(
            "{}/cards/named?fuzzy={}",
            self.base_url,
            urlencoding::encode(name)
        );
        let response = self.get(&url, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!("No single fuzzy match for '{}': {}", name, response.status());
            return Ok(None);
        }
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Exact lookup by name within a set, used to recover a lost image URL.
    pub async fn named_exact(
        &self,
        name: &str,
        set_code: &str,
    ) -> Result<Option<LookupCard>, Box<dyn std::error::Error>> {
        let url = format!(
            "{}/cards/named?exact={}&set={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(set_code)
        );
        let response = self.get(&url, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!(
                "No exact match for '{}' in set '{}': {}",
                name,
                set_code,
                response.status()
            );
            return Ok(None);
        }
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Full-text search, one candidate per distinct card. No matches is an
    /// empty page, not an error.
    pub async fn search(&self, query: &str) -> Result<SearchPage, Box<dyn std::error::Error>> {
        let url = format!(
            "{}/cards/search?q={}&unique=cards",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = self.get(&url, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!("Search '{}' matched nothing: {}", query, response.status());
            return Ok(SearchPage::default());
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lookup by the card's service id. Unlike the name lookups this is an
    /// error on a non-success status: callers hold an id they got from the
    /// service, so failure here is worth surfacing.
    pub async fn card_by_id(&self, id: &str) -> Result<LookupCard, Box<dyn std::error::Error>> {
        let url = format!("{}/cards/{}", self.base_url, id);
        let response = self.get(&url, CARD_REQUEST_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            return Err(format!(
                "Card lookup for '{}' failed with status {}",
                id,
                response.status()
            )
            .into());
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lookup of one printing by set code and collector number.
    pub async fn card_by_set_number(
        &self,
        set_code: &str,
        number: &str,
    ) -> Result<Option<LookupCard>, Box<dyn std::error::Error>> {
        let url = format!(
            "{}/cards/{}/{}",
            self.base_url,
            set_code.to_lowercase(),
            number
        );
        let response = self.get(&url, CARD_REQUEST_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!(
                "No printing {} in '{}': {}",
                number,
                set_code,
                response.status()
            );
            return Ok(None);
        }
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// All printings behind a card's prints URL (first page).
    pub async fn variants(
        &self,
        prints_search_uri: &str,
    ) -> Result<Vec<LookupCard>, Box<dyn std::error::Error>> {
        let response = self.get(prints_search_uri, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!(
                "Prints lookup at {} failed: {}",
                prints_search_uri,
                response.status()
            );
            return Ok(Vec::new());
        }
        let body = response.text().await?;
        let page: SearchPage = serde_json::from_str(&body)?;
        Ok(page.data)
    }

    /// Set metadata, used to backfill the printed set size.
    pub async fn set_by_code(
        &self,
        code: &str,
    ) -> Result<Option<SetInfo>, Box<dyn std::error::Error>> {
        let url = format!("{}/sets/{}", self.base_url, code.to_lowercase());
        let response = self.get(&url, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!("No set '{}': {}", code, response.status());
            return Ok(None);
        }
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Printings of one card in one language, for the language switch.
    pub async fn search_oracle_lang(
        &self,
        oracle_id: &str,
        lang: &str,
    ) -> Result<SearchPage, Box<dyn std::error::Error>> {
        let url = format!(
            "{}/cards/search?q=oracleid:{}+lang:{}",
            self.base_url, oracle_id, lang
        );
        let response = self.get(&url, LOOKUP_TIMEOUT_SECS).await?;
        if !response.status().is_success() {
            debug!(
                "No '{}' printings for oracle id {}: {}",
                lang,
                oracle_id,
                response.status()
            );
            return Ok(SearchPage::default());
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
