use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::cards::image_locator::ImageLocator;
use crate::scryfall_client::ScryfallClient;
use crate::utilities::constants::IMAGE_REQUEST_TIMEOUT_SECS;
use crate::utilities::string_manipulators::front_face_name;

/// Content-addressed cache of card images on local disk. Files are keyed by
/// the md5 of their source URL, so the same URL is fetched at most once.
/// Nothing is ever evicted.
pub struct ImageCache {
    dir: PathBuf,
    client: reqwest::Client,
    lookup: ScryfallClient,
}

impl ImageCache {
    pub fn new(dir: &str, client: reqwest::Client, lookup: ScryfallClient) -> Self {
        ImageCache {
            dir: PathBuf::from(dir),
            client,
            lookup,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name_for(url: &str) -> String {
        format!("{:x}.jpg", md5::compute(url.as_bytes()))
    }

    /// Resolves a card's image to a local file. Tries the stored locator
    /// first; when it is empty, recovers the URL with an exact name lookup
    /// (front face only, since the service does not know "A // B" names).
    /// Every failure degrades to `None`, never an error.
    pub async fn resolve(
        &self,
        locator: Option<&ImageLocator>,
        fallback_name: Option<&str>,
        fallback_set: Option<&str>,
    ) -> Option<PathBuf> {
        let url = match locator.and_then(|l| l.best_url()) {
            Some(url) => url.to_string(),
            None => self.fallback_url(fallback_name?, fallback_set?).await?,
        };

        let path = self.dir.join(Self::file_name_for(&url));
        if path.exists() {
            debug!("Image cache hit for {}", url);
            return Some(path);
        }

        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(
                "Could not create image cache dir {}: {}",
                self.dir.display(),
                e
            );
            return None;
        }
        let bytes = match self.download(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Image download failed for {}: {}", url, e);
                return None;
            }
        };
        if let Err(e) = fs::write(&path, &bytes) {
            warn!("Could not write cached image {}: {}", path.display(), e);
            return None;
        }
        debug!("Cached image for {} at {}", url, path.display());
        Some(path)
    }

    async fn fallback_url(&self, name: &str, set_code: &str) -> Option<String> {
        let front = front_face_name(name);
        let card = self
            .lookup
            .named_exact(front, set_code)
            .await
            .ok()
            .flatten()?;
        debug!(
            "Recovered image URL for '{}' ({})",
            card.front_name(),
            set_code
        );
        card.best_image_url().map(|url| url.to_string())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(IMAGE_REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()).into());
        }
        Ok(response.bytes().await?.to_vec())
    }
}
