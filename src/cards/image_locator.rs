use serde::{Deserialize, Serialize};

/// Image URLs per rendition size, as served by the card lookup service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageTiers {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

impl ImageTiers {
    pub fn best_url(&self) -> Option<&str> {
        usable(self.large.as_deref())
            .or_else(|| usable(self.normal.as_deref()))
            .or_else(|| usable(self.small.as_deref()))
    }
}

// A present tier can still hold "" or the literal string "null"
fn usable(url: Option<&str>) -> Option<&str> {
    url.filter(|url| !url.is_empty() && *url != "null")
}

/// Stored image reference. Older documents carry a bare URL string, newer
/// ones the tiered object, so both shapes must deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageLocator {
    Tiers(ImageTiers),
    Url(String),
}

impl ImageLocator {
    pub fn best_url(&self) -> Option<&str> {
        match self {
            ImageLocator::Tiers(tiers) => tiers.best_url(),
            ImageLocator::Url(url) => usable(Some(url.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_large_over_normal_over_small() {
        let tiers = ImageTiers {
            small: Some("s".to_string()),
            normal: Some("n".to_string()),
            large: Some("l".to_string()),
        };
        assert_eq!(tiers.best_url(), Some("l"));

        let tiers = ImageTiers {
            small: Some("s".to_string()),
            normal: Some("n".to_string()),
            large: None,
        };
        assert_eq!(tiers.best_url(), Some("n"));

        let tiers = ImageTiers {
            small: Some("s".to_string()),
            normal: None,
            large: None,
        };
        assert_eq!(tiers.best_url(), Some("s"));
    }

    #[test]
    fn deserializes_both_stored_shapes() {
        let from_string: ImageLocator =
            serde_json::from_str("\"https://cards.example/a.jpg\"").unwrap();
        assert_eq!(from_string.best_url(), Some("https://cards.example/a.jpg"));

        let from_object: ImageLocator =
            serde_json::from_str(r#"{"normal": "https://cards.example/n.jpg"}"#).unwrap();
        assert_eq!(from_object.best_url(), Some("https://cards.example/n.jpg"));
    }

    #[test]
    fn empty_and_null_urls_are_unusable() {
        assert_eq!(ImageLocator::Url(String::new()).best_url(), None);
        assert_eq!(ImageLocator::Url("null".to_string()).best_url(), None);
        assert_eq!(ImageLocator::Tiers(ImageTiers::default()).best_url(), None);
    }

    #[test]
    fn unusable_tier_falls_through_to_the_next() {
        let tiers = ImageTiers {
            small: Some("s".to_string()),
            normal: Some("https://cards.example/normal.jpg".to_string()),
            large: Some(String::new()),
        };
        assert_eq!(tiers.best_url(), Some("https://cards.example/normal.jpg"));

        let tiers = ImageTiers {
            small: Some("s".to_string()),
            normal: Some("null".to_string()),
            large: None,
        };
        assert_eq!(tiers.best_url(), Some("s"));

        let tiers = ImageTiers {
            small: None,
            normal: Some("null".to_string()),
            large: Some("null".to_string()),
        };
        assert_eq!(tiers.best_url(), None);
    }
}
