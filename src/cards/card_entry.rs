use serde::{Deserialize, Serialize};

use crate::cards::card_face::CardFace;
use crate::cards::image_locator::ImageLocator;
use crate::cards::lookup_card::LookupCard;
use crate::cards::variant::Variant;

fn default_lang() -> String {
    "en".to_string()
}

fn default_count() -> u32 {
    1
}

/// Identity of a collection row. Two rows are the same physical pile of
/// cards only when every field matches; anything else is a distinct row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardKey {
    pub id: String,
    pub lang: String,
    pub is_proxy: bool,
    pub collector_number: String,
    pub set_code: String,
}

/// User choices when a card is taken into a collection.
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub lang: Option<String>,
    pub is_proxy: bool,
    pub variant: Variant,
    pub count: u32,
    pub purchase_price: Option<f64>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            lang: None,
            is_proxy: false,
            variant: Variant::default(),
            count: 1,
            purchase_price: None,
        }
    }
}

/// A row in a collection: a snapshot of the looked-up printing plus the
/// locally owned fields (language, proxy flag, finish, prices, count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub set_code: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default)]
    pub set_size: Option<u32>,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub card_faces: Option<Vec<CardFace>>,
    #[serde(default)]
    pub oracle_id: Option<String>,
    #[serde(default)]
    pub prints_search_uri: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub is_proxy: bool,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub eur: Option<f64>,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub image_url: Option<ImageLocator>,
}

impl CardEntry {
    /// Builds a row from a looked-up card. Proxies never carry a market
    /// price; everything else starts at the finish's current price.
    pub fn from_lookup(card: &LookupCard, options: &AddOptions) -> Self {
        let eur = if options.is_proxy {
            Some(0.0)
        } else {
            Some(card.price_for(options.variant).unwrap_or(0.0))
        };
        CardEntry {
            id: card.id.clone(),
            name: card.name.clone(),
            set_code: card.set.clone(),
            set_name: card.set_name.clone(),
            collector_number: card.collector_number.clone(),
            set_size: None,
            mana_cost: card.mana_cost.clone(),
            type_line: card.type_line.clone(),
            oracle_text: card.oracle_text.clone(),
            card_faces: card.card_faces.clone(),
            oracle_id: card.oracle_id.clone(),
            prints_search_uri: card.prints_search_uri.clone(),
            lang: options.lang.clone().unwrap_or_else(|| card.lang.clone()),
            is_proxy: options.is_proxy,
            variant: options.variant,
            eur,
            purchase_price: options.purchase_price,
            count: options.count.max(1),
            image_url: card
                .best_image_url()
                .map(|url| ImageLocator::Url(url.to_string())),
        }
    }

    /// Snapshot of the identity tuple, taken before any edit so the row can
    /// still be found after its fields change.
    pub fn key(&self) -> CardKey {
        CardKey {
            id: self.id.clone(),
            lang: self.lang.clone(),
            is_proxy: self.is_proxy,
            collector_number: self.collector_number.clone(),
            set_code: self.set_code.clone(),
        }
    }

    pub fn matches(&self, key: &CardKey) -> bool {
        self.id == key.id
            && self.lang == key.lang
            && self.is_proxy == key.is_proxy
            && self.collector_number == key.collector_number
            && self.set_code == key.set_code
    }

    /// Swaps this row to another printing of the same card, keeping the
    /// locally owned fields.
    pub fn replace_printing(&self, card: &LookupCard) -> CardEntry {
        CardEntry::from_lookup(
            card,
            &AddOptions {
                lang: Some(self.lang.clone()),
                is_proxy: self.is_proxy,
                variant: self.variant,
                count: self.count,
                purchase_price: self.purchase_price,
            },
        )
    }

    /// Like `replace_printing`, but adopts the new printing's language.
    /// Used when the user switches a row to another language.
    pub fn switch_language(&self, card: &LookupCard) -> CardEntry {
        let mut entry = self.replace_printing(card);
        entry.lang = card.lang.clone();
        entry
    }
}
