use serde::{Deserialize, Serialize};

use crate::cards::card_entry::CardEntry;
use crate::utilities::constants::DEFAULT_COLLECTION_COLOR;

fn default_color() -> String {
    DEFAULT_COLLECTION_COLOR.to_string()
}

/// A named collection of card rows. `name` is the key every other part of
/// the system looks collections up by. `last_price_update` is unix seconds,
/// 0 meaning never refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub cards: Vec<CardEntry>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub last_price_update: i64,
}

impl Collection {
    pub fn new(name: &str, color: &str) -> Self {
        Collection {
            name: name.to_string(),
            cards: Vec::new(),
            color: color.to_string(),
            last_price_update: 0,
        }
    }

    /// Sum of current market prices, one term per row.
    pub fn market_value(&self) -> f64 {
        self.cards.iter().filter_map(|card| card.eur).sum()
    }

    /// Sum of recorded purchase prices, one term per row.
    pub fn purchase_value(&self) -> f64 {
        self.cards
            .iter()
            .filter_map(|card| card.purchase_price)
            .sum()
    }

    pub fn value_delta(&self) -> f64 {
        self.market_value() - self.purchase_value()
    }
}
