use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cards::card_face::CardFace;
use crate::cards::image_locator::ImageTiers;
use crate::cards::variant::Variant;
use crate::utilities::string_manipulators::front_face_name;

fn default_lang() -> String {
    "en".to_string()
}

/// The lookup service serves prices as nullable strings ("3.20"), but older
/// dumps carry plain numbers. Accept both.
fn flexible_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupPrices {
    #[serde(default, deserialize_with = "flexible_price")]
    pub eur: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub eur_foil: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub eur_etched: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub eur_gilded: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub usd: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub usd_foil: Option<f64>,
    #[serde(default, deserialize_with = "flexible_price")]
    pub tix: Option<f64>,
}

impl LookupPrices {
    /// EUR price for the given finish. A missing or zero price means the
    /// market has none, so both come back as `None`.
    pub fn price_for(&self, variant: Variant) -> Option<f64> {
        let price = match variant {
            Variant::Nonfoil => self.eur,
            Variant::Foil => self.eur_foil,
            Variant::Etched => self.eur_etched,
            Variant::Gilded => self.eur_gilded,
        };
        price.filter(|value| *value != 0.0)
    }
}

/// Card record as served by the lookup service. Only the consumed subset of
/// fields is modeled; everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub collector_number: String,
    #[serde(default)]
    pub oracle_id: Option<String>,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageTiers>,
    #[serde(default)]
    pub card_faces: Option<Vec<CardFace>>,
    #[serde(default)]
    pub prices: LookupPrices,
    #[serde(default)]
    pub finishes: Vec<String>,
    #[serde(default)]
    pub legalities: HashMap<String, String>,
    #[serde(default)]
    pub prints_search_uri: Option<String>,
}

impl LookupCard {
    pub fn front_name(&self) -> &str {
        front_face_name(&self.name)
    }

    /// Best available image URL: the card's own tiers, falling back to the
    /// first face that has any (double-faced cards carry per-face images).
    pub fn best_image_url(&self) -> Option<&str> {
        self.image_uris
            .as_ref()
            .and_then(|tiers| tiers.best_url())
            .or_else(|| {
                self.card_faces
                    .as_ref()?
                    .iter()
                    .find_map(|face| face.image_uris.as_ref()?.best_url())
            })
    }

    pub fn price_for(&self, variant: Variant) -> Option<f64> {
        self.prices.price_for(variant)
    }

    /// Finishes this printing exists in, for the add and edit flows.
    pub fn available_variants(&self) -> Vec<Variant> {
        let variants: Vec<Variant> = self
            .finishes
            .iter()
            .filter_map(|finish| finish.parse().ok())
            .collect();
        if variants.is_empty() {
            vec![Variant::default()]
        } else {
            variants
        }
    }

    /// Formats the card is currently legal in.
    pub fn legal_formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self
            .legalities
            .iter()
            .filter(|(_, status)| status.as_str() == "legal")
            .map(|(format, _)| format.as_str())
            .collect();
        formats.sort();
        formats
    }
}

/// One page of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_cards: u64,
    #[serde(default)]
    pub data: Vec<LookupCard>,
}

/// Set metadata, consumed for the printed set size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub card_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prices_parse_from_strings_and_numbers() {
        let prices: LookupPrices = serde_json::from_value(json!({
            "eur": "3.20",
            "eur_foil": 7.5,
            "eur_etched": null,
            "usd": "0.49"
        }))
        .unwrap();
        assert_eq!(prices.eur, Some(3.2));
        assert_eq!(prices.eur_foil, Some(7.5));
        assert_eq!(prices.eur_etched, None);
        assert_eq!(prices.eur_gilded, None);
        assert_eq!(prices.usd, Some(0.49));
    }

    #[test]
    fn zero_and_missing_prices_are_absent() {
        let prices: LookupPrices = serde_json::from_value(json!({
            "eur": "0.00",
            "eur_foil": "1.83"
        }))
        .unwrap();
        assert_eq!(prices.price_for(Variant::Nonfoil), None);
        assert_eq!(prices.price_for(Variant::Foil), Some(1.83));
        assert_eq!(prices.price_for(Variant::Etched), None);
    }

    #[test]
    fn image_url_falls_back_to_faces() {
        let card: LookupCard = serde_json::from_value(json!({
            "id": "abc",
            "name": "Fire // Ice",
            "card_faces": [
                {"name": "Fire"},
                {"name": "Ice", "image_uris": {"normal": "https://cards.example/ice.jpg"}}
            ]
        }))
        .unwrap();
        assert_eq!(card.best_image_url(), Some("https://cards.example/ice.jpg"));
        assert_eq!(card.front_name(), "Fire");
    }

    #[test]
    fn finishes_map_to_variants() {
        let card: LookupCard = serde_json::from_value(json!({
            "id": "abc",
            "name": "Sol Ring",
            "finishes": ["nonfoil", "foil", "halffoil"]
        }))
        .unwrap();
        assert_eq!(
            card.available_variants(),
            vec![Variant::Nonfoil, Variant::Foil]
        );

        let bare: LookupCard =
            serde_json::from_value(json!({"id": "x", "name": "Island"})).unwrap();
        assert_eq!(bare.available_variants(), vec![Variant::Nonfoil]);
    }

    #[test]
    fn unknown_payload_fields_are_ignored() {
        let card: LookupCard = serde_json::from_value(json!({
            "id": "abc",
            "name": "Lightning Bolt",
            "object": "card",
            "games": ["paper", "mtgo"],
            "prices": {"eur": "1.10", "usd_etched": null}
        }))
        .unwrap();
        assert_eq!(card.price_for(Variant::Nonfoil), Some(1.1));
        assert_eq!(card.lang, "en");
    }
}
