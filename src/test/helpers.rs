use serde_json::json;

use crate::cards::card_entry::CardEntry;
use crate::cards::collection::Collection;
use crate::cards::variant::Variant;

/// An English Alpha Lightning Bolt row, the baseline fixture most store and
/// refresh tests start from.
pub fn bolt_entry() -> CardEntry {
    CardEntry {
        id: "f29ba16f".to_string(),
        name: "Lightning Bolt".to_string(),
        set_code: "lea".to_string(),
        set_name: "Limited Edition Alpha".to_string(),
        collector_number: "161".to_string(),
        set_size: Some(295),
        mana_cost: Some("{R}".to_string()),
        type_line: Some("Instant".to_string()),
        oracle_text: Some("Lightning Bolt deals 3 damage to any target.".to_string()),
        card_faces: None,
        oracle_id: Some("4457ed35".to_string()),
        prints_search_uri: None,
        lang: "en".to_string(),
        is_proxy: false,
        variant: Variant::Nonfoil,
        eur: None,
        purchase_price: None,
        count: 1,
        image_url: None,
    }
}

/// Same printing as [`bolt_entry`] in German. The service keeps the English
/// name on translated printings, so only the language differs.
pub fn bolt_entry_german() -> CardEntry {
    let mut entry = bolt_entry();
    entry.lang = "de".to_string();
    entry
}

pub fn proxy_entry() -> CardEntry {
    let mut entry = bolt_entry();
    entry.is_proxy = true;
    entry.eur = Some(0.0);
    entry
}

pub fn sol_ring_foil_entry() -> CardEntry {
    CardEntry {
        id: "97042ba6".to_string(),
        name: "Sol Ring".to_string(),
        set_code: "c21".to_string(),
        set_name: "Commander 2021".to_string(),
        collector_number: "263".to_string(),
        set_size: None,
        mana_cost: Some("{1}".to_string()),
        type_line: Some("Artifact".to_string()),
        oracle_text: None,
        card_faces: None,
        oracle_id: None,
        prints_search_uri: None,
        lang: "en".to_string(),
        is_proxy: false,
        variant: Variant::Foil,
        eur: None,
        purchase_price: None,
        count: 1,
        image_url: None,
    }
}

pub fn standard_collection(cards: Vec<CardEntry>) -> Collection {
    Collection {
        name: "Standard".to_string(),
        cards,
        color: "#aabbcc".to_string(),
        last_price_update: 0,
    }
}

/// Minimal card payload for mocked price lookups.
pub fn card_price_body(id: &str, name: &str, prices: serde_json::Value) -> String {
    json!({
        "id": id,
        "name": name,
        "set": "lea",
        "set_name": "Limited Edition Alpha",
        "collector_number": "161",
        "lang": "en",
        "prices": prices,
    })
    .to_string()
}
