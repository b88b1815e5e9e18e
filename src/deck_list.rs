use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::cards::card_entry::{AddOptions, CardEntry};
use crate::cards::collection::Collection;
use crate::cards::variant::Variant;
use crate::scryfall_client::ScryfallClient;
use crate::utilities::constants::PRICE_REQUEST_PACING_MS;

lazy_static! {
    static ref DECK_LINE_RE: Regex =
        Regex::new(r"^(\d+)x?\s+(.+?)(?:\s+\((\w+)\)\s+(\S+))?(\s+\*F\*)?$").unwrap();
}

/// One line of a text deck list: `<count> <name> [(<SET>) <number>] [*F*]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckLine {
    pub count: u32,
    pub name: String,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub foil: bool,
}

impl fmt::Display for DeckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.name)?;
        if let (Some(set), Some(number)) = (&self.set_code, &self.collector_number) {
            write!(f, " ({}) {}", set.to_uppercase(), number)?;
        }
        if self.foil {
            write!(f, " *F*")?;
        }
        Ok(())
    }
}

/// Parses a whole deck list. Blank lines and `#`/`//` comments are skipped;
/// lines that do not match the format are logged and dropped rather than
/// failing the import.
pub fn parse_deck_list(text: &str) -> Vec<DeckLine> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let captures = match DECK_LINE_RE.captures(line) {
            Some(captures) => captures,
            None => {
                warn!(
                    "Skipping unrecognized deck list entry on line {}: '{}'",
                    index + 1,
                    line
                );
                continue;
            }
        };
        let count: u32 = captures[1].parse().unwrap_or(0);
        if count == 0 {
            warn!("Skipping zero-count deck list entry on line {}", index + 1);
            continue;
        }
        lines.push(DeckLine {
            count,
            name: captures[2].to_string(),
            set_code: captures.get(3).map(|m| m.as_str().to_lowercase()),
            collector_number: captures.get(4).map(|m| m.as_str().to_string()),
            foil: captures.get(5).is_some(),
        });
    }
    lines
}

/// Resolves every parsed line against the lookup service. Lines naming a
/// printing go through the set+number endpoint, the rest through fuzzy name
/// lookup; a line that resolves to nothing is logged and dropped. The foil
/// marker maps to the foil finish.
pub async fn import_deck_list(
    text: &str,
    client: &ScryfallClient,
) -> Result<Vec<CardEntry>, Box<dyn std::error::Error>> {
    let mut entries = Vec::new();
    for line in parse_deck_list(text) {
        let card = match (&line.set_code, &line.collector_number) {
            (Some(set), Some(number)) => client.card_by_set_number(set, number).await?,
            _ => client.named_fuzzy(&line.name).await?,
        };
        match card {
            Some(card) => {
                let options = AddOptions {
                    variant: if line.foil {
                        Variant::Foil
                    } else {
                        Variant::Nonfoil
                    },
                    count: line.count,
                    ..AddOptions::default()
                };
                entries.push(CardEntry::from_lookup(&card, &options));
            }
            None => warn!("No card found for deck list entry '{}'", line),
        }
        tokio::time::sleep(Duration::from_millis(PRICE_REQUEST_PACING_MS)).await;
    }
    Ok(entries)
}

/// Renders a collection as a deck list, merging rows that agree on name,
/// printing and foilness. Any non-regular finish exports as foil.
pub fn export_deck_list(collection: &Collection) -> String {
    let mut totals: HashMap<(String, String, String, bool), u32> = HashMap::new();
    for card in &collection.cards {
        let key = (
            card.name.clone(),
            card.set_code.clone(),
            card.collector_number.clone(),
            card.variant.is_foil(),
        );
        *totals.entry(key).or_insert(0) += card.count.max(1);
    }
    totals
        .into_iter()
        .map(|((name, set, number, foil), count)| DeckLine {
            count,
            name,
            set_code: (!set.is_empty()).then_some(set),
            collector_number: (!number.is_empty()).then_some(number),
            foil,
        })
        .sorted_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.set_code.cmp(&b.set_code))
                .then_with(|| a.collector_number.cmp(&b.collector_number))
                .then_with(|| a.foil.cmp(&b.foil))
        })
        .map(|line| line.to_string())
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::helpers::{bolt_entry, card_price_body, sol_ring_foil_entry, standard_collection};
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn parses_a_full_line() {
        let lines = parse_deck_list("4 Lightning Bolt (LEA) 161 *F*");
        assert_eq!(
            lines,
            vec![DeckLine {
                count: 4,
                name: "Lightning Bolt".to_string(),
                set_code: Some("lea".to_string()),
                collector_number: Some("161".to_string()),
                foil: true,
            }]
        );
    }

    #[test]
    fn parses_a_bare_line_and_x_counts() {
        let lines = parse_deck_list("2 Sol Ring\n3x Brainstorm");
        assert_eq!(lines[0].name, "Sol Ring");
        assert_eq!(lines[0].set_code, None);
        assert!(!lines[0].foil);
        assert_eq!(lines[1].count, 3);
        assert_eq!(lines[1].name, "Brainstorm");
    }

    #[test]
    fn keeps_split_card_names_intact() {
        let lines = parse_deck_list("1 Fire // Ice (APC) 128");
        assert_eq!(lines[0].name, "Fire // Ice");
        assert_eq!(lines[0].set_code, Some("apc".to_string()));
        assert_eq!(lines[0].collector_number, Some("128".to_string()));
    }

    #[test]
    fn foil_marker_without_printing() {
        let lines = parse_deck_list("2 Sol Ring *F*");
        assert_eq!(lines[0].name, "Sol Ring");
        assert!(lines[0].foil);
    }

    #[test]
    fn drops_blanks_comments_and_junk() {
        let text = "1 Opt\n\n# Lands\n// sideboard below\nSideboard\n0 Ponder\n2 Ponder";
        let lines = parse_deck_list(text);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Opt");
        assert_eq!(lines[1].name, "Ponder");
        assert_eq!(lines[1].count, 2);
    }

    #[test]
    fn export_merges_rows_and_marks_foils() {
        let mut second_bolt = bolt_entry();
        second_bolt.count = 2;
        let mut etched = sol_ring_foil_entry();
        etched.variant = Variant::Etched;
        let collection = standard_collection(vec![
            bolt_entry(),
            second_bolt,
            sol_ring_foil_entry(),
            etched,
        ]);

        let text = export_deck_list(&collection);
        assert_eq!(text, "3 Lightning Bolt (LEA) 161\n2 Sol Ring (C21) 263 *F*");
    }

    #[test]
    fn export_omits_missing_printings() {
        let mut bare = bolt_entry();
        bare.set_code = String::new();
        bare.collector_number = String::new();
        let text = export_deck_list(&standard_collection(vec![bare]));
        assert_eq!(text, "1 Lightning Bolt");
    }

    #[test]
    fn lines_render_back_to_the_input_format() {
        for input in ["4 Lightning Bolt (LEA) 161 *F*", "2 Sol Ring"] {
            let lines = parse_deck_list(input);
            assert_eq!(lines[0].to_string(), input);
        }
    }

    #[tokio::test]
    async fn import_resolves_printings_and_names() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut server = std::thread::spawn(|| mockito::Server::new())
            .join()
            .unwrap();
        let client = ScryfallClient::new(Some(&server.url()), reqwest::Client::new());

        let by_number = server
            .mock("GET", "/cards/lea/161")
            .with_status(200)
            .with_body(card_price_body(
                "f29ba16f",
                "Lightning Bolt",
                json!({"eur": "3.20", "eur_foil": "99.00"}),
            ))
            .create();
        let by_name = server
            .mock("GET", "/cards/named")
            .match_query(Matcher::UrlEncoded("fuzzy".into(), "Sol Ring".into()))
            .with_status(200)
            .with_body(card_price_body("97042ba6", "Sol Ring", json!({"eur": "2.10"})))
            .create();
        let missing = server
            .mock("GET", "/cards/named")
            .match_query(Matcher::UrlEncoded("fuzzy".into(), "No Such Card".into()))
            .with_status(404)
            .with_body(r#"{"object": "error", "code": "not_found"}"#)
            .create();

        let entries = import_deck_list(
            "4 Lightning Bolt (LEA) 161 *F*\n2 Sol Ring\n1 No Such Card",
            &client,
        )
        .await
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "f29ba16f");
        assert_eq!(entries[0].variant, Variant::Foil);
        assert_eq!(entries[0].count, 4);
        assert_eq!(entries[0].eur, Some(99.0));
        assert_eq!(entries[1].id, "97042ba6");
        assert_eq!(entries[1].count, 2);
        by_number.assert();
        by_name.assert();
        missing.assert();
    }
}
