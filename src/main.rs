mod cards;
mod collection_store;
mod deck_list;
mod image_cache;
mod price_refresher;
mod scryfall_client;
#[cfg(test)]
mod test;
mod utilities;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::cards::card_entry::{AddOptions, CardEntry};
use crate::cards::lookup_card::LookupCard;
use crate::cards::variant::Variant;
use crate::collection_store::CollectionStore;
use crate::deck_list::{export_deck_list, import_deck_list};
use crate::image_cache::ImageCache;
use crate::price_refresher::{RefreshEvent, RefreshRegistry, RefreshSettings};
use crate::scryfall_client::ScryfallClient;
use crate::utilities::config::CONFIG;
use crate::utilities::constants::DEFAULT_COLLECTION_COLOR;
use crate::utilities::string_manipulators::{parse_decimal, timestamp_as_string};

fn print_usage() {
    println!("Usage: mtg_collection_manager <command> [args]");
    println!();
    println!("  search <name>");
    println!("  collections");
    println!("  show <collection>");
    println!("  create <collection> [color]");
    println!("  delete-collection <collection>");
    println!("  add <collection> <card name> [lang=..] [variant=..] [count=..] [price=..] [proxy]");
    println!("  edit <collection> <index> [lang=..] [variant=..] [count=..] [price=..] [proxy=0|1]");
    println!("  variants <collection> <index>");
    println!("  reprint <collection> <index> <printing index>");
    println!("  remove <collection> <index>");
    println!("  refresh [collection]");
    println!("  refresh-all");
    println!("  import <collection> <file>");
    println!("  export <collection>");
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn spawn_event_printer(mut events: UnboundedReceiver<RefreshEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RefreshEvent::Status { collection, status } => {
                    info!("[{}] {}", collection, status)
                }
                RefreshEvent::Progress {
                    collection,
                    done,
                    total,
                } => info!("[{}] {}/{}", collection, done, total),
                RefreshEvent::Finished { collection } => {
                    println!("Prices refreshed for '{}'", collection)
                }
            }
        }
    })
}

fn print_card(card: &LookupCard) {
    println!("{} {}", card.name, card.mana_cost.as_deref().unwrap_or(""));
    if let Some(type_line) = &card.type_line {
        println!("{}", type_line);
    }
    if let Some(text) = &card.oracle_text {
        println!("{}", text);
    }
    for face in card.card_faces.iter().flatten() {
        println!("-- {}", face.name);
        if let Some(text) = &face.oracle_text {
            println!("{}", text);
        }
    }
    println!(
        "{} ({}) {}",
        card.set_name,
        card.set.to_uppercase(),
        card.collector_number
    );
    if let Some(price) = card.price_for(Variant::Nonfoil) {
        println!("EUR {:.2}", price);
    }
    if let Some(price) = card.price_for(Variant::Foil) {
        println!("EUR (foil) {:.2}", price);
    }
    let finishes: Vec<String> = card
        .available_variants()
        .iter()
        .map(|variant| variant.to_string())
        .collect();
    println!("Finishes: {}", finishes.join(", "));
    let formats = card.legal_formats();
    if !formats.is_empty() {
        println!("Legal in: {}", formats.join(", "));
    }
}

fn find_row(
    store: &CollectionStore,
    name: &str,
    index: usize,
) -> Result<CardEntry, Box<dyn std::error::Error>> {
    let collection = store
        .find(name)?
        .ok_or_else(|| format!("No collection named '{}'", name))?;
    let position = index.checked_sub(1).ok_or("Card indexes start at 1")?;
    collection
        .cards
        .get(position)
        .cloned()
        .ok_or_else(|| format!("No card at index {} in '{}'", index, name).into())
}

/// Splits `add` arguments into the card name words and the trailing
/// `key=value` options.
fn split_card_args(args: &[String]) -> (Vec<&str>, Vec<&str>) {
    let split = args
        .iter()
        .position(|arg| arg.contains('=') || arg == "proxy")
        .unwrap_or(args.len());
    (
        args[..split].iter().map(String::as_str).collect(),
        args[split..].iter().map(String::as_str).collect(),
    )
}

fn parse_add_options(args: &[&str]) -> Result<AddOptions, Box<dyn std::error::Error>> {
    let mut options = AddOptions::default();
    for arg in args {
        if *arg == "proxy" {
            options.is_proxy = true;
            continue;
        }
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Unrecognized option '{}'", arg))?;
        match key {
            "lang" => options.lang = Some(value.to_string()),
            "variant" => {
                options.variant = value
                    .parse()
                    .map_err(|_| format!("Unknown variant '{}'", value))?
            }
            "count" => options.count = value.parse()?,
            // Invalid price text is dropped, not rejected
            "price" => options.purchase_price = parse_decimal(value),
            "proxy" => options.is_proxy = value != "0",
            _ => return Err(format!("Unrecognized option '{}'", key).into()),
        }
    }
    Ok(options)
}

async fn search_command(
    client: &ScryfallClient,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.join(" ");
    if name.is_empty() {
        return Err("search needs a card name".into());
    }
    match client.named_fuzzy(&name).await? {
        Some(card) => print_card(&card),
        None => {
            let page = client.search(&name).await?;
            if page.data.is_empty() {
                println!("No cards found for '{}'", name);
            } else {
                println!("{} matches:", page.total_cards);
                for card in page.data.iter().take(20) {
                    println!(
                        "  {} ({}) {} [{}]",
                        card.name,
                        card.set.to_uppercase(),
                        card.collector_number,
                        card.lang
                    );
                }
            }
        }
    }
    Ok(())
}

async fn collections_command(
    store: &CollectionStore,
    registry: &RefreshRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let collections = store.load()?;
    if collections.is_empty() {
        println!("No collections yet. Create one with 'create <name>'.");
        return Ok(());
    }

    let started = registry.start_due(collections);
    if started > 0 {
        info!("Started {} price refresh task(s)", started);
        registry.wait_for_completion().await;
    }

    let collections = store.load()?;
    println!(
        "{:<20} {:>5} {:>10} {:>10} {:>8}  {:<8} {}",
        "name", "cards", "value", "paid", "delta", "status", "refreshed"
    );
    for collection in &collections {
        println!(
            "{:<20} {:>5} {:>10.2} {:>10.2} {:>8.2}  {:<8} {}",
            collection.name,
            collection.cards.len(),
            collection.market_value(),
            collection.purchase_value(),
            collection.value_delta(),
            registry.status(&collection.name).to_string(),
            timestamp_as_string(collection.last_price_update),
        );
    }
    Ok(())
}

async fn show_command(
    store: &CollectionStore,
    registry: &RefreshRegistry,
    cache: &ImageCache,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("show needs a collection name")?;
    if registry.is_pending(name) {
        println!("'{}' is refreshing prices right now, try again shortly", name);
        return Ok(());
    }
    let collection = store
        .find(name)?
        .ok_or_else(|| format!("No collection named '{}'", name))?;
    println!("{} ({} cards)", collection.name, collection.cards.len());

    let images: Vec<Option<PathBuf>> = stream::iter(collection.cards.iter())
        .map(|card| {
            cache.resolve(
                card.image_url.as_ref(),
                Some(card.name.as_str()),
                Some(card.set_code.as_str()),
            )
        })
        .buffered(10)
        .collect()
        .await;

    for (index, (card, image)) in collection.cards.iter().zip(images).enumerate() {
        let mut details = format!(
            "({}) {} [{}]",
            card.set_code.to_uppercase(),
            card.collector_number,
            card.lang
        );
        if card.variant != Variant::Nonfoil {
            details.push_str(&format!(" {}", card.variant));
        }
        if card.is_proxy {
            details.push_str(" proxy");
        }
        let price = card
            .eur
            .map(|value| format!("{:.2}", value))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}. {:<30} {} x{} {:>8}  {}",
            index + 1,
            card.name,
            details,
            card.count,
            price,
            image.map(|p| p.display().to_string()).unwrap_or_default(),
        );
    }
    println!(
        "Market value: {:.2} EUR, paid: {:.2} EUR",
        collection.market_value(),
        collection.purchase_value()
    );
    Ok(())
}

fn create_command(
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("create needs a collection name")?;
    let color = args
        .get(1)
        .map(String::as_str)
        .unwrap_or(DEFAULT_COLLECTION_COLOR);
    store.create(name, color)?;
    println!("Created collection '{}'", name);
    Ok(())
}

fn delete_collection_command(
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("delete-collection needs a name")?;
    if !confirm(&format!("Delete collection '{}' and all its cards?", name)) {
        println!("Kept '{}'", name);
        return Ok(());
    }
    if store.delete(name)? {
        println!("Deleted '{}'", name);
    } else {
        println!("No collection named '{}'", name);
    }
    Ok(())
}

async fn add_command(
    client: &ScryfallClient,
    store: &CollectionStore,
    cache: &ImageCache,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("add needs a collection name")?;
    if store.find(collection)?.is_none() {
        return Err(format!("No collection named '{}'", collection).into());
    }
    let (name_parts, option_args) = split_card_args(&args[1..]);
    let name = name_parts.join(" ");
    if name.is_empty() {
        return Err("add needs a card name".into());
    }
    let options = parse_add_options(&option_args)?;

    let card = client
        .named_fuzzy(&name)
        .await?
        .ok_or_else(|| format!("No card found for '{}'", name))?;
    let mut entry = CardEntry::from_lookup(&card, &options);
    if let Some(set_info) = client.set_by_code(&card.set).await? {
        entry.set_size = Some(set_info.card_count);
    }
    if cache
        .resolve(
            entry.image_url.as_ref(),
            Some(entry.name.as_str()),
            Some(entry.set_code.as_str()),
        )
        .await
        .is_none()
    {
        debug!("No image cached for '{}'", entry.name);
    }

    store.upsert_card(collection, &entry.key(), entry.clone())?;
    println!(
        "Added {} ({}) {} to '{}'",
        entry.name,
        entry.set_code.to_uppercase(),
        entry.collector_number,
        collection
    );
    Ok(())
}

async fn switch_row_language(
    client: &ScryfallClient,
    row: &CardEntry,
    lang: &str,
) -> Result<CardEntry, Box<dyn std::error::Error>> {
    let oracle_id = row
        .oracle_id
        .as_deref()
        .ok_or("This row has no oracle id to translate with")?;
    let page = client.search_oracle_lang(oracle_id, lang).await?;
    let translated = page
        .data
        .iter()
        .find(|card| card.set == row.set_code && card.collector_number == row.collector_number)
        .or_else(|| page.data.first())
        .ok_or_else(|| format!("No {} printing found for '{}'", lang, row.name))?;
    Ok(row.switch_language(translated))
}

async fn edit_command(
    client: &ScryfallClient,
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("edit needs a collection name")?;
    let index: usize = args.get(1).ok_or("edit needs a card index")?.parse()?;
    let row = find_row(store, collection, index)?;
    // Identity is snapshotted before any field changes
    let key = row.key();

    let mut edited = row;
    let was_proxy = edited.is_proxy;
    let mut refetch_price = false;
    let mut new_lang: Option<String> = None;
    for arg in &args[2..] {
        let (option_key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Unrecognized option '{}'", arg))?;
        match option_key {
            "lang" => new_lang = Some(value.to_string()),
            "variant" => {
                edited.variant = value
                    .parse()
                    .map_err(|_| format!("Unknown variant '{}'", value))?;
                refetch_price = true;
            }
            "count" => edited.count = value.parse::<u32>()?.max(1),
            "price" => edited.purchase_price = parse_decimal(value),
            "proxy" => edited.is_proxy = value != "0",
            _ => return Err(format!("Unrecognized option '{}'", option_key).into()),
        }
    }

    if let Some(lang) = new_lang {
        let translated = switch_row_language(client, &edited, &lang).await?;
        edited = translated;
    }
    if edited.is_proxy {
        edited.eur = Some(0.0);
    } else if refetch_price || was_proxy {
        match client.card_by_id(&edited.id).await {
            Ok(card) => edited.eur = card.price_for(edited.variant),
            Err(e) => {
                warn!("Price lookup failed for '{}': {}", edited.name, e);
                edited.eur = None;
            }
        }
    }

    store.upsert_card(collection, &key, edited)?;
    println!("Updated card {} in '{}'", index, collection);
    Ok(())
}

async fn variants_command(
    client: &ScryfallClient,
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("variants needs a collection name")?;
    let index: usize = args.get(1).ok_or("variants needs a card index")?.parse()?;
    let row = find_row(store, collection, index)?;
    let uri = row
        .prints_search_uri
        .as_deref()
        .ok_or("This row has no printings listing")?;

    let printings = client.variants(uri).await?;
    if printings.is_empty() {
        println!("No other printings found for '{}'", row.name);
        return Ok(());
    }
    for (position, card) in printings.iter().enumerate() {
        let price = card
            .price_for(Variant::Nonfoil)
            .map(|value| format!("{:.2} EUR", value))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}. {} ({}) {} [{}] {} {}",
            position + 1,
            card.name,
            card.set.to_uppercase(),
            card.collector_number,
            card.lang,
            card.finishes.join("/"),
            price
        );
    }
    Ok(())
}

async fn reprint_command(
    client: &ScryfallClient,
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("reprint needs a collection name")?;
    let index: usize = args.get(1).ok_or("reprint needs a card index")?.parse()?;
    let choice: usize = args.get(2).ok_or("reprint needs a printing index")?.parse()?;
    let row = find_row(store, collection, index)?;
    let key = row.key();
    let uri = row
        .prints_search_uri
        .as_deref()
        .ok_or("This row has no printings listing")?;

    let printings = client.variants(uri).await?;
    let position = choice.checked_sub(1).ok_or("Printing indexes start at 1")?;
    let chosen = printings
        .get(position)
        .ok_or_else(|| format!("No printing at index {}", choice))?;

    let replaced = row.replace_printing(chosen);
    store.upsert_card(collection, &key, replaced.clone())?;
    println!(
        "Swapped card {} to {} ({}) {}",
        index,
        replaced.name,
        replaced.set_code.to_uppercase(),
        replaced.collector_number
    );
    Ok(())
}

fn remove_command(
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("remove needs a collection name")?;
    let index: usize = args.get(1).ok_or("remove needs a card index")?.parse()?;
    let row = find_row(store, collection, index)?;
    if !confirm(&format!(
        "Remove {} ({}) {} from '{}'?",
        row.name,
        row.set_code.to_uppercase(),
        row.collector_number,
        collection
    )) {
        println!("Kept {}", row.name);
        return Ok(());
    }
    store.remove_card(collection, &row.key())?;
    println!("Removed {}", row.name);
    Ok(())
}

async fn refresh_command(
    store: &CollectionStore,
    registry: &RefreshRegistry,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    match args.first() {
        Some(name) => {
            let collection = store
                .find(name)?
                .ok_or_else(|| format!("No collection named '{}'", name))?;
            if registry.start(collection) {
                registry.wait_for_completion().await;
            } else {
                println!("A refresh for '{}' is already running", name);
            }
        }
        None => {
            let started = registry.start_due(store.load()?);
            println!("Started {} refresh task(s)", started);
            registry.wait_for_completion().await;
        }
    }
    Ok(())
}

async fn refresh_all_command(
    registry: &RefreshRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = registry.refresh_all().await?;
    println!("Restarted price refresh for {} collection(s)", started);
    registry.wait_for_completion().await;
    Ok(())
}

async fn import_command(
    client: &ScryfallClient,
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let collection = args.first().ok_or("import needs a collection name")?;
    let path = args.get(1).ok_or("import needs a deck list file")?;
    if store.find(collection)?.is_none() {
        return Err(format!("No collection named '{}'", collection).into());
    }

    let text = fs::read_to_string(path)?;
    let entries = import_deck_list(&text, client).await?;
    let count = entries.len();
    for entry in entries {
        store.upsert_card(collection, &entry.key(), entry)?;
    }
    println!("Imported {} card(s) into '{}'", count, collection);
    Ok(())
}

fn export_command(
    store: &CollectionStore,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("export needs a collection name")?;
    let collection = store
        .find(name)?
        .ok_or_else(|| format!("No collection named '{}'", name))?;
    println!("{}", export_deck_list(&collection));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(command) => command.as_str(),
        None => {
            print_usage();
            return Ok(());
        }
    };

    let client = ScryfallClient::new(None, reqwest::Client::new());
    let store = CollectionStore::new(&CONFIG.collections_file);
    let cache = ImageCache::new(
        &CONFIG.image_cache_dir,
        reqwest::Client::new(),
        client.clone(),
    );
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let registry = RefreshRegistry::with_settings(
        client.clone(),
        store.clone(),
        events_tx,
        RefreshSettings {
            interval: Duration::from_secs(CONFIG.refresh_interval_secs),
            pacing: Duration::from_millis(CONFIG.request_pacing_ms),
            cancel_wait: Duration::from_secs(CONFIG.cancel_wait_secs),
        },
    );
    let printer = spawn_event_printer(events_rx);

    let outcome = match command {
        "search" => search_command(&client, &args[1..]).await,
        "collections" => collections_command(&store, &registry).await,
        "show" => show_command(&store, &registry, &cache, &args[1..]).await,
        "create" => create_command(&store, &args[1..]),
        "delete-collection" => delete_collection_command(&store, &args[1..]),
        "add" => add_command(&client, &store, &cache, &args[1..]).await,
        "edit" => edit_command(&client, &store, &args[1..]).await,
        "variants" => variants_command(&client, &store, &args[1..]).await,
        "reprint" => reprint_command(&client, &store, &args[1..]).await,
        "remove" => remove_command(&store, &args[1..]),
        "refresh" => refresh_command(&store, &registry, &args[1..]).await,
        "refresh-all" => refresh_all_command(&registry).await,
        "import" => import_command(&client, &store, &args[1..]).await,
        "export" => export_command(&store, &args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    };

    registry.cancel_all().await;
    drop(registry);
    let _ = printer.await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::helpers::{card_price_body, standard_collection};
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::tempdir;

    struct TestContext {
        server: mockito::ServerGuard,
        _temp_dir: tempfile::TempDir,
        store: CollectionStore,
        client: ScryfallClient,
        cache: ImageCache,
    }

    impl TestContext {
        fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let server = std::thread::spawn(|| mockito::Server::new())
                .join()
                .unwrap();
            let temp_dir = tempdir().unwrap();
            let store =
                CollectionStore::new(temp_dir.path().join("collections.json").to_str().unwrap());
            let client = ScryfallClient::new(Some(&server.url()), reqwest::Client::new());
            let cache = ImageCache::new(
                temp_dir.path().join("images").to_str().unwrap(),
                reqwest::Client::new(),
                client.clone(),
            );
            TestContext {
                server,
                _temp_dir: temp_dir,
                store,
                client,
                cache,
            }
        }
    }

    #[tokio::test]
    async fn add_into_a_missing_collection_fails_before_any_lookup() {
        let mut ctx = TestContext::new();
        ctx.store.save(&[standard_collection(vec![])]).unwrap();
        let mock = ctx.server.mock("GET", Matcher::Any).expect(0).create();

        let args = vec![
            "Missing".to_string(),
            "Lightning".to_string(),
            "Bolt".to_string(),
        ];
        let err = add_command(&ctx.client, &ctx.store, &ctx.cache, &args)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No collection named 'Missing'"));
        assert_eq!(ctx.store.load().unwrap(), vec![standard_collection(vec![])]);
        mock.assert();
    }

    #[tokio::test]
    async fn add_appends_the_looked_up_card() {
        let mut ctx = TestContext::new();
        ctx.store.save(&[standard_collection(vec![])]).unwrap();
        let mock = ctx
            .server
            .mock("GET", "/cards/named")
            .match_query(Matcher::UrlEncoded(
                "fuzzy".into(),
                "Lightning Bolt".into(),
            ))
            .with_status(200)
            .with_body(card_price_body(
                "f29ba16f",
                "Lightning Bolt",
                json!({"eur": "3.20"}),
            ))
            .create();

        let args = vec![
            "Standard".to_string(),
            "Lightning".to_string(),
            "Bolt".to_string(),
        ];
        add_command(&ctx.client, &ctx.store, &ctx.cache, &args)
            .await
            .unwrap();

        let stored = ctx.store.find("Standard").unwrap().unwrap();
        assert_eq!(stored.cards.len(), 1);
        assert_eq!(stored.cards[0].name, "Lightning Bolt");
        assert_eq!(stored.cards[0].set_code, "lea");
        assert_eq!(stored.cards[0].eur, Some(3.2));
        mock.assert();
    }
}
