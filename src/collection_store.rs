use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, warn};

use crate::cards::card_entry::{CardEntry, CardKey};
use crate::cards::collection::Collection;

/// Persistence for all collections: one JSON array document, rewritten whole
/// on every mutation. Writes go to a temp file in the same directory and are
/// renamed over the target, so a crash never leaves a half-written document.
/// Concurrent writers are not coordinated; the last write wins.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    path: PathBuf,
}

impl CollectionStore {
    pub fn new(path: &str) -> Self {
        CollectionStore {
            path: PathBuf::from(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every collection. A missing file is an empty store; a document
    /// that no longer parses is logged and also treated as empty.
    pub fn load(&self) -> Result<Vec<Collection>, Box<dyn std::error::Error>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(collections) => Ok(collections),
            Err(e) => {
                error!(
                    "Collections file {} is not valid JSON ({}), starting empty",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Writes the whole document, pretty-printed with UTF-8 kept verbatim.
    pub fn save(&self, collections: &[Collection]) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(collections)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<Option<Collection>, Box<dyn std::error::Error>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|collection| collection.name == name))
    }

    /// Creates an empty collection. The name is the lookup key everywhere,
    /// so a second collection with the same name is refused.
    pub fn create(&self, name: &str, color: &str) -> Result<Collection, Box<dyn std::error::Error>> {
        let mut collections = self.load()?;
        if collections.iter().any(|collection| collection.name == name) {
            return Err(format!("A collection named '{}' already exists", name).into());
        }
        let collection = Collection::new(name, color);
        collections.push(collection.clone());
        self.save(&collections)?;
        Ok(collection)
    }

    /// Removes a collection by name. Returns whether anything was removed.
    pub fn delete(&self, name: &str) -> Result<bool, Box<dyn std::error::Error>> {
        let mut collections = self.load()?;
        let before = collections.len();
        collections.retain(|collection| collection.name != name);
        if collections.len() == before {
            return Ok(false);
        }
        self.save(&collections)?;
        Ok(true)
    }

    /// Replaces the first row matching `key`, or appends when none does.
    /// Add, edit and printing swaps all come through here, keyed by the
    /// row's identity as it was before the change.
    pub fn upsert_card(
        &self,
        collection_name: &str,
        key: &CardKey,
        mut entry: CardEntry,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if entry.is_proxy {
            entry.eur = Some(0.0);
        }
        let mut collections = self.load()?;
        let collection = match collections
            .iter_mut()
            .find(|collection| collection.name == collection_name)
        {
            Some(collection) => collection,
            None => {
                warn!(
                    "No collection named '{}', dropping card update",
                    collection_name
                );
                return Ok(());
            }
        };
        match collection.cards.iter_mut().find(|card| card.matches(key)) {
            Some(existing) => *existing = entry,
            None => collection.cards.push(entry),
        }
        self.save(&collections)
    }

    /// Removes the first row matching `key`. A key that matches nothing is
    /// a silent no-op.
    pub fn remove_card(
        &self,
        collection_name: &str,
        key: &CardKey,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut collections = self.load()?;
        let collection = match collections
            .iter_mut()
            .find(|collection| collection.name == collection_name)
        {
            Some(collection) => collection,
            None => {
                warn!(
                    "No collection named '{}', nothing to remove",
                    collection_name
                );
                return Ok(());
            }
        };
        match collection.cards.iter().position(|card| card.matches(key)) {
            Some(index) => {
                collection.cards.remove(index);
            }
            None => return Ok(()),
        }
        self.save(&collections)
    }

    /// Completion write of a price refresh: swaps in the repriced rows and
    /// stamps the refresh time, in one save.
    pub fn complete_refresh(
        &self,
        collection_name: &str,
        cards: Vec<CardEntry>,
        at: i64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut collections = self.load()?;
        let collection = match collections
            .iter_mut()
            .find(|collection| collection.name == collection_name)
        {
            Some(collection) => collection,
            None => {
                warn!(
                    "Collection '{}' disappeared during refresh, dropping its prices",
                    collection_name
                );
                return Ok(());
            }
        };
        collection.cards = cards;
        collection.last_price_update = at;
        self.save(&collections)
    }

    /// Marks every collection as never refreshed. A full refresh starts by
    /// forcing all timestamps back to zero.
    pub fn reset_refresh_timestamps(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut collections = self.load()?;
        for collection in collections.iter_mut() {
            collection.last_price_update = 0;
        }
        self.save(&collections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::helpers::{
        bolt_entry, bolt_entry_german, proxy_entry, standard_collection,
    };
    use tempfile::tempdir;

    struct TestContext {
        _temp_dir: tempfile::TempDir,
        store: CollectionStore,
    }

    impl TestContext {
        fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let temp_dir = tempdir().unwrap();
            let store =
                CollectionStore::new(temp_dir.path().join("collections.json").to_str().unwrap());
            TestContext {
                _temp_dir: temp_dir,
                store,
            }
        }
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let ctx = TestContext::new();
        assert!(ctx.store.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let ctx = TestContext::new();
        fs::write(ctx.store.path(), "{not json").unwrap();
        assert!(ctx.store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let ctx = TestContext::new();
        let mut entry = bolt_entry();
        entry.name = "Schöne Karte".to_string();
        let collections = vec![standard_collection(vec![entry])];

        ctx.store.save(&collections).unwrap();
        assert_eq!(ctx.store.load().unwrap(), collections);

        // Pretty-printed, non-ASCII kept verbatim
        let content = fs::read_to_string(ctx.store.path()).unwrap();
        assert!(content.starts_with("[\n"));
        assert!(content.contains("Schöne Karte"));
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let ctx = TestContext::new();
        ctx.store.create("Standard", "#aabbcc").unwrap();
        assert!(ctx.store.create("Standard", "#ddeeff").is_err());
        assert_eq!(ctx.store.load().unwrap().len(), 1);
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let ctx = TestContext::new();
        ctx.store.create("Standard", "#aabbcc").unwrap();
        assert!(ctx.store.delete("Standard").unwrap());
        assert!(!ctx.store.delete("Standard").unwrap());
        assert!(ctx.store.load().unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_only_the_matching_row() {
        let ctx = TestContext::new();
        let english = bolt_entry();
        let german = bolt_entry_german();
        ctx.store
            .save(&[standard_collection(vec![english.clone(), german.clone()])])
            .unwrap();

        let mut edited = german.clone();
        edited.purchase_price = Some(2.5);
        ctx.store
            .upsert_card("Standard", &german.key(), edited.clone())
            .unwrap();

        let cards = ctx.store.find("Standard").unwrap().unwrap().cards;
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0], english);
        assert_eq!(cards[1], edited);
    }

    #[test]
    fn upsert_appends_when_no_row_matches() {
        let ctx = TestContext::new();
        ctx.store.create("Standard", "#aabbcc").unwrap();

        let entry = bolt_entry();
        ctx.store
            .upsert_card("Standard", &entry.key(), entry.clone())
            .unwrap();

        let cards = ctx.store.find("Standard").unwrap().unwrap().cards;
        assert_eq!(cards, vec![entry]);
    }

    #[test]
    fn upsert_zeroes_proxy_prices() {
        let ctx = TestContext::new();
        ctx.store.create("Standard", "#aabbcc").unwrap();

        let mut entry = proxy_entry();
        entry.eur = Some(12.0);
        ctx.store
            .upsert_card("Standard", &entry.key(), entry)
            .unwrap();

        let cards = ctx.store.find("Standard").unwrap().unwrap().cards;
        assert_eq!(cards[0].eur, Some(0.0));
    }

    #[test]
    fn remove_deletes_exactly_one_row() {
        let ctx = TestContext::new();
        let entry = bolt_entry();
        ctx.store
            .save(&[standard_collection(vec![entry.clone()])])
            .unwrap();

        let mut wrong_key = entry.key();
        wrong_key.collector_number = "999".to_string();
        ctx.store.remove_card("Standard", &wrong_key).unwrap();
        assert_eq!(ctx.store.find("Standard").unwrap().unwrap().cards.len(), 1);

        ctx.store.remove_card("Standard", &entry.key()).unwrap();
        assert!(ctx.store.find("Standard").unwrap().unwrap().cards.is_empty());
    }

    #[test]
    fn deleting_one_language_keeps_the_other() {
        let ctx = TestContext::new();
        let english = bolt_entry();
        let german = bolt_entry_german();
        ctx.store
            .save(&[standard_collection(vec![english.clone(), german.clone()])])
            .unwrap();

        ctx.store.remove_card("Standard", &german.key()).unwrap();

        let cards = ctx.store.find("Standard").unwrap().unwrap().cards;
        assert_eq!(cards, vec![english]);
    }

    #[test]
    fn complete_refresh_swaps_cards_and_timestamp() {
        let ctx = TestContext::new();
        let mut entry = bolt_entry();
        ctx.store
            .save(&[standard_collection(vec![entry.clone()])])
            .unwrap();

        entry.eur = Some(3.2);
        ctx.store
            .complete_refresh("Standard", vec![entry.clone()], 1_700_000_000)
            .unwrap();

        let collection = ctx.store.find("Standard").unwrap().unwrap();
        assert_eq!(collection.cards, vec![entry]);
        assert_eq!(collection.last_price_update, 1_700_000_000);
    }

    #[test]
    fn reset_marks_every_collection_stale() {
        let ctx = TestContext::new();
        let mut first = standard_collection(vec![bolt_entry()]);
        first.last_price_update = 1_700_000_000;
        let mut second = standard_collection(vec![]);
        second.name = "Modern".to_string();
        second.last_price_update = 1_700_000_500;
        ctx.store.save(&[first, second]).unwrap();

        ctx.store.reset_refresh_timestamps().unwrap();

        for collection in ctx.store.load().unwrap() {
            assert_eq!(collection.last_price_update, 0);
        }
    }
}
