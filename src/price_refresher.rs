use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::cards::card_entry::CardEntry;
use crate::cards::collection::Collection;
use crate::collection_store::CollectionStore;
use crate::scryfall_client::ScryfallClient;
use crate::utilities::constants::{
    CANCEL_WAIT_SECS, PRICE_REFRESH_INTERVAL_SECS, PRICE_REQUEST_PACING_MS,
};

/// Lifecycle of one collection's price refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Pending,
    Done,
    Error,
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStatus::Idle => write!(f, "idle"),
            RefreshStatus::Pending => write!(f, "pending"),
            RefreshStatus::Done => write!(f, "done"),
            RefreshStatus::Error => write!(f, "error"),
        }
    }
}

/// Progress notifications from running refresh tasks, for whoever renders
/// status.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Status {
        collection: String,
        status: RefreshStatus,
    },
    Progress {
        collection: String,
        done: usize,
        total: usize,
    },
    Finished {
        collection: String,
    },
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// A collection refreshed more recently than this is skipped by the scan.
    pub interval: Duration,
    /// Sleep between per-card requests, to stay polite to the service.
    pub pacing: Duration,
    /// How long `cancel_all` waits for a task before giving up on it.
    pub cancel_wait: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(PRICE_REFRESH_INTERVAL_SECS),
            pacing: Duration::from_millis(PRICE_REQUEST_PACING_MS),
            cancel_wait: Duration::from_secs(CANCEL_WAIT_SECS),
        }
    }
}

/// One refresh run over one collection. Prices are fetched card by card in
/// document order; per-card failures empty that card's price and the run
/// goes on. Nothing is persisted until the whole run finishes.
#[derive(Clone)]
pub struct PriceRefresher {
    client: ScryfallClient,
    store: CollectionStore,
    pacing: Duration,
}

impl PriceRefresher {
    pub fn new(client: ScryfallClient, store: CollectionStore, pacing: Duration) -> Self {
        PriceRefresher {
            client,
            store,
            pacing,
        }
    }

    pub async fn refresh_collection(
        &self,
        mut collection: Collection,
        abort: Arc<AtomicBool>,
        events: UnboundedSender<RefreshEvent>,
    ) -> RefreshStatus {
        let name = collection.name.clone();
        let total = collection.cards.len();
        let _ = events.send(RefreshEvent::Status {
            collection: name.clone(),
            status: RefreshStatus::Pending,
        });
        info!("Refreshing prices for '{}' ({} cards)", name, total);

        let mut done = 0;
        for card in collection.cards.iter_mut() {
            if abort.load(Ordering::SeqCst) {
                warn!("Price refresh for '{}' aborted, discarding partial run", name);
                let _ = events.send(RefreshEvent::Status {
                    collection: name.clone(),
                    status: RefreshStatus::Error,
                });
                return RefreshStatus::Error;
            }
            self.refresh_card(card).await;
            done += 1;
            let _ = events.send(RefreshEvent::Progress {
                collection: name.clone(),
                done,
                total,
            });
            tokio::time::sleep(self.pacing).await;
        }

        let finished_at = Utc::now().timestamp();
        if let Err(e) = self
            .store
            .complete_refresh(&name, collection.cards, finished_at)
        {
            error!("Could not persist refreshed prices for '{}': {}", name, e);
            let _ = events.send(RefreshEvent::Status {
                collection: name.clone(),
                status: RefreshStatus::Error,
            });
            return RefreshStatus::Error;
        }

        info!("Prices for '{}' refreshed", name);
        let _ = events.send(RefreshEvent::Status {
            collection: name.clone(),
            status: RefreshStatus::Done,
        });
        let _ = events.send(RefreshEvent::Finished { collection: name });
        RefreshStatus::Done
    }

    async fn refresh_card(&self, card: &mut CardEntry) {
        if card.is_proxy {
            // Proxies never carry a market price
            card.eur = Some(0.0);
            return;
        }
        if card.id.is_empty() {
            debug!("Skipping '{}': no service id", card.name);
            return;
        }
        match self.client.card_by_id(&card.id).await {
            Ok(lookup) => {
                card.eur = lookup.price_for(card.variant);
                debug!("'{}' ({}) priced at {:?}", card.name, card.variant, card.eur);
            }
            Err(e) => {
                warn!(
                    "Price lookup failed for '{}' ({}): {}",
                    card.name, card.id, e
                );
                card.eur = None;
            }
        }
    }
}

struct RunningRefresh {
    abort: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Task registry for refresh runs, keyed by collection name. At most one
/// task per name is ever in flight; starting a second is a no-op. Statuses
/// outlive their tasks so the shell can keep showing Done or Error.
pub struct RefreshRegistry {
    refresher: PriceRefresher,
    store: CollectionStore,
    events: UnboundedSender<RefreshEvent>,
    settings: RefreshSettings,
    running: Arc<Mutex<HashMap<String, RunningRefresh>>>,
    statuses: Arc<Mutex<HashMap<String, RefreshStatus>>>,
}

impl RefreshRegistry {
    pub fn new(
        client: ScryfallClient,
        store: CollectionStore,
        events: UnboundedSender<RefreshEvent>,
    ) -> Self {
        Self::with_settings(client, store, events, RefreshSettings::default())
    }

    pub fn with_settings(
        client: ScryfallClient,
        store: CollectionStore,
        events: UnboundedSender<RefreshEvent>,
        settings: RefreshSettings,
    ) -> Self {
        RefreshRegistry {
            refresher: PriceRefresher::new(client, store.clone(), settings.pacing),
            store,
            events,
            settings,
            running: Arc::new(Mutex::new(HashMap::new())),
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawns a refresh task for the collection unless one is already in
    /// flight for that name. Returns whether a task was started.
    pub fn start(&self, collection: Collection) -> bool {
        let name = collection.name.clone();
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        if running
            .get(&name)
            .map_or(false, |run| !run.handle.is_finished())
        {
            debug!("Refresh for '{}' already in flight", name);
            return false;
        }

        self.set_status(&name, RefreshStatus::Pending);
        let abort = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn({
            let refresher = self.refresher.clone();
            let events = self.events.clone();
            let statuses = Arc::clone(&self.statuses);
            let abort = Arc::clone(&abort);
            let name = name.clone();
            async move {
                let status = refresher.refresh_collection(collection, abort, events).await;
                if let Ok(mut statuses) = statuses.lock() {
                    statuses.insert(name, status);
                }
            }
        });
        running.insert(name, RunningRefresh { abort, handle });
        true
    }

    /// The periodic scan: starts a task for every collection that has cards
    /// and has not been refreshed within the interval. Skipped collections
    /// keep their current status. Returns how many tasks were started.
    pub fn start_due(&self, collections: Vec<Collection>) -> usize {
        let now = Utc::now().timestamp();
        let mut started = 0;
        for collection in collections {
            if collection.cards.is_empty() {
                debug!("Skipping '{}': no cards", collection.name);
                continue;
            }
            let age = now - collection.last_price_update;
            if age < self.settings.interval.as_secs() as i64 {
                debug!("Skipping '{}': refreshed {}s ago", collection.name, age);
                continue;
            }
            if self.start(collection) {
                started += 1;
            }
        }
        started
    }

    fn set_status(&self, name: &str, status: RefreshStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(name.to_string(), status);
        }
    }

    pub fn status(&self, name: &str) -> RefreshStatus {
        self.statuses
            .lock()
            .ok()
            .and_then(|statuses| statuses.get(name).copied())
            .unwrap_or(RefreshStatus::Idle)
    }

    /// A collection cannot be opened for editing while this is true.
    pub fn is_pending(&self, name: &str) -> bool {
        self.status(name) == RefreshStatus::Pending
    }

    /// Flags every running task to abort, then waits up to the configured
    /// bound for each. A task that does not stop in time is abandoned.
    pub async fn cancel_all(&self) {
        let running: Vec<(String, RunningRefresh)> = match self.running.lock() {
            Ok(mut guard) => guard.drain().collect(),
            Err(_) => return,
        };
        if running.is_empty() {
            return;
        }
        info!("Cancelling {} price refresh task(s)", running.len());
        for (_, run) in running.iter() {
            run.abort.store(true, Ordering::SeqCst);
        }
        let wait = self.settings.cancel_wait;
        let joins = running.into_iter().map(|(name, run)| async move {
            match tokio::time::timeout(wait, run.handle).await {
                Ok(_) => debug!("Refresh task for '{}' stopped", name),
                Err(_) => warn!(
                    "Refresh task for '{}' did not stop within {:?}, giving up",
                    name, wait
                ),
            }
        });
        join_all(joins).await;
    }

    /// Full restart: every timestamp back to zero (persisted), in-flight
    /// runs cancelled, then a fresh scan over the reloaded store.
    pub async fn refresh_all(&self) -> Result<usize, Box<dyn std::error::Error>> {
        info!("Full price refresh requested");
        self.store.reset_refresh_timestamps()?;
        self.cancel_all().await;
        let collections = self.store.load()?;
        Ok(self.start_due(collections))
    }

    /// Joins every task started so far. For shell flows that launch runs
    /// and then block until the work is done; not safe to race with
    /// `cancel_all`.
    pub async fn wait_for_completion(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = match self.running.lock() {
                Ok(mut guard) => guard.drain().map(|(_, run)| run.handle).collect(),
                Err(_) => return,
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }
}
