//! # Persistence
//!
//! Write-through mirror of the collection store.
//!
//! ## Requirements
//!
//! - Plain key-value get/set, nothing more
//! - Best effort: a failed write is logged and forgotten, the in-memory state stays the truth for the session
//! - Never in a mutation's way: writes go through one writer task, each bounded by a timeout
//! - Read once on start-up
//!
//! ## Layout
//!
//! - `favorites`: JSON array of `{ movieId, addedAt }` in display order
//! - `watchlist`: same as favorites
//! - `ratings`: JSON array of `{ movieId, rating }` in display order
//!
//! A missing key is an empty collection. An unreadable value is logged and also treated as empty.
//!
//! ## Backends
//!
//! - [`RedisStore`]: one connection manager, a single retry and a short connect timeout so a dead Redis
//!   never holds up a mutation for long
//! - [`MemoryStore`]: tests and runs without Redis
use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::de::DeserializeOwned;
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    error::StorageError,
    model::{CollectionKind, Hydrated, RatedMovie},
    store::{CollectionStore, Snapshot},
};

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Some(Duration::from_millis(100)));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await?;

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);

        Ok(())
    }
}

/// How long one durable write may take before it is abandoned.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

enum Write {
    Flush(CollectionKind),
    Settle(oneshot::Sender<()>),
}

struct Mirror {
    durable: Arc<dyn DurableStore>,
    store: Arc<CollectionStore>,
}

impl Mirror {
    async fn write(&self, kind: CollectionKind) -> Result<(), StorageError> {
        let encoded = encode(&self.store.snapshot(kind))?;

        timeout(WRITE_TIMEOUT, self.durable.set(kind.storage_key(), encoded))
            .await
            .map_err(|_| StorageError::Unavailable("write timed out".to_string()))?
    }

    async fn read<T: DeserializeOwned>(&self, kind: CollectionKind) -> Result<Vec<T>, StorageError> {
        match self.durable.get(kind.storage_key()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Mirrors the store into durable storage from a single writer task.
///
/// Writes are queued in order and never awaited by a mutation.
pub struct PersistenceBridge {
    mirror: Arc<Mirror>,
    queue: mpsc::UnboundedSender<Write>,
}

impl PersistenceBridge {
    /// Starts the writer task, so this needs a tokio runtime.
    pub fn new(durable: Arc<dyn DurableStore>, store: Arc<CollectionStore>) -> Self {
        let mirror = Arc::new(Mirror { durable, store });
        let (queue, writes) = mpsc::unbounded_channel();

        tokio::spawn(run_writer(mirror.clone(), writes));

        Self { mirror, queue }
    }

    /// Queues a write of the collection as it is when the write runs.
    pub fn schedule(&self, kind: CollectionKind) {
        if self.queue.send(Write::Flush(kind)).is_err() {
            warn!(key = kind.storage_key(), "Writer stopped, collection not persisted");
        }
    }

    /// Writes the collection and waits for it, after everything already queued.
    pub async fn flush(&self, kind: CollectionKind) {
        self.schedule(kind);
        self.settled().await;
    }

    pub async fn flush_all(&self) {
        for kind in CollectionKind::ALL {
            self.schedule(kind);
        }
        self.settled().await;
    }

    /// Waits until every write queued so far has finished or failed.
    pub async fn settled(&self) {
        let (done, finished) = oneshot::channel();

        if self.queue.send(Write::Settle(done)).is_ok() {
            let _ = finished.await;
        }
    }

    pub async fn hydrate(&self) -> Hydrated {
        let hydrated = Hydrated {
            favorites: self.load(CollectionKind::Favorite).await,
            watchlist: self.load(CollectionKind::Watchlist).await,
            ratings: self.load(CollectionKind::Rating).await,
        };

        info!(
            favorites = hydrated.favorites.len(),
            watchlist = hydrated.watchlist.len(),
            ratings = hydrated.ratings.len(),
            "Hydrated collections"
        );

        hydrated
    }

    async fn load<T: DeserializeOwned>(&self, kind: CollectionKind) -> Vec<T> {
        self.mirror.read(kind).await.unwrap_or_else(|e| {
            warn!(key = kind.storage_key(), "Discarding unreadable collection: {e}");
            Vec::new()
        })
    }
}

async fn run_writer(mirror: Arc<Mirror>, mut writes: mpsc::UnboundedReceiver<Write>) {
    while let Some(write) = writes.recv().await {
        match write {
            Write::Flush(kind) => match mirror.write(kind).await {
                Ok(()) => debug!(key = kind.storage_key(), "Collection persisted"),
                Err(e) => warn!(key = kind.storage_key(), "Failed to persist collection: {e}"),
            },
            Write::Settle(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Persistence writer stopped");
}

fn encode(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    match snapshot {
        Snapshot::Favorite(members) | Snapshot::Watchlist(members) => {
            serde_json::to_string(&members.values().collect::<Vec<_>>())
        }
        Snapshot::Rating(ratings) => serde_json::to_string(
            &ratings
                .iter()
                .map(|(movie_id, rating)| RatedMovie { movie_id, rating })
                .collect::<Vec<_>>(),
        ),
    }
}
