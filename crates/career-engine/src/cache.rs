/// Tiered in-memory cache of resolved record sets with durable write-through.
///
/// Entries are keyed by canonical query key and live for a fixed TTL (`now < expires_at`).
/// On insert, expired entries are purged first, then the oldest entries by insertion
/// time are evicted until the table fits. Concurrent misses for the same key share a
/// single load. Empty results are returned but never stored.
///
/// The table is mirrored to a [`BlobStore`] by a background writer task, so writes never
/// block a read. On open the persisted table is rehydrated; a corrupt table is logged
/// and discarded.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use career_common::storage::BlobStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::CacheCorruptionError;
use crate::model::RecordSet;

pub const CACHE_NAMESPACE: &str = "career_cache";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_entries: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: RecordSet,
    /// Epoch millis
    pub inserted_at: u64,
    /// Epoch millis
    pub expires_at: u64,
    /// Tie-breaker for entries inserted in the same millisecond.
    #[serde(default)]
    pub seq: u64,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }

    fn age_order(&self) -> (u64, u64) {
        (self.inserted_at, self.seq)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Reads that joined a load already in flight.
    pub coalesced: u64,
    /// Entries still stored but past their expiry.
    pub expired_entries: usize,
}

#[derive(Deserialize)]
struct CacheSnapshot {
    version: u32,
    entries: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct CacheSnapshotRef<'a> {
    version: u32,
    entries: Vec<&'a CacheEntry>,
}

type SharedLoad = Shared<BoxFuture<'static, RecordSet>>;

struct InFlight {
    id: u64,
    load: SharedLoad,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    next_seq: u64,
    next_load_id: u64,
    hits: u64,
    misses: u64,
    coalesced: u64,
}

enum PersistCommand {
    Write(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

pub struct CareerCache {
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    persist_tx: mpsc::UnboundedSender<PersistCommand>,
}

impl CareerCache {
    /// Open the cache, rehydrating the persisted table from `store`, and start the
    /// background writer. Must be called within a Tokio runtime.
    pub async fn open(store: Arc<dyn BlobStore>, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let settings = CacheSettings {
            max_entries: settings.max_entries.max(1),
            ..settings
        };

        let mut state = CacheState::default();
        if let Some(bytes) = store.read_blob(CACHE_NAMESPACE).await {
            match rehydrate(&bytes, clock.now_millis(), settings.max_entries) {
                Ok(entries) => {
                    state.next_seq = entries.values().map(|e| e.seq + 1).max().unwrap_or(0);
                    state.entries = entries;
                    info!(entries = state.entries.len(), backend = store.backend(), "cache rehydrated");
                }
                Err(e) => {
                    warn!(error = %e, backend = store.backend(), "persisted cache is corrupt, starting empty");
                }
            }
        }

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, persist_rx));

        Self {
            settings,
            clock,
            state: Mutex::new(state),
            persist_tx,
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Return the cached record set for `key`, or run `load` on a miss.
    ///
    /// Concurrent callers missing on the same key await one shared load. A load whose key
    /// was invalidated while it ran is returned to its callers but not stored.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> RecordSet
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RecordSet> + Send + 'static,
    {
        let now = self.clock.now_millis();
        let (pending, load_id) = {
            let mut state = self.lock();

            if let Some(entry) = state.entries.get(key) {
                if entry.is_valid_at(now) {
                    let payload = entry.payload.clone();
                    state.hits += 1;
                    debug!(key, source = %payload.source, "cache hit");
                    return payload;
                }
                state.entries.remove(key);
                debug!(key, "cache entry expired");
            }

            if let Some(in_flight) = state.in_flight.get(key) {
                let joined = (in_flight.load.clone(), in_flight.id);
                state.coalesced += 1;
                debug!(key, "joining in-flight load");
                joined
            } else {
                state.misses += 1;
                let id = state.next_load_id;
                state.next_load_id += 1;
                let shared = load().boxed().shared();
                state.in_flight.insert(
                    key.to_string(),
                    InFlight {
                        id,
                        load: shared.clone(),
                    },
                );
                debug!(key, "cache miss");
                (shared, id)
            }
        };

        let result = pending.await;
        self.complete(key, load_id, &result);
        result
    }

    /// Store a finished load. Only the first caller to finish a still-current load stores
    /// it; everyone else finds the in-flight marker gone.
    fn complete(&self, key: &str, load_id: u64, result: &RecordSet) {
        let mut state = self.lock();
        match state.in_flight.get(key) {
            Some(in_flight) if in_flight.id == load_id => {
                state.in_flight.remove(key);
            }
            _ => return,
        }

        if result.is_empty() {
            debug!(key, "empty result not cached");
            return;
        }

        let now = self.clock.now_millis();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.is_valid_at(now));
        let purged = before - state.entries.len();
        if purged > 0 {
            debug!(purged, "expired cache entries purged");
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload: result.clone(),
                inserted_at: now,
                expires_at: now.saturating_add(self.settings.ttl.as_millis() as u64),
                seq,
            },
        );
        evict_oldest(&mut state.entries, self.settings.max_entries);

        let bytes = encode(&state.entries);
        drop(state);
        if let Some(bytes) = bytes {
            self.persist(bytes);
        }
    }

    /// Drop every entry and every in-flight load. Returns the number of entries removed.
    pub fn invalidate_all(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        let bytes = encode(&state.entries);
        drop(state);

        if let Some(bytes) = bytes {
            self.persist(bytes);
        }
        info!(removed, "cache invalidated");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_millis();
        let state = self.lock();
        CacheStats {
            size: state.entries.len(),
            max_size: self.settings.max_entries,
            hits: state.hits,
            misses: state.misses,
            coalesced: state.coalesced,
            expired_entries: state.entries.values().filter(|e| !e.is_valid_at(now)).count(),
        }
    }

    /// Wait until every write queued so far has reached the store.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.persist_tx.send(PersistCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn persist(&self, bytes: Vec<u8>) {
        if self.persist_tx.send(PersistCommand::Write(bytes)).is_err() {
            warn!("cache writer stopped, snapshot not persisted");
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.lock().entries.values().cloned().collect();
        entries.sort_by_key(|e| e.age_order());
        entries
    }
}

fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) {
    while entries.len() > max_entries {
        let Some(oldest) = entries
            .values()
            .min_by_key(|e| e.age_order())
            .map(|e| e.key.clone())
        else {
            break;
        };
        entries.remove(&oldest);
        debug!(key = %oldest, "cache entry evicted");
    }
}

fn encode(entries: &HashMap<String, CacheEntry>) -> Option<Vec<u8>> {
    let mut ordered: Vec<&CacheEntry> = entries.values().collect();
    ordered.sort_by_key(|e| e.age_order());
    let snapshot = CacheSnapshotRef {
        version: SNAPSHOT_VERSION,
        entries: ordered,
    };
    serde_json::to_vec(&snapshot)
        .inspect_err(|e| warn!(error = %e, "failed to encode cache snapshot"))
        .ok()
}

/// Decode a persisted table, dropping malformed and expired entries individually.
fn rehydrate(
    bytes: &[u8],
    now: u64,
    max_entries: usize,
) -> Result<HashMap<String, CacheEntry>, CacheCorruptionError> {
    let snapshot: CacheSnapshot = serde_json::from_slice(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CacheCorruptionError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let mut entries = HashMap::new();
    let mut expired = 0usize;
    for value in snapshot.entries {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) if entry.is_valid_at(now) => {
                entries.insert(entry.key.clone(), entry);
            }
            Ok(_) => expired += 1,
            Err(e) => warn!(error = %e, "malformed cache entry dropped"),
        }
    }
    if expired > 0 {
        debug!(expired, "expired entries dropped on rehydrate");
    }
    evict_oldest(&mut entries, max_entries);
    Ok(entries)
}

async fn run_writer(store: Arc<dyn BlobStore>, mut rx: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Write(bytes) => {
                if !store.write_blob(CACHE_NAMESPACE, &bytes).await {
                    warn!(backend = store.backend(), "failed to persist cache snapshot");
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("cache writer stopped");
}
