//! Two-tier enrichment cache.
//!
//! The memory tier answers every read it can. The durable tier (libSQL) is
//! read on a memory miss and written by a background worker fed through a
//! bounded queue, so callers never wait on disk and a durable failure never
//! reaches them: it is logged and the memory tier keeps serving.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use pathwise_shared::CacheRecord;
use pathwise_storage::Storage;

/// Pending durable writes before new ones are dropped.
const WRITE_QUEUE_CAPACITY: usize = 256;

enum WriteJob {
    Record(CacheRecord),
    BatchRun {
        id: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        stats_json: String,
    },
    Flush(oneshot::Sender<()>),
}

struct DurableTier {
    storage: Arc<Storage>,
    queue: mpsc::Sender<WriteJob>,
}

/// Memory-first cache keyed by normalized career title.
pub struct CacheStore {
    memory: RwLock<HashMap<String, CacheRecord>>,
    durable: Option<DurableTier>,
}

impl CacheStore {
    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            durable: None,
        }
    }

    /// Cache backed by `storage`. Spawns the write worker, so this must be
    /// called inside a Tokio runtime.
    pub fn with_storage(storage: Arc<Storage>) -> Self {
        let (queue, rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        tokio::spawn(write_worker(Arc::clone(&storage), rx));
        Self {
            memory: RwLock::new(HashMap::new()),
            durable: Some(DurableTier { storage, queue }),
        }
    }

    /// Look up a record. Memory first, then the durable tier; a durable hit
    /// is promoted into memory. Durable read errors count as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheRecord> {
        if let Some(record) = self.memory.read().await.get(key) {
            return Some(record.clone());
        }

        let durable = self.durable.as_ref()?;
        match durable.storage.get_cached_record(key).await {
            Ok(Some(record)) => {
                debug!(key, "durable cache hit");
                self.memory
                    .write()
                    .await
                    .insert(key.to_string(), record.clone());
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "durable cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a record in memory and queue it for the durable tier.
    pub async fn set(&self, record: CacheRecord) {
        let key = record.key().to_string();
        self.memory.write().await.insert(key.clone(), record.clone());
        self.enqueue(WriteJob::Record(record), &key);
    }

    /// Queue a batch summary for the durable history table.
    pub fn record_batch_run(
        &self,
        id: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        stats_json: String,
    ) {
        let job = WriteJob::BatchRun {
            id: id.to_string(),
            started_at,
            finished_at,
            stats_json,
        };
        self.enqueue(job, id);
    }

    fn enqueue(&self, job: WriteJob, label: &str) {
        let Some(durable) = &self.durable else {
            return;
        };
        match durable.queue.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(item = label, "durable write queue full, dropping write");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(item = label, "durable writer stopped, dropping write");
            }
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let Some(durable) = &self.durable else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if durable.queue.send(WriteJob::Flush(tx)).await.is_err() {
            warn!("durable writer stopped before flush");
            return;
        }
        let _ = rx.await;
    }

    /// Number of records held in memory.
    pub async fn memory_len(&self) -> usize {
        self.memory.read().await.len()
    }

    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }
}

async fn write_worker(storage: Arc<Storage>, mut rx: mpsc::Receiver<WriteJob>) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Record(record) => {
                if let Err(e) = storage.put_cached_record(&record).await {
                    warn!(key = record.key(), error = %e, "durable cache write failed");
                }
            }
            WriteJob::BatchRun {
                id,
                started_at,
                finished_at,
                stats_json,
            } => {
                if let Err(e) = storage
                    .insert_batch_run(&id, started_at, finished_at, &stats_json)
                    .await
                {
                    warn!(batch = %id, error = %e, "batch history write failed");
                }
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("durable write worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise_shared::EnrichedEntity;
    use uuid::Uuid;

    fn temp_db() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pw_cache_{}.db", Uuid::now_v7()))
    }

    fn record(key: &str, confidence: f64) -> CacheRecord {
        CacheRecord::new(key, EnrichedEntity::default(), confidence, Utc::now())
    }

    #[tokio::test]
    async fn memory_only_round_trip() {
        let cache = CacheStore::in_memory();
        assert!(cache.get("nurse").await.is_none());

        cache.set(record("nurse", 0.9)).await;
        let got = cache.get("nurse").await.expect("hit");
        assert_eq!(got.confidence(), 0.9);
        assert_eq!(cache.memory_len().await, 1);
        cache.flush().await;
    }

    #[tokio::test]
    async fn writes_reach_durable_tier_after_flush() {
        let path = temp_db();
        let storage = Arc::new(Storage::open(&path).await.unwrap());
        let cache = CacheStore::with_storage(Arc::clone(&storage));

        cache.set(record("chef", 0.85)).await;
        cache.flush().await;

        let stored = storage.get_cached_record("chef").await.unwrap().expect("row");
        assert_eq!(stored.confidence(), 0.85);
    }

    #[tokio::test]
    async fn durable_hit_is_promoted_to_memory() {
        let path = temp_db();
        let storage = Arc::new(Storage::open(&path).await.unwrap());
        storage.put_cached_record(&record("pilot", 0.9)).await.unwrap();

        let cache = CacheStore::with_storage(storage);
        assert_eq!(cache.memory_len().await, 0);
        assert!(cache.get("pilot").await.is_some());
        assert_eq!(cache.memory_len().await, 1);
    }

    #[tokio::test]
    async fn durable_write_failure_keeps_memory_tier_serving() {
        let path = temp_db();
        drop(Storage::open(&path).await.unwrap());
        let readonly = Arc::new(Storage::open_readonly(&path).await.unwrap());
        let cache = CacheStore::with_storage(Arc::clone(&readonly));

        cache.set(record("baker", 0.9)).await;
        cache.flush().await;

        assert!(cache.get("baker").await.is_some());
        assert!(readonly.get_cached_record("baker").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_runs_are_recorded() {
        let path = temp_db();
        let storage = Arc::new(Storage::open(&path).await.unwrap());
        let cache = CacheStore::with_storage(Arc::clone(&storage));

        let now = Utc::now();
        cache.record_batch_run("run-1", now, now, r#"{"attempted":1}"#.into());
        cache.flush().await;

        let runs = storage.list_batch_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "run-1");
    }
}
