//! libSQL durable tier for the Pathwise enrichment cache.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! normalized career title plus a history of batch runs.
//!
//! **Access rules:**
//! - the enhancement pipeline: read-write via [`Storage::open`]
//! - inspection commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use pathwise_shared::{CacheRecord, EnrichedEntity, PathwiseError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PathwiseError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PathwiseError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PathwiseError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Enrichment cache
    // -----------------------------------------------------------------------

    /// Load the cached record for `key`, regardless of staleness.
    pub async fn get_cached_record(&self, key: &str) -> Result<Option<CacheRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT cache_key, payload_json, confidence, created_at
                 FROM enrichment_cache WHERE cache_key = ?1",
                params![key],
            )
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_cache_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PathwiseError::Storage(e.to_string())),
        }
    }

    /// Store a record, replacing any previous row for the same key.
    pub async fn put_cached_record(&self, record: &CacheRecord) -> Result<()> {
        self.check_writable()?;
        let payload = serde_json::to_string(record.payload())
            .map_err(|e| PathwiseError::Storage(format!("payload encode failed: {e}")))?;
        let created_at = record.created_at().to_rfc3339();
        let stale_at = record.stale_at().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO enrichment_cache (cache_key, payload_json, confidence, created_at, stale_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(cache_key) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   confidence = excluded.confidence,
                   created_at = excluded.created_at,
                   stale_at = excluded.stale_at",
                params![
                    record.key(),
                    payload.as_str(),
                    record.confidence(),
                    created_at.as_str(),
                    stale_at.as_str()
                ],
            )
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Count cached rows: `(total, not yet stale at now)`.
    pub async fn cache_counts(&self, now: DateTime<Utc>) -> Result<(u64, u64)> {
        let now = now.to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN stale_at > ?1 THEN 1 ELSE 0 END), 0)
                 FROM enrichment_cache",
                params![now.as_str()],
            )
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let total: i64 = row
                    .get(0)
                    .map_err(|e| PathwiseError::Storage(e.to_string()))?;
                let fresh: i64 = row
                    .get(1)
                    .map_err(|e| PathwiseError::Storage(e.to_string()))?;
                Ok((total.max(0) as u64, fresh.max(0) as u64))
            }
            Ok(None) => Ok((0, 0)),
            Err(e) => Err(PathwiseError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Batch run history
    // -----------------------------------------------------------------------

    /// Record the summary of one enhancement batch.
    pub async fn insert_batch_run(
        &self,
        id: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        stats_json: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let started = started_at.to_rfc3339();
        let finished = finished_at.to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO batch_runs (id, started_at, finished_at, stats_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, started.as_str(), finished.as_str(), stats_json],
            )
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Most recent batch runs, newest first.
    pub async fn list_batch_runs(&self, limit: u32) -> Result<Vec<BatchRunRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, stats_json
                 FROM batch_runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| PathwiseError::Storage(e.to_string()))?;

        let mut runs = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            runs.push(BatchRunRow {
                id: row
                    .get(0)
                    .map_err(|e| PathwiseError::Storage(e.to_string()))?,
                started_at: parse_timestamp(
                    &row.get::<String>(1)
                        .map_err(|e| PathwiseError::Storage(e.to_string()))?,
                )?,
                finished_at: parse_timestamp(
                    &row.get::<String>(2)
                        .map_err(|e| PathwiseError::Storage(e.to_string()))?,
                )?,
                stats_json: row
                    .get(3)
                    .map_err(|e| PathwiseError::Storage(e.to_string()))?,
            });
        }
        Ok(runs)
    }
}

/// A stored batch run.
#[derive(Debug, Clone)]
pub struct BatchRunRow {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats_json: String,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PathwiseError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`CacheRecord`].
///
/// `stale_at` is recomputed from `created_at` so the TTL invariant holds even
/// for rows written by an older build.
fn row_to_cache_record(row: &libsql::Row) -> Result<CacheRecord> {
    let key: String = row
        .get(0)
        .map_err(|e| PathwiseError::Storage(e.to_string()))?;
    let payload_json: String = row
        .get(1)
        .map_err(|e| PathwiseError::Storage(e.to_string()))?;
    let confidence: f64 = row
        .get(2)
        .map_err(|e| PathwiseError::Storage(e.to_string()))?;
    let created_at = parse_timestamp(
        &row.get::<String>(3)
            .map_err(|e| PathwiseError::Storage(e.to_string()))?,
    )?;
    let payload: EnrichedEntity = serde_json::from_str(&payload_json)
        .map_err(|e| PathwiseError::Storage(format!("payload decode failed: {e}")))?;
    Ok(CacheRecord::new(key, payload, confidence, created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pathwise_shared::{SalaryBands, SalaryRange};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn range(min: f64, max: f64) -> SalaryRange {
        SalaryRange {
            min,
            max,
            currency: "GBP".into(),
            sources: vec!["https://example.com/salaries".into()],
        }
    }

    fn sample_payload() -> EnrichedEntity {
        EnrichedEntity {
            salary: Some(SalaryBands {
                entry: Some(range(22_000.0, 28_000.0)),
                mid: Some(range(30_000.0, 42_000.0)),
                senior: Some(range(45_000.0, 65_000.0)),
                by_region: vec![],
            }),
            sources: vec!["https://example.com/salaries".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn cache_record_roundtrip() {
        let storage = test_storage().await;

        let missing = storage.get_cached_record("dataanalyst").await.expect("get miss");
        assert!(missing.is_none());

        let created = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = CacheRecord::new("dataanalyst", sample_payload(), 0.85, created);
        storage.put_cached_record(&record).await.expect("put");

        let loaded = storage
            .get_cached_record("dataanalyst")
            .await
            .expect("get hit")
            .expect("record present");
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let storage = test_storage().await;
        let now = Utc::now();

        let first = CacheRecord::new("nurse", sample_payload(), 0.6, now - Duration::hours(30));
        storage.put_cached_record(&first).await.unwrap();
        let second = CacheRecord::new("nurse", sample_payload(), 0.9, now);
        storage.put_cached_record(&second).await.unwrap();

        let loaded = storage.get_cached_record("nurse").await.unwrap().unwrap();
        assert_eq!(loaded.confidence(), 0.9);

        let (total, fresh) = storage.cache_counts(now).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn cache_counts_separates_stale_rows() {
        let storage = test_storage().await;
        let now = Utc::now();
        storage
            .put_cached_record(&CacheRecord::new("a", sample_payload(), 0.9, now))
            .await
            .unwrap();
        storage
            .put_cached_record(&CacheRecord::new(
                "b",
                sample_payload(),
                0.9,
                now - Duration::hours(48),
            ))
            .await
            .unwrap();

        let (total, fresh) = storage.cache_counts(now).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn batch_run_history() {
        let storage = test_storage().await;
        let start = Utc::now();
        storage
            .insert_batch_run("run-1", start, start + Duration::seconds(3), r#"{"attempted":2}"#)
            .await
            .expect("insert run");

        let runs = storage.list_batch_runs(10).await.expect("list runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "run-1");
        assert!(runs[0].stats_json.contains("attempted"));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("pw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.put_cached_record(&CacheRecord::new("a", sample_payload(), 0.9, Utc::now()))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get_cached_record("a").await.unwrap().is_some());

        let result = ro
            .put_cached_record(&CacheRecord::new("b", sample_payload(), 0.9, Utc::now()))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
