//! Batch enhancement of baseline career entities.
//!
//! One call to [`Enhancer::enhance`] runs a batch through four stages:
//! filter by freshness, fan out research calls under a concurrency bound,
//! normalize/validate/score/cache each reply, and merge results back onto the
//! input in its original order. Individual failures become per-entity
//! outcomes; the batch itself never fails.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use pathwise_research::ResearchAdapter;
use pathwise_shared::{
    AppConfig, BaselineEntity, CacheRecord, EnhancedEntity, EnhancementOutcome, PathwiseError,
    Result,
};

use crate::cache::CacheStore;
use crate::freshness::{DEFAULT_CONFIDENCE_THRESHOLD, is_expired, needs_enhancement};
use crate::guard;
use crate::normalize::{NormalizeOptions, normalize};
use crate::score::score;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runtime policy for an [`Enhancer`].
#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub confidence_threshold: f64,
    /// Upper bound on research calls in flight at once.
    pub max_concurrency: usize,
    /// Deadline for a single research call.
    pub request_timeout: Duration,
    /// Deadline for a whole batch; items still pending are marked failed.
    pub batch_timeout: Option<Duration>,
    pub default_currency: String,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_concurrency: 4,
            request_timeout: Duration::from_secs(30),
            batch_timeout: Some(Duration::from_secs(120)),
            default_currency: "GBP".into(),
        }
    }
}

impl From<&AppConfig> for EnhancerConfig {
    fn from(config: &AppConfig) -> Self {
        let enhancement = &config.enhancement;
        Self {
            confidence_threshold: enhancement.confidence_threshold,
            max_concurrency: enhancement.max_concurrency.max(1) as usize,
            request_timeout: config.research.request_timeout(),
            batch_timeout: (enhancement.batch_timeout_secs > 0)
                .then(|| Duration::from_secs(enhancement.batch_timeout_secs)),
            default_currency: enhancement.default_currency.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Completed,
    Error,
}

/// Snapshot of a running batch, for progress bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub completed: usize,
    pub total: usize,
    pub current_item: Option<String>,
    pub errors: Vec<String>,
}

/// Callback interface for batch progress.
pub trait EnhanceProgress: Send + Sync {
    fn update(&self, update: &ProgressUpdate);
}

/// No-op progress reporter.
pub struct SilentProgress;

impl EnhanceProgress for SilentProgress {
    fn update(&self, _update: &ProgressUpdate) {}
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Unique titles sent to the research service.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entities served from a fresh cache entry without a research call.
    pub cache_hits: usize,
}

/// Everything one batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    /// Same length and order as the input.
    pub entities: Vec<EnhancedEntity>,
    /// One outcome per attempted title, plus one per unusable title.
    pub outcomes: Vec<EnhancementOutcome>,
    pub summary: BatchSummary,
}

// ---------------------------------------------------------------------------
// Enhancer
// ---------------------------------------------------------------------------

type InFlight = Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Orchestrates enhancement batches against one research adapter and cache.
///
/// Safe to share: concurrent batches for the same title wait on each other
/// instead of calling the research service twice.
pub struct Enhancer<A> {
    inner: Arc<Inner<A>>,
}

struct Inner<A> {
    adapter: A,
    cache: Arc<CacheStore>,
    config: EnhancerConfig,
    normalize: NormalizeOptions,
    permits: Semaphore,
    in_flight: InFlight,
}

impl<A: ResearchAdapter + 'static> Enhancer<A> {
    pub fn new(adapter: A, cache: Arc<CacheStore>, config: EnhancerConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrency.max(1));
        let normalize = NormalizeOptions {
            default_currency: config.default_currency.clone(),
        };
        Self {
            inner: Arc::new(Inner {
                adapter,
                cache,
                config,
                normalize,
                permits,
                in_flight: Arc::default(),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.inner.cache
    }

    /// Enhance `entities`, returning them enriched or baseline, in input order.
    pub async fn enhance_entities(&self, entities: &[BaselineEntity]) -> Vec<EnhancedEntity> {
        self.enhance(entities, &SilentProgress).await.entities
    }

    /// Run one batch and report per-entity outcomes.
    #[instrument(skip_all, fields(entities = entities.len()))]
    pub async fn enhance(
        &self,
        entities: &[BaselineEntity],
        progress: &dyn EnhanceProgress,
    ) -> BatchReport {
        let started_at = Utc::now();
        let start = std::time::Instant::now();
        let batch_id = Uuid::now_v7().to_string();
        let config = &self.inner.config;

        // Filtering
        let mut outcomes = Vec::new();
        let mut cached: HashMap<String, Option<CacheRecord>> = HashMap::new();
        let mut pending: Vec<(String, String)> = Vec::new();
        for entity in entities {
            let key = entity.cache_key();
            if key.is_empty() {
                outcomes.push(EnhancementOutcome::failure(
                    entity.title.clone(),
                    "title has no letters or digits",
                ));
                continue;
            }
            if cached.contains_key(&key) {
                continue;
            }
            let record = self.inner.cache.get(&key).await;
            if needs_enhancement(record.as_ref(), config.confidence_threshold, Utc::now()) {
                pending.push((key.clone(), entity.title.clone()));
            }
            cached.insert(key, record);
        }

        let total = pending.len();
        info!(
            batch = %batch_id,
            to_enhance = total,
            unique_titles = cached.len(),
            "enhancement batch started"
        );
        progress.update(&ProgressUpdate {
            status: ProgressStatus::Processing,
            completed: 0,
            total,
            current_item: None,
            errors: Vec::new(),
        });

        // Fetching
        let attempted: HashSet<String> = pending.iter().map(|(key, _)| key.clone()).collect();
        let deadline = config.batch_timeout.map(|timeout| Instant::now() + timeout);
        let handles: Vec<_> = pending
            .into_iter()
            .map(|(key, title)| {
                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let task_title = title.clone();
                let handle =
                    tokio::spawn(async move { inner.enhance_one(&task_key, &task_title).await });
                (key, title, handle)
            })
            .collect();

        let mut results: HashMap<String, CacheRecord> = HashMap::new();
        let mut errors = Vec::new();
        for (done, (key, title, mut handle)) in handles.into_iter().enumerate() {
            match settle(&mut handle, deadline).await {
                Ok(record) => {
                    outcomes.push(EnhancementOutcome::success(key.clone()));
                    results.insert(key, record);
                }
                Err(reason) => {
                    warn!(batch = %batch_id, title = %title, %reason, "enhancement failed");
                    errors.push(format!("{title}: {reason}"));
                    outcomes.push(EnhancementOutcome::failure(key, reason));
                }
            }
            progress.update(&ProgressUpdate {
                status: ProgressStatus::Processing,
                completed: done + 1,
                total,
                current_item: Some(title),
                errors: errors.clone(),
            });
        }

        // Merge
        let now = Utc::now();
        let mut cache_hits = 0;
        let merged: Vec<EnhancedEntity> = entities
            .iter()
            .map(|entity| {
                let key = entity.cache_key();
                if let Some(record) = results.get(&key) {
                    return EnhancedEntity::enriched(entity.clone(), record);
                }
                match cached.get(&key).and_then(Option::as_ref) {
                    Some(record) if !is_expired(record, now) => {
                        if !attempted.contains(&key) {
                            cache_hits += 1;
                        }
                        EnhancedEntity::enriched(entity.clone(), record)
                    }
                    _ => EnhancedEntity::baseline(entity.clone()),
                }
            })
            .collect();

        let succeeded = results.len();
        let summary = BatchSummary {
            attempted: total,
            succeeded,
            failed: total - succeeded,
            cache_hits,
        };

        progress.update(&ProgressUpdate {
            status: if total > 0 && succeeded == 0 {
                ProgressStatus::Error
            } else {
                ProgressStatus::Completed
            },
            completed: total,
            total,
            current_item: None,
            errors,
        });

        info!(
            batch = %batch_id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cache_hits = summary.cache_hits,
            duration_ms = start.elapsed().as_millis(),
            "enhancement batch complete"
        );

        self.record_run(&batch_id, started_at, &summary);

        BatchReport {
            batch_id,
            entities: merged,
            outcomes,
            summary,
        }
    }

    fn record_run(&self, batch_id: &str, started_at: DateTime<Utc>, summary: &BatchSummary) {
        match serde_json::to_string(summary) {
            Ok(stats) => {
                self.inner
                    .cache
                    .record_batch_run(batch_id, started_at, Utc::now(), stats)
            }
            Err(e) => warn!(batch = %batch_id, error = %e, "could not serialize batch summary"),
        }
    }
}

impl<A: ResearchAdapter> Inner<A> {
    /// Research, normalize, validate, score and cache one title.
    async fn enhance_one(&self, key: &str, title: &str) -> Result<CacheRecord> {
        let _slot = self.claim(key).await;

        // another batch may have finished this title while we waited
        if let Some(record) = self.cache.get(key).await {
            if !needs_enhancement(Some(&record), self.config.confidence_threshold, Utc::now()) {
                debug!(key, "reusing concurrent enhancement");
                return Ok(record);
            }
        }

        let response = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| PathwiseError::UpstreamUnavailable("enhancer shut down".into()))?;
            tokio::time::timeout(self.config.request_timeout, self.adapter.fetch(title))
                .await
                .map_err(|_| {
                    PathwiseError::UpstreamUnavailable(format!(
                        "research call timed out after {}ms",
                        self.config.request_timeout.as_millis()
                    ))
                })??
        };

        let entity = normalize(&response, &self.normalize).ok_or_else(|| {
            PathwiseError::malformed("salary bands could not be read from the response")
        })?;
        let entity = guard::validate(Some(entity))?;
        let confidence = score(&response, &entity);

        let record = CacheRecord::new(key, entity, confidence, Utc::now());
        self.cache.set(record.clone()).await;
        debug!(key, confidence, structured = response.is_structured(), "enhancement cached");
        Ok(record)
    }

    /// Wait for exclusive ownership of `key` within this process.
    async fn claim(&self, key: &str) -> InFlightSlot {
        let lock = {
            let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        InFlightSlot {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held while a title is being enhanced; drops its map entry when no one
/// else is waiting on it.
struct InFlightSlot {
    key: String,
    in_flight: InFlight,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let lock = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // the map's reference plus ours
        if Arc::strong_count(&lock) == 2 {
            map.remove(&self.key);
        }
    }
}

/// Await one task, giving up at the batch deadline.
async fn settle(
    handle: &mut JoinHandle<Result<CacheRecord>>,
    deadline: Option<Instant>,
) -> std::result::Result<CacheRecord, String> {
    let joined = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, &mut *handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err("batch deadline exceeded".into());
            }
        },
        None => (&mut *handle).await,
    };
    match joined {
        Ok(Ok(record)) => Ok(record),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("enhancement task failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pathwise_research::{UpstreamResponse, classify_content};
    use pathwise_shared::{EnrichedEntity, SalaryBands, SalaryRange, cache_key};
    use pathwise_storage::Storage;

    #[derive(Clone)]
    enum Reply {
        Ok(UpstreamResponse),
        Slow(Duration, UpstreamResponse),
        Unavailable,
    }

    #[derive(Default)]
    struct Counters {
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    struct ScriptedAdapter {
        replies: HashMap<String, Reply>,
        counters: Arc<Counters>,
    }

    impl ScriptedAdapter {
        fn new(replies: Vec<(&str, Reply)>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let adapter = Self {
                replies: replies
                    .into_iter()
                    .map(|(title, reply)| (title.to_string(), reply))
                    .collect(),
                counters: Arc::clone(&counters),
            };
            (adapter, counters)
        }
    }

    impl ResearchAdapter for ScriptedAdapter {
        async fn fetch(&self, title: &str) -> Result<UpstreamResponse> {
            self.counters.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(active, Ordering::SeqCst);

            let reply = match self.replies.get(title) {
                Some(Reply::Ok(response)) => Ok(response.clone()),
                Some(Reply::Slow(delay, response)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(response.clone())
                }
                Some(Reply::Unavailable) | None => Err(PathwiseError::UpstreamUnavailable(
                    format!("{title}: HTTP 503"),
                )),
            };

            self.counters.active.fetch_sub(1, Ordering::SeqCst);
            reply
        }
    }

    fn citations(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://source{i}.example")).collect()
    }

    fn payload(entry: &str) -> UpstreamResponse {
        classify_content(
            format!(
                r#"{{
                    "salary": {{"entry": "{entry}", "mid": "£30,000 - £40,000", "senior": "£45,000 - £60,000"}},
                    "marketDemand": {{"level": "high", "jobPostings": 5200}},
                    "educationPathways": [{{"type": "degree", "title": "BSc Data Science"}}]
                }}"#
            ),
            citations(3),
        )
    }

    fn valid() -> Reply {
        Reply::Ok(payload("£22,000 - £28,000"))
    }

    fn enhancer(adapter: ScriptedAdapter, config: EnhancerConfig) -> Enhancer<ScriptedAdapter> {
        Enhancer::new(adapter, Arc::new(CacheStore::in_memory()), config)
    }

    fn entities(titles: &[&str]) -> Vec<BaselineEntity> {
        titles
            .iter()
            .map(|t| BaselineEntity::new(*t, format!("{t} pathway")))
            .collect()
    }

    fn salary_record(key: &str, confidence: f64, created_at: DateTime<Utc>) -> CacheRecord {
        let range = |min: f64, max: f64| SalaryRange {
            min,
            max,
            currency: "GBP".into(),
            sources: vec![],
        };
        let entity = EnrichedEntity {
            salary: Some(SalaryBands {
                entry: Some(range(20_000.0, 24_000.0)),
                mid: Some(range(26_000.0, 30_000.0)),
                senior: Some(range(32_000.0, 40_000.0)),
                by_region: vec![],
            }),
            ..EnrichedEntity::default()
        };
        CacheRecord::new(key, entity, confidence, created_at)
    }

    #[derive(Default)]
    struct RecordingProgress(std::sync::Mutex<Vec<ProgressUpdate>>);

    impl EnhanceProgress for RecordingProgress {
        fn update(&self, update: &ProgressUpdate) {
            self.0.lock().unwrap().push(update.clone());
        }
    }

    #[tokio::test]
    async fn analyst_enriched_and_researcher_left_as_baseline() {
        let (adapter, counters) = ScriptedAdapter::new(vec![
            ("Data Analyst", valid()),
            ("UX Researcher", Reply::Unavailable),
        ]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let input = entities(&["Data Analyst", "UX Researcher"]);

        let report = enhancer.enhance(&input, &SilentProgress).await;

        assert_eq!(report.entities.len(), 2);
        let analyst = report.entities[0].enrichment.as_ref().expect("enriched");
        let entry = analyst.data.salary.as_ref().unwrap().entry.as_ref().unwrap();
        assert_eq!((entry.min, entry.max), (22_000.0, 28_000.0));
        assert!(analyst.confidence >= 0.8);

        assert_eq!(report.entities[1], EnhancedEntity::baseline(input[1].clone()));
        assert_eq!(
            report.summary,
            BatchSummary {
                attempted: 2,
                succeeded: 1,
                failed: 1,
                cache_hits: 0
            }
        );
        let failure = report
            .outcomes
            .iter()
            .find(|o| o.entity_key == "uxresearcher")
            .unwrap();
        assert!(!failure.is_success());
        assert!(failure.reason.as_deref().unwrap().contains("upstream unavailable"));
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let titles = ["Nurse", "Chef", "Pilot", "Baker", "Welder"];
        let (adapter, _) = ScriptedAdapter::new(vec![
            ("Nurse", valid()),
            ("Chef", valid()),
            ("Pilot", Reply::Unavailable),
            ("Baker", valid()),
            ("Welder", valid()),
        ]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let input = entities(&titles);

        let output = enhancer.enhance_entities(&input).await;

        assert_eq!(output.len(), 5);
        for (i, (entity, original)) in output.iter().zip(&input).enumerate() {
            assert_eq!(&entity.baseline, original, "order preserved");
            assert_eq!(entity.is_enriched(), i != 2);
        }
    }

    #[tokio::test]
    async fn second_pass_makes_no_research_calls() {
        let (adapter, counters) =
            ScriptedAdapter::new(vec![("Nurse", valid()), ("Chef", valid())]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let input = entities(&["Nurse", "Chef"]);

        let first = enhancer.enhance(&input, &SilentProgress).await;
        assert_eq!(first.summary.succeeded, 2);
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);

        let second = enhancer.enhance(&input, &SilentProgress).await;
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.summary.attempted, 0);
        assert_eq!(second.summary.cache_hits, 2);
        assert_eq!(second.entities, first.entities);
    }

    #[tokio::test]
    async fn unreadable_salary_is_never_cached() {
        let (adapter, _) = ScriptedAdapter::new(vec![
            ("Actor", Reply::Ok(payload("competitive"))),
            ("Judge", Reply::Ok(payload("£80,000 - £90,000"))),
        ]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let report = enhancer
            .enhance(&entities(&["Actor", "Judge"]), &SilentProgress)
            .await;

        assert!(report.entities.iter().all(|e| !e.is_enriched()));
        let reason = |key: &str| {
            report
                .outcomes
                .iter()
                .find(|o| o.entity_key == key)
                .and_then(|o| o.reason.clone())
                .unwrap()
        };
        assert!(reason("actor").contains("malformed"));
        assert!(reason("judge").contains("integrity rejected"));
        assert!(enhancer.cache().get("actor").await.is_none());
        assert!(enhancer.cache().get("judge").await.is_none());
    }

    #[tokio::test]
    async fn free_text_with_unattributable_bands_is_never_cached() {
        let narrative = |text: &str| {
            Reply::Ok(UpstreamResponse::FreeText {
                text: text.into(),
                citations: citations(5),
            })
        };
        let (adapter, _) = ScriptedAdapter::new(vec![
            (
                "Analyst",
                narrative(
                    "Salaries for junior, mid-level and senior analysts are £22,000-£28,000, \
                     £30,000-£40,000 and £45,000-£60,000 respectively.",
                ),
            ),
            (
                "Surveyor",
                narrative(
                    "Junior surveyors earn £22,000 - £28,000. \
                     Highly experienced surveyors earn £55,000 - £70,000.",
                ),
            ),
        ]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let report = enhancer
            .enhance(&entities(&["Analyst", "Surveyor"]), &SilentProgress)
            .await;

        assert_eq!(report.summary.failed, 2);
        assert!(report.entities.iter().all(|e| !e.is_enriched()));
        for outcome in &report.outcomes {
            assert!(outcome.reason.as_deref().unwrap_or("").contains("malformed"));
        }
        assert!(enhancer.cache().get("analyst").await.is_none());
        assert!(enhancer.cache().get("surveyor").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_titles_share_one_call() {
        let (adapter, counters) = ScriptedAdapter::new(vec![("Data Analyst", valid())]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let input = entities(&["Data Analyst", "data analyst", "Data-Analyst"]);

        let report = enhancer.enhance(&input, &SilentProgress).await;

        assert_eq!(counters.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.summary.attempted, 1);
        assert!(report.entities.iter().all(EnhancedEntity::is_enriched));
        assert_eq!(report.entities[1].baseline.title, "data analyst");
    }

    #[tokio::test]
    async fn concurrent_batches_share_in_flight_call() {
        let slow = Reply::Slow(Duration::from_millis(100), payload("£22,000 - £28,000"));
        let (adapter, counters) = ScriptedAdapter::new(vec![("Nurse", slow)]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let input = entities(&["Nurse"]);

        let (a, b) = tokio::join!(
            enhancer.enhance_entities(&input),
            enhancer.enhance_entities(&input)
        );

        assert_eq!(counters.calls.load(Ordering::SeqCst), 1);
        assert!(a[0].is_enriched() && b[0].is_enriched());
        assert!(enhancer.inner.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fan_out_respects_concurrency_bound() {
        let titles = ["A1", "B2", "C3", "D4", "E5", "F6"];
        let slow = Reply::Slow(Duration::from_millis(30), payload("£22,000 - £28,000"));
        let (adapter, counters) =
            ScriptedAdapter::new(titles.iter().map(|t| (*t, slow.clone())).collect());
        let config = EnhancerConfig {
            max_concurrency: 2,
            ..EnhancerConfig::default()
        };
        let enhancer = enhancer(adapter, config);

        let report = enhancer.enhance(&entities(&titles), &SilentProgress).await;

        assert_eq!(report.summary.succeeded, 6);
        assert!(counters.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn slow_call_times_out_individually() {
        let (adapter, _) = ScriptedAdapter::new(vec![
            ("Nurse", Reply::Slow(Duration::from_secs(5), payload("£22,000 - £28,000"))),
            ("Chef", valid()),
        ]);
        let config = EnhancerConfig {
            request_timeout: Duration::from_millis(50),
            ..EnhancerConfig::default()
        };
        let enhancer = enhancer(adapter, config);

        let report = enhancer
            .enhance(&entities(&["Nurse", "Chef"]), &SilentProgress)
            .await;

        assert!(!report.entities[0].is_enriched());
        assert!(report.entities[1].is_enriched());
        let nurse = &report.outcomes[0];
        assert!(nurse.reason.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn batch_deadline_returns_partial_results() {
        let (adapter, _) = ScriptedAdapter::new(vec![
            ("Chef", valid()),
            ("Nurse", Reply::Slow(Duration::from_secs(5), payload("£22,000 - £28,000"))),
        ]);
        let config = EnhancerConfig {
            batch_timeout: Some(Duration::from_millis(100)),
            ..EnhancerConfig::default()
        };
        let enhancer = enhancer(adapter, config);

        let report = enhancer
            .enhance(&entities(&["Chef", "Nurse"]), &SilentProgress)
            .await;

        assert!(report.entities[0].is_enriched());
        assert!(!report.entities[1].is_enriched());
        assert_eq!(
            report.outcomes[1].reason.as_deref(),
            Some("batch deadline exceeded")
        );
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_unexpired_cache() {
        let (adapter, _) = ScriptedAdapter::new(vec![]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let now = Utc::now();
        // low confidence forces a refresh but the record is still valid
        enhancer.cache().set(salary_record("chef", 0.5, now)).await;
        enhancer
            .cache()
            .set(salary_record("nurse", 0.9, now - chrono::Duration::hours(25)))
            .await;

        let report = enhancer
            .enhance(&entities(&["Chef", "Nurse"]), &SilentProgress)
            .await;

        assert_eq!(report.summary.failed, 2);
        let chef = report.entities[0].enrichment.as_ref().expect("hydrated");
        assert_eq!(chef.confidence, 0.5);
        assert!(!report.entities[1].is_enriched());
    }

    #[tokio::test]
    async fn blank_title_fails_without_a_call() {
        let (adapter, counters) = ScriptedAdapter::new(vec![]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());

        let report = enhancer.enhance(&entities(&["---"]), &SilentProgress).await;

        assert_eq!(counters.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.entities.len(), 1);
        assert!(!report.entities[0].is_enriched());
        assert_eq!(report.outcomes.len(), 1);
        assert!(!report.outcomes[0].is_success());
    }

    #[tokio::test]
    async fn progress_reports_each_settled_item() {
        let (adapter, _) = ScriptedAdapter::new(vec![
            ("Nurse", valid()),
            ("Chef", Reply::Unavailable),
        ]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let progress = RecordingProgress::default();

        enhancer
            .enhance(&entities(&["Nurse", "Chef"]), &progress)
            .await;

        let updates = progress.0.lock().unwrap();
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0].completed, 0);
        assert_eq!(updates[1].current_item.as_deref(), Some("Nurse"));
        assert_eq!(updates[2].errors.len(), 1);
        let last = updates.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Completed);
        assert_eq!((last.completed, last.total), (2, 2));
    }

    #[tokio::test]
    async fn all_failures_end_in_error_status() {
        let (adapter, _) = ScriptedAdapter::new(vec![]);
        let enhancer = enhancer(adapter, EnhancerConfig::default());
        let progress = RecordingProgress::default();

        enhancer.enhance(&entities(&["Chef"]), &progress).await;

        let updates = progress.0.lock().unwrap();
        assert_eq!(updates.last().unwrap().status, ProgressStatus::Error);
    }

    #[tokio::test]
    async fn durable_round_trip_and_history() {
        let path = std::env::temp_dir().join(format!("pw_enhance_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&path).await.unwrap());
        let cache = Arc::new(CacheStore::with_storage(Arc::clone(&storage)));
        let (adapter, _) = ScriptedAdapter::new(vec![("Data Analyst", valid())]);
        let enhancer = Enhancer::new(adapter, Arc::clone(&cache), EnhancerConfig::default());

        let output = enhancer.enhance_entities(&entities(&["Data Analyst"])).await;
        cache.flush().await;

        // a fresh memory tier reads the same record back from disk
        let reopened = CacheStore::with_storage(Arc::clone(&storage));
        let record = reopened.get(&cache_key("Data Analyst")).await.expect("stored");
        let enrichment = output[0].enrichment.as_ref().unwrap();
        assert_eq!(record.payload(), &enrichment.data);
        assert_eq!(record.confidence(), enrichment.confidence);

        let runs = storage.list_batch_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].stats_json.contains(r#""succeeded":1"#));
    }

    #[test]
    fn config_from_app_config() {
        let mut app = AppConfig::default();
        app.enhancement.max_concurrency = 0;
        app.enhancement.batch_timeout_secs = 0;
        let config = EnhancerConfig::from(&app);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.batch_timeout, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
