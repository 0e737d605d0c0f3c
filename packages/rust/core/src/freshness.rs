//! When a cached enrichment must be refreshed.

use chrono::{DateTime, Utc};

use pathwise_shared::CacheRecord;

/// Confidence below which a cached record is re-enhanced.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// True once `now` has reached the record's stale instant.
pub fn is_expired(record: &CacheRecord, now: DateTime<Utc>) -> bool {
    now >= record.stale_at()
}

/// Whether an entity needs a fresh research call.
///
/// Returns `false` only when a record exists, is not yet stale, and its
/// confidence meets `threshold`.
pub fn needs_enhancement(record: Option<&CacheRecord>, threshold: f64, now: DateTime<Utc>) -> bool {
    match record {
        None => true,
        Some(record) => is_expired(record, now) || record.confidence() < threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pathwise_shared::EnrichedEntity;

    fn record(confidence: f64, created_at: DateTime<Utc>) -> CacheRecord {
        CacheRecord::new("dataanalyst", EnrichedEntity::default(), confidence, created_at)
    }

    #[test]
    fn absent_record_needs_enhancement() {
        assert!(needs_enhancement(None, 0.8, Utc::now()));
    }

    #[test]
    fn fresh_confident_record_is_kept() {
        let now = Utc::now();
        let r = record(0.9, now - Duration::hours(1));
        assert!(!needs_enhancement(Some(&r), 0.8, now));
    }

    #[test]
    fn stale_record_needs_enhancement() {
        let now = Utc::now();
        let r = record(0.95, now - Duration::hours(25));
        assert!(is_expired(&r, now));
        assert!(needs_enhancement(Some(&r), 0.8, now));
    }

    #[test]
    fn stale_boundary_is_inclusive() {
        let created = Utc::now();
        let r = record(0.95, created);
        assert!(!needs_enhancement(Some(&r), 0.8, r.stale_at() - Duration::seconds(1)));
        assert!(needs_enhancement(Some(&r), 0.8, r.stale_at()));
    }

    #[test]
    fn low_confidence_needs_enhancement() {
        let now = Utc::now();
        let r = record(0.79, now);
        assert!(needs_enhancement(Some(&r), 0.8, now));
        let r = record(0.8, now);
        assert!(!needs_enhancement(Some(&r), 0.8, now));
    }
}
