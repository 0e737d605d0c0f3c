//! Enhancement pipeline for Pathwise.
//!
//! This crate ties the research adapter, the normalizer, and the two-tier
//! cache together into batch enhancement (see [`Enhancer`]).

pub mod cache;
pub mod enhancer;
pub mod extract;
pub mod freshness;
pub mod guard;
pub mod normalize;
pub mod score;

pub use cache::CacheStore;
pub use enhancer::{
    BatchReport, BatchSummary, EnhanceProgress, Enhancer, EnhancerConfig, ProgressStatus,
    ProgressUpdate, SilentProgress,
};
pub use freshness::{DEFAULT_CONFIDENCE_THRESHOLD, is_expired, needs_enhancement};
pub use normalize::{NormalizeOptions, normalize};
