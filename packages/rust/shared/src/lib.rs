//! Shared types, error model, and configuration for Pathwise.
//!
//! This crate is the foundation depended on by all other Pathwise crates.
//! It provides:
//! - [`PathwiseError`]: the unified error type
//! - Domain types ([`BaselineEntity`], [`EnrichedEntity`], [`CacheRecord`], [`EnhancedEntity`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnhancementConfig, ResearchConfig, StorageConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, research_api_key, validate_config,
};
pub use error::{PathwiseError, Result};
pub use types::{
    AutomationRisk, BaselineEntity, CACHE_TTL_HOURS, CacheRecord, Competencies, CostRange,
    EducationPathway, EnhancedEntity, EnhancementOutcome, EnrichedEntity, Enrichment,
    IndustryGrowth, Level, MarketDemand, OutcomeStatus, Outlook, PathwayKind, RegionalSalary,
    SalaryBands, SalaryRange, WorkEnvironment, cache_key, cache_ttl,
};
