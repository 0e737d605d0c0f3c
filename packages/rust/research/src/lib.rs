//! Upstream research adapter for Pathwise.
//!
//! This crate provides:
//! - [`ResearchAdapter`]: the seam the enhancement pipeline calls, one title at a time
//! - [`UpstreamResponse`]: a structured document or free narrative text, plus citations
//! - [`HttpResearchAdapter`]: the reqwest-backed implementation
//! - [`document`]: the tolerant wire schema for structured replies

pub mod client;
pub mod document;

use std::future::Future;

use pathwise_shared::Result;

pub use client::{HttpResearchAdapter, classify_content};
pub use document::{
    RawAmount, RawAutomationRisk, RawCompetencies, RawIndustryGrowth, RawMarketDemand,
    RawPathway, RawRegionalSalary, RawSalary, RawScalar, RawWorkEnvironment, ResearchDocument,
};

/// What the research service said about one career.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamResponse {
    /// A JSON document matching the canonical sections.
    Structured {
        document: ResearchDocument,
        citations: Vec<String>,
        /// Length in characters of the reply the document was parsed from.
        raw_len: usize,
    },
    /// Unstructured narrative text.
    FreeText { text: String, citations: Vec<String> },
}

impl UpstreamResponse {
    pub fn citations(&self) -> &[String] {
        match self {
            Self::Structured { citations, .. } | Self::FreeText { citations, .. } => citations,
        }
    }

    /// Size of the reply in characters.
    pub fn content_len(&self) -> usize {
        match self {
            Self::Structured { raw_len, .. } => *raw_len,
            Self::FreeText { text, .. } => text.chars().count(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }
}

/// Fetches research for a single career title.
///
/// Implementations fail with `PathwiseError::UpstreamUnavailable` on transport
/// or service errors. The pipeline calls `fetch` at most once per title per batch.
pub trait ResearchAdapter: Send + Sync {
    fn fetch(&self, title: &str) -> impl Future<Output = Result<UpstreamResponse>> + Send;
}
