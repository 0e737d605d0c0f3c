//! Core domain types for Pathwise career enrichment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hours a cached enrichment stays fresh.
pub const CACHE_TTL_HOURS: i64 = 24;

/// The fixed cache time-to-live.
pub fn cache_ttl() -> Duration {
    Duration::hours(CACHE_TTL_HOURS)
}

/// Normalize a career title into its cache key: lower-cased, alphanumeric only.
///
/// `"Data Analyst"` and `"data-analyst "` both map to `"dataanalyst"`.
pub fn cache_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Baseline input
// ---------------------------------------------------------------------------

/// A display-ready career pathway with no verified enrichment.
///
/// Fields other than `title` and `description` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntity {
    /// Career title, e.g. "Data Analyst".
    pub title: String,
    /// Short pathway description.
    #[serde(default)]
    pub description: String,
    /// Any other display fields owned by the caller.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BaselineEntity {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// The normalized cache key for this entity's title.
    pub fn cache_key(&self) -> String {
        cache_key(&self.title)
    }
}

// ---------------------------------------------------------------------------
// Canonical enriched schema
// ---------------------------------------------------------------------------

/// A salary range in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    /// ISO 4217 code, e.g. "GBP".
    pub currency: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// A regional salary figure reported by the research service.
///
/// Only ever populated from explicit upstream data; never derived by scaling
/// a national figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalSalary {
    pub region: String,
    pub range: SalaryRange,
}

/// Salary bands by seniority. All three bands are mandatory for a valid record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryBands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<SalaryRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<SalaryRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senior: Option<SalaryRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_region: Vec<RegionalSalary>,
}

impl SalaryBands {
    /// The three seniority bands with their field names.
    pub fn bands(&self) -> [(&'static str, Option<&SalaryRange>); 3] {
        [
            ("entry", self.entry.as_ref()),
            ("mid", self.mid.as_ref()),
            ("senior", self.senior.as_ref()),
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.entry.is_some() && self.mid.is_some() && self.senior.is_some()
    }
}

/// Coarse three-step level used for demand and automation risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    /// Parse common wordings ("very high", "moderate", "Low") into a level.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.contains("high") || s.contains("strong") {
            Some(Self::High)
        } else if s.contains("medium") || s.contains("moderate") {
            Some(Self::Medium)
        } else if s.contains("low") || s.contains("weak") {
            Some(Self::Low)
        } else {
            None
        }
    }
}

/// Labour-market demand statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDemand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_postings: Option<u32>,
    /// Year-on-year change in postings, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_employers: Vec<String>,
}

impl MarketDemand {
    pub fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.job_postings.is_none()
            && self.growth_rate.is_none()
            && self.competition.is_none()
            && self.top_locations.is_empty()
            && self.top_employers.is_empty()
    }
}

/// Kind of education or training route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathwayKind {
    Degree,
    Apprenticeship,
    Bootcamp,
    Certification,
    Course,
    Other,
}

impl PathwayKind {
    pub fn parse(s: &str) -> Self {
        let s = s.to_lowercase();
        if s.contains("apprentice") {
            Self::Apprenticeship
        } else if s.contains("bootcamp") {
            Self::Bootcamp
        } else if s.contains("certif") {
            Self::Certification
        } else if s.contains("degree")
            || s.contains("bachelor")
            || s.contains("master")
            || s.contains("phd")
        {
            Self::Degree
        } else if s.contains("course") {
            Self::Course
        } else {
            Self::Other
        }
    }
}

/// Cost bounds for an education pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
}

/// One route into the career.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationPathway {
    #[serde(rename = "type")]
    pub kind: PathwayKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_requirements: Vec<String>,
    /// True only when the pathway came from a structured, cited document.
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkEnvironment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flexibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,
}

impl WorkEnvironment {
    pub fn is_empty(&self) -> bool {
        self.remote_options.is_none()
            && self.typical_hours.is_none()
            && self.flexibility.is_none()
            && self.travel.is_none()
            && self.team_size.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRisk {
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mitigations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub future_skills: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Declining,
    Stable,
    Growing,
}

impl Outlook {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        if s.contains("declin") || s.contains("shrink") || s.contains("negative") {
            Some(Self::Declining)
        } else if s.contains("grow") || s.contains("positive") || s.contains("strong") {
            Some(Self::Growing)
        } else if s.contains("stable") || s.contains("steady") || s.contains("flat") {
            Some(Self::Stable)
        } else {
            None
        }
    }
}

/// Industry growth projection, percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryGrowth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_year: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub five_year: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlook: Option<Outlook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<String>,
}

impl IndustryGrowth {
    pub fn is_empty(&self) -> bool {
        self.next_year.is_none()
            && self.five_year.is_none()
            && self.outlook.is_none()
            && self.factors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Competencies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
}

impl Competencies {
    pub fn is_empty(&self) -> bool {
        self.technical.is_empty() && self.soft.is_empty() && self.certifications.is_empty()
    }
}

/// The canonical enriched record every upstream shape is normalized into.
///
/// Every section is optional in the type; the integrity guard is what makes
/// the salary bands mandatory before a record can be cached or surfaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<SalaryBands>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_demand: Option<MarketDemand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub education_pathways: Vec<EducationPathway>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_environment: Option<WorkEnvironment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_risk: Option<AutomationRisk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_growth: Option<IndustryGrowth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competencies: Option<Competencies>,
    /// Citation URLs backing the record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Cache record
// ---------------------------------------------------------------------------

/// A cached enrichment. `stale_at` is always `created_at + TTL`.
///
/// Records are only built through [`CacheRecord::new`], so the invariant holds
/// for every value in either cache tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecord {
    key: String,
    payload: EnrichedEntity,
    confidence: f64,
    created_at: DateTime<Utc>,
    stale_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Build a record; confidence is clamped to `[0, 1]`.
    pub fn new(
        key: impl Into<String>,
        payload: EnrichedEntity,
        confidence: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            key: key.into(),
            payload,
            confidence,
            created_at,
            stale_at: created_at + cache_ttl(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &EnrichedEntity {
        &self.payload
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stale_at(&self) -> DateTime<Utc> {
        self.stale_at
    }
}

// ---------------------------------------------------------------------------
// Outcomes and output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Per-entity result of one batch. Never aggregated into a batch error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementOutcome {
    pub entity_key: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EnhancementOutcome {
    pub fn success(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            status: OutcomeStatus::Success,
            reason: None,
        }
    }

    pub fn failure(entity_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            status: OutcomeStatus::Failure,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Verified enrichment attached to a baseline entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrichment {
    #[serde(flatten)]
    pub data: EnrichedEntity,
    pub confidence: f64,
    pub enhanced_at: DateTime<Utc>,
    pub stale_at: DateTime<Utc>,
}

impl From<&CacheRecord> for Enrichment {
    fn from(record: &CacheRecord) -> Self {
        Self {
            data: record.payload.clone(),
            confidence: record.confidence,
            enhanced_at: record.created_at,
            stale_at: record.stale_at,
        }
    }
}

/// A baseline entity, enriched when verified data is available.
///
/// Unenhanced entities serialize exactly like their baseline form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedEntity {
    #[serde(flatten)]
    pub baseline: BaselineEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

impl EnhancedEntity {
    pub fn baseline(entity: BaselineEntity) -> Self {
        Self {
            baseline: entity,
            enrichment: None,
        }
    }

    pub fn enriched(entity: BaselineEntity, record: &CacheRecord) -> Self {
        Self {
            baseline: entity,
            enrichment: Some(Enrichment::from(record)),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }
}
