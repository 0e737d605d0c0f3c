//! Wire shape of a structured research document.
//!
//! The research service is asked for JSON, but field naming and value types
//! drift between responses: camelCase or snake_case keys, numbers as strings,
//! ranges as `"£22,000 - £28,000"` or as `{min, max}` objects. These types
//! accept all of that and leave interpretation to the normalizer.

use serde::{Deserialize, Deserializer};

/// A scalar the service may send as a number, a string or a boolean.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl RawScalar {
    /// Render as display text (used for free-form facts like working hours).
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
            Self::Flag(b) => if *b { "yes" } else { "no" }.to_string(),
        }
    }
}

/// A money amount: either free text (`"£22k–£28k"`) or explicit bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Bounds {
        #[serde(default)]
        min: Option<RawScalar>,
        #[serde(default)]
        max: Option<RawScalar>,
        #[serde(default)]
        currency: Option<String>,
        #[serde(default, deserialize_with = "nullable_list")]
        sources: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSalary {
    #[serde(default, alias = "entryLevel", alias = "entry_level")]
    pub entry: Option<RawAmount>,
    #[serde(default, alias = "midLevel", alias = "mid_level", alias = "experienced")]
    pub mid: Option<RawAmount>,
    #[serde(default, alias = "seniorLevel", alias = "senior_level")]
    pub senior: Option<RawAmount>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub sources: Vec<String>,
    #[serde(default, alias = "by_region", deserialize_with = "nullable_vec")]
    pub by_region: Vec<RawRegionalSalary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRegionalSalary {
    pub region: String,
    #[serde(default)]
    pub range: Option<RawAmount>,
    #[serde(default)]
    pub min: Option<RawScalar>,
    #[serde(default)]
    pub max: Option<RawScalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarketDemand {
    #[serde(default, alias = "demandLevel", alias = "demand_level")]
    pub level: Option<String>,
    #[serde(default, alias = "job_postings")]
    pub job_postings: Option<RawScalar>,
    #[serde(default, alias = "growth_rate")]
    pub growth_rate: Option<RawScalar>,
    #[serde(default, alias = "competitionLevel", alias = "competition_level")]
    pub competition: Option<String>,
    #[serde(default, alias = "top_locations", deserialize_with = "nullable_list")]
    pub top_locations: Vec<String>,
    #[serde(default, alias = "top_employers", deserialize_with = "nullable_list")]
    pub top_employers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPathway {
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub duration: Option<RawScalar>,
    #[serde(default)]
    pub cost: Option<RawAmount>,
    #[serde(default, alias = "entry_requirements", deserialize_with = "nullable_list")]
    pub entry_requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkEnvironment {
    #[serde(default, alias = "remote_options", alias = "remote")]
    pub remote_options: Option<RawScalar>,
    #[serde(default, alias = "typical_hours", alias = "hours")]
    pub typical_hours: Option<RawScalar>,
    #[serde(default)]
    pub flexibility: Option<RawScalar>,
    #[serde(default, alias = "travelRequirements", alias = "travel_requirements")]
    pub travel: Option<RawScalar>,
    #[serde(default, alias = "team_size")]
    pub team_size: Option<RawScalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAutomationRisk {
    #[serde(default, alias = "riskLevel", alias = "risk_level")]
    pub level: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub mitigations: Vec<String>,
    #[serde(default, alias = "future_skills", deserialize_with = "nullable_list")]
    pub future_skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndustryGrowth {
    #[serde(default, alias = "next_year")]
    pub next_year: Option<RawScalar>,
    #[serde(default, alias = "five_year")]
    pub five_year: Option<RawScalar>,
    #[serde(default)]
    pub outlook: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCompetencies {
    #[serde(default, deserialize_with = "nullable_list")]
    pub technical: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub soft: Vec<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub certifications: Vec<String>,
}

/// A structured research document as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchDocument {
    #[serde(default, alias = "salaryData", alias = "salary_data")]
    pub salary: Option<RawSalary>,
    #[serde(default, alias = "market_demand")]
    pub market_demand: Option<RawMarketDemand>,
    #[serde(default, alias = "education_pathways", deserialize_with = "nullable_vec")]
    pub education_pathways: Vec<RawPathway>,
    #[serde(default, alias = "work_environment")]
    pub work_environment: Option<RawWorkEnvironment>,
    #[serde(default, alias = "automation_risk", alias = "automation")]
    pub automation_risk: Option<RawAutomationRisk>,
    #[serde(default, alias = "industry_growth", alias = "growth")]
    pub industry_growth: Option<RawIndustryGrowth>,
    #[serde(default, alias = "skills")]
    pub competencies: Option<RawCompetencies>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub sources: Vec<String>,
}

impl ResearchDocument {
    /// True when no section at all was present.
    pub fn is_empty(&self) -> bool {
        self.salary.is_none()
            && self.market_demand.is_none()
            && self.education_pathways.is_empty()
            && self.work_environment.is_none()
            && self.automation_risk.is_none()
            && self.industry_growth.is_none()
            && self.competencies.is_none()
    }
}

/// Treat an explicit `null` list as empty.
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
