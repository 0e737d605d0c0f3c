//! Map any upstream response shape onto the canonical enriched schema.
//!
//! The rule throughout: a field is filled only from something the response
//! actually states. Missing salary bands make the whole result `None`; every
//! other section is dropped individually when it cannot be read.

use pathwise_research::{
    RawAmount, RawAutomationRisk, RawCompetencies, RawIndustryGrowth, RawMarketDemand, RawPathway,
    RawRegionalSalary, RawSalary, RawScalar, RawWorkEnvironment, ResearchDocument,
    UpstreamResponse,
};
use pathwise_shared::{
    AutomationRisk, Competencies, CostRange, EducationPathway, EnrichedEntity, IndustryGrowth,
    Level, MarketDemand, Outlook, PathwayKind, RegionalSalary, SalaryBands, SalaryRange,
    WorkEnvironment,
};
use tracing::debug;

use crate::extract::{self, Band, MoneyRange};

/// Knobs the normalizer needs from configuration.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Currency applied when neither the figure nor its section names one.
    pub default_currency: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_currency: "GBP".into(),
        }
    }
}

/// Normalize a response into an [`EnrichedEntity`].
///
/// Returns `None` when the entry, mid and senior salary bands cannot all be
/// read from the response.
pub fn normalize(
    response: &UpstreamResponse,
    options: &NormalizeOptions,
) -> Option<EnrichedEntity> {
    match response {
        UpstreamResponse::Structured {
            document,
            citations,
            ..
        } => normalize_document(document, citations, options),
        UpstreamResponse::FreeText { text, citations } => normalize_text(text, citations, options),
    }
}

// ---------------------------------------------------------------------------
// Structured documents
// ---------------------------------------------------------------------------

fn normalize_document(
    doc: &ResearchDocument,
    citations: &[String],
    options: &NormalizeOptions,
) -> Option<EnrichedEntity> {
    let sources = merge_sources(citations, &doc.sources);
    let Some(salary) = doc.salary.as_ref().and_then(|s| salary_bands(s, &sources, options)) else {
        debug!("structured response lacks readable salary bands");
        return None;
    };
    let cited = !sources.is_empty();

    Some(EnrichedEntity {
        salary: Some(salary),
        market_demand: doc.market_demand.as_ref().and_then(market_demand),
        education_pathways: doc
            .education_pathways
            .iter()
            .filter_map(|p| pathway(p, cited))
            .collect(),
        work_environment: doc.work_environment.as_ref().and_then(work_environment),
        automation_risk: doc.automation_risk.as_ref().and_then(automation_risk),
        industry_growth: doc.industry_growth.as_ref().and_then(industry_growth),
        competencies: doc.competencies.as_ref().and_then(competencies),
        sources,
    })
}

fn salary_bands(
    raw: &RawSalary,
    sources: &[String],
    options: &NormalizeOptions,
) -> Option<SalaryBands> {
    let section_currency = raw.currency.as_deref().and_then(extract::currency_code);
    let section_sources = if raw.sources.is_empty() {
        sources.to_vec()
    } else {
        raw.sources.clone()
    };
    let band = |amount: Option<&RawAmount>| {
        amount.and_then(|a| salary_range(a, section_currency, &section_sources, options))
    };

    let entry = band(raw.entry.as_ref())?;
    let mid = band(raw.mid.as_ref())?;
    let senior = band(raw.senior.as_ref())?;

    let by_region = raw
        .by_region
        .iter()
        .filter_map(|r| regional(r, section_currency, &section_sources, options))
        .collect();

    Some(SalaryBands {
        entry: Some(entry),
        mid: Some(mid),
        senior: Some(senior),
        by_region,
    })
}

fn salary_range(
    amount: &RawAmount,
    section_currency: Option<&'static str>,
    fallback_sources: &[String],
    options: &NormalizeOptions,
) -> Option<SalaryRange> {
    let (parsed, currency, sources) = match amount {
        RawAmount::Text(text) => (extract::parse_salary_range(text)?, None, Vec::new()),
        RawAmount::Bounds {
            min,
            max,
            currency,
            sources,
        } => {
            let (min, min_cur) = scalar_amount(min.as_ref()?)?;
            let (max, max_cur) = scalar_amount(max.as_ref()?)?;
            let parsed = MoneyRange {
                min,
                max,
                currency: min_cur.or(max_cur),
            };
            let currency = currency.as_deref().and_then(extract::currency_code);
            (parsed, currency, sources.clone())
        }
    };

    let currency = parsed
        .currency
        .or(currency)
        .or(section_currency)
        .map(str::to_string)
        .unwrap_or_else(|| options.default_currency.clone());

    Some(SalaryRange {
        min: parsed.min,
        max: parsed.max,
        currency,
        sources: if sources.is_empty() {
            fallback_sources.to_vec()
        } else {
            sources
        },
    })
}

fn regional(
    raw: &RawRegionalSalary,
    section_currency: Option<&'static str>,
    sources: &[String],
    options: &NormalizeOptions,
) -> Option<RegionalSalary> {
    let region = raw.region.trim();
    if region.is_empty() {
        return None;
    }
    let range = match (&raw.range, &raw.min, &raw.max) {
        (Some(amount), _, _) => salary_range(amount, section_currency, sources, options)?,
        (None, Some(min), Some(max)) => {
            let bounds = RawAmount::Bounds {
                min: Some(min.clone()),
                max: Some(max.clone()),
                currency: None,
                sources: Vec::new(),
            };
            salary_range(&bounds, section_currency, sources, options)?
        }
        _ => return None,
    };
    Some(RegionalSalary {
        region: region.to_string(),
        range,
    })
}

fn scalar_amount(value: &RawScalar) -> Option<(f64, Option<&'static str>)> {
    match value {
        RawScalar::Number(n) if n.is_finite() => Some((*n, None)),
        RawScalar::Text(s) => {
            let range = extract::parse_salary_range(s)?;
            (range.min == range.max).then_some((range.min, range.currency))
        }
        _ => None,
    }
}

fn scalar_percent(value: &RawScalar) -> Option<f64> {
    match value {
        RawScalar::Number(n) if n.is_finite() => Some(*n),
        RawScalar::Text(s) => extract::parse_percent(s),
        _ => None,
    }
}

fn scalar_count(value: &RawScalar) -> Option<u32> {
    let n = match value {
        RawScalar::Number(n) => *n,
        RawScalar::Text(s) => extract::parse_amount(s)?,
        RawScalar::Flag(_) => return None,
    };
    (n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX)).then_some(n.round() as u32)
}

fn market_demand(raw: &RawMarketDemand) -> Option<MarketDemand> {
    let demand = MarketDemand {
        level: raw.level.as_deref().and_then(Level::parse),
        job_postings: raw.job_postings.as_ref().and_then(scalar_count),
        growth_rate: raw.growth_rate.as_ref().and_then(scalar_percent),
        competition: non_empty(raw.competition.as_deref()),
        top_locations: clean_list(&raw.top_locations),
        top_employers: clean_list(&raw.top_employers),
    };
    (!demand.is_empty()).then_some(demand)
}

fn pathway(raw: &RawPathway, cited: bool) -> Option<EducationPathway> {
    let title = non_empty(raw.title.as_deref())?;
    let kind = PathwayKind::parse(raw.kind.as_deref().unwrap_or(&title));
    let cost = raw.cost.as_ref().and_then(|amount| match amount {
        RawAmount::Text(text) => extract::parse_salary_range(text).map(|r| CostRange {
            min: r.min,
            max: r.max,
        }),
        RawAmount::Bounds { min, max, .. } => {
            let min = scalar_amount(min.as_ref()?)?.0;
            let max = scalar_amount(max.as_ref()?)?.0;
            Some(CostRange { min, max })
        }
    });

    Some(EducationPathway {
        kind,
        title,
        provider: non_empty(raw.provider.as_deref()),
        duration: raw
            .duration
            .as_ref()
            .map(RawScalar::as_text)
            .filter(|d| !d.is_empty()),
        cost,
        entry_requirements: clean_list(&raw.entry_requirements),
        verified: cited,
    })
}

fn work_environment(raw: &RawWorkEnvironment) -> Option<WorkEnvironment> {
    let text = |v: &Option<RawScalar>| v.as_ref().map(RawScalar::as_text).filter(|s| !s.is_empty());
    let env = WorkEnvironment {
        remote_options: text(&raw.remote_options),
        typical_hours: text(&raw.typical_hours),
        flexibility: text(&raw.flexibility),
        travel: text(&raw.travel),
        team_size: text(&raw.team_size),
    };
    (!env.is_empty()).then_some(env)
}

fn automation_risk(raw: &RawAutomationRisk) -> Option<AutomationRisk> {
    Some(AutomationRisk {
        level: raw.level.as_deref().and_then(Level::parse)?,
        timeline: non_empty(raw.timeline.as_deref()),
        mitigations: clean_list(&raw.mitigations),
        future_skills: clean_list(&raw.future_skills),
    })
}

fn industry_growth(raw: &RawIndustryGrowth) -> Option<IndustryGrowth> {
    let growth = IndustryGrowth {
        next_year: raw.next_year.as_ref().and_then(scalar_percent),
        five_year: raw.five_year.as_ref().and_then(scalar_percent),
        outlook: raw.outlook.as_deref().and_then(Outlook::parse),
        factors: clean_list(&raw.factors),
    };
    (!growth.is_empty()).then_some(growth)
}

fn competencies(raw: &RawCompetencies) -> Option<Competencies> {
    let c = Competencies {
        technical: clean_list(&raw.technical),
        soft: clean_list(&raw.soft),
        certifications: clean_list(&raw.certifications),
    };
    (!c.is_empty()).then_some(c)
}

// ---------------------------------------------------------------------------
// Free text
// ---------------------------------------------------------------------------

fn normalize_text(
    text: &str,
    citations: &[String],
    options: &NormalizeOptions,
) -> Option<EnrichedEntity> {
    let band = |b: Band| {
        extract::salary_band(text, b).map(|r| SalaryRange {
            min: r.min,
            max: r.max,
            currency: r
                .currency
                .map(str::to_string)
                .unwrap_or_else(|| options.default_currency.clone()),
            sources: citations.to_vec(),
        })
    };

    let (Some(entry), Some(mid), Some(senior)) =
        (band(Band::Entry), band(Band::Mid), band(Band::Senior))
    else {
        debug!("free-text response lacks one or more salary bands");
        return None;
    };

    let demand = MarketDemand {
        level: extract::demand_level(text),
        job_postings: extract::job_postings(text),
        ..MarketDemand::default()
    };
    let growth = IndustryGrowth {
        next_year: extract::growth_next_year(text),
        five_year: extract::growth_five_year(text),
        outlook: extract::outlook(text),
        factors: Vec::new(),
    };
    let environment = WorkEnvironment {
        remote_options: extract::remote_mode(text),
        ..WorkEnvironment::default()
    };

    Some(EnrichedEntity {
        salary: Some(SalaryBands {
            entry: Some(entry),
            mid: Some(mid),
            senior: Some(senior),
            by_region: Vec::new(),
        }),
        market_demand: (!demand.is_empty()).then_some(demand),
        education_pathways: extract::qualifications(text)
            .into_iter()
            .map(|(kind, title)| EducationPathway {
                kind,
                title,
                provider: None,
                duration: None,
                cost: None,
                entry_requirements: Vec::new(),
                verified: false,
            })
            .collect(),
        work_environment: (!environment.is_empty()).then_some(environment),
        automation_risk: extract::automation_level(text).map(|level| AutomationRisk {
            level,
            timeline: None,
            mitigations: Vec::new(),
            future_skills: Vec::new(),
        }),
        industry_growth: (!growth.is_empty()).then_some(growth),
        competencies: None,
        sources: citations.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn merge_sources(citations: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for source in citations.iter().chain(extra) {
        let source = source.trim();
        if !source.is_empty() && !merged.iter().any(|s| s == source) {
            merged.push(source.to_string());
        }
    }
    merged
}
