//! Confidence scoring for a normalized enrichment.

use pathwise_research::UpstreamResponse;
use pathwise_shared::EnrichedEntity;

const BASE_STRUCTURED: f64 = 0.5;
const BASE_FREE_TEXT: f64 = 0.3;

const SALARY: f64 = 0.15;
const MARKET_DEMAND: f64 = 0.1;
const EDUCATION: f64 = 0.1;
const WORK_ENVIRONMENT: f64 = 0.05;
const AUTOMATION: f64 = 0.05;
const GROWTH: f64 = 0.05;

/// (minimum citations, bonus), cumulative.
const CITATION_TIERS: &[(usize, f64)] = &[(3, 0.1), (5, 0.05)];
/// (reply length in characters above which, bonus), cumulative.
const LENGTH_TIERS: &[(usize, f64)] = &[(1_000, 0.05), (2_000, 0.05)];

/// Score how much to trust `entity`, in `[0, 1]`.
///
/// Never decreases when a section is added, a citation is added, or the
/// reply grows.
pub fn score(response: &UpstreamResponse, entity: &EnrichedEntity) -> f64 {
    let mut score = if response.is_structured() {
        BASE_STRUCTURED
    } else {
        BASE_FREE_TEXT
    };

    let sections = [
        (entity.salary.is_some(), SALARY),
        (entity.market_demand.is_some(), MARKET_DEMAND),
        (!entity.education_pathways.is_empty(), EDUCATION),
        (entity.work_environment.is_some(), WORK_ENVIRONMENT),
        (entity.automation_risk.is_some(), AUTOMATION),
        (entity.industry_growth.is_some(), GROWTH),
    ];
    score += sections
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum::<f64>();

    let citations = response.citations().len();
    score += CITATION_TIERS
        .iter()
        .filter(|(min, _)| citations >= *min)
        .map(|(_, bonus)| bonus)
        .sum::<f64>();

    let length = response.content_len();
    score += LENGTH_TIERS
        .iter()
        .filter(|(above, _)| length > *above)
        .map(|(_, bonus)| bonus)
        .sum::<f64>();

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise_research::ResearchDocument;
    use pathwise_shared::{
        AutomationRisk, EducationPathway, IndustryGrowth, Level, MarketDemand, PathwayKind,
        SalaryBands, WorkEnvironment,
    };

    fn structured(citations: usize, raw_len: usize) -> UpstreamResponse {
        UpstreamResponse::Structured {
            document: ResearchDocument::default(),
            citations: (0..citations).map(|i| format!("https://s{i}.example")).collect(),
            raw_len,
        }
    }

    fn full_entity() -> EnrichedEntity {
        EnrichedEntity {
            salary: Some(SalaryBands::default()),
            market_demand: Some(MarketDemand {
                level: Some(Level::High),
                ..MarketDemand::default()
            }),
            education_pathways: vec![EducationPathway {
                kind: PathwayKind::Degree,
                title: "Degree".into(),
                provider: None,
                duration: None,
                cost: None,
                entry_requirements: vec![],
                verified: true,
            }],
            work_environment: Some(WorkEnvironment {
                remote_options: Some("hybrid".into()),
                ..WorkEnvironment::default()
            }),
            automation_risk: Some(AutomationRisk {
                level: Level::Low,
                timeline: None,
                mitigations: vec![],
                future_skills: vec![],
            }),
            industry_growth: Some(IndustryGrowth {
                next_year: Some(3.0),
                ..IndustryGrowth::default()
            }),
            competencies: None,
            sources: vec![],
        }
    }

    #[test]
    fn base_depends_on_response_kind() {
        let empty = EnrichedEntity::default();
        assert!((score(&structured(0, 10), &empty) - 0.5).abs() < 1e-9);
        let text = UpstreamResponse::FreeText {
            text: "short".into(),
            citations: vec![],
        };
        assert!((score(&text, &empty) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn salary_and_demand_with_citations_reach_threshold() {
        let entity = EnrichedEntity {
            salary: Some(SalaryBands::default()),
            market_demand: Some(MarketDemand {
                level: Some(Level::Medium),
                ..MarketDemand::default()
            }),
            ..EnrichedEntity::default()
        };
        // 0.5 + 0.15 + 0.1 + 0.1
        assert!((score(&structured(3, 500), &entity) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn clamped_to_one() {
        let s = score(&structured(10, 5_000), &full_entity());
        assert_eq!(s, 1.0);
    }

    #[test]
    fn monotonic_in_citations_and_length() {
        let entity = EnrichedEntity {
            salary: Some(SalaryBands::default()),
            ..EnrichedEntity::default()
        };
        let mut last = 0.0;
        for citations in 0..8 {
            let s = score(&structured(citations, 100), &entity);
            assert!(s >= last);
            last = s;
        }
        let mut last = 0.0;
        for len in [0, 999, 1_000, 1_001, 2_000, 2_001, 10_000] {
            let s = score(&structured(0, len), &entity);
            assert!(s >= last);
            assert!((0.0..=1.0).contains(&s));
            last = s;
        }
    }

    #[test]
    fn monotonic_in_completeness() {
        let full = full_entity();
        let response = structured(1, 100);
        let mut partial = EnrichedEntity::default();
        let mut last = score(&response, &partial);

        partial.salary = full.salary.clone();
        let s = score(&response, &partial);
        assert!(s >= last);
        last = s;

        partial.market_demand = full.market_demand.clone();
        partial.education_pathways = full.education_pathways.clone();
        let s = score(&response, &partial);
        assert!(s >= last);
        last = s;

        let s = score(&response, &full);
        assert!(s >= last);
    }
}
