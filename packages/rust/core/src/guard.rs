//! Integrity guard: the last check before an enrichment can be cached.
//!
//! A record either passes whole or is rejected whole; salary figures are
//! never patched up here.

use pathwise_shared::{EnrichedEntity, PathwiseError, Result, SalaryRange};

use crate::extract::{MAX_PLAUSIBLE_SALARY, MIN_PLAUSIBLE_SALARY};

/// Accept `candidate` only if every mandatory salary field is present and sane.
pub fn validate(candidate: Option<EnrichedEntity>) -> Result<EnrichedEntity> {
    let entity = candidate.ok_or_else(|| PathwiseError::rejected("no enrichment to validate"))?;
    let salary = entity
        .salary
        .as_ref()
        .ok_or_else(|| PathwiseError::rejected("salary bands missing"))?;

    let mut seen: Vec<(&str, &SalaryRange)> = Vec::with_capacity(3);
    for (band, range) in salary.bands() {
        let range =
            range.ok_or_else(|| PathwiseError::rejected(format!("{band} salary missing")))?;
        check_range(band, range)?;
        // one stated figure copied into several bands
        if let Some((other, _)) = seen
            .iter()
            .find(|(_, prior)| prior.min == range.min && prior.max == range.max)
        {
            return Err(PathwiseError::rejected(format!(
                "{band} salary repeats the {other} band"
            )));
        }
        seen.push((band, range));
    }

    for regional in &salary.by_region {
        check_range(&format!("{} regional", regional.region), &regional.range)?;
    }

    if let (Some(entry), Some(senior)) = (&salary.entry, &salary.senior) {
        if entry.min > senior.min {
            return Err(PathwiseError::rejected(format!(
                "entry salary floor {} exceeds senior floor {}",
                entry.min, senior.min
            )));
        }
    }

    Ok(entity)
}

fn check_range(label: &str, range: &SalaryRange) -> Result<()> {
    for value in [range.min, range.max] {
        if !value.is_finite() {
            return Err(PathwiseError::rejected(format!("{label} salary is not a number")));
        }
        if !(MIN_PLAUSIBLE_SALARY..=MAX_PLAUSIBLE_SALARY).contains(&value) {
            return Err(PathwiseError::rejected(format!(
                "{label} salary {value} outside plausible annual range"
            )));
        }
    }
    if range.min > range.max {
        return Err(PathwiseError::rejected(format!(
            "{label} salary min {} exceeds max {}",
            range.min, range.max
        )));
    }
    if range.currency.trim().is_empty() {
        return Err(PathwiseError::rejected(format!("{label} salary has no currency")));
    }
    Ok(())
}
