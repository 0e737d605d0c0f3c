//! Pattern extraction for research replies.
//!
//! Every extractor returns `Option<T>`: `None` means no confident match was
//! found, and callers must not substitute a default. Free-text rules live in
//! tables so each can be tested and tuned on its own.

use std::sync::LazyLock;

use regex::Regex;

use pathwise_shared::{Level, Outlook, PathwayKind};

/// Plausible annual salary bounds; anything outside is treated as a misread.
pub const MIN_PLAUSIBLE_SALARY: f64 = 1_000.0;
pub const MAX_PLAUSIBLE_SALARY: f64 = 1_000_000.0;

/// A money range as written in the source text.
///
/// Bounds are kept in source order; ordering is checked by the integrity guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyRange {
    pub min: f64,
    pub max: f64,
    pub currency: Option<&'static str>,
}

/// Seniority band a salary mention belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Entry,
    Mid,
    Senior,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Entry, Band::Mid, Band::Senior];

    fn group(self) -> &'static str {
        match self {
            Band::Entry => "entry",
            Band::Mid => "mid",
            Band::Senior => "senior",
        }
    }
}

// ---------------------------------------------------------------------------
// Money parsing
// ---------------------------------------------------------------------------

const CURRENCY: &str = r"£|\$|€|\b(?:GBP|USD|EUR)\b";
const NUMBER: &str = r"\d[\d,]*(?:\.\d+)?";

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<c1>{CURRENCY})?\s?(?P<a>{NUMBER})\s?(?P<ka>k\b)?\s*(?:-|–|—|\bto\b|\band\b)\s*(?P<c2>{CURRENCY})?\s?(?P<b>{NUMBER})\s?(?P<kb>k\b)?(?:\s?(?P<c3>GBP|USD|EUR)\b)?"
    ))
    .expect("valid regex")
});

static SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:about|around|approximately|c\.)?\s*(?P<c1>{CURRENCY})?\s?(?P<a>{NUMBER})\s?(?P<ka>k)?\s*(?P<c3>GBP|USD|EUR)?\s*(?:per (?:year|annum)|a year|p\.?a\.?|annually)?\s*$"
    ))
    .expect("valid regex")
});

static NON_ANNUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)per (?:hour|day|week|month)|an hour|a day|a week|a month|/\s?(?:hr|hour|day|wk|week|month)\b|\bhourly\b|\bdaily\b|\bweekly\b|\bmonthly\b",
    )
    .expect("valid regex")
});

static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));

/// Map a currency symbol or code to its ISO code.
pub fn currency_code(marker: &str) -> Option<&'static str> {
    match marker.trim().to_uppercase().as_str() {
        "£" | "GBP" => Some("GBP"),
        "$" | "USD" => Some("USD"),
        "€" | "EUR" => Some("EUR"),
        _ => None,
    }
}

fn parse_number(digits: &str) -> Option<f64> {
    let cleaned: String = digits.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse an annual salary range such as `"£22,000 - £28,000"` or `"$45k–60k"`.
///
/// A single figure (`"£30,000 per year"`) yields `min == max`. Hourly, daily,
/// weekly or monthly rates return `None` rather than being annualised, and a
/// bare numeric range without any currency marker is only accepted when it is
/// the whole string (so `"2020-2023 data"` is never read as a salary).
pub fn parse_salary_range(text: &str) -> Option<MoneyRange> {
    if NON_ANNUAL_RE.is_match(text) {
        return None;
    }

    if let Some(caps) = RANGE_RE.captures(text) {
        let whole = caps.get(0)?;
        let currency = ["c1", "c2", "c3"]
            .iter()
            .find_map(|name| caps.name(name).and_then(|m| currency_code(m.as_str())));

        let rest = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        if currency.is_none() && DIGIT_RE.is_match(&rest) {
            return None;
        }

        let mut min = parse_number(caps.name("a")?.as_str())?;
        let mut max = parse_number(caps.name("b")?.as_str())?;
        let (ka, kb) = (caps.name("ka").is_some(), caps.name("kb").is_some());
        if ka {
            min *= 1_000.0;
        }
        if kb {
            max *= 1_000.0;
        }
        // "£22-28k": the suffix on the upper bound applies to both
        if kb && !ka && min < 1_000.0 {
            min *= 1_000.0;
        }
        if ka && !kb && max < 1_000.0 {
            max *= 1_000.0;
        }
        return Some(MoneyRange { min, max, currency });
    }

    parse_amount_with_currency(text).map(|(value, currency)| MoneyRange {
        min: value,
        max: value,
        currency,
    })
}

/// Parse a single money amount (`"£22,000"`, `"22k"`, `"9250"`).
pub fn parse_amount(text: &str) -> Option<f64> {
    parse_amount_with_currency(text).map(|(value, _)| value)
}

fn parse_amount_with_currency(text: &str) -> Option<(f64, Option<&'static str>)> {
    let caps = SINGLE_RE.captures(text)?;
    let mut value = parse_number(caps.name("a")?.as_str())?;
    if caps.name("ka").is_some() {
        value *= 1_000.0;
    }
    let currency = ["c1", "c3"]
        .iter()
        .find_map(|name| caps.name(name).and_then(|m| currency_code(m.as_str())));
    Some((value, currency))
}

/// Parse a percentage such as `"4.5%"`, `"+12 %"` or `"-3"`.
pub fn parse_percent(text: &str) -> Option<f64> {
    static PCT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:about|around|approximately|c\.)?\s*(?P<n>[-+]?\d+(?:\.\d+)?)\s*%?\s*$")
            .expect("valid regex")
    });
    let caps = PCT_RE.captures(text)?;
    parse_number(caps.name("n")?.as_str()).filter(|p| (-100.0..=1_000.0).contains(p))
}

// ---------------------------------------------------------------------------
// Free-text rule tables
// ---------------------------------------------------------------------------

/// Keywords that introduce a salary mention for each band.
///
/// Alternatives are tried leftmost-first, so "highly experienced" is read as
/// one senior keyword rather than a mid one.
const BAND_RULES: &[(Band, &str)] = &[
    (
        Band::Entry,
        r"entry[- ]level|graduates?|junior|starting salar(?:y|ies)|newly[- ]qualified|trainees?",
    ),
    (
        Band::Mid,
        r"mid[- ]level|mid[- ]career|mid[- ]senior|experienced|intermediate",
    ),
    (Band::Senior, r"highly experienced|senior|principal|head of"),
];

/// Longest gap allowed between a band keyword and the range it introduces.
const MAX_KEYWORD_GAP: usize = 80;

const NEXT_YEAR_RULES: &[&str] = &[
    r"(?i)(?P<pct>[-+]?\d+(?:\.\d+)?)\s?%[^.\n%]{0,40}?(?:next year|next 12 months|annually|per year|each year|year[- ]on[- ]year)",
    r"(?i)(?:next year|next 12 months|year[- ]on[- ]year|per year|each year|annual(?:ly)?)[^.\n%]{0,60}?(?P<pct>[-+]?\d+(?:\.\d+)?)\s?%",
];

const FIVE_YEAR_RULES: &[&str] = &[
    r"(?i)(?:five|5)[- ]years?[^.\n%]{0,60}?(?P<pct>[-+]?\d+(?:\.\d+)?)\s?%",
    r"(?i)(?P<pct>[-+]?\d+(?:\.\d+)?)\s?%[^.\n%]{0,60}?(?:over (?:the next )?(?:five|5) years|by 20\d\d)",
];

const AUTOMATION_RULES: &[&str] = &[
    r"(?i)\b(?P<word>low|medium|moderate|high)\b[^.\n]{0,25}?(?:risk of automation|automation risk)",
    r"(?i)(?:risk of automation|automation risk)[^.\n]{0,25}?\b(?P<word>low|medium|moderate|high)\b",
];

const QUALIFICATION_RULES: &[(PathwayKind, &str)] = &[
    (
        PathwayKind::Apprenticeship,
        r"(?i)\b(?P<phrase>(?:level \d+ |degree |higher )?apprenticeships?)\b",
    ),
    (
        PathwayKind::Degree,
        r"(?i)\b(?P<phrase>(?:bachelor'?s |master'?s |undergraduate |postgraduate |foundation )?degrees?|BSc|MSc)\b",
    ),
    (
        PathwayKind::Bootcamp,
        r"(?i)\b(?P<phrase>(?:coding |data |ux |tech )?bootcamps?)\b",
    ),
    (
        PathwayKind::Certification,
        r"(?i)\b(?P<phrase>(?:professional |industry )?(?:certifications?|certificates?))\b",
    ),
];

const MONEY: &str = r"(?:£|\$|€)\s?\d[\d,]*(?:\.\d+)?\s?[kK]?";
const MONEY_OPT: &str = r"(?:£|\$|€)?\s?\d[\d,]*(?:\.\d+)?\s?[kK]?";

static BAND_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = BAND_RULES
        .iter()
        .map(|(band, keywords)| format!("(?P<{}>{keywords})", band.group()))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).expect("valid regex")
});

/// A money range, or failing that a lone money figure.
static MONEY_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<range>{MONEY}\s*(?:-|–|—|to|and)\s*{MONEY_OPT})|{MONEY}"
    ))
    .expect("valid regex")
});

static NEXT_YEAR_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(NEXT_YEAR_RULES));
static FIVE_YEAR_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(FIVE_YEAR_RULES));
static AUTOMATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(AUTOMATION_RULES));

static QUALIFICATION_RES: LazyLock<Vec<(PathwayKind, Regex)>> = LazyLock::new(|| {
    QUALIFICATION_RULES
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("valid regex")))
        .collect()
});

fn compile(rules: &[&str]) -> Vec<Regex> {
    rules
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// First capture of `group` across `rules`, in table order.
fn first_capture<'t>(rules: &[Regex], text: &'t str, group: &str) -> Option<&'t str> {
    rules
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.name(group)).map(|m| m.as_str()))
}

// ---------------------------------------------------------------------------
// Free-text extractors
// ---------------------------------------------------------------------------

/// Salary range mentioned for `band`, if the text states one.
///
/// Each range in the text belongs to at most one band, so a figure stated
/// for one band is never reported for another.
pub fn salary_band(text: &str, band: Band) -> Option<MoneyRange> {
    attributed_ranges(text)
        .into_iter()
        .filter(|(b, _)| *b == band)
        .find_map(|(_, range)| parse_salary_range(range))
}

/// Money ranges in `text` paired with the band that introduces them.
///
/// A range is claimed by the band keywords between it and the previous money
/// figure, in the same sentence and within [`MAX_KEYWORD_GAP`] bytes. Ranges
/// preceded by no keyword, or by keywords of more than one band
/// ("junior, mid-level and senior ... respectively"), are left unclaimed.
fn attributed_ranges(text: &str) -> Vec<(Band, &str)> {
    let keywords: Vec<(usize, usize, Band)> = BAND_KEYWORD_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let band = Band::ALL.into_iter().find(|b| caps.name(b.group()).is_some())?;
            Some((whole.start(), whole.end(), band))
        })
        .collect();

    let mut claims = Vec::new();
    let mut window_start = 0;
    for caps in MONEY_SPAN_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let from = window_start;
        window_start = whole.end();
        let Some(range) = caps.name("range") else {
            continue;
        };

        let mut bands = keywords
            .iter()
            .filter(|(start, end, _)| *start >= from && *end <= range.start())
            .filter(|(_, end, _)| {
                let gap = &text[*end..range.start()];
                gap.len() <= MAX_KEYWORD_GAP && !gap.contains(['.', '\n'])
            })
            .map(|(_, _, band)| *band);
        let Some(band) = bands.next() else { continue };
        if bands.all(|other| other == band) {
            claims.push((band, range.as_str()));
        }
    }
    claims
}

/// Growth expected over the next year, percent.
pub fn growth_next_year(text: &str) -> Option<f64> {
    first_capture(&NEXT_YEAR_RES, text, "pct").and_then(parse_percent)
}

/// Growth expected over five years, percent.
pub fn growth_five_year(text: &str) -> Option<f64> {
    first_capture(&FIVE_YEAR_RES, text, "pct").and_then(parse_percent)
}

pub fn outlook(text: &str) -> Option<Outlook> {
    static OUTLOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)outlook[^.\n]{0,40}?\b(?P<word>positive|strong|growing|stable|steady|declining|negative)\b",
        )
        .expect("valid regex")
    });
    OUTLOOK_RE
        .captures(text)
        .and_then(|c| c.name("word"))
        .and_then(|m| Outlook::parse(m.as_str()))
}

pub fn demand_level(text: &str) -> Option<Level> {
    static DEMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(?P<word>very high|high|strong|moderate|medium|low|weak)\s+(?:levels? of\s+)?demand\b",
        )
        .expect("valid regex")
    });
    DEMAND_RE
        .captures(text)
        .and_then(|c| c.name("word"))
        .and_then(|m| Level::parse(m.as_str()))
}

pub fn job_postings(text: &str) -> Option<u32> {
    static POSTINGS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)(?P<n>\d[\d,]*)\s+(?:job (?:postings|vacancies|openings|adverts)|vacancies|open roles)",
        )
        .expect("valid regex")
    });
    let caps = POSTINGS_RE.captures(text)?;
    let n = parse_number(caps.name("n")?.as_str())?;
    (n >= 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

pub fn automation_level(text: &str) -> Option<Level> {
    first_capture(&AUTOMATION_RES, text, "word").and_then(Level::parse)
}

/// Remote/hybrid/on-site wording, verbatim.
pub fn remote_mode(text: &str) -> Option<String> {
    static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(?P<mode>fully remote|remote|hybrid|office[- ]based|on[- ]site)\b[^.\n]{0,30}?\b(?:work(?:ing)?|roles?|options?|positions?|arrangements?)\b",
        )
        .expect("valid regex")
    });
    REMOTE_RE
        .captures(text)
        .and_then(|c| c.name("mode"))
        .map(|m| m.as_str().to_lowercase())
}

/// Qualification routes mentioned in the text, at most one per kind.
pub fn qualifications(text: &str) -> Vec<(PathwayKind, String)> {
    QUALIFICATION_RES
        .iter()
        .filter_map(|(kind, re)| {
            re.captures(text)
                .and_then(|c| c.name("phrase"))
                .map(|m| (*kind, capitalize(m.as_str().trim())))
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
