//! Converts free-text contract durations ("24 mois", "1.5 années",
//! "18 à 24 mois") into months. The first number wins, so ranges yield
//! their minimum.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static MONTHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+).*(mois|months|month)").expect("months pattern"));
static YEARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+).*(années|année|ans|an|years|year)").expect("years pattern"));
static WEEKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+).*(semaines|semaine|weeks|week)").expect("weeks pattern"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("number pattern"));
static INDEFINITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(indéterminé|indeterminé|indetermine|inderterminé|cdi|full time)")
        .expect("indefinite pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "months", rename_all = "snake_case")]
pub enum ContractDuration {
    Months(f64),
    Indefinite,
    Unknown,
}

impl ContractDuration {
    /// Months for aggregation: indefinite contracts count as 0, unparsable
    /// durations as `None`.
    pub fn as_months(&self) -> Option<f64> {
        match self {
            ContractDuration::Months(months) => Some(*months),
            ContractDuration::Indefinite => Some(0.0),
            ContractDuration::Unknown => None,
        }
    }
}

pub fn sanitize_duration(raw: &str) -> ContractDuration {
    let text = raw.to_lowercase();
    let first_number = |pattern: &Regex| {
        pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    if let Some(months) = first_number(&MONTHS) {
        ContractDuration::Months(months)
    } else if let Some(years) = first_number(&YEARS) {
        ContractDuration::Months(years * 12.0)
    } else if let Some(weeks) = first_number(&WEEKS) {
        ContractDuration::Months(weeks / 4.0)
    } else if let Some(months) = first_number(&NUMBER) {
        ContractDuration::Months(months)
    } else if INDEFINITE.is_match(&text) {
        ContractDuration::Indefinite
    } else {
        ContractDuration::Unknown
    }
}
