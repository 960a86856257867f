use super::{ExtractedParameters, ParameterSource};
use crate::errors::{AgentError, AgentResult};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Offline, deterministic extractor.
///
/// Picks a single ticker (see `pick_symbol`), the first positive number that
/// is not part of a date, and either an explicit date (`YYYY-MM-DD`,
/// `DD/MM/YYYY`) or a known relative phrase. Anything missing or ambiguous is
/// `Unparseable`; nothing is guessed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, query: &str, today: NaiveDate) -> AgentResult<ExtractedParameters> {
        let tokens: Vec<&str> = query
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| "?!,;:\"'()".contains(c)).trim_end_matches('.'))
            .filter(|t| !t.is_empty())
            .collect();

        let explicit_date = tokens.iter().find_map(|t| parse_date(t));
        let target_date = explicit_date
            .or_else(|| relative_date(&query.to_lowercase(), today))
            .ok_or(AgentError::Unparseable)?;

        let symbol = pick_symbol(&tokens)?;

        let strike = tokens
            .iter()
            .filter(|t| parse_date(t).is_none())
            .find_map(|t| parse_number(t))
            .ok_or(AgentError::Unparseable)?;

        ExtractedParameters::new(symbol, strike, target_date)
    }
}

impl ParameterSource for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract(&self, query: &str, today: NaiveDate) -> AgentResult<ExtractedParameters> {
        self.parse(query, today)
    }
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(token, "%d/%m/%Y"))
        .ok()
}

/// English and Portuguese phrasings. "End of next year" is both an
/// end-of-year and a next-year phrase and resolves to Dec 31 of next year.
fn relative_date(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    const NEXT_WEEK: &[&str] = &["next week", "semana que vem", "próxima semana", "proxima semana"];
    const NEXT_MONTH: &[&str] = &["next month", "mês que vem", "mes que vem", "próximo mês", "proximo mes"];
    const END_OF_YEAR: &[&str] = &[
        "end of the year",
        "end of year",
        "end of next year",
        "end of the next year",
        "year end",
        "year-end",
        "fim do ano",
        "final do ano",
        "fim do próximo ano",
        "fim do proximo ano",
        "final do próximo ano",
        "final do proximo ano",
    ];
    const NEXT_YEAR: &[&str] = &["next year", "ano que vem", "próximo ano", "proximo ano"];

    let has = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));

    match (has(END_OF_YEAR), has(NEXT_YEAR)) {
        (true, true) => NaiveDate::from_ymd_opt(today.year() + 1, 12, 31),
        (true, false) => NaiveDate::from_ymd_opt(today.year(), 12, 31),
        _ if has(NEXT_WEEK) => today.checked_add_days(Days::new(7)),
        _ if has(NEXT_MONTH) => today.checked_add_months(Months::new(1)),
        (false, true) => today.checked_add_months(Months::new(12)),
        (false, false) => None,
    }
}

/// Exchange-shaped tickers (PETR4, VALE3, ITUB4.SA, AAPL.US) win over bare
/// letter tokens. More than one distinct candidate at the winning tier is
/// ambiguous: "US listed AAPL" could mean either.
fn pick_symbol<'a>(tokens: &[&'a str]) -> AgentResult<&'a str> {
    let mut strong: Vec<&str> = Vec::new();
    let mut bare: Vec<&str> = Vec::new();
    for &t in tokens.iter().filter(|t| looks_like_ticker(t)) {
        let tier = if is_exchange_shaped(t) { &mut strong } else { &mut bare };
        if !tier.contains(&t) {
            tier.push(t);
        }
    }

    let candidates = if strong.is_empty() { bare } else { strong };
    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(AgentError::Unparseable),
        many => {
            tracing::debug!(candidates = ?many, "ambiguous ticker");
            Err(AgentError::Unparseable)
        }
    }
}

/// Letters then digits (B3 style), or carries an explicit exchange qualifier.
fn is_exchange_shaped(token: &str) -> bool {
    if token.contains('.') {
        return true;
    }
    let digits_at = token.find(|c: char| c.is_ascii_digit());
    digits_at.is_some_and(|i| {
        i > 0 && token[i..].chars().all(|c| c.is_ascii_digit())
    })
}

/// PETR4, VALE3, AAPL, ITUB4.SA: starts with a letter, uppercase letters and
/// digits, optional dotted exchange qualifier.
fn looks_like_ticker(token: &str) -> bool {
    let (base, qualifier) = match token.split_once('.') {
        Some((b, q)) => (b, Some(q)),
        None => (token, None),
    };
    let base_ok = (2..=8).contains(&base.len())
        && base.starts_with(|c: char| c.is_ascii_uppercase())
        && base.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    let qualifier_ok = qualifier.map_or(true, |q| {
        (1..=3).contains(&q.len()) && q.chars().all(|c| c.is_ascii_alphabetic())
    });
    base_ok && qualifier_ok
}

/// Positive number with optional currency prefix; accepts "45", "45.5",
/// "45,50" and "1.234,56".
fn parse_number(token: &str) -> Option<f64> {
    let t = token
        .trim_start_matches("US$")
        .trim_start_matches("R$")
        .trim_start_matches('$');
    if t.is_empty() || !t.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (t.rfind(','), t.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => t.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => t.replace(',', ""),
        (Some(_), None) => t.replace(',', "."),
        _ => t.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| *v > 0.0 && v.is_finite())
}
