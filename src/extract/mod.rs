pub mod llm;
pub mod rules;

use crate::errors::{AgentError, AgentResult};
use chrono::NaiveDate;
use std::future::Future;

/// Sentinel the language service answers with when a field is missing.
pub const MISSING_SENTINEL: &str = "missing";

/// Structured form of a question: which asset, what price, by when.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedParameters {
    pub symbol: String,
    pub strike: f64,
    pub target_date: NaiveDate,
}

impl ExtractedParameters {
    /// Checked constructor. Blank symbols and non-positive strikes are not
    /// parameters at all, so they come back as `Unparseable`.
    pub fn new(symbol: &str, strike: f64, target_date: NaiveDate) -> AgentResult<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || !symbol.chars().all(is_ticker_char) {
            return Err(AgentError::Unparseable);
        }
        if !(strike > 0.0 && strike.is_finite()) {
            return Err(AgentError::Unparseable);
        }
        Ok(Self {
            symbol,
            strike,
            target_date,
        })
    }
}

fn is_ticker_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')
}

/// Text -> parameters capability. `today` anchors relative expressions such
/// as "next month".
pub trait ParameterSource {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        query: &str,
        today: NaiveDate,
    ) -> impl Future<Output = AgentResult<ExtractedParameters>> + Send;
}

/// The extractor chosen at startup.
pub enum Extractor {
    Llm(llm::LlmExtractor),
    Rules(rules::RuleBasedExtractor),
}

impl ParameterSource for Extractor {
    fn name(&self) -> &'static str {
        match self {
            Extractor::Llm(e) => e.name(),
            Extractor::Rules(e) => e.name(),
        }
    }

    async fn extract(&self, query: &str, today: NaiveDate) -> AgentResult<ExtractedParameters> {
        match self {
            Extractor::Llm(e) => e.extract(query, today).await,
            Extractor::Rules(e) => e.extract(query, today).await,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameters {
    symbol: String,
    strike: RawStrike,
    date: String,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawStrike {
    Number(f64),
    Text(String),
}

/// Strictly parse the language service's answer.
///
/// - the sentinel (any case, optionally quoted) -> `Unparseable`
/// - anything other than `{symbol, strike, date}` -> `MalformedResponse`
///
/// A Markdown code fence around the object is tolerated.
pub fn parse_structured_response(content: &str) -> AgentResult<ExtractedParameters> {
    let content = strip_code_fence(content.trim());

    if content.trim_matches('"').eq_ignore_ascii_case(MISSING_SENTINEL) {
        return Err(AgentError::Unparseable);
    }

    // Derived structs also accept a JSON array, so the object check is explicit.
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| AgentError::MalformedResponse(format!("{e}: {content}")))?;
    if !value.is_object() {
        return Err(AgentError::MalformedResponse(format!("expected a JSON object: {content}")));
    }
    let raw: RawParameters = serde_json::from_value(value)
        .map_err(|e| AgentError::MalformedResponse(format!("{e}: {content}")))?;

    let strike = match raw.strike {
        RawStrike::Number(n) => n,
        RawStrike::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AgentError::MalformedResponse(format!("strike is not a number: {s}")))?,
    };

    let target_date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d")
        .map_err(|e| AgentError::MalformedResponse(format!("date '{}': {e}", raw.date)))?;

    ExtractedParameters::new(&raw.symbol, strike, target_date)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
