use super::retry::{with_retry, RetryPolicy};
use crate::errors::{AgentError, AgentResult};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;

/// Window for the "most recent close" lookup. A few sessions wide so weekends
/// and holidays still resolve to the last trading day.
const LATEST_RANGE: &str = "5d";

/// Window for volatility estimation.
const HISTORY_RANGE: &str = "2y";

/// Source of daily closes for a ticker. Implementations normalize the raw
/// ticker themselves (see `qualify`).
pub trait MarketDataSource {
    /// Exchange-qualified form of `symbol` as the upstream expects it.
    fn qualify(&self, symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Most recent daily close.
    fn latest_close(&self, symbol: &str) -> impl Future<Output = AgentResult<f64>> + Send;

    /// Chronological daily closes covering the volatility window.
    fn daily_closes(&self, symbol: &str) -> impl Future<Output = AgentResult<Vec<f64>>> + Send;
}

/// Spot price and history for one request. Never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub spot_price: f64,
    pub history: Vec<f64>,
}

/// Fetch spot and history, in that order. Fails with `DataUnavailable` on an
/// empty series or a non-positive spot.
pub async fn fetch_snapshot<M: MarketDataSource>(source: &M, symbol: &str) -> AgentResult<MarketSnapshot> {
    let qualified = source.qualify(symbol);

    let spot_price = source.latest_close(symbol).await?;
    if !(spot_price > 0.0 && spot_price.is_finite()) {
        return Err(AgentError::DataUnavailable(format!(
            "{qualified}: invalid current price {spot_price}"
        )));
    }

    let history = source.daily_closes(symbol).await?;
    if history.is_empty() {
        return Err(AgentError::DataUnavailable(format!(
            "{qualified}: no historical prices"
        )));
    }

    tracing::info!(
        symbol = %qualified,
        spot = spot_price,
        observations = history.len(),
        "market snapshot fetched"
    );

    Ok(MarketSnapshot {
        symbol: qualified,
        spot_price,
        history,
    })
}

/// Append the exchange suffix unless the symbol already carries a qualifier.
pub fn normalize_symbol(symbol: &str, exchange_suffix: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.contains('.') || exchange_suffix.is_empty() {
        symbol
    } else {
        format!("{symbol}{}", exchange_suffix.to_uppercase())
    }
}

/// Yahoo Finance chart API client. All methods return Result, never panic.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
    exchange_suffix: String,
    retry: RetryPolicy,
}

impl YahooFinanceClient {
    pub fn new(base_url: &str, exchange_suffix: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(concat!("strike_odds/", env!("CARGO_PKG_VERSION")))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            exchange_suffix: exchange_suffix.to_string(),
            retry,
        }
    }

    async fn chart_closes(&self, symbol: &str, range: &str) -> AgentResult<Vec<f64>> {
        let qualified = self.qualify(symbol);
        let qualified = qualified.as_str();
        with_retry(&self.retry, "market data fetch", || self.fetch_chart(qualified, range)).await
    }

    async fn fetch_chart(&self, qualified: &str, range: &str) -> AgentResult<Vec<f64>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, qualified);

        let resp = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", "1d")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AgentError::DataUnavailable(format!(
                "{qualified}: symbol not found or delisted"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamApi {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        parse_chart_closes(qualified, &body)
    }
}

impl MarketDataSource for YahooFinanceClient {
    fn qualify(&self, symbol: &str) -> String {
        normalize_symbol(symbol, &self.exchange_suffix)
    }

    async fn latest_close(&self, symbol: &str) -> AgentResult<f64> {
        let closes = self.chart_closes(symbol, LATEST_RANGE).await?;
        closes.last().copied().ok_or_else(|| {
            AgentError::DataUnavailable(format!("{}: no current price", self.qualify(symbol)))
        })
    }

    async fn daily_closes(&self, symbol: &str) -> AgentResult<Vec<f64>> {
        self.chart_closes(symbol, HISTORY_RANGE).await
    }
}

// Chart API response format (trimmed):
// {
//   "chart": {
//     "result": [
//       {
//         "meta": { "symbol": "PETR4.SA", "currency": "BRL", ... },
//         "timestamp": [1718020800, 1718107200],
//         "indicators": { "quote": [ { "close": [37.1, null] } ] }
//       }
//     ],
//     "error": null
//   }
// }
//
// Unknown symbols come back as
// { "chart": { "result": null, "error": { "code": "Not Found", "description": "..." } } }

#[derive(serde::Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(serde::Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(serde::Deserialize)]
struct Indicators {
    quote: Option<Vec<Quote>>,
}

#[derive(serde::Deserialize)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// Extract chronological closes, skipping null sessions.
fn parse_chart_closes(symbol: &str, body: &str) -> AgentResult<Vec<f64>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| AgentError::Parse(format!("chart response for {symbol}: {e}")))?;

    if let Some(err) = envelope.chart.error {
        let reason = err
            .description
            .or(err.code)
            .unwrap_or_else(|| "unknown error".into());
        return Err(AgentError::DataUnavailable(format!("{symbol}: {reason}")));
    }

    let closes: Vec<f64> = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .and_then(|r| r.indicators.quote)
        .and_then(|mut q| if q.is_empty() { None } else { Some(q.swap_remove(0)) })
        .and_then(|q| q.close)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|c| c.is_finite())
        .collect();

    if closes.is_empty() {
        return Err(AgentError::DataUnavailable(format!("{symbol}: no price data")));
    }

    Ok(closes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::spawn_stub;

    #[test]
    fn test_normalize_appends_suffix() {
        assert_eq!(normalize_symbol("petr4", ".SA"), "PETR4.SA");
        assert_eq!(normalize_symbol(" VALE3 ", ".SA"), "VALE3.SA");
    }

    #[test]
    fn test_normalize_keeps_qualified() {
        assert_eq!(normalize_symbol("AAPL.US", ".SA"), "AAPL.US");
        assert_eq!(normalize_symbol("itub4.sa", ".SA"), "ITUB4.SA");
        assert_eq!(normalize_symbol("AAPL", ""), "AAPL");
    }

    #[test]
    fn test_parse_skips_null_closes() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"PETR4.SA"},
            "timestamp":[1,2,3,4],
            "indicators":{"quote":[{"close":[37.1,null,37.9,38.2]}]}}],"error":null}}"#;
        let closes = parse_chart_closes("PETR4.SA", body).unwrap();
        assert_eq!(closes, vec![37.1, 37.9, 38.2]);
    }

    #[test]
    fn test_parse_unknown_symbol_is_data_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found",
            "description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart_closes("XXXX9.SA", body) {
            Err(AgentError::DataUnavailable(msg)) => {
                assert!(msg.contains("XXXX9.SA"));
                assert!(msg.contains("delisted"));
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_series_is_data_unavailable() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{"close":[]}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart_closes("PETR4.SA", body),
            Err(AgentError::DataUnavailable(_))
        ));
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart_closes("PETR4.SA", body),
            Err(AgentError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        assert!(matches!(
            parse_chart_closes("PETR4.SA", "<html>rate limited</html>"),
            Err(AgentError::Parse(_))
        ));
    }

    fn client_at(base_url: &str) -> YahooFinanceClient {
        YahooFinanceClient::new(base_url, ".SA", Duration::from_secs(2), RetryPolicy::new(1))
    }

    #[tokio::test]
    async fn test_http_not_found_is_data_unavailable() {
        let base = spawn_stub(StatusCode::NOT_FOUND, "").await;
        match client_at(&base).latest_close("xxxx9").await {
            Err(AgentError::DataUnavailable(msg)) => assert!(msg.contains("XXXX9.SA"), "{msg}"),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_server_error_is_upstream_error() {
        let base = spawn_stub(StatusCode::BAD_GATEWAY, "upstream down").await;
        let err = client_at(&base).daily_closes("PETR4").await.unwrap_err();
        assert!(
            matches!(err, AgentError::UpstreamApi { status: 502, ref body } if body == "upstream down"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_latest_close_is_last_session() {
        let base = spawn_stub(
            StatusCode::OK,
            r#"{"chart":{"result":[{"indicators":{"quote":[{"close":[37.1,37.9,38.2,null]}]}}],"error":null}}"#,
        )
        .await;
        let client = client_at(&base);
        assert_eq!(client.latest_close("PETR4").await.unwrap(), 38.2);
        assert_eq!(client.daily_closes("PETR4").await.unwrap(), vec![37.1, 37.9, 38.2]);
    }

    struct FixedSource {
        spot: f64,
        history: Vec<f64>,
    }

    impl MarketDataSource for FixedSource {
        async fn latest_close(&self, _symbol: &str) -> AgentResult<f64> {
            Ok(self.spot)
        }

        async fn daily_closes(&self, _symbol: &str) -> AgentResult<Vec<f64>> {
            Ok(self.history.clone())
        }
    }

    #[tokio::test]
    async fn test_snapshot_rejects_non_positive_spot() {
        let src = FixedSource { spot: 0.0, history: vec![1.0, 2.0, 3.0] };
        assert!(matches!(
            fetch_snapshot(&src, "petr4").await,
            Err(AgentError::DataUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_rejects_empty_history() {
        let src = FixedSource { spot: 10.0, history: vec![] };
        assert!(matches!(
            fetch_snapshot(&src, "petr4").await,
            Err(AgentError::DataUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_carries_qualified_symbol() {
        let src = FixedSource { spot: 10.0, history: vec![9.0, 10.0] };
        let snap = fetch_snapshot(&src, "petr4").await.unwrap();
        assert_eq!(snap.symbol, "PETR4");
        assert_eq!(snap.spot_price, 10.0);
    }
}
