use crate::errors::{AgentError, AgentResult};
use crate::models::monte_carlo::TRADING_DAYS_PER_YEAR;
use statrs::statistics::Statistics;

/// Day-over-day percentage returns of chronological closes.
/// The first observation has no predecessor, so it yields no return.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized historical volatility: sample standard deviation (n - 1) of
/// daily percentage returns, scaled by sqrt(252).
///
/// Needs at least two returns (three closes); with fewer the sample standard
/// deviation is undefined and the estimate fails with `DataUnavailable`.
pub fn annualized_volatility(closes: &[f64]) -> AgentResult<f64> {
    if let Some(bad) = closes.iter().find(|c| !(**c > 0.0 && c.is_finite())) {
        return Err(AgentError::DataUnavailable(format!(
            "history contains an invalid close: {bad}"
        )));
    }

    let returns = daily_returns(closes);
    if returns.len() < 2 {
        return Err(AgentError::DataUnavailable(format!(
            "need at least 3 daily closes to estimate volatility, got {}",
            closes.len()
        )));
    }

    let daily = returns.iter().std_dev();
    if !daily.is_finite() {
        return Err(AgentError::DataUnavailable(format!(
            "volatility estimate is not finite: {daily}"
        )));
    }

    Ok(daily * TRADING_DAYS_PER_YEAR.sqrt())
}
