use crate::errors::{AgentError, AgentResult};
use crate::extract::{ExtractedParameters, ParameterSource};
use crate::feeds::market_data::{fetch_snapshot, MarketDataSource};
use crate::models::analytic::LognormalSurvival;
use crate::models::monte_carlo::{simulate, Horizon, SimulationConfig, SimulationInputs, SimulationResult};
use crate::models::volatility::annualized_volatility;
use crate::report;
use chrono::NaiveDate;

/// Everything one answered question produced. Owned by the request.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub params: ExtractedParameters,
    pub qualified_symbol: String,
    pub spot_price: f64,
    pub sigma: f64,
    pub horizon: Horizon,
    pub result: SimulationResult,
    /// Closed-form P(S_T >= K) in percent, for comparison.
    pub analytic_prob_reach: f64,
}

impl Evaluation {
    pub fn report(&self) -> String {
        report::render_text(&self.params, self.spot_price, self.sigma, &self.horizon, &self.result)
    }
}

/// One sequential run: extract -> horizon check -> market data -> volatility
/// -> simulation. Holds only borrowed collaborators and read-only config.
pub struct Pipeline<'a, E, M> {
    extractor: &'a E,
    market: &'a M,
    simulation: SimulationConfig,
}

impl<'a, E: ParameterSource, M: MarketDataSource> Pipeline<'a, E, M> {
    pub fn new(extractor: &'a E, market: &'a M, simulation: SimulationConfig) -> Self {
        Self {
            extractor,
            market,
            simulation,
        }
    }

    pub async fn run(&self, query: &str, today: NaiveDate) -> AgentResult<Evaluation> {
        let params = self.extractor.extract(query, today).await?;
        tracing::info!(
            extractor = self.extractor.name(),
            symbol = %params.symbol,
            strike = params.strike,
            target_date = %params.target_date,
            "parameters extracted"
        );

        // Checked before any network call or random draw
        let horizon = Horizon::between(today, params.target_date)?;

        let snapshot = fetch_snapshot(self.market, &params.symbol).await?;
        let sigma = annualized_volatility(&snapshot.history)?;

        let inputs = SimulationInputs::new(snapshot.spot_price, sigma, &horizon, &self.simulation);
        let strike = params.strike;
        let result = tokio::task::spawn_blocking(move || simulate(&inputs, strike))
            .await
            .map_err(|e| AgentError::Task(e.to_string()))??;

        let analytic_prob_reach = 100.0
            * LognormalSurvival::new().probability(
                snapshot.spot_price,
                strike,
                sigma,
                horizon.years,
                self.simulation.risk_free_rate,
            );

        tracing::info!(
            symbol = %snapshot.symbol,
            spot = snapshot.spot_price,
            sigma = sigma,
            days = horizon.days,
            paths = inputs.path_count,
            prob_reach = result.prob_reach_or_exceed(),
            analytic = analytic_prob_reach,
            "simulation complete"
        );

        Ok(Evaluation {
            params,
            qualified_symbol: snapshot.symbol,
            spot_price: snapshot.spot_price,
            sigma,
            horizon,
            result,
            analytic_prob_reach,
        })
    }

    /// Text-in, text-out: the report on success, one user-facing line on failure.
    pub async fn answer(&self, query: &str, today: NaiveDate) -> String {
        match self.run(query, today).await {
            Ok(eval) => eval.report(),
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                e.user_message()
            }
        }
    }
}
