use crate::errors::{AgentError, AgentResult};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Trading-year convention used for both horizon scaling and vol annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.1425;
pub const DEFAULT_PATH_COUNT: usize = 1_000_000;
pub const DEFAULT_SEED: u64 = 42;

/// Process-wide simulation constants. Read once at startup, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub risk_free_rate: f64,
    pub path_count: usize,
    pub seed: u64,
}

/// Distance to the target date.
///
/// `years` is calendar days divided by 252. This mixes calendar days with a
/// trading-day year: a known modeling approximation kept for compatibility
/// with previously published answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    pub days: i64,
    pub years: f64,
}

impl Horizon {
    /// Fails with `InvalidHorizon` unless `target` is strictly after `today`.
    pub fn between(today: NaiveDate, target: NaiveDate) -> AgentResult<Self> {
        let days = (target - today).num_days();
        if days < 1 {
            return Err(AgentError::InvalidHorizon { days });
        }
        Ok(Self {
            days,
            years: days as f64 / TRADING_DAYS_PER_YEAR,
        })
    }
}

/// Everything one simulation run needs. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInputs {
    pub spot_price: f64,
    pub sigma: f64,
    pub time_to_target: f64,
    pub risk_free_rate: f64,
    pub path_count: usize,
    /// Defaults to 42 via `SimulationConfig`; override for independent runs.
    pub seed: u64,
}

impl SimulationInputs {
    pub fn new(spot_price: f64, sigma: f64, horizon: &Horizon, config: &SimulationConfig) -> Self {
        Self {
            spot_price,
            sigma,
            time_to_target: horizon.years,
            risk_free_rate: config.risk_free_rate,
            path_count: config.path_count,
            seed: config.seed,
        }
    }

    fn validate(&self, strike: f64) -> AgentResult<()> {
        if !(self.spot_price > 0.0 && self.spot_price.is_finite()) {
            return Err(AgentError::InvalidInput(format!("spot price {}", self.spot_price)));
        }
        if !(self.sigma >= 0.0 && self.sigma.is_finite()) {
            return Err(AgentError::InvalidInput(format!("volatility {}", self.sigma)));
        }
        if !(self.time_to_target > 0.0 && self.time_to_target.is_finite()) {
            return Err(AgentError::InvalidInput(format!(
                "time to target {}",
                self.time_to_target
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(AgentError::InvalidInput(format!(
                "risk-free rate {}",
                self.risk_free_rate
            )));
        }
        if self.path_count == 0 {
            return Err(AgentError::InvalidInput("path count must be positive".into()));
        }
        if !(strike > 0.0 && strike.is_finite()) {
            return Err(AgentError::InvalidInput(format!("strike {strike}")));
        }
        Ok(())
    }
}

/// Terminal-price ensemble plus hit probabilities (percentages).
/// Immutable once produced.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    terminal_prices: Box<[f64]>,
    strike: f64,
    prob_reach_or_exceed: f64,
    prob_not_reach: f64,
}

impl SimulationResult {
    pub fn terminal_prices(&self) -> &[f64] {
        &self.terminal_prices
    }

    pub fn strike(&self) -> f64 {
        self.strike
    }

    /// P(S_T >= K) in percent ("call" side).
    pub fn prob_reach_or_exceed(&self) -> f64 {
        self.prob_reach_or_exceed
    }

    /// 100 - P(S_T >= K) ("put" side).
    pub fn prob_not_reach(&self) -> f64 {
        self.prob_not_reach
    }

    pub fn mean_terminal_price(&self) -> f64 {
        self.terminal_prices.iter().sum::<f64>() / self.terminal_prices.len() as f64
    }
}

/// Simulate terminal prices with the exact lognormal solution of GBM:
///
/// S_T = S_0 * exp((r - sigma^2/2) * T + sigma * sqrt(T) * Z),  Z ~ N(0, 1)
///
/// One draw per path, seeded from `inputs.seed`, so identical inputs give a
/// bit-identical ensemble. Inputs are validated before the RNG is touched.
pub fn simulate(inputs: &SimulationInputs, strike: f64) -> AgentResult<SimulationResult> {
    inputs.validate(strike)?;

    let drift = (inputs.risk_free_rate - 0.5 * inputs.sigma * inputs.sigma) * inputs.time_to_target;
    let diffusion = inputs.sigma * inputs.time_to_target.sqrt();

    let mut rng = StdRng::seed_from_u64(inputs.seed);
    let terminal_prices: Box<[f64]> = (0..inputs.path_count)
        .map(|_| {
            let z: f64 = StandardNormal.sample(&mut rng);
            inputs.spot_price * (drift + diffusion * z).exp()
        })
        .collect();

    let hits = terminal_prices.iter().filter(|&&s| s >= strike).count();
    let prob_reach_or_exceed = 100.0 * hits as f64 / inputs.path_count as f64;

    Ok(SimulationResult {
        terminal_prices,
        strike,
        prob_reach_or_exceed,
        prob_not_reach: 100.0 - prob_reach_or_exceed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analytic::LognormalSurvival;

    fn inputs(sigma: f64, paths: usize) -> SimulationInputs {
        SimulationInputs {
            spot_price: 100.0,
            sigma,
            time_to_target: 1.0,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            path_count: paths,
            seed: DEFAULT_SEED,
        }
    }

    #[test]
    fn test_probabilities_are_complementary() {
        for strike in [50.0, 90.0, 100.0, 113.7, 150.0, 400.0] {
            let res = simulate(&inputs(0.3, 10_000), strike).unwrap();
            assert_eq!(
                res.prob_reach_or_exceed() + res.prob_not_reach(),
                100.0,
                "strike={strike}"
            );
            assert!((0.0..=100.0).contains(&res.prob_reach_or_exceed()));
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = simulate(&inputs(0.3, 10_000), 105.0).unwrap();
        let b = simulate(&inputs(0.3, 10_000), 105.0).unwrap();
        assert_eq!(a.terminal_prices(), b.terminal_prices());
        assert_eq!(a.prob_reach_or_exceed(), b.prob_reach_or_exceed());
    }

    #[test]
    fn test_seed_override_changes_ensemble() {
        let a = simulate(&inputs(0.3, 1_000), 105.0).unwrap();
        let b = simulate(&SimulationInputs { seed: 7, ..inputs(0.3, 1_000) }, 105.0).unwrap();
        assert_ne!(a.terminal_prices(), b.terminal_prices());
    }

    #[test]
    fn test_ensemble_has_path_count_entries() {
        let res = simulate(&inputs(0.3, 4_321), 100.0).unwrap();
        assert_eq!(res.terminal_prices().len(), 4_321);
    }

    #[test]
    fn test_zero_vol_is_deterministic_forward() {
        let forward = 100.0 * DEFAULT_RISK_FREE_RATE.exp();
        let below = simulate(&inputs(0.0, 1_000), forward * 0.999).unwrap();
        assert_eq!(below.prob_reach_or_exceed(), 100.0);
        let above = simulate(&inputs(0.0, 1_000), forward * 1.001).unwrap();
        assert_eq!(above.prob_reach_or_exceed(), 0.0);
    }

    #[test]
    fn test_tiny_vol_approaches_boundary() {
        let forward = 100.0 * DEFAULT_RISK_FREE_RATE.exp();
        let res = simulate(&inputs(1e-6, 10_000), forward * 0.99).unwrap();
        assert_eq!(res.prob_reach_or_exceed(), 100.0);
        let res = simulate(&inputs(1e-6, 10_000), forward * 1.01).unwrap();
        assert_eq!(res.prob_reach_or_exceed(), 0.0);
    }

    #[test]
    fn test_converges_to_analytic_survival() {
        let res = simulate(&inputs(0.3, DEFAULT_PATH_COUNT), 100.0).unwrap();
        let analytic = 100.0 * LognormalSurvival::new().probability(100.0, 100.0, 0.3, 1.0, DEFAULT_RISK_FREE_RATE);
        assert!(
            (res.prob_reach_or_exceed() - analytic).abs() < 0.5,
            "mc={} analytic={analytic}",
            res.prob_reach_or_exceed()
        );
    }

    #[test]
    fn test_mean_tracks_forward() {
        let res = simulate(&inputs(0.2, 200_000), 100.0).unwrap();
        let forward = 100.0 * DEFAULT_RISK_FREE_RATE.exp();
        let rel = (res.mean_terminal_price() - forward).abs() / forward;
        assert!(rel < 0.01, "mean={} forward={forward}", res.mean_terminal_price());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut bad = inputs(0.3, 100);
        bad.spot_price = 0.0;
        assert!(matches!(simulate(&bad, 100.0), Err(AgentError::InvalidInput(_))));

        let mut bad = inputs(0.3, 100);
        bad.sigma = -0.1;
        assert!(matches!(simulate(&bad, 100.0), Err(AgentError::InvalidInput(_))));

        assert!(matches!(simulate(&inputs(0.3, 0), 100.0), Err(AgentError::InvalidInput(_))));
        assert!(matches!(simulate(&inputs(0.3, 100), -5.0), Err(AgentError::InvalidInput(_))));
    }

    #[test]
    fn test_horizon_same_day_is_invalid() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(matches!(
            Horizon::between(today, today),
            Err(AgentError::InvalidHorizon { days: 0 })
        ));
        let past = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(matches!(
            Horizon::between(today, past),
            Err(AgentError::InvalidHorizon { days: -9 })
        ));
    }

    #[test]
    fn test_horizon_uses_trading_year() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let h = Horizon::between(today, NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()).unwrap();
        assert_eq!(h.days, 1);
        assert_eq!(h.years, 1.0 / 252.0);

        let h = Horizon::between(today, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()).unwrap();
        assert_eq!(h.days, 365);
        assert!((h.years - 365.0 / 252.0).abs() < 1e-12);
    }
}
