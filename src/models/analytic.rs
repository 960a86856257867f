use statrs::distribution::{ContinuousCDF, Normal};

/// Closed-form lognormal survival probability under GBM with drift r.
///
/// P(S_T >= K) = Phi(d2)
///
/// where d2 = (ln(S/K) + (r - sigma^2/2)*T) / (sigma * sqrt(T))
///
/// Used as a cross-check next to the Monte Carlo estimate.
pub struct LognormalSurvival {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl LognormalSurvival {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    /// Returns a probability in [0, 1]. Never panics.
    pub fn probability(&self, spot: f64, strike: f64, sigma: f64, ttl_years: f64, rate: f64) -> f64 {
        if spot <= 0.0 || strike <= 0.0 {
            return 0.0;
        }

        let sigma_sqrt_t = sigma * ttl_years.max(0.0).sqrt();

        // Degenerate variance: the terminal price is the forward
        if sigma_sqrt_t < 1e-12 {
            let forward = spot * (rate * ttl_years.max(0.0)).exp();
            return if forward >= strike { 1.0 } else { 0.0 };
        }

        let d2 = ((spot / strike).ln() + (rate - 0.5 * sigma * sigma) * ttl_years) / sigma_sqrt_t;
        self.normal.cdf(d2)
    }
}

impl Default for LognormalSurvival {
    fn default() -> Self {
        Self::new()
    }
}
