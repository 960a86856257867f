use crate::extract::ExtractedParameters;
use crate::models::monte_carlo::{Horizon, SimulationResult};
use smallvec::SmallVec;

pub const DEFAULT_BINS: usize = 50;
pub const MAX_BINS: usize = 500;

/// Text summary of one answered question.
pub fn render_text(
    params: &ExtractedParameters,
    spot_price: f64,
    sigma: f64,
    horizon: &Horizon,
    result: &SimulationResult,
) -> String {
    format!(
        "Asset: {symbol}\n\
         Target price: {strike:.2}\n\
         Target date: {date}\n\
         Current price: {spot:.2}\n\
         Annualized volatility: {vol:.2}%\n\
         Time to target: {days} calendar days ({years:.2} trading years)\n\
         Probability of reaching or exceeding (CALL): {call:.2}%\n\
         Probability of not reaching (PUT): {put:.2}%\n",
        symbol = params.symbol,
        strike = params.strike,
        date = params.target_date.format("%d/%m/%Y"),
        spot = spot_price,
        vol = sigma * 100.0,
        days = horizon.days,
        years = horizon.years,
        call = result.prob_reach_or_exceed(),
        put = result.prob_not_reach(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Strike,
    Spot,
    Mean,
}

/// Vertical marker a renderer draws over the histogram.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ReferenceLine {
    pub kind: ReferenceKind,
    pub value: f64,
}

/// Equal-width binning of terminal prices. `edges` has `counts.len() + 1`
/// entries; the last bin is closed on the right.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub reference_lines: SmallVec<[ReferenceLine; 3]>,
}

impl Histogram {
    pub fn build(result: &SimulationResult, spot_price: f64, bins: usize) -> Self {
        let bins = bins.clamp(1, MAX_BINS);
        let prices = result.terminal_prices();

        let (lo, hi) = prices
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        // Degenerate ensemble (zero vol): give the single value a unit-wide bin
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, lo + 0.5) };
        let width = (hi - lo) / bins as f64;

        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0u64; bins];
        for &p in prices {
            let idx = (((p - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let mut reference_lines = SmallVec::new();
        reference_lines.push(ReferenceLine { kind: ReferenceKind::Strike, value: result.strike() });
        reference_lines.push(ReferenceLine { kind: ReferenceKind::Spot, value: spot_price });
        reference_lines.push(ReferenceLine { kind: ReferenceKind::Mean, value: result.mean_terminal_price() });

        Self {
            edges,
            counts,
            reference_lines,
        }
    }
}
