use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::currency::CurrencyTable;
use super::types::{PlanParams, SimulationPercentiles};

pub const DEFAULT_TRIALS: usize = 500;

/// Annual return model shared by every trial, as decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialAssumptions {
    pub initial_balance: f64,
    pub expected_return: f64,
    pub volatility: f64,
    /// Flat yearly inflow; life events are not consulted.
    pub annual_contribution: f64,
}

impl TrialAssumptions {
    pub fn from_params(params: &PlanParams, table: &CurrencyTable) -> Self {
        let rates = params.rates_with(table);
        Self {
            initial_balance: params.initial_principal,
            expected_return: (rates.appreciation_pct + rates.yield_pct) / 100.0,
            volatility: rates.volatility_pct / 100.0,
            annual_contribution: params.monthly_contribution * 12.0 + params.annual_contribution,
        }
    }
}

pub fn simulate<R: Rng + ?Sized>(
    params: &PlanParams,
    trial_count: usize,
    rng: &mut R,
) -> Vec<SimulationPercentiles> {
    simulate_with(params, trial_count, &CurrencyTable::hkd_base(), rng)
}

pub fn simulate_seeded(
    params: &PlanParams,
    trial_count: usize,
    seed: u64,
) -> Vec<SimulationPercentiles> {
    let mut rng = StdRng::seed_from_u64(seed);
    simulate(params, trial_count, &mut rng)
}

/// Runs `trial_count` independent paths from the current age to the
/// retirement age and reports p10/p50/p90 of the balances at each year.
///
/// Every year is sorted on its own, so the bands are cross-sectional: the p50
/// series is generally not the path of any single trial.
pub fn simulate_with<R: Rng + ?Sized>(
    params: &PlanParams,
    trial_count: usize,
    table: &CurrencyTable,
    rng: &mut R,
) -> Vec<SimulationPercentiles> {
    if trial_count == 0 {
        warn!("monte carlo requested with zero trials");
        return Vec::new();
    }
    if params.retirement_age < params.current_age {
        warn!(
            current_age = params.current_age,
            retirement_age = params.retirement_age,
            "retirement age precedes current age"
        );
        return Vec::new();
    }

    let years = (params.retirement_age - params.current_age) as usize;
    let assumptions = TrialAssumptions::from_params(params, table);
    debug!(
        trial_count,
        years,
        expected_return = assumptions.expected_return,
        volatility = assumptions.volatility,
        "running monte carlo"
    );

    let mut by_year = vec![Vec::with_capacity(trial_count); years + 1];
    for _ in 0..trial_count {
        let realized = (0..years)
            .map(|_| assumptions.expected_return + assumptions.volatility * standard_normal(&mut *rng))
            .collect::<Vec<_>>();
        for (idx, balance) in run_trial(&assumptions, &realized).into_iter().enumerate() {
            by_year[idx].push(balance);
        }
    }

    by_year
        .into_iter()
        .enumerate()
        .map(|(year, mut balances)| {
            balances.sort_by(|a, b| a.total_cmp(b));
            SimulationPercentiles {
                year: year as u32,
                age: params.current_age + year as u32,
                p10: percentile_at(&balances, 0.10),
                p50: percentile_at(&balances, 0.50),
                p90: percentile_at(&balances, 0.90),
            }
        })
        .collect()
}

/// Balances for year 0 through `realized_returns.len()` under the given
/// yearly returns, floored at zero after each year.
pub fn run_trial(assumptions: &TrialAssumptions, realized_returns: &[f64]) -> Vec<f64> {
    let mut balance = assumptions.initial_balance;
    let mut path = Vec::with_capacity(realized_returns.len() + 1);
    path.push(balance);
    for &realized in realized_returns {
        balance = (balance * (1.0 + realized) + assumptions.annual_contribution).max(0.0);
        path.push(balance);
    }
    path
}

/// Box-Muller draw; zero uniforms are redrawn so `ln` stays finite.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u = nonzero_uniform(rng);
    let v = nonzero_uniform(rng);
    (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

fn nonzero_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let x: f64 = rng.r#gen();
        if x != 0.0 {
            return x;
        }
    }
}

/// Nearest-rank lookup at `floor(len * p)` on already sorted values.
fn percentile_at(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}
