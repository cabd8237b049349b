use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::currency::CurrencyTable;
use super::portfolio::aggregate_with;
use super::types::{AssetCategory, GapAnalysis, PlanParams, PortfolioStatistics};

pub const CONSERVATIVE_YIELD_PCT: f64 = 4.5;

/// Compares where the current and target portfolios end up after
/// `years_to_retirement` and sizes a lump sum that closes the difference if
/// invested today at the conservative yield.
pub fn analyze_gap(
    actual: &PortfolioStatistics,
    target: &PortfolioStatistics,
    years_to_retirement: u32,
) -> GapAnalysis {
    let actual_future_value = future_value(actual, years_to_retirement);
    let target_future_value = future_value(target, years_to_retirement);
    let shortfall = target_future_value - actual_future_value;
    let suggested_makeup_amount = if shortfall > 0.0 {
        shortfall / (1.0 + CONSERVATIVE_YIELD_PCT / 100.0).powi(years_to_retirement as i32)
    } else {
        0.0
    };

    GapAnalysis {
        actual_future_value,
        target_future_value,
        shortfall,
        suggested_makeup_amount,
        assumed_conservative_yield_pct: CONSERVATIVE_YIELD_PCT,
    }
}

/// A plan's gap against one benchmark profile, with the inputs that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanGap {
    pub profile: RiskProfile,
    pub years_to_retirement: u32,
    pub actual: PortfolioStatistics,
    pub target: PortfolioStatistics,
    pub analysis: GapAnalysis,
}

pub fn analyze_plan(params: &PlanParams, profile: RiskProfile) -> PlanGap {
    analyze_plan_with(
        params,
        profile,
        &BenchmarkTable::standard(),
        &CurrencyTable::hkd_base(),
    )
}

/// The plan's holdings are measured against the profile's target mix of the
/// same total value. Without priced holdings the plan's principal and
/// effective rates stand in for the actual portfolio.
pub fn analyze_plan_with(
    params: &PlanParams,
    profile: RiskProfile,
    benchmarks: &BenchmarkTable,
    table: &CurrencyTable,
) -> PlanGap {
    let aggregated = aggregate_with(&params.holdings, table).statistics;
    let actual = if aggregated.total_value > 0.0 {
        aggregated
    } else {
        let rates = params.rates_with(table);
        PortfolioStatistics {
            weighted_return_pct: rates.appreciation_pct,
            weighted_yield_pct: rates.yield_pct,
            weighted_volatility_pct: rates.volatility_pct,
            total_value: params.initial_principal,
        }
    };
    let target = benchmarks.target_statistics(profile, actual.total_value);
    let years_to_retirement = params.retirement_age.saturating_sub(params.current_age);

    PlanGap {
        profile,
        years_to_retirement,
        actual,
        target,
        analysis: analyze_gap(&actual, &target, years_to_retirement),
    }
}

fn future_value(stats: &PortfolioStatistics, years: u32) -> f64 {
    stats.total_value * (1.0 + stats.total_return_pct() / 100.0).powi(years as i32)
}

/// Principal whose yield alone covers `target_annual_income`.
pub fn fire_number(target_annual_income: f64, yield_pct: f64) -> Option<f64> {
    if yield_pct <= 0.0 {
        return None;
    }
    Some(target_annual_income / (yield_pct / 100.0))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssumption {
    pub return_pct: f64,
    pub yield_pct: f64,
    pub volatility_pct: f64,
}

/// Target allocations per risk profile and the long-run assumptions for each
/// asset category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkTable {
    pub assumptions: BTreeMap<AssetCategory, CategoryAssumption>,
    pub allocations: BTreeMap<RiskProfile, Vec<(AssetCategory, f64)>>,
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl BenchmarkTable {
    pub fn standard() -> Self {
        use AssetCategory::*;

        let assumption = |return_pct, yield_pct, volatility_pct| CategoryAssumption {
            return_pct,
            yield_pct,
            volatility_pct,
        };
        let mut assumptions = BTreeMap::new();
        assumptions.insert(Equity, assumption(6.0, 2.5, 18.0));
        assumptions.insert(Bond, assumption(2.5, 3.5, 6.0));
        assumptions.insert(Cash, assumption(0.0, 2.0, 0.5));
        assumptions.insert(Crypto, assumption(15.0, 0.0, 70.0));
        assumptions.insert(RealEstate, assumption(3.0, 4.0, 12.0));
        assumptions.insert(Commodity, assumption(3.0, 0.0, 20.0));

        let mut allocations = BTreeMap::new();
        allocations.insert(
            RiskProfile::Conservative,
            vec![(Equity, 0.25), (Bond, 0.50), (Cash, 0.20), (RealEstate, 0.05)],
        );
        allocations.insert(
            RiskProfile::Balanced,
            vec![
                (Equity, 0.55),
                (Bond, 0.30),
                (Cash, 0.05),
                (RealEstate, 0.05),
                (Commodity, 0.05),
            ],
        );
        allocations.insert(
            RiskProfile::Aggressive,
            vec![(Equity, 0.80), (Bond, 0.10), (Crypto, 0.05), (Commodity, 0.05)],
        );

        Self {
            assumptions,
            allocations,
        }
    }

    /// Statistics of a portfolio worth `total_value` held at the profile's
    /// target weights. Categories without assumptions contribute nothing.
    pub fn target_statistics(&self, profile: RiskProfile, total_value: f64) -> PortfolioStatistics {
        let mut stats = PortfolioStatistics {
            total_value,
            ..PortfolioStatistics::default()
        };
        let Some(weights) = self.allocations.get(&profile) else {
            return stats;
        };
        for &(category, weight) in weights {
            if let Some(a) = self.assumptions.get(&category) {
                stats.weighted_return_pct += weight * a.return_pct;
                stats.weighted_yield_pct += weight * a.yield_pct;
                stats.weighted_volatility_pct += weight * a.volatility_pct;
            }
        }
        stats
    }
}
