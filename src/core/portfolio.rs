use super::currency::CurrencyTable;
use super::types::{
    AnnotatedHolding, EffectiveRates, Holding, PlanParams, PortfolioAggregate, PortfolioStatistics,
};

pub fn aggregate(holdings: &[Holding]) -> PortfolioAggregate {
    aggregate_with(holdings, &CurrencyTable::hkd_base())
}

/// Value-weighted statistics across `holdings`, plus each holding's share of
/// the total. Inputs are left untouched.
pub fn aggregate_with(holdings: &[Holding], table: &CurrencyTable) -> PortfolioAggregate {
    let base_values = holdings
        .iter()
        .map(|h| table.to_base(h.local_value(), &h.currency))
        .collect::<Vec<_>>();
    let total_value: f64 = base_values.iter().sum();

    if total_value == 0.0 {
        return PortfolioAggregate {
            statistics: PortfolioStatistics::default(),
            holdings: holdings
                .iter()
                .zip(&base_values)
                .map(|(holding, &base_value)| AnnotatedHolding {
                    holding: holding.clone(),
                    base_value,
                    allocation_pct: 0.0,
                })
                .collect(),
        };
    }

    let mut statistics = PortfolioStatistics {
        total_value,
        ..PortfolioStatistics::default()
    };
    let mut annotated = Vec::with_capacity(holdings.len());
    for (holding, &base_value) in holdings.iter().zip(&base_values) {
        let weight = base_value / total_value;
        statistics.weighted_return_pct += weight * holding.expected_return_pct;
        statistics.weighted_yield_pct += weight * holding.dividend_yield_pct;
        statistics.weighted_volatility_pct += weight * holding.volatility_pct;
        annotated.push(AnnotatedHolding {
            holding: holding.clone(),
            base_value,
            allocation_pct: round_one_decimal(weight * 100.0),
        });
    }

    PortfolioAggregate {
        statistics,
        holdings: annotated,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl PlanParams {
    pub fn rates(&self) -> EffectiveRates {
        self.rates_with(&CurrencyTable::hkd_base())
    }

    /// Manual override when present, otherwise the aggregated holdings.
    pub fn rates_with(&self, table: &CurrencyTable) -> EffectiveRates {
        if let Some(manual) = self.manual_rates {
            return EffectiveRates {
                appreciation_pct: manual.return_pct,
                yield_pct: manual.yield_pct,
                volatility_pct: manual.volatility_pct,
            };
        }
        let stats = aggregate_with(&self.holdings, table).statistics;
        EffectiveRates {
            appreciation_pct: stats.weighted_return_pct,
            yield_pct: stats.weighted_yield_pct,
            volatility_pct: stats.weighted_volatility_pct,
        }
    }
}
