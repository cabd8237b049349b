mod amortization;
mod currency;
mod engine;
mod error;
mod export;
mod gap;
mod monte_carlo;
mod portfolio;
mod stress;
mod types;

pub use amortization::periodic_payment;
pub use currency::CurrencyTable;
pub use engine::{
    DEFAULT_LIFE_EXPECTANCY_AGE, early_retirement_offset, project, project_at_rates, project_with,
};
pub use error::{PlanError, Result};
pub use export::stress_outcomes_csv;
pub use gap::{
    BenchmarkTable, CONSERVATIVE_YIELD_PCT, CategoryAssumption, PlanGap, RiskProfile,
    analyze_gap, analyze_plan, analyze_plan_with, fire_number,
};
pub use monte_carlo::{
    DEFAULT_TRIALS, TrialAssumptions, run_trial, simulate, simulate_seeded, simulate_with,
    standard_normal,
};
pub use portfolio::{aggregate, aggregate_with};
pub use stress::{
    LONGEVITY_LIFE_EXPECTANCY_AGE, StressCatalog, StressScenario, classify, run_all,
    run_all_with, run_scenario,
};
pub use types::{
    AnnotatedHolding, AssetCategory, EffectiveRates, GapAnalysis, Holding, LifeEvent,
    LifeEventKind, MAX_AGE, ManualRates, MortgageState, PlanParams, PortfolioAggregate,
    PortfolioStatistics, SimulationPercentiles, StressStatus, StressTestOutcome, YearlyResult,
    YearlyValues,
};
