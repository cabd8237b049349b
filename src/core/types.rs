use serde::{Deserialize, Serialize};

use super::error::{PlanError, Result};

#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    #[default]
    Equity,
    Bond,
    Cash,
    Crypto,
    #[serde(alias = "realEstate", alias = "real_estate")]
    RealEstate,
    Commodity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub category: AssetCategory,
    pub currency: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub expected_return_pct: f64,
    pub dividend_yield_pct: f64,
    pub volatility_pct: f64,
}

impl Default for Holding {
    fn default() -> Self {
        Self {
            id: String::new(),
            category: AssetCategory::Equity,
            currency: "HKD".to_string(),
            quantity: 0.0,
            unit_price: 0.0,
            expected_return_pct: 0.0,
            dividend_yield_pct: 0.0,
            volatility_pct: 0.0,
        }
    }
}

impl Holding {
    pub fn local_value(&self) -> f64 {
        self.unit_price * self.quantity
    }
}

/// A holding paired with its converted value and share of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedHolding {
    #[serde(flatten)]
    pub holding: Holding,
    pub base_value: f64,
    /// Share of total base value in percent, rounded to one decimal.
    pub allocation_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStatistics {
    pub weighted_return_pct: f64,
    pub weighted_yield_pct: f64,
    pub weighted_volatility_pct: f64,
    pub total_value: f64,
}

impl PortfolioStatistics {
    /// Price appreciation plus dividend yield, in percent.
    pub fn total_return_pct(&self) -> f64 {
        self.weighted_return_pct + self.weighted_yield_pct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAggregate {
    pub statistics: PortfolioStatistics,
    pub holdings: Vec<AnnotatedHolding>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MortgageState {
    pub active: bool,
    pub remaining_principal: f64,
    pub annual_rate_pct: f64,
    pub remaining_term_months: u32,
    pub monthly_payment: f64,
    pub reinvest_after_payoff: bool,
}

impl MortgageState {
    pub fn liability(&self) -> f64 {
        if self.active {
            self.remaining_principal.max(0.0)
        } else {
            0.0
        }
    }

    pub fn is_paid_off(&self) -> bool {
        self.remaining_term_months == 0 || self.remaining_principal <= 0.0
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifeEventKind {
    #[serde(alias = "stopContributions", alias = "stop_contributions")]
    StopContributions,
    #[serde(alias = "oneTimeExpense", alias = "one_time_expense")]
    OneTimeExpense,
    #[serde(alias = "recurringExpense", alias = "recurring_expense")]
    RecurringExpense,
    #[serde(alias = "marketCrash", alias = "market_crash")]
    MarketCrash,
    #[serde(alias = "returnReduction", alias = "return_reduction")]
    ReturnReduction,
    #[serde(alias = "earlyRetirement", alias = "early_retirement")]
    EarlyRetirement,
}

fn default_duration_years() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeEvent {
    pub start_age: u32,
    #[serde(default = "default_duration_years")]
    pub duration_years: u32,
    pub kind: LifeEventKind,
    /// Percent for crashes and return reductions, currency for expenses,
    /// years for early retirement.
    #[serde(default)]
    pub magnitude: f64,
}

impl LifeEvent {
    pub fn new(kind: LifeEventKind, start_age: u32, duration_years: u32, magnitude: f64) -> Self {
        Self {
            start_age,
            duration_years,
            kind,
            magnitude,
        }
    }

    pub fn is_active(&self, age: u32) -> bool {
        let end = self.start_age.saturating_add(self.duration_years.max(1));
        self.start_age <= age && age < end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManualRates {
    pub return_pct: f64,
    pub yield_pct: f64,
    pub volatility_pct: f64,
}

/// Annual rates in percent that drive a projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveRates {
    pub appreciation_pct: f64,
    pub yield_pct: f64,
    pub volatility_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanParams {
    pub current_age: u32,
    pub retirement_age: u32,
    pub initial_principal: f64,
    pub monthly_contribution: f64,
    pub annual_contribution: f64,
    pub inflation_rate_pct: f64,
    /// When set, replaces the rates aggregated from `holdings`.
    pub manual_rates: Option<ManualRates>,
    pub holdings: Vec<Holding>,
    pub mortgage: MortgageState,
    pub early_retirement_offset_years: Option<f64>,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            current_age: 30,
            retirement_age: 65,
            initial_principal: 100_000.0,
            monthly_contribution: 1_000.0,
            annual_contribution: 0.0,
            inflation_rate_pct: 2.5,
            manual_rates: None,
            holdings: Vec::new(),
            mortgage: MortgageState::default(),
            early_retirement_offset_years: None,
        }
    }
}

/// Upper bound on any age accepted from a plan document.
pub const MAX_AGE: u32 = 150;

impl PlanParams {
    /// Structural checks for plans arriving from outside the engine. The
    /// projection itself tolerates all of these silently.
    pub fn validate(&self) -> Result<()> {
        if self.current_age > MAX_AGE || self.retirement_age > MAX_AGE {
            return Err(PlanError::InvalidInput(format!(
                "currentAge and retirementAge must be <= {MAX_AGE}"
            )));
        }
        if self.retirement_age < self.current_age {
            return Err(PlanError::InvalidInput(
                "retirementAge must be >= currentAge".to_string(),
            ));
        }
        let amounts = [
            ("initialPrincipal", self.initial_principal),
            ("monthlyContribution", self.monthly_contribution),
            ("annualContribution", self.annual_contribution),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanError::InvalidInput(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        if !self.inflation_rate_pct.is_finite() || self.inflation_rate_pct <= -100.0 {
            return Err(PlanError::InvalidInput(
                "inflationRatePct must be > -100".to_string(),
            ));
        }
        if self
            .early_retirement_offset_years
            .is_some_and(|offset| !offset.is_finite() || offset < 0.0)
        {
            return Err(PlanError::InvalidInput(
                "earlyRetirementOffsetYears must be a non-negative number".to_string(),
            ));
        }
        for holding in &self.holdings {
            let fields = [("quantity", holding.quantity), ("unitPrice", holding.unit_price)];
            for (name, value) in fields {
                if !value.is_finite() || value < 0.0 {
                    return Err(PlanError::InvalidInput(format!(
                        "holding '{}': {name} must be a non-negative number",
                        holding.id
                    )));
                }
            }
        }
        if self.mortgage.active && self.mortgage.remaining_principal < 0.0 {
            return Err(PlanError::InvalidInput(
                "mortgage.remainingPrincipal must be >= 0".to_string(),
            ));
        }
        if !self.mortgage.monthly_payment.is_finite() || self.mortgage.monthly_payment < 0.0 {
            return Err(PlanError::InvalidInput(
                "mortgage.monthlyPayment must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// A projection horizon must end after the current age and stay within
    /// `MAX_AGE`.
    pub fn validate_life_expectancy(&self, life_expectancy_age: u32) -> Result<()> {
        if life_expectancy_age <= self.current_age || life_expectancy_age > MAX_AGE {
            return Err(PlanError::InvalidInput(format!(
                "lifeExpectancyAge must be > currentAge and <= {MAX_AGE}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyValues {
    pub principal: f64,
    pub appreciation: f64,
    pub dividends: f64,
    pub total_balance: f64,
    pub total_liabilities: f64,
    pub net_worth: f64,
    pub passive_income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyResult {
    pub year: u32,
    pub age: u32,
    pub nominal: YearlyValues,
    pub real: YearlyValues,
}

/// Cross-sectional balance percentiles for one year. Each year is ranked on
/// its own, so a band is not one realizable trial path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationPercentiles {
    pub year: u32,
    pub age: u32,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StressStatus {
    Safe,
    Warning,
    Danger,
}

impl StressStatus {
    pub fn label(self) -> &'static str {
        match self {
            StressStatus::Safe => "Safe",
            StressStatus::Warning => "Warning",
            StressStatus::Danger => "Danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTestOutcome {
    pub scenario_id: String,
    pub title: String,
    pub description: String,
    pub final_balance: f64,
    pub baseline_final_balance: f64,
    pub difference: f64,
    pub bankrupt: bool,
    pub bankrupt_age: Option<u32>,
    pub status: StressStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub actual_future_value: f64,
    pub target_future_value: f64,
    pub shortfall: f64,
    pub suggested_makeup_amount: f64,
    pub assumed_conservative_yield_pct: f64,
}
