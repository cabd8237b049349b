use tracing::{debug, warn};

use super::currency::CurrencyTable;
use super::error::{PlanError, Result};
use super::types::{
    EffectiveRates, LifeEvent, LifeEventKind, MortgageState, PlanParams, YearlyResult,
    YearlyValues,
};

pub const DEFAULT_LIFE_EXPECTANCY_AGE: u32 = 85;

/// Unrounded running state carried from year to year. Only the emitted
/// `YearlyResult` rows are rounded.
#[derive(Debug, Clone)]
struct ProjectionState {
    balance: f64,
    contributed: f64,
    appreciation: f64,
    dividends: f64,
    mortgage: MortgageState,
}

#[derive(Debug, Clone, Copy)]
struct YearAdjustments {
    crash_multiplier: f64,
    rate_multiplier: f64,
    expenses: f64,
    contributions_stopped: bool,
}

impl Default for YearAdjustments {
    fn default() -> Self {
        Self {
            crash_multiplier: 1.0,
            rate_multiplier: 1.0,
            expenses: 0.0,
            contributions_stopped: false,
        }
    }
}

pub fn project(
    params: &PlanParams,
    events: &[LifeEvent],
    life_expectancy_age: u32,
) -> Result<Vec<YearlyResult>> {
    project_with(params, events, life_expectancy_age, &CurrencyTable::hkd_base())
}

pub fn project_with(
    params: &PlanParams,
    events: &[LifeEvent],
    life_expectancy_age: u32,
    table: &CurrencyTable,
) -> Result<Vec<YearlyResult>> {
    project_at_rates(params, events, life_expectancy_age, params.rates_with(table))
}

/// One row per age from `current_age` to `life_expectancy_age` inclusive.
/// Negative balances are carried forward and keep compounding.
pub fn project_at_rates(
    params: &PlanParams,
    events: &[LifeEvent],
    life_expectancy_age: u32,
    rates: EffectiveRates,
) -> Result<Vec<YearlyResult>> {
    let offset = early_retirement_offset(params, events)?;
    if life_expectancy_age <= params.current_age {
        warn!(
            current_age = params.current_age,
            life_expectancy_age, "no projection horizon"
        );
        return Ok(Vec::new());
    }

    let years = life_expectancy_age - params.current_age;
    let effective_retirement_age = params.retirement_age as f64 - offset;
    debug!(
        years,
        effective_retirement_age,
        events = events.len(),
        "running projection"
    );

    let mut state = ProjectionState {
        balance: params.initial_principal,
        contributed: params.initial_principal,
        appreciation: 0.0,
        dividends: 0.0,
        mortgage: params.mortgage,
    };

    let mut results = Vec::with_capacity(years as usize + 1);
    results.push(snapshot(0, params.current_age, &state, rates.yield_pct, 1.0));

    for year in 1..=years {
        let age = params.current_age + year;
        let is_retired = age as f64 >= effective_retirement_age;
        let adjustments = year_adjustments(events, age);

        state.balance *= adjustments.crash_multiplier;
        state.balance -= adjustments.expenses;

        let appreciation_pct = rates.appreciation_pct * adjustments.rate_multiplier;
        let yield_pct = rates.yield_pct * adjustments.rate_multiplier;
        let contributing = !is_retired && !adjustments.contributions_stopped;
        let monthly_contribution = if contributing {
            params.monthly_contribution
        } else {
            0.0
        };

        run_months(&mut state, monthly_contribution, appreciation_pct, yield_pct);

        if contributing {
            state.balance += params.annual_contribution;
            state.contributed += params.annual_contribution;
        }

        let deflator = (1.0 + params.inflation_rate_pct / 100.0).powi(-(year as i32));
        results.push(snapshot(year, age, &state, yield_pct, deflator));
    }

    Ok(results)
}

/// Years by which retirement is brought forward. The explicit field and
/// `EarlyRetirement` events together may supply at most one value.
pub fn early_retirement_offset(params: &PlanParams, events: &[LifeEvent]) -> Result<f64> {
    let from_events = events
        .iter()
        .filter(|e| e.kind == LifeEventKind::EarlyRetirement)
        .collect::<Vec<_>>();
    let count = from_events.len() + usize::from(params.early_retirement_offset_years.is_some());
    if count > 1 {
        return Err(PlanError::ConflictingEarlyRetirement { count });
    }

    Ok(params
        .early_retirement_offset_years
        .or_else(|| from_events.first().map(|e| e.magnitude))
        .unwrap_or(0.0))
}

fn year_adjustments(events: &[LifeEvent], age: u32) -> YearAdjustments {
    let mut adjustments = YearAdjustments::default();
    for event in events.iter().filter(|e| e.is_active(age)) {
        match event.kind {
            LifeEventKind::MarketCrash => {
                adjustments.crash_multiplier *= 1.0 - event.magnitude / 100.0;
            }
            LifeEventKind::ReturnReduction => {
                adjustments.rate_multiplier *= 1.0 - event.magnitude / 100.0;
            }
            LifeEventKind::OneTimeExpense | LifeEventKind::RecurringExpense => {
                adjustments.expenses += event.magnitude;
            }
            LifeEventKind::StopContributions => adjustments.contributions_stopped = true,
            LifeEventKind::EarlyRetirement => {}
        }
    }
    adjustments
}

fn run_months(
    state: &mut ProjectionState,
    monthly_contribution: f64,
    appreciation_pct: f64,
    yield_pct: f64,
) {
    let monthly_growth = appreciation_pct / 100.0 / 12.0;
    let monthly_yield = yield_pct / 100.0 / 12.0;

    for _ in 0..12 {
        let redirected = service_mortgage(&mut state.mortgage);
        let deposit = monthly_contribution + redirected;
        state.balance += deposit;
        state.contributed += deposit;

        let appreciation = state.balance * monthly_growth;
        let dividend = state.balance * monthly_yield;
        state.balance += appreciation + dividend;
        state.appreciation += appreciation;
        state.dividends += dividend;
    }
}

/// Pays one month of the loan. Returns the amount freed up for investing once
/// the loan is gone and reinvesting is enabled.
fn service_mortgage(mortgage: &mut MortgageState) -> f64 {
    if !mortgage.active {
        return 0.0;
    }
    if mortgage.is_paid_off() {
        return if mortgage.reinvest_after_payoff {
            mortgage.monthly_payment
        } else {
            0.0
        };
    }

    let interest = mortgage.remaining_principal * mortgage.annual_rate_pct / 100.0 / 12.0;
    let principal_paid = mortgage.monthly_payment - interest;
    mortgage.remaining_principal = (mortgage.remaining_principal - principal_paid).max(0.0);
    mortgage.remaining_term_months -= 1;
    0.0
}

fn snapshot(
    year: u32,
    age: u32,
    state: &ProjectionState,
    yield_pct: f64,
    deflator: f64,
) -> YearlyResult {
    let liabilities = state.mortgage.liability();
    let nominal = YearlyValues {
        principal: state.contributed,
        appreciation: state.appreciation,
        dividends: state.dividends,
        total_balance: state.balance,
        total_liabilities: liabilities,
        net_worth: state.balance - liabilities,
        passive_income: state.balance * yield_pct / 100.0,
    };

    YearlyResult {
        year,
        age,
        nominal: rounded(nominal),
        real: rounded(scaled(nominal, deflator)),
    }
}

fn scaled(values: YearlyValues, factor: f64) -> YearlyValues {
    YearlyValues {
        principal: values.principal * factor,
        appreciation: values.appreciation * factor,
        dividends: values.dividends * factor,
        total_balance: values.total_balance * factor,
        total_liabilities: values.total_liabilities * factor,
        net_worth: values.net_worth * factor,
        passive_income: values.passive_income * factor,
    }
}

fn rounded(values: YearlyValues) -> YearlyValues {
    let total_balance = values.total_balance.round();
    let total_liabilities = values.total_liabilities.round();
    YearlyValues {
        principal: values.principal.round(),
        appreciation: values.appreciation.round(),
        dividends: values.dividends.round(),
        total_balance,
        total_liabilities,
        net_worth: total_balance - total_liabilities,
        passive_income: values.passive_income.round(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AssetCategory, Holding, ManualRates};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_params() -> PlanParams {
        PlanParams {
            current_age: 30,
            retirement_age: 65,
            initial_principal: 100_000.0,
            monthly_contribution: 0.0,
            annual_contribution: 0.0,
            inflation_rate_pct: 0.0,
            manual_rates: Some(ManualRates::default()),
            holdings: Vec::new(),
            mortgage: MortgageState::default(),
            early_retirement_offset_years: None,
        }
    }

    fn with_rates(mut params: PlanParams, return_pct: f64, yield_pct: f64) -> PlanParams {
        params.manual_rates = Some(ManualRates {
            return_pct,
            yield_pct,
            volatility_pct: 0.0,
        });
        params
    }

    fn balances(rows: &[YearlyResult]) -> Vec<f64> {
        rows.iter().map(|r| r.nominal.total_balance).collect()
    }

    #[test]
    fn non_positive_horizon_yields_empty_sequence() {
        let params = flat_params();
        assert!(project(&params, &[], 30).expect("valid").is_empty());
        assert!(project(&params, &[], 20).expect("valid").is_empty());
    }

    #[test]
    fn one_flat_year_preserves_principal() {
        let rows = project(&flat_params(), &[], 31).expect("valid");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].age, 31);
        assert_eq!(rows[1].nominal.total_balance, 100_000.0);
        assert_eq!(
            rows[1].nominal.net_worth,
            rows[1].nominal.total_balance - rows[1].nominal.total_liabilities
        );
    }

    #[test]
    fn initial_row_is_undeflated_starting_state() {
        let mut params = with_rates(flat_params(), 6.0, 3.0);
        params.inflation_rate_pct = 5.0;
        params.mortgage = MortgageState::amortizing(200_000.0, 0.0, 200, false);
        let rows = project(&params, &[], 40).expect("valid");

        let first = rows[0];
        assert_eq!(first.year, 0);
        assert_eq!(first.age, 30);
        assert_eq!(first.nominal, first.real);
        assert_eq!(first.nominal.total_balance, 100_000.0);
        assert_eq!(first.nominal.appreciation, 0.0);
        assert_eq!(first.nominal.dividends, 0.0);
        assert_eq!(first.nominal.total_liabilities, 200_000.0);
        assert_eq!(first.nominal.net_worth, -100_000.0);
        assert_eq!(first.nominal.passive_income, 3_000.0);
    }

    #[test]
    fn monthly_compounding_matches_hand_calculation() {
        // 100,000 at 6% appreciation + 2% yield, compounded monthly for a year.
        let params = with_rates(flat_params(), 6.0, 2.0);
        let rows = project(&params, &[], 31).expect("valid");
        let expected = 100_000.0 * (1.0 + 0.08 / 12.0_f64).powi(12);
        assert_approx_tol(rows[1].nominal.total_balance, expected, 0.5);

        let growth = expected - 100_000.0;
        assert_approx_tol(rows[1].nominal.appreciation, growth * 0.75, 1.0);
        assert_approx_tol(rows[1].nominal.dividends, growth * 0.25, 1.0);
        assert_approx_tol(rows[1].nominal.passive_income, expected * 0.02, 1.0);
    }

    #[test]
    fn contributions_accumulate_monthly_and_at_year_end() {
        let mut params = flat_params();
        params.monthly_contribution = 1_000.0;
        params.annual_contribution = 5_000.0;
        let rows = project(&params, &[], 32).expect("valid");
        assert_eq!(balances(&rows), vec![100_000.0, 117_000.0, 134_000.0]);
        assert_eq!(rows[2].nominal.principal, 134_000.0);
    }

    #[test]
    fn contributions_stop_once_retired() {
        let mut params = flat_params();
        params.monthly_contribution = 1_000.0;
        params.annual_contribution = 1_000.0;
        params.retirement_age = 32;
        let rows = project(&params, &[], 34).expect("valid");
        // Age 31 contributes, ages 32 onward are retired.
        assert_eq!(
            balances(&rows),
            vec![100_000.0, 113_000.0, 113_000.0, 113_000.0, 113_000.0]
        );
    }

    #[test]
    fn end_to_end_thirty_five_year_regression() {
        let params = PlanParams {
            current_age: 30,
            retirement_age: 65,
            initial_principal: 100_000.0,
            monthly_contribution: 1_000.0,
            annual_contribution: 0.0,
            inflation_rate_pct: 0.0,
            manual_rates: None,
            holdings: vec![Holding {
                id: "2800.HK".to_string(),
                category: AssetCategory::Equity,
                currency: "HKD".to_string(),
                quantity: 4_000.0,
                unit_price: 25.0,
                expected_return_pct: 6.0,
                dividend_yield_pct: 0.0,
                volatility_pct: 15.0,
            }],
            mortgage: MortgageState::default(),
            early_retirement_offset_years: None,
        };
        let rows = project(&params, &[], 65).expect("valid");
        assert_eq!(rows.len(), 36);
        assert_eq!(rows[1].nominal.total_balance, 118_565.0);
        assert_eq!(rows[34].nominal.total_balance, 2_102_137.0);
        let last = rows.last().expect("rows");
        assert_eq!(last.age, 65);
        assert_eq!(last.nominal.total_balance, 2_231_792.0);
        assert_eq!(last.real.total_balance, last.nominal.total_balance);
    }

    #[test]
    fn inflation_deflates_real_values() {
        let mut params = flat_params();
        params.inflation_rate_pct = 10.0;
        let rows = project(&params, &[], 32).expect("valid");
        assert_eq!(rows[1].real.total_balance, (100_000.0 / 1.1_f64).round());
        assert_eq!(rows[2].real.total_balance, (100_000.0 / 1.21_f64).round());
        assert_eq!(rows[2].nominal.total_balance, 100_000.0);
    }

    #[test]
    fn market_crash_applies_before_growth() {
        let params = with_rates(flat_params(), 12.0, 0.0);
        let crash = LifeEvent::new(LifeEventKind::MarketCrash, 31, 1, 50.0);
        let rows = project(&params, &[crash], 31).expect("valid");
        let expected = 50_000.0 * (1.0 + 0.01_f64).powi(12);
        assert_approx_tol(rows[1].nominal.total_balance, expected, 0.5);
    }

    #[test]
    fn stacked_crashes_compound() {
        let params = flat_params();
        let events = [
            LifeEvent::new(LifeEventKind::MarketCrash, 31, 1, 50.0),
            LifeEvent::new(LifeEventKind::MarketCrash, 31, 1, 50.0),
        ];
        let rows = project(&params, &events, 31).expect("valid");
        assert_eq!(rows[1].nominal.total_balance, 25_000.0);
    }

    #[test]
    fn return_reduction_scales_rates_for_active_years_only() {
        let params = with_rates(flat_params(), 6.0, 6.0);
        let events = [LifeEvent::new(LifeEventKind::ReturnReduction, 31, 1, 100.0)];
        let rows = project(&params, &events, 32).expect("valid");
        assert_eq!(rows[1].nominal.total_balance, 100_000.0);
        assert_eq!(rows[1].nominal.passive_income, 0.0);
        assert!(rows[2].nominal.total_balance > 100_000.0);
    }

    #[test]
    fn expenses_reduce_balance_for_their_duration() {
        let params = flat_params();
        let events = [
            LifeEvent::new(LifeEventKind::OneTimeExpense, 31, 1, 10_000.0),
            LifeEvent::new(LifeEventKind::RecurringExpense, 32, 3, 5_000.0),
        ];
        let rows = project(&params, &events, 36).expect("valid");
        assert_eq!(
            balances(&rows),
            vec![
                100_000.0, 90_000.0, 85_000.0, 80_000.0, 75_000.0, 75_000.0, 75_000.0
            ]
        );
    }

    #[test]
    fn stop_contributions_pauses_monthly_and_annual() {
        let mut params = flat_params();
        params.monthly_contribution = 100.0;
        params.annual_contribution = 800.0;
        let events = [LifeEvent::new(LifeEventKind::StopContributions, 32, 2, 0.0)];
        let rows = project(&params, &events, 35).expect("valid");
        assert_eq!(
            balances(&rows),
            vec![100_000.0, 102_000.0, 102_000.0, 102_000.0, 104_000.0, 106_000.0]
        );
    }

    #[test]
    fn negative_balances_are_carried_and_compound() {
        let params = with_rates(flat_params(), 12.0, 0.0);
        let events = [LifeEvent::new(LifeEventKind::OneTimeExpense, 31, 1, 200_000.0)];
        let rows = project(&params, &events, 32).expect("valid");
        assert!(rows[1].nominal.total_balance < -100_000.0);
        assert!(rows[2].nominal.total_balance < rows[1].nominal.total_balance);
    }

    #[test]
    fn early_retirement_event_shifts_retirement_age() {
        let mut params = flat_params();
        params.monthly_contribution = 1_000.0;
        params.retirement_age = 35;
        let events = [LifeEvent::new(LifeEventKind::EarlyRetirement, 0, 1, 3.0)];
        let rows = project(&params, &events, 34).expect("valid");
        // Effective retirement at 32: only age 31 contributes.
        assert_eq!(rows.last().expect("rows").nominal.total_balance, 112_000.0);

        let mut explicit = params.clone();
        explicit.early_retirement_offset_years = Some(3.0);
        let explicit_rows = project(&explicit, &[], 34).expect("valid");
        assert_eq!(explicit_rows, rows);
    }

    #[test]
    fn multiple_early_retirements_are_rejected() {
        let params = flat_params();
        let events = [
            LifeEvent::new(LifeEventKind::EarlyRetirement, 0, 1, 3.0),
            LifeEvent::new(LifeEventKind::EarlyRetirement, 0, 1, 5.0),
        ];
        assert_eq!(
            project(&params, &events, 40),
            Err(PlanError::ConflictingEarlyRetirement { count: 2 })
        );

        let mut with_field = params;
        with_field.early_retirement_offset_years = Some(2.0);
        assert_eq!(
            project(&with_field, &events[..1], 40),
            Err(PlanError::ConflictingEarlyRetirement { count: 2 })
        );
    }

    #[test]
    fn mortgage_amortizes_and_payment_is_reinvested_after_payoff() {
        let mut params = flat_params();
        params.mortgage = MortgageState::amortizing(12_000.0, 0.0, 12, true);
        let rows = project(&params, &[], 32).expect("valid");

        assert_eq!(rows[0].nominal.total_liabilities, 12_000.0);
        assert_eq!(rows[1].nominal.total_liabilities, 0.0);
        assert_eq!(rows[1].nominal.total_balance, 100_000.0);
        assert_eq!(rows[2].nominal.total_balance, 112_000.0);
        assert_eq!(rows[2].nominal.principal, 112_000.0);
    }

    #[test]
    fn mortgage_without_reinvest_leaves_balance_alone() {
        let mut params = flat_params();
        params.mortgage = MortgageState::amortizing(12_000.0, 0.0, 12, false);
        let rows = project(&params, &[], 32).expect("valid");
        assert_eq!(rows[2].nominal.total_balance, 100_000.0);
        assert_eq!(rows[2].nominal.net_worth, 100_000.0);
    }

    #[test]
    fn interest_bearing_mortgage_tracks_schedule() {
        let mut params = flat_params();
        params.mortgage = MortgageState::amortizing(1_000_000.0, 3.0, 360, false);
        let rows = project(&params, &[], 31).expect("valid");

        let mut principal = 1_000_000.0_f64;
        let payment = params.mortgage.monthly_payment;
        for _ in 0..12 {
            principal -= payment - principal * 3.0 / 100.0 / 12.0;
        }
        assert_eq!(rows[1].nominal.total_liabilities, principal.round());
        assert_eq!(
            rows[1].nominal.net_worth,
            rows[1].nominal.total_balance - rows[1].nominal.total_liabilities
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_projection_is_deterministic_and_net_worth_holds(
            current_age in 20u32..60,
            horizon in 1u32..40,
            principal in 0u32..2_000_000,
            monthly in 0u32..20_000,
            return_bp in -500i32..1500,
            yield_bp in 0i32..600,
            inflation_bp in 0u32..800,
            crash_pct in 0u32..90,
            mortgage_principal in 0u32..3_000_000,
            mortgage_rate_bp in 0u32..800,
            mortgage_months in 1u32..400,
        ) {
            let params = PlanParams {
                current_age,
                retirement_age: current_age + horizon / 2,
                initial_principal: principal as f64,
                monthly_contribution: monthly as f64,
                annual_contribution: 0.0,
                inflation_rate_pct: inflation_bp as f64 / 100.0,
                manual_rates: Some(ManualRates {
                    return_pct: return_bp as f64 / 100.0,
                    yield_pct: yield_bp as f64 / 100.0,
                    volatility_pct: 0.0,
                }),
                holdings: Vec::new(),
                mortgage: MortgageState::amortizing(
                    mortgage_principal as f64,
                    mortgage_rate_bp as f64 / 100.0,
                    mortgage_months,
                    true,
                ),
                early_retirement_offset_years: None,
            };
            let events = [LifeEvent::new(
                LifeEventKind::MarketCrash,
                current_age + 1,
                1,
                crash_pct as f64,
            )];

            let a = project(&params, &events, current_age + horizon).expect("valid");
            let b = project(&params, &events, current_age + horizon).expect("valid");
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len() as u32, horizon + 1);

            for (idx, row) in a.iter().enumerate() {
                prop_assert_eq!(row.age, current_age + idx as u32);
                prop_assert_eq!(
                    row.nominal.net_worth,
                    row.nominal.total_balance - row.nominal.total_liabilities
                );
                prop_assert_eq!(
                    row.real.net_worth,
                    row.real.total_balance - row.real.total_liabilities
                );
                prop_assert!(row.nominal.total_liabilities >= 0.0);
            }
        }
    }
}
