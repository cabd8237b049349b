use serde::Serialize;
use tracing::debug;

use super::currency::CurrencyTable;
use super::engine::{DEFAULT_LIFE_EXPECTANCY_AGE, project_at_rates};
use super::error::Result;
use super::types::{
    EffectiveRates, LifeEvent, LifeEventKind, PlanParams, StressStatus, StressTestOutcome,
    YearlyResult,
};

pub const LONGEVITY_LIFE_EXPECTANCY_AGE: u32 = 100;

const DANGER_RATIO: f64 = 0.5;
const WARNING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressScenario {
    pub id: String,
    pub title: String,
    pub description: String,
    pub events: Vec<LifeEvent>,
    /// Defaults to `DEFAULT_LIFE_EXPECTANCY_AGE`.
    pub life_expectancy_age: Option<u32>,
    /// A positive final balance is always `Safe` for a longevity run, since a
    /// longer horizon is expected to end lower than the baseline.
    pub longevity: bool,
}

impl StressScenario {
    pub fn new(id: &str, title: &str, description: &str, events: Vec<LifeEvent>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            events,
            life_expectancy_age: None,
            longevity: false,
        }
    }

    /// The plan as given, with no events, to the default life expectancy.
    /// Every scenario is judged against this run.
    pub fn baseline() -> Self {
        Self::new("baseline", "Baseline", "No adverse events", Vec::new())
    }

    pub fn life_expectancy(&self) -> u32 {
        self.life_expectancy_age
            .unwrap_or(DEFAULT_LIFE_EXPECTANCY_AGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressCatalog {
    pub scenarios: Vec<StressScenario>,
}

impl StressCatalog {
    /// The stock adverse scenarios, timed relative to the plan's ages.
    pub fn standard(params: &PlanParams) -> Self {
        let now = params.current_age;
        let after = |years: u32| now.saturating_add(years);
        let pre_retirement = params.retirement_age.saturating_sub(1).max(after(1));
        let event = LifeEvent::new;

        let mut longevity = StressScenario::new(
            "longevity",
            "Longevity",
            "Savings must last until age 100",
            Vec::new(),
        );
        longevity.life_expectancy_age = Some(LONGEVITY_LIFE_EXPECTANCY_AGE);
        longevity.longevity = true;

        let scenarios = vec![
            StressScenario::new(
                "market-crash",
                "Market crash",
                "Portfolio drops 30% next year",
                vec![event(LifeEventKind::MarketCrash, after(1), 1, 30.0)],
            ),
            StressScenario::new(
                "pre-retirement-crash",
                "Crash before retirement",
                "Portfolio drops 40% the year before retiring",
                vec![event(LifeEventKind::MarketCrash, pre_retirement, 1, 40.0)],
            ),
            StressScenario::new(
                "lost-decade",
                "Lost decade",
                "Returns and yield halved for ten years",
                vec![event(LifeEventKind::ReturnReduction, after(1), 10, 50.0)],
            ),
            StressScenario::new(
                "stagflation",
                "Stagflation",
                "A 15% drawdown followed by five years of 70% lower returns",
                vec![
                    event(LifeEventKind::MarketCrash, after(5), 1, 15.0),
                    event(LifeEventKind::ReturnReduction, after(5), 5, 70.0),
                ],
            ),
            StressScenario::new(
                "job-loss",
                "Job loss",
                "No contributions for two years",
                vec![event(LifeEventKind::StopContributions, after(1), 2, 0.0)],
            ),
            StressScenario::new(
                "career-break",
                "Career break",
                "No contributions for five years starting in ten years",
                vec![event(LifeEventKind::StopContributions, after(10), 5, 0.0)],
            ),
            StressScenario::new(
                "medical-emergency",
                "Medical emergency",
                "A one-off 300,000 expense in ten years",
                vec![event(LifeEventKind::OneTimeExpense, after(10), 1, 300_000.0)],
            ),
            StressScenario::new(
                "education-costs",
                "Education costs",
                "150,000 a year for four years of tuition",
                vec![event(LifeEventKind::RecurringExpense, after(15), 4, 150_000.0)],
            ),
            StressScenario::new(
                "early-retirement",
                "Early retirement",
                "Retiring five years ahead of plan",
                vec![event(LifeEventKind::EarlyRetirement, now, 1, 5.0)],
            ),
            longevity,
        ];

        Self { scenarios }
    }
}

pub fn run_all(params: &PlanParams) -> Result<Vec<StressTestOutcome>> {
    run_all_with(
        params,
        &StressCatalog::standard(params),
        &CurrencyTable::hkd_base(),
    )
}

/// Baseline is the plan with no events to the default life expectancy; each
/// scenario is then classified against it.
pub fn run_all_with(
    params: &PlanParams,
    catalog: &StressCatalog,
    table: &CurrencyTable,
) -> Result<Vec<StressTestOutcome>> {
    let rates = params.rates_with(table);
    let baseline = StressScenario::baseline();
    let baseline_rows =
        project_at_rates(params, &baseline.events, baseline.life_expectancy(), rates)?;
    let baseline_final = final_balance(&baseline_rows);

    catalog
        .scenarios
        .iter()
        .map(|scenario| evaluate(params, scenario, rates, baseline_final))
        .collect()
}

pub fn run_scenario(
    params: &PlanParams,
    scenario: &StressScenario,
    baseline_final_balance: f64,
    table: &CurrencyTable,
) -> Result<StressTestOutcome> {
    evaluate(params, scenario, params.rates_with(table), baseline_final_balance)
}

fn evaluate(
    params: &PlanParams,
    scenario: &StressScenario,
    rates: EffectiveRates,
    baseline_final: f64,
) -> Result<StressTestOutcome> {
    let rows = if scenario
        .events
        .iter()
        .any(|e| e.kind == LifeEventKind::EarlyRetirement)
    {
        // The scenario's own retirement timing replaces the plan's offset.
        let scenario_params = PlanParams {
            early_retirement_offset_years: None,
            ..params.clone()
        };
        project_at_rates(
            &scenario_params,
            &scenario.events,
            scenario.life_expectancy(),
            rates,
        )?
    } else {
        project_at_rates(params, &scenario.events, scenario.life_expectancy(), rates)?
    };

    let final_balance = final_balance(&rows);
    let bankrupt_age = rows
        .iter()
        .find(|r| r.nominal.total_balance < 0.0)
        .map(|r| r.age);
    let status = classify(
        final_balance,
        baseline_final,
        bankrupt_age.is_some(),
        scenario.longevity,
    );
    debug!(
        scenario = %scenario.id,
        final_balance,
        baseline_final,
        ?status,
        "stress scenario evaluated"
    );

    Ok(StressTestOutcome {
        scenario_id: scenario.id.clone(),
        title: scenario.title.clone(),
        description: scenario.description.clone(),
        final_balance,
        baseline_final_balance: baseline_final,
        difference: final_balance - baseline_final,
        bankrupt: bankrupt_age.is_some(),
        bankrupt_age,
        status,
    })
}

pub fn classify(
    final_balance: f64,
    baseline_final: f64,
    bankrupt: bool,
    longevity: bool,
) -> StressStatus {
    if longevity && final_balance > 0.0 {
        return StressStatus::Safe;
    }
    let ratio = if baseline_final > 0.0 {
        final_balance / baseline_final
    } else {
        0.0
    };
    if bankrupt || final_balance <= 0.0 || ratio < DANGER_RATIO {
        StressStatus::Danger
    } else if ratio < WARNING_RATIO {
        StressStatus::Warning
    } else {
        StressStatus::Safe
    }
}

fn final_balance(rows: &[YearlyResult]) -> f64 {
    rows.last().map_or(0.0, |r| r.nominal.total_balance)
}
