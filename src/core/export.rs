use super::error::{PlanError, Result};
use super::types::StressTestOutcome;

/// Stress results as a spreadsheet-friendly CSV table, one row per scenario.
///
/// Columns: scenario, description, final_balance, difference, status,
/// bankrupt_age. Solvent scenarios show `-` for the bankruptcy age.
pub fn stress_outcomes_csv(outcomes: &[StressTestOutcome]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "scenario",
        "description",
        "final_balance",
        "difference",
        "status",
        "bankrupt_age",
    ])
    .map_err(export_error)?;

    for o in outcomes {
        let bankrupt_age = o
            .bankrupt_age
            .map_or_else(|| "-".to_string(), |age| age.to_string());
        wtr.write_record([
            o.title.as_str(),
            o.description.as_str(),
            &format!("{:.0}", o.final_balance),
            &format!("{:.0}", o.difference),
            o.status.label(),
            &bankrupt_age,
        ])
        .map_err(export_error)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| PlanError::Export(format!("failed to flush CSV writer: {e}")))?;
    String::from_utf8(data).map_err(|e| PlanError::Export(format!("CSV output is not UTF-8: {e}")))
}

fn export_error(err: csv::Error) -> PlanError {
    PlanError::Export(err.to_string())
}
