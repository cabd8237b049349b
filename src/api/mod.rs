use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    DEFAULT_LIFE_EXPECTANCY_AGE, DEFAULT_TRIALS, EffectiveRates, LifeEvent, PlanError, PlanGap,
    PlanParams, PortfolioAggregate, RiskProfile, SimulationPercentiles, StressTestOutcome,
    YearlyResult, aggregate, analyze_plan, fire_number, project, run_all, simulate_seeded,
    stress_outcomes_csv,
};

pub const MAX_TRIALS: usize = 100_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    plan: PlanParams,
    events: Vec<LifeEvent>,
    life_expectancy_age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MonteCarloPayload {
    plan: PlanParams,
    trials: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StressPayload {
    plan: PlanParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GapPayload {
    plan: PlanParams,
    profile: Option<RiskProfile>,
    target_annual_income: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    life_expectancy_age: u32,
    rates: EffectiveRates,
    portfolio: PortfolioAggregate,
    years: Vec<YearlyResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonteCarloResponse {
    trials: usize,
    seed: u64,
    bands: Vec<SimulationPercentiles>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StressResponse {
    baseline_final_balance: f64,
    outcomes: Vec<StressTestOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GapResponse {
    #[serde(flatten)]
    gap: PlanGap,
    target_annual_income: Option<f64>,
    fire_number: Option<f64>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "fireplan HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/project", post(project_handler))
        .route("/api/monte-carlo", post(monte_carlo_handler))
        .route("/api/stress-test", post(stress_handler))
        .route("/api/stress-test.csv", post(stress_csv_handler))
        .route("/api/gap", post(gap_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_handler(Json(payload): Json<ProjectPayload>) -> Response {
    respond(build_project_response(payload))
}

async fn monte_carlo_handler(Json(payload): Json<MonteCarloPayload>) -> Response {
    respond(build_monte_carlo_response(payload))
}

async fn stress_handler(Json(payload): Json<StressPayload>) -> Response {
    respond(build_stress_response(payload))
}

async fn stress_csv_handler(Json(payload): Json<StressPayload>) -> Response {
    let csv = build_stress_response(payload).and_then(|r| stress_outcomes_csv(&r.outcomes));
    match csv {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"stress-test.csv\"",
                ),
            ],
            body,
        )),
        Err(err) => plan_error_response(&err),
    }
}

async fn gap_handler(Json(payload): Json<GapPayload>) -> Response {
    respond(build_gap_response(payload))
}

fn build_project_response(payload: ProjectPayload) -> Result<ProjectResponse, PlanError> {
    let plan = payload.plan;
    plan.validate()?;
    let life_expectancy_age = payload
        .life_expectancy_age
        .unwrap_or(DEFAULT_LIFE_EXPECTANCY_AGE);
    plan.validate_life_expectancy(life_expectancy_age)?;

    let years = project(&plan, &payload.events, life_expectancy_age)?;
    Ok(ProjectResponse {
        life_expectancy_age,
        rates: plan.rates(),
        portfolio: aggregate(&plan.holdings),
        years,
    })
}

fn build_monte_carlo_response(payload: MonteCarloPayload) -> Result<MonteCarloResponse, PlanError> {
    let plan = payload.plan;
    plan.validate()?;
    let trials = payload.trials.unwrap_or(DEFAULT_TRIALS);
    if trials == 0 || trials > MAX_TRIALS {
        return Err(PlanError::InvalidInput(format!(
            "trials must be between 1 and {MAX_TRIALS}"
        )));
    }
    let seed = payload.seed.unwrap_or_else(rand::random);

    Ok(MonteCarloResponse {
        trials,
        seed,
        bands: simulate_seeded(&plan, trials, seed),
    })
}

fn build_stress_response(payload: StressPayload) -> Result<StressResponse, PlanError> {
    let plan = payload.plan;
    plan.validate()?;
    let outcomes = run_all(&plan)?;
    let baseline_final_balance = outcomes
        .first()
        .map_or(0.0, |o| o.baseline_final_balance);

    Ok(StressResponse {
        baseline_final_balance,
        outcomes,
    })
}

fn build_gap_response(payload: GapPayload) -> Result<GapResponse, PlanError> {
    let plan = payload.plan;
    plan.validate()?;
    if payload
        .target_annual_income
        .is_some_and(|income| !income.is_finite() || income < 0.0)
    {
        return Err(PlanError::InvalidInput(
            "targetAnnualIncome must be a non-negative number".to_string(),
        ));
    }

    let gap = analyze_plan(&plan, payload.profile.unwrap_or(RiskProfile::Balanced));
    let fire_number = payload
        .target_annual_income
        .and_then(|income| fire_number(income, gap.actual.weighted_yield_pct));

    Ok(GapResponse {
        gap,
        target_annual_income: payload.target_annual_income,
        fire_number,
    })
}

fn respond<T: Serialize>(result: Result<T, PlanError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => plan_error_response(&err),
    }
}

fn plan_error_response(err: &PlanError) -> Response {
    let status = match err {
        PlanError::InvalidInput(_) | PlanError::ConflictingEarlyRetirement { .. } => {
            StatusCode::BAD_REQUEST
        }
        PlanError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(%err, status = status.as_u16(), "request rejected");
    error_response(status, &err.to_string())
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn payload_from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, PlanError> {
    serde_json::from_str::<T>(json)
        .map_err(|e| PlanError::InvalidInput(format!("Invalid API JSON payload: {e}")))
}
