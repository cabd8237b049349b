use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fireplan::core::{
    DEFAULT_LIFE_EXPECTANCY_AGE, DEFAULT_TRIALS, LifeEvent, PlanGap, PlanParams, RiskProfile,
    analyze_plan, fire_number, project, run_all, simulate_seeded, stress_outcomes_csv,
};

#[derive(Parser, Debug)]
#[command(
    name = "fireplan",
    about = "Retirement projections, Monte Carlo bands, stress tests and allocation gap analysis"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Year-by-year nominal and real projection
    Project {
        #[command(flatten)]
        plan: PlanArgs,
        /// JSON array of life events
        #[arg(long)]
        events: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_LIFE_EXPECTANCY_AGE)]
        life_expectancy: u32,
    },
    /// p10/p50/p90 balance bands up to retirement
    MonteCarlo {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(long, default_value_t = DEFAULT_TRIALS)]
        trials: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the standard adverse scenarios against the plan
    Stress {
        #[command(flatten)]
        plan: PlanArgs,
        /// Emit CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// Compare current holdings with a benchmark allocation
    Gap {
        #[command(flatten)]
        plan: PlanArgs,
        #[arg(long, value_enum, default_value_t = CliRiskProfile::Balanced)]
        profile: CliRiskProfile,
        /// Annual income the portfolio yield should cover
        #[arg(long)]
        target_income: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Plan document (camelCase JSON); omitted fields take their defaults
    #[arg(long)]
    plan: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl From<CliRiskProfile> for RiskProfile {
    fn from(value: CliRiskProfile) -> Self {
        match value {
            CliRiskProfile::Conservative => RiskProfile::Conservative,
            CliRiskProfile::Balanced => RiskProfile::Balanced,
            CliRiskProfile::Aggressive => RiskProfile::Aggressive,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GapReport<'a> {
    #[serde(flatten)]
    gap: &'a PlanGap,
    fire_number: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve { port } => {
            fireplan::api::run_http_server(port)
                .await
                .context("HTTP server failed")?;
        }
        Command::Project {
            plan,
            events,
            life_expectancy,
        } => {
            let params = plan.load()?;
            params.validate_life_expectancy(life_expectancy)?;
            let events = match events {
                Some(path) => read_json::<Vec<LifeEvent>>(&path)?,
                None => Vec::new(),
            };
            let rows = project(&params, &events, life_expectancy)?;
            print_json(&rows)?;
        }
        Command::MonteCarlo { plan, trials, seed } => {
            let params = plan.load()?;
            if trials == 0 {
                anyhow::bail!("--trials must be > 0");
            }
            let seed = seed.unwrap_or_else(rand::random);
            info!(seed, trials, "monte carlo seed");
            print_json(&simulate_seeded(&params, trials, seed))?;
        }
        Command::Stress { plan, csv } => {
            let params = plan.load()?;
            let outcomes = run_all(&params)?;
            if csv {
                print!("{}", stress_outcomes_csv(&outcomes)?);
            } else {
                print_json(&outcomes)?;
            }
        }
        Command::Gap {
            plan,
            profile,
            target_income,
        } => {
            let params = plan.load()?;
            let gap = analyze_plan(&params, profile.into());
            let fire_number =
                target_income.and_then(|income| fire_number(income, gap.actual.weighted_yield_pct));
            print_json(&GapReport {
                gap: &gap,
                fire_number,
            })?;
        }
    }

    Ok(())
}

impl PlanArgs {
    fn load(&self) -> Result<PlanParams> {
        let params = match &self.plan {
            Some(path) => read_json::<PlanParams>(path)?,
            None => PlanParams::default(),
        };
        params.validate()?;
        Ok(params)
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,fireplan=debug"
    } else {
        "warn,fireplan=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
