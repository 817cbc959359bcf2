use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adaptive_calc::{
    CalculationCache, CalculationOutcome, CalculationScheduler, CompoundFrequency,
    IncrementalEngine, ProjectionInput, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "adaptive-calc")]
#[command(about = "Incremental savings projections", long_about = None)]
struct Cli {
    /// Runtime configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single projection
    Project {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Vary the monthly contribution and recompute incrementally
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// First monthly contribution
        #[arg(long)]
        from: f64,

        /// Last monthly contribution (inclusive)
        #[arg(long)]
        to: f64,

        /// Increment between runs
        #[arg(long, default_value = "100")]
        step: f64,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Starting balance
    #[arg(long, default_value = "10000")]
    principal: f64,

    /// Monthly contribution
    #[arg(long, default_value = "500")]
    contribution: f64,

    /// Annual interest rate in percent
    #[arg(long, default_value = "5")]
    rate: f64,

    /// Horizon in years
    #[arg(long, default_value = "10")]
    years: u32,

    /// Compounding frequency (monthly, quarterly, yearly)
    #[arg(long, default_value = "monthly")]
    frequency: CompoundFrequency,

    /// Flat tax on interest in percent
    #[arg(long, default_value = "0")]
    tax_rate: f64,

    /// Annual inflation in percent
    #[arg(long, default_value = "0")]
    inflation: f64,
}

impl InputArgs {
    fn to_input(&self) -> ProjectionInput {
        ProjectionInput::new(self.principal, self.contribution, self.rate, self.years)
            .with_frequency(self.frequency)
            .with_tax_rate(self.tax_rate)
            .with_inflation_rate(self.inflation)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "adaptive_calc=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => RuntimeConfig::default(),
    };

    let cache = Arc::new(CalculationCache::new(config.cache.clone()));
    let scheduler = Arc::new(CalculationScheduler::new(config.scheduler.clone()));
    cache.start().context("Failed to start cache sweep")?;
    scheduler.start().context("Failed to start scheduler")?;

    let engine = IncrementalEngine::new(
        Arc::clone(&cache),
        Some(Arc::clone(&scheduler)),
        config.engine.clone(),
    );

    let outcome = match &cli.command {
        Commands::Project { input } => run_project(&engine, input.to_input(), cli.json).await,
        Commands::Sweep {
            input,
            from,
            to,
            step,
        } => run_sweep(&engine, input, *from, *to, *step, cli.json).await,
    };

    if outcome.is_ok() && !cli.json {
        println!();
        println!("{}", cache.stats().await);
        let stats = scheduler.get_stats();
        println!(
            "SchedulerStats {{ completed: {}, failed: {}, success_rate: {:.1}%, avg: {:.3}ms }}",
            stats.completed_tasks, stats.failed_tasks, stats.success_rate, stats.average_duration_ms
        );
    }

    scheduler.destroy();
    cache.destroy().await;
    outcome
}

async fn run_project(engine: &IncrementalEngine, input: ProjectionInput, json: bool) -> Result<()> {
    let outcome = engine.calculate(input).await.context("Projection failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_projection(&outcome);
    Ok(())
}

async fn run_sweep(
    engine: &IncrementalEngine,
    args: &InputArgs,
    from: f64,
    to: f64,
    step: f64,
    json: bool,
) -> Result<()> {
    if step <= 0.0 {
        bail!("--step must be greater than 0");
    }
    if to < from {
        bail!("--to must not be below --from");
    }

    let mut outcomes = Vec::new();
    let mut contribution = from;
    while contribution <= to + f64::EPSILON {
        let mut input = args.to_input();
        input.periodic_contribution = contribution;

        let outcome = engine
            .calculate(input)
            .await
            .with_context(|| format!("Projection failed for contribution {}", contribution))?;
        outcomes.push((contribution, outcome));
        contribution += step;
    }

    if json {
        let runs: Vec<_> = outcomes
            .iter()
            .map(|(contribution, outcome)| {
                serde_json::json!({
                    "contribution": contribution,
                    "final_amount": outcome.result.final_amount,
                    "metadata": outcome.metadata,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!(
        "{:>12}  {:>16}  {:>9}  {:>11}  {:>10}",
        "Contribution", "Final amount", "Cache hit", "Incremental", "Time (ms)"
    );
    println!("{}", "=".repeat(66));
    for (contribution, outcome) in &outcomes {
        println!(
            "{:>12.2}  {:>16.2}  {:>9}  {:>11}  {:>10.3}",
            contribution,
            outcome.result.final_amount,
            outcome.metadata.cache_hit,
            outcome.metadata.incremental_update,
            outcome.metadata.calculation_time_ms
        );
    }

    Ok(())
}

fn print_projection(outcome: &CalculationOutcome) {
    let result = &outcome.result;

    println!(
        "{:>4}  {:>14}  {:>12}  {:>12}  {:>14}  {:>7}",
        "Year", "Start", "Contributed", "Interest", "End", "Growth"
    );
    println!("{}", "=".repeat(72));
    for year in &result.yearly {
        println!(
            "{:>4}  {:>14.2}  {:>12.2}  {:>12.2}  {:>14.2}  {:>6.2}%",
            year.year,
            year.start_amount,
            year.contributions,
            year.interest,
            year.end_amount,
            year.growth_rate
        );
    }

    println!();
    println!("Final amount:        {:.2}", result.final_amount);
    println!("Total contributions: {:.2}", result.total_contributions);
    println!("Total interest:      {:.2}", result.total_interest);
    println!("Effective rate:      {:.2}%", result.effective_annual_rate);
    println!("After tax:           {:.2}", result.after_tax_final_amount);
    println!("In today's money:    {:.2}", result.real_final_amount);
    println!(
        "Computed in {:.3}ms (cache hit: {}, incremental: {})",
        outcome.metadata.calculation_time_ms,
        outcome.metadata.cache_hit,
        outcome.metadata.incremental_update
    );
}
