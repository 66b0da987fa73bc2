mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use shoplens_core::{DateRange, Metric, MetricsPipeline, PipelineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "shoplens.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "E-commerce event metrics", long_about = None)]
struct Cli {
    /// Event dataset (.parquet, .csv, .json, .jsonl/.ndjson); falls back to
    /// SHOPLENS_DATASET, then the config file
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    /// Pipeline config file (defaults to ./shoplens.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Product, view, purchase, brand and category counts
    Summary,
    /// View and purchase totals per month
    Monthly,
    /// Categories with the largest view or purchase totals
    TopCategories(TopCategoriesArgs),
    /// Products with a high view-to-purchase ratio
    AtRisk(AtRiskArgs),
    /// Purchase totals per day
    Daily,
    /// Gap-filled daily purchases for one user
    UserFrequency(UserFrequencyArgs),
    /// Category/brand/price table for a date window
    Breakdown(BreakdownArgs),
    /// Main categories available as breakdown filters
    Categories,
    /// Every view at once
    Report,
}

#[derive(Args, Debug)]
struct TopCategoriesArgs {
    /// view or purchase
    #[arg(long, default_value = "purchase")]
    metric: Metric,
    /// Number of categories to keep (overrides the config)
    #[arg(long)]
    k: Option<usize>,
}

#[derive(Args, Debug, Default)]
struct AtRiskArgs {
    /// Ratio a product must exceed (overrides the config)
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Args, Debug, Default)]
struct UserFrequencyArgs {
    /// User to inspect (overrides the config)
    #[arg(long)]
    user_id: Option<i64>,
}

#[derive(Args, Debug)]
struct BreakdownArgs {
    /// First day of the window; defaults to the earliest event
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day of the window, inclusive; defaults to the latest event
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Main category to keep; repeat for several, omit for all
    #[arg(long = "category")]
    categories: Vec<String>,
    /// view or purchase
    #[arg(long, default_value = "purchase")]
    metric: Metric,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    let dataset = resolve_dataset(cli.dataset.clone(), &config)?;

    apply_overrides(&mut config, &cli.command);
    let pipeline = MetricsPipeline::load(&dataset, config)
        .with_context(|| format!("failed to load dataset {}", dataset.display()))?;
    info!(rows = pipeline.events().len(), "event snapshot ready");

    run(&pipeline, cli.command, cli.json)
}

fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        PipelineConfig::from_file(default_path)
            .with_context(|| format!("failed to read config {}", default_path.display()))
    } else {
        Ok(PipelineConfig::default())
    }
}

fn resolve_dataset(flag: Option<PathBuf>, config: &PipelineConfig) -> Result<PathBuf> {
    flag.or_else(|| std::env::var_os("SHOPLENS_DATASET").map(PathBuf::from))
        .or_else(|| config.dataset.clone())
        .context("a dataset must be given via --dataset, SHOPLENS_DATASET or the config file")
}

fn apply_overrides(config: &mut PipelineConfig, command: &Command) {
    match command {
        Command::TopCategories(TopCategoriesArgs { k: Some(k), .. }) => config.top_categories = *k,
        Command::AtRisk(AtRiskArgs {
            threshold: Some(threshold),
        }) => config.at_risk_threshold = *threshold,
        Command::UserFrequency(UserFrequencyArgs {
            user_id: Some(user_id),
        }) => config.frequency_user_id = *user_id,
        _ => {}
    }
}

fn run(pipeline: &MetricsPipeline, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Summary => {
            let summary = pipeline.summarize()?;
            emit(json, &summary, || render::summary(&summary))
        }
        Command::Monthly => {
            let rows = pipeline.monthly_totals()?;
            emit(json, &rows, || render::monthly(&rows))
        }
        Command::TopCategories(args) => {
            let rows = pipeline.top_categories(args.metric)?;
            emit(json, &rows, || render::categories(&rows, args.metric))
        }
        Command::AtRisk(_) => {
            let rows = pipeline.at_risk_products()?;
            emit(json, &rows, || render::products(&rows))
        }
        Command::Daily => {
            let rows = pipeline.daily_purchases()?;
            emit(json, &rows, || render::daily(&rows))
        }
        Command::UserFrequency(_) => {
            let user_id = pipeline.config().frequency_user_id;
            let rows = pipeline.user_purchase_frequency(user_id)?;
            if rows.is_empty() {
                warn!(user_id, "user has no events in the dataset");
            }
            emit(json, &rows, || render::daily(&rows))
        }
        Command::Breakdown(args) => {
            let range = breakdown_range(pipeline, args.start, args.end)?;
            let rows = pipeline.breakdown_in_range(&range, &args.categories, args.metric)?;
            emit(json, &rows, || render::breakdown(&rows, args.metric))
        }
        Command::Categories => {
            let categories = pipeline.events().main_categories()?;
            emit(json, &categories, || categories.join("\n"))
        }
        Command::Report => {
            let report = pipeline.report()?;
            emit(json, &report, || render::report(&report))
        }
    }
}

fn breakdown_range(
    pipeline: &MetricsPipeline,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<DateRange> {
    let bounds = pipeline.events().time_bounds()?;
    let start = start
        .or(bounds.map(|(lo, _)| lo.date()))
        .context("--start is required for an empty dataset")?;
    let end = end
        .or(bounds.map(|(_, hi)| hi.date()))
        .context("--end is required for an empty dataset")?;
    Ok(DateRange::from_dates(start, end)?)
}

fn emit<T, F>(json: bool, value: &T, table: F) -> Result<()>
where
    T: serde::Serialize,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", table());
    }
    Ok(())
}
