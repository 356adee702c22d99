mod config;
mod database;
mod engine;
mod error;
mod exchange;
mod indicators;
mod ml;
mod types;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{AppConfig, EvaluationConfig, ModelKind};
use database::WarehouseProvider;
use engine::{write_frame_csv, EvaluationReport, Evaluator};
use exchange::{FetchRequest, KlineDumpProvider, SeriesProvider};
use indicators::derive_indicators;
use ml::HttpPredictionClient;
use types::close_series;

#[derive(Parser)]
#[command(name = "growth-model-eval")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Scores crypto price-growth models against realized 24h growth", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Evaluation settings file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Env file with database credentials and MODEL_URL (default: db.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Model selectors and output shared by both evaluation commands.
#[derive(Args)]
struct ModelArgs {
    /// Model to query (CBR, Bayesian, ElasticNet, Huber, Lasso, LassoLars, Ridge, XGB)
    #[arg(short, long)]
    model: Option<ModelKind>,
    /// Registered model version
    #[arg(long)]
    version: Option<String>,
    /// Registered model alias
    #[arg(long)]
    alias: Option<String>,
    /// Prediction endpoint, overrides MODEL_URL
    #[arg(long)]
    url: Option<String>,
    /// Write the time/actual/predicted table to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate against precomputed indicators in the warehouse
    Evaluate {
        /// Indicator table (default: crypto_ind_<currency>)
        #[arg(short, long)]
        table: Option<String>,
        /// Currency symbol, e.g. btcusdt
        #[arg(long)]
        currency: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start: String,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Evaluate against local Binance kline dumps
    EvaluateLocal {
        /// Symbol, e.g. BTCUSDT
        #[arg(long)]
        currency: String,
        /// Directory holding the spot/ dump tree
        #[arg(short, long, default_value = ".")]
        data_dir: PathBuf,
        /// Only evaluate rows from this date on (YYYY-MM-DD)
        #[arg(short, long)]
        start: Option<String>,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Derive the indicator table from local kline dumps and write it as CSV
    Transform {
        /// Symbol, e.g. BTCUSDT
        #[arg(long)]
        currency: String,
        /// Directory holding the spot/ dump tree
        #[arg(short, long, default_value = ".")]
        data_dir: PathBuf,
        /// Output CSV file path
        #[arg(short, long, default_value = "indicators.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Growth Model Evaluation v0.1.0");
    let config = EvaluationConfig::load(Path::new(&cli.config))?;
    let env_file = cli.env_file.as_deref();

    match cli.command {
        Commands::Evaluate { table, currency, start, model } => {
            let app = AppConfig::load(env_file)?;
            let request = FetchRequest {
                table,
                currency,
                start: Some(parse_start(&start)?),
            };
            request.resolve_table()?;
            let provider = WarehouseProvider::connect(&app.database, &config.timeouts).await?;
            let url = model_url(&model, app);
            run_evaluation(Arc::new(provider), &request, config, model, url).await?;
        }
        Commands::EvaluateLocal { currency, data_dir, start, model } => {
            let app = AppConfig::load(env_file)?;
            let url = model_url(&model, app);
            let start = start.as_deref().map(parse_start).transpose()?;
            let request = FetchRequest::for_currency(currency, start);
            let provider = KlineDumpProvider::new(data_dir);
            run_evaluation(Arc::new(provider), &request, config, model, url).await?;
        }
        Commands::Transform { currency, data_dir, output } => {
            transform_dump(&currency, &data_dir, &output, &config)?;
        }
    }

    Ok(())
}

/// `--url` overrides the configured MODEL_URL.
fn model_url(args: &ModelArgs, app: AppConfig) -> String {
    args.url.clone().unwrap_or(app.model_url)
}

fn parse_start(start: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid start date format. Use YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid start date {}", start))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

async fn run_evaluation(
    provider: Arc<dyn SeriesProvider>,
    request: &FetchRequest,
    mut config: EvaluationConfig,
    args: ModelArgs,
    url: String,
) -> Result<EvaluationReport> {
    if args.model.is_some() {
        config.model.model = args.model;
    }
    if args.version.is_some() {
        config.model.version = args.version;
    }
    if args.alias.is_some() {
        config.model.alias = args.alias;
    }

    info!("Analysis started at {}", Utc::now());
    let predictor = HttpPredictionClient::new(url, &config.timeouts)?;
    let mut evaluator = Evaluator::new(provider, Arc::new(predictor), config);
    let outcome = evaluator.run(request).await;
    info!("Evaluation finished in state {}", evaluator.state());
    let report = outcome?;

    report.print_summary();
    if let Some(path) = &args.output {
        report.write_csv(path)?;
        info!("Comparison table written to {}", path.display());
    }
    Ok(report)
}

fn transform_dump(currency: &str, data_dir: &Path, output: &Path, config: &EvaluationConfig) -> Result<()> {
    let symbol = currency.to_uppercase();
    let candles = KlineDumpProvider::new(data_dir).load_candles(&symbol)?;
    let derived = derive_indicators(&close_series(&candles), &config.pipeline);

    let (_, incomplete) = derived.frame.drop_incomplete();
    info!(
        "Derived {} indicator rows for {} ({} incomplete)",
        derived.frame.len(),
        symbol,
        incomplete
    );
    write_frame_csv(&derived.frame, output)?;
    info!("Indicator table written to {}", output.display());
    Ok(())
}
