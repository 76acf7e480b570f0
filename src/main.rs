mod types;
mod indicators;
mod exchange;
mod config;
mod errors;
mod ml;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::{load_config, write_default_config, PipelineConfig};
use exchange::{BinanceClient, PriceSource};
use ml::{
    create_market_target, map_ohlcv_to_features, ArtifactStore, InferenceSession, ModelVersion,
    TrainingPipeline,
};
use types::{HistoryPeriod, PriceSeries, TimeFrame};

#[derive(Parser)]
#[command(name = "market-direction-ml")]
#[command(version = "0.1.0")]
#[command(about = "Triple-barrier labelling and direction classification on exchange candles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Overrides for the `[data]` section
#[derive(Args, Debug, Default)]
struct DataArgs {
    /// Symbol to fetch (e.g., BTCUSDT, ETHUSDT)
    #[arg(short, long)]
    symbol: Option<String>,
    /// Candle interval (1m, 5m, 15m, 1h, 4h, 1d)
    #[arg(short, long)]
    interval: Option<String>,
    /// First day to fetch (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,
    /// Look-back period when no start is given (7d, 6mo, 2y, ytd, max)
    #[arg(short, long)]
    period: Option<String>,
}

impl DataArgs {
    fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(symbol) = &self.symbol {
            config.data.symbol = symbol.to_uppercase();
        }
        if let Some(interval) = &self.interval {
            config.data.interval = TimeFrame::from_str(interval).map_err(|e| anyhow!(e))?;
        }
        if let Some(start) = &self.start {
            let date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .map_err(|_| anyhow!("Invalid start date format. Use YYYY-MM-DD"))?;
            config.data.start_date = Some(date);
        }
        if let Some(period) = &self.period {
            config.data.period = HistoryPeriod::from_str(period).map_err(|e| anyhow!(e))?;
        }
        Ok(())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Fetch candles and print the latest feature rows
    Features {
        #[command(flatten)]
        data: DataArgs,
        /// Rows to print
        #[arg(short, long, default_value = "10")]
        rows: usize,
    },
    /// Fetch candles and print the barrier label distribution
    Labels {
        #[command(flatten)]
        data: DataArgs,
        /// Rows to print
        #[arg(short, long, default_value = "10")]
        rows: usize,
    },
    /// Train, evaluate and save a new model version
    Train {
        #[command(flatten)]
        data: DataArgs,
        /// Skip writing artifacts
        #[arg(long)]
        dry_run: bool,
    },
    /// Score the most recent candles with a saved model
    Predict {
        #[command(flatten)]
        data: DataArgs,
        /// Model version to load (defaults to the latest)
        #[arg(long)]
        model_version: Option<String>,
        /// Candles to score
        #[arg(short, long, default_value = "5")]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

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

    info!("Market Direction ML v0.1.0");

    let config_path = Path::new(&cli.config);
    if let Commands::InitConfig { force } = cli.command {
        if config_path.exists() && !force {
            return Err(anyhow!(
                "{} already exists, pass --force to overwrite",
                config_path.display()
            ));
        }
        return write_default_config(config_path);
    }

    let mut config = load_config(Some(config_path))?;

    match cli.command {
        Commands::InitConfig { .. } => {}
        Commands::Features { data, rows } => {
            data.apply(&mut config)?;
            show_features(&config, rows).await?;
        }
        Commands::Labels { data, rows } => {
            data.apply(&mut config)?;
            show_labels(&config, rows).await?;
        }
        Commands::Train { data, dry_run } => {
            data.apply(&mut config)?;
            train_model(config, dry_run).await?;
        }
        Commands::Predict { data, model_version, rows } => {
            data.apply(&mut config)?;
            predict(&config, model_version.as_deref(), rows).await?;
        }
    }

    Ok(())
}

fn client_for(config: &PipelineConfig) -> BinanceClient {
    BinanceClient::new(config.data.base_url.clone())
}

async fn fetch(config: &PipelineConfig) -> Result<PriceSeries> {
    let series = client_for(config)
        .fetch_history(&config.history_request())
        .await?;
    Ok(series)
}

async fn show_features(config: &PipelineConfig, rows: usize) -> Result<()> {
    let series = fetch(config).await?;
    let frame = map_ohlcv_to_features(&series)?;
    let latest = frame.tail(rows);

    println!("\n=== Features: {} {} ===", config.data.symbol, config.data.interval);
    println!("{:<20} {}", "open_time", latest.column_names().join(" | "));
    for (ts, row) in latest.index().iter().zip(latest.to_rows()) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:.5}", v)).collect();
        println!("{:<20} {}", ts.format("%Y-%m-%d %H:%M"), cells.join(" | "));
    }
    println!("{} feature rows from {} candles", frame.len(), series.len());

    Ok(())
}

async fn show_labels(config: &PipelineConfig, rows: usize) -> Result<()> {
    let series = fetch(config).await?;
    let labels = create_market_target(&series, &config.barrier)?;

    println!("\n=== Barrier labels: {} {} ===", config.data.symbol, config.data.interval);
    println!(
        "take_profit={:.2}% stop_loss={:.2}% horizon={}",
        config.barrier.take_profit_pct * 100.0,
        config.barrier.stop_loss_pct * 100.0,
        config.barrier.horizon
    );

    let start = labels.len().saturating_sub(rows);
    for (candle, label) in series.candles()[start..].iter().zip(&labels.labels()[start..]) {
        let label = label.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{}  close={:.2}  {}",
            candle.open_time.format("%Y-%m-%d %H:%M"),
            candle.close,
            label
        );
    }
    println!("Distribution: {}", labels.counts());

    Ok(())
}

async fn train_model(config: PipelineConfig, dry_run: bool) -> Result<()> {
    let store = ArtifactStore::new(&config.artifacts.models_dir);
    let pipeline = TrainingPipeline::new(client_for(&config), config);
    let artifacts = pipeline.run().await?;

    let m = &artifacts.metrics;
    println!("\n=== Training Results ===");
    println!("Samples:   {} train / {} test", m.train_samples, m.test_samples);
    println!("Accuracy:  {:.2}% (train {:.2}%)", m.accuracy * 100.0, m.train_accuracy * 100.0);
    println!("Precision: {:.3}", m.precision);
    println!("Recall:    {:.3}", m.recall);
    println!("F1:        {:.3}", m.f1_score);
    println!("{}", m.report);

    if dry_run {
        warn!("Dry run, artifacts not saved");
        return Ok(());
    }

    let version = artifacts.save(&store)?;
    println!("Saved model v{} to {}", version, store.models_dir().display());

    Ok(())
}

async fn predict(config: &PipelineConfig, version: Option<&str>, rows: usize) -> Result<()> {
    let store = ArtifactStore::new(&config.artifacts.models_dir);
    let bundle = match version {
        Some(v) => store.load_bundle(&ModelVersion::from_str(v)?)?,
        None => store.load_latest()?,
    };
    info!(
        "Using model v{} trained on {} {}",
        bundle.version, bundle.metrics.symbol, bundle.metrics.interval
    );
    if bundle.metrics.symbol != config.data.symbol {
        warn!(
            "Model was trained on {}, scoring {}",
            bundle.metrics.symbol, config.data.symbol
        );
    }

    let series = fetch(config).await?;
    let session = InferenceSession::from_bundle(bundle);
    let predictions = session.predict_latest(&series, rows)?;

    println!("\n=== Predictions: {} {} ===", config.data.symbol, config.data.interval);
    for p in predictions {
        let probs: Vec<String> = p
            .probabilities
            .iter()
            .map(|(label, v)| format!("{}={:.0}%", label, v * 100.0))
            .collect();
        println!(
            "{}  {:<8} ({})",
            p.open_time.format("%Y-%m-%d %H:%M"),
            p.label.to_string(),
            probs.join(", ")
        );
    }

    Ok(())
}
