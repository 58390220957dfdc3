use std::{env, fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use replay_trader::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Learning agent to train ("DQN" or "DDPG").
    #[arg(long, default_value = "DQN")]
    model_name: String,

    /// Instrument whose `<data-dir>/<stock-name>.csv` close prices are replayed.
    #[arg(long, default_value = "^GSPC_2010-2015")]
    stock_name: String,

    /// Number of price differences per observation.
    #[arg(long)]
    window_size: Option<usize>,

    /// Number of training episodes.
    #[arg(long)]
    num_episode: Option<usize>,

    /// Cash balance at the start of every episode.
    #[arg(long)]
    initial_funding: Option<f64>,

    /// Directory holding the price CSV files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving periodic agent checkpoints [default: saved_models].
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Train without writing any checkpoint.
    #[arg(long, conflicts_with = "checkpoint_dir")]
    no_checkpoint: bool,

    /// Write the training report to this JSON file (plus a CSV beside it).
    #[arg(long)]
    report: Option<PathBuf>,

    /// Annual risk-free yield in basis points.
    #[arg(long, default_value_t = 275)]
    risk_free_bps: u16,

    /// Seed for every random draw of the agent.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON training configuration; command-line flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn train_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?,
            None => TrainConfig::default(),
        };

        if let Some(window_size) = self.window_size {
            config = config.with_window_size(window_size);
        }
        if let Some(num_episode) = self.num_episode {
            config = config.with_num_episode(num_episode);
        }
        if let Some(initial_funding) = self.initial_funding {
            config = config.with_initial_funding(Cash(initial_funding));
        }
        if self.no_checkpoint {
            config = config.without_checkpoints();
        } else if let Some(dir) = &self.checkpoint_dir {
            config = config.with_checkpoint_dir(dir);
        } else if config.checkpoint_dir.is_none() {
            config = config.with_checkpoint_dir(DEFAULT_CHECKPOINT_DIR);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let _guard = init_tracing()?;
    let cli = Cli::parse();
    let start = Instant::now();

    // Unknown model names abort before any data is loaded.
    let kind = AgentKind::parse(&cli.model_name)?;
    let config = cli.train_config()?;

    let prices = CsvPriceSeries::new(&cli.data_dir)
        .load(&cli.stock_name)
        .with_context(|| format!("Failed to load prices for '{}'", cli.stock_name))?;

    let mut trainer = Trainer::new(config.clone(), prices)?
        .with_rate_source(TreasuryBondRate::from_bps(cli.risk_free_bps));
    let mut agent = kind.build(trainer.state_dim(), config.initial_funding, cli.seed)?;

    println!(
        "Training {} on {} ({} episodes, trading period {})",
        agent.identifier(),
        cli.stock_name,
        config.num_episode,
        trainer.prices().trading_period()
    );

    let report = trainer.run(&mut agent, &mut TracingReporter::default())?;

    println!("\n--- Returns Across Episodes ---");
    for summary in &report.episodes {
        println!(
            "Episode {:>3}: return {:>12} | final value {:>12} | sharpe {}",
            summary.episode,
            summary.total_return.to_string(),
            summary.final_value.to_string(),
            summary
                .sharpe_ratio
                .map_or_else(|| "n/a".to_string(), |s| format!("{s:.4}"))
        );
    }

    if let Some(path) = &cli.report {
        report.to_json(path)?;
        let csv_path = path.with_extension("csv");
        report.to_csv(&csv_path)?;
        info!(json = %path.display(), csv = %csv_path.display(), "Report Written");
    }

    println!(
        "total running time: {}",
        humantime::format_duration(std::time::Duration::from_secs(start.elapsed().as_secs()))
    );

    drop(_guard);
    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "replay_trader";

    // Detect if running in container
    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        // Container mode: log to stdout
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        return Ok(None);
    }

    // Local mode: log to file
    let log_dir = match dirs::state_dir() {
        Some(dir) => dir.join(app_name).join("logs"),
        None => dirs::home_dir()
            .context("Failed to find home directory")?
            .join(format!(".local/state/{app_name}/logs")),
    };
    fs::create_dir_all(&log_dir)?;

    let timestamp = time::OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year][month][day]-[hour][minute][second]"
        ))
        .context("Failed to format timestamp")?;
    let file_name = format!("{app_name}-{timestamp}.log");
    let file_path = log_dir.join(&file_name);

    let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(log_file = %file_path.display(), "Logging to file (local mode)");
    Ok(Some(guard))
}
