use std::{
    fs::{self, File},
    path::Path,
};

use polars::{
    df,
    prelude::{CsvWriter, DataFrame, PolarsError, SerWriter},
};
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{Cash, Price},
    error::{DataError, IoError, TraderError, TraderResult},
    gym::{
        Reward,
        trading::{
            action::{ActionKind, Decision},
            config::TrainConfig,
            execution::Execution,
            ledger::Account,
        },
    },
    math::returns::{maximum_drawdown, mean, sharpe_ratio},
};

// ================================================================================================
// Step
// ================================================================================================

/// Everything that happened during one step, handed to a
/// [`Reporter`](crate::report::Reporter) for progress display.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub episode: usize,
    pub t: usize,
    pub trading_period: usize,
    pub price: Price,

    /// The agent's decision, with scores replaced when a hold was converted
    /// into a sale.
    pub decision: Decision,

    /// `None` when the action had no effect on the account.
    pub execution: Option<Execution>,
    pub reward: Reward,
    pub balance: Cash,
    pub holdings: usize,
    pub portfolio_value: Cash,

    /// Loss of the learning update triggered by this step, if any.
    pub loss: Option<f64>,
}

// ================================================================================================
// Episode
// ================================================================================================

/// Counters the trainer accumulates while stepping one episode.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeTally {
    pub buys: usize,
    pub sells: usize,
    pub hold_overrides: usize,
    pub explorations: usize,
    pub replays: usize,
    pub loss_sum: f64,
}

impl EpisodeTally {
    pub fn record(&mut self, step: &StepReport, hold_overridden: bool) {
        if let Some(execution) = &step.execution {
            match execution.executed {
                ActionKind::Buy => self.buys += 1,
                ActionKind::Sell => self.sells += 1,
                ActionKind::Hold => {}
            }
        }
        if hold_overridden {
            self.hold_overrides += 1;
        }
        if step.decision.is_exploration() {
            self.explorations += 1;
        }
        if let Some(loss) = step.loss {
            self.replays += 1;
            self.loss_sum += loss;
        }
    }
}

/// Portfolio performance of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub initial_value: Cash,
    pub final_value: Cash,
    pub balance: Cash,
    pub holdings: usize,

    /// `final_value - initial_value`, the per-episode entry of the
    /// cross-episode returns.
    pub total_return: Cash,
    pub mean_return_rate: Option<f64>,

    /// Annualized over 252 trading days, net of the daily risk-free rate.
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub buys: usize,
    pub sells: usize,
    pub hold_overrides: usize,
    pub explorations: usize,
    pub replays: usize,
    pub mean_loss: Option<f64>,
}

impl EpisodeSummary {
    /// Summarises the statistics recorded on `account` during `episode`.
    ///
    /// An episode without any recorded step reports its initial value as the
    /// final value.
    pub fn from_account(
        episode: usize,
        account: &Account,
        daily_risk_free: f64,
        tally: &EpisodeTally,
    ) -> Self {
        let initial_value = account.initial_portfolio_value();
        let final_value = account
            .portfolio_values()
            .last()
            .copied()
            .unwrap_or(initial_value);
        let values: Vec<f64> = account.portfolio_values().iter().map(|v| v.0).collect();

        Self {
            episode,
            initial_value,
            final_value,
            balance: account.balance(),
            holdings: account.holdings(),
            total_return: final_value - initial_value,
            mean_return_rate: mean(account.return_rates()),
            sharpe_ratio: sharpe_ratio(account.return_rates(), daily_risk_free),
            max_drawdown: maximum_drawdown(&values),
            buys: tally.buys,
            sells: tally.sells,
            hold_overrides: tally.hold_overrides,
            explorations: tally.explorations,
            replays: tally.replays,
            mean_loss: (tally.replays > 0).then(|| tally.loss_sum / tally.replays as f64),
        }
    }
}

// ================================================================================================
// Run
// ================================================================================================

/// Final result of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub instrument: String,
    pub agent: String,
    pub config: TrainConfig,

    /// Total return of every episode, in episode order.
    pub returns_across_episodes: Vec<f64>,
    pub episodes: Vec<EpisodeSummary>,
}

impl TrainingReport {
    pub fn new(
        instrument: impl Into<String>,
        agent: impl Into<String>,
        config: TrainConfig,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            agent: agent.into(),
            config,
            returns_across_episodes: Vec::new(),
            episodes: Vec::new(),
        }
    }

    pub fn push(&mut self, summary: EpisodeSummary) {
        self.returns_across_episodes.push(summary.total_return.0);
        self.episodes.push(summary);
    }

    pub fn best_episode(&self) -> Option<&EpisodeSummary> {
        self.episodes
            .iter()
            .max_by(|a, b| a.total_return.0.total_cmp(&b.total_return.0))
    }

    /// One row per episode.
    pub fn as_df(&self) -> TraderResult<DataFrame> {
        let col_u64 = |f: fn(&EpisodeSummary) -> usize| -> Vec<u64> {
            self.episodes.iter().map(|s| f(s) as u64).collect()
        };

        df!(
            "episode" => col_u64(|s| s.episode),
            "final_value" => self.episodes.iter().map(|s| s.final_value.0).collect::<Vec<_>>(),
            "total_return" => self.returns_across_episodes.clone(),
            "mean_return_rate" => self
                .episodes
                .iter()
                .map(|s| s.mean_return_rate)
                .collect::<Vec<_>>(),
            "sharpe_ratio" => self.episodes.iter().map(|s| s.sharpe_ratio).collect::<Vec<_>>(),
            "max_drawdown" => self.episodes.iter().map(|s| s.max_drawdown).collect::<Vec<_>>(),
            "buys" => col_u64(|s| s.buys),
            "sells" => col_u64(|s| s.sells),
            "hold_overrides" => col_u64(|s| s.hold_overrides),
            "replays" => col_u64(|s| s.replays),
            "mean_loss" => self.episodes.iter().map(|s| s.mean_loss).collect::<Vec<_>>(),
        )
        .map_err(polars_err)
    }

    /// Writes the whole report as pretty JSON, creating parent directories.
    pub fn to_json(&self, path: &Path) -> TraderResult<()> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(IoError::from)?;
        serde_json::to_writer_pretty(file, self).map_err(IoError::from)?;
        Ok(())
    }

    /// Writes the per-episode table as CSV, creating parent directories.
    pub fn to_csv(&self, path: &Path) -> TraderResult<()> {
        ensure_parent(path)?;
        let mut df = self.as_df()?;
        let mut file = File::create(path).map_err(IoError::from)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(polars_err)?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> TraderResult<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::FileSystem(format!(
                "Failed to create report directory '{}': {e}",
                dir.display()
            ))
        })?;
    }
    Ok(())
}

fn polars_err(e: PolarsError) -> TraderError {
    DataError::DataFrame(e.to_string()).into()
}
