#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use replay_trader::prelude::*;

/// The literal 20-day close series used by the end-to-end scenarios.
pub fn twenty_prices() -> Vec<f64> {
    vec![
        100.0, 101.0, 99.0, 105.0, 98.0, 102.0, 104.0, 103.0, 107.0, 110.0, 108.0, 111.0, 109.0,
        112.0, 115.0, 113.0, 116.0, 114.0, 118.0, 120.0,
    ]
}

pub fn series(prices: Vec<f64>) -> PriceSeries {
    PriceSeries::new("TEST", prices).expect("valid test series")
}

pub fn quiet_config(window_size: usize, num_episode: usize, funding: f64) -> TrainConfig {
    TrainConfig::default()
        .with_window_size(window_size)
        .with_num_episode(num_episode)
        .with_initial_funding(Cash(funding))
        .with_show_progress(false)
}

/// Fresh, per-test scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "replay_trader_it_{name}_{}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

// ================================================================================================
// Scripted Agent
// ================================================================================================

/// Plays back a fixed list of decisions, then holds.
///
/// Every learning update records its index.
pub struct ScriptedAgent {
    account: Account,
    script: VecDeque<Decision>,
    memory: Vec<Transition>,
    batch_size: usize,
    pub replays: Vec<u64>,
}

impl ScriptedAgent {
    pub fn new(batch_size: usize) -> Self {
        Self {
            account: Account::new(Cash(0.0)),
            script: VecDeque::new(),
            memory: Vec::new(),
            batch_size,
            replays: Vec::new(),
        }
    }

    /// Queues `action` with scores that rank it first and Buy second, so a
    /// scripted hold never turns into a sale.
    pub fn with_script(self, actions: &[ActionKind]) -> Self {
        actions
            .iter()
            .fold(self, |agent, action| agent.then(*action, plain_scores(*action)))
    }

    /// Queues `action` with explicit scores.
    pub fn then(mut self, action: ActionKind, scores: [f64; 3]) -> Self {
        self.script.push_back(Decision {
            action,
            scores: ActionScores(scores),
        });
        self
    }

    pub fn memory(&self) -> &[Transition] {
        &self.memory
    }
}

fn plain_scores(action: ActionKind) -> [f64; 3] {
    let mut scores = [0.0, 0.5, 0.0];
    scores[action.index()] = 1.0;
    scores
}

impl Agent for ScriptedAgent {
    fn identifier(&self) -> &str {
        "SCRIPTED"
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    fn decide(&mut self, _state: &Observation, _t: usize) -> TraderResult<Decision> {
        Ok(self.script.pop_front().unwrap_or(Decision {
            action: ActionKind::Hold,
            scores: ActionScores(plain_scores(ActionKind::Hold)),
        }))
    }

    fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn experience_replay(&mut self, update_index: u64) -> TraderResult<f64> {
        self.replays.push(update_index);
        Ok(0.0)
    }

    fn save(&self, _path: &Path) -> TraderResult<()> {
        Ok(())
    }
}

// ================================================================================================
// Recording Reporter
// ================================================================================================

#[derive(Default)]
pub struct RecordingReporter {
    pub steps: Vec<StepReport>,
    pub episodes: Vec<EpisodeSummary>,
    pub finished: usize,
}

impl Reporter for RecordingReporter {
    fn on_step(&mut self, step: &StepReport) {
        self.steps.push(step.clone());
    }

    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        self.episodes.push(summary.clone());
    }

    fn on_finish(&mut self, _report: &TrainingReport) {
        self.finished += 1;
    }
}
