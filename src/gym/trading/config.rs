use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    data::domain::Cash,
    error::{EnvError, IoError, TraderResult},
};

/// Checkpoint directory the `train` binary uses when none is configured.
pub const DEFAULT_CHECKPOINT_DIR: &str = "saved_models";

/// Configuration of a training run.
///
/// # Example
///
/// ```
/// # use replay_trader::prelude::*;
/// let config = TrainConfig::default()
///     .with_window_size(10)
///     .with_num_episode(1)
///     .with_initial_funding(Cash(1000.0))
///     .with_show_progress(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of price differences in every observation.
    pub window_size: usize,

    /// Number of episodes to run; learned parameters carry over between them.
    pub num_episode: usize,

    /// Cash balance restored at the start of every episode.
    pub initial_funding: Cash,

    /// Checkpoint after every episode whose number is a multiple of this.
    pub checkpoint_every: usize,

    /// Directory receiving agent checkpoints. No checkpoints are written when unset.
    pub checkpoint_dir: Option<PathBuf>,

    /// Draw a terminal progress bar while stepping.
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            num_episode: 10,
            initial_funding: Cash(50_000.0),
            checkpoint_every: 5,
            checkpoint_dir: None,
            show_progress: true,
        }
    }
}

// ================================================================================================
// Builder Methods
// ================================================================================================

impl TrainConfig {
    pub fn with_window_size(self, window_size: usize) -> Self {
        Self {
            window_size,
            ..self
        }
    }

    pub fn with_num_episode(self, num_episode: usize) -> Self {
        Self {
            num_episode,
            ..self
        }
    }

    pub fn with_initial_funding(self, initial_funding: Cash) -> Self {
        Self {
            initial_funding,
            ..self
        }
    }

    pub fn with_checkpoint_every(self, checkpoint_every: usize) -> Self {
        Self {
            checkpoint_every,
            ..self
        }
    }

    pub fn with_checkpoint_dir(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: Some(dir.into()),
            ..self
        }
    }

    /// Disables checkpointing.
    pub fn without_checkpoints(self) -> Self {
        Self {
            checkpoint_dir: None,
            ..self
        }
    }

    pub fn with_show_progress(self, show_progress: bool) -> Self {
        Self {
            show_progress,
            ..self
        }
    }

    /// Reads a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> TraderResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            IoError::FileSystem(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(IoError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TraderResult<()> {
        let invalid = |msg: String| Err(EnvError::InvalidConfig(msg).into());

        if self.window_size == 0 {
            return invalid("window_size must be at least 1".to_string());
        }
        if self.num_episode == 0 {
            return invalid("num_episode must be at least 1".to_string());
        }
        if !self.initial_funding.0.is_finite() || self.initial_funding.0 <= 0.0 {
            return invalid(format!(
                "initial_funding must be positive, got {}",
                self.initial_funding.0
            ));
        }
        if self.checkpoint_every == 0 {
            return invalid("checkpoint_every must be at least 1".to_string());
        }
        Ok(())
    }

    /// Checkpoint location for episode `episode` of `agent`, if one is due.
    pub fn checkpoint_path(&self, agent: &str, episode: usize) -> Option<PathBuf> {
        if episode % self.checkpoint_every != 0 {
            return None;
        }
        self.checkpoint_dir
            .as_ref()
            .map(|dir| dir.join(format!("{agent}_ep{episode}.postcard")))
    }
}
