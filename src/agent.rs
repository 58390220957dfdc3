pub mod ddpg;
pub mod dqn;
pub mod memory;
pub mod network;
pub mod noise;

use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    agent::{ddpg::DdpgAgent, dqn::DqnAgent, memory::Transition},
    data::domain::Cash,
    error::{AgentError, IoError, TraderResult},
    gym::trading::{action::Decision, ledger::Account, observation::Observation},
};

// ============================================================================
//  Agent Selection
// ============================================================================

/// The learning-agent variants that can be selected by name at startup.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum AgentKind {
    /// Discrete-action value learner with epsilon-greedy exploration.
    #[strum(serialize = "DQN")]
    Dqn,

    /// Continuous-action actor-critic with Ornstein-Uhlenbeck exploration.
    #[strum(serialize = "DDPG")]
    Ddpg,
}

impl AgentKind {
    /// Resolves a model name, failing before any episode runs.
    pub fn parse(name: &str) -> TraderResult<Self> {
        Self::from_str(name).map_err(|_| AgentError::UnknownKind(name.to_string()).into())
    }

    /// Builds a freshly initialised agent of this kind.
    ///
    /// `seed` pins every random draw of the agent (initial weights,
    /// exploration, minibatch sampling); `None` seeds from the OS.
    pub fn build(
        self,
        state_dim: usize,
        initial_funding: Cash,
        seed: Option<u64>,
    ) -> TraderResult<Box<dyn Agent>> {
        let agent: Box<dyn Agent> = match self {
            AgentKind::Dqn => Box::new(DqnAgent::new(
                state_dim,
                initial_funding,
                Default::default(),
                seed,
            )?),
            AgentKind::Ddpg => Box::new(DdpgAgent::new(
                state_dim,
                initial_funding,
                Default::default(),
                seed,
            )?),
        };
        Ok(agent)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

// ============================================================================
//  Core Agent Definition
// ============================================================================

/// Capabilities the training loop needs from a learning agent.
///
/// The trainer drives every call; it never inspects which variant it holds.
/// Trading state lives in the agent's [`Account`]; learned parameters are
/// private to the implementation and survive [`Agent::reset`].
pub trait Agent {
    /// Name used in logs and checkpoint file names.
    fn identifier(&self) -> &str;

    fn account(&self) -> &Account;

    fn account_mut(&mut self) -> &mut Account;

    /// Restores trading state for a new episode. Learned parameters are kept.
    fn reset(&mut self, initial_funding: Cash) {
        self.account_mut().reset(initial_funding);
    }

    /// Chooses an action for `state`, observed at time index `t`.
    fn decide(&mut self, state: &Observation, t: usize) -> TraderResult<Decision>;

    /// Appends a transition to replay memory.
    fn remember(&mut self, transition: Transition);

    fn memory_len(&self) -> usize;

    /// Replay threshold: updates start once memory holds more transitions.
    fn batch_size(&self) -> usize;

    /// Performs one learning update and returns its loss.
    ///
    /// `update_index` counts updates across the whole run, starting at 1.
    fn experience_replay(&mut self, update_index: u64) -> TraderResult<f64>;

    /// Persists learned parameters to `path`.
    fn save(&self, path: &Path) -> TraderResult<()>;
}

impl Agent for Box<dyn Agent> {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn account(&self) -> &Account {
        (**self).account()
    }

    fn account_mut(&mut self) -> &mut Account {
        (**self).account_mut()
    }

    fn reset(&mut self, initial_funding: Cash) {
        (**self).reset(initial_funding)
    }

    fn decide(&mut self, state: &Observation, t: usize) -> TraderResult<Decision> {
        (**self).decide(state, t)
    }

    fn remember(&mut self, transition: Transition) {
        (**self).remember(transition)
    }

    fn memory_len(&self) -> usize {
        (**self).memory_len()
    }

    fn batch_size(&self) -> usize {
        (**self).batch_size()
    }

    fn experience_replay(&mut self, update_index: u64) -> TraderResult<f64> {
        (**self).experience_replay(update_index)
    }

    fn save(&self, path: &Path) -> TraderResult<()> {
        (**self).save(path)
    }
}

// ============================================================================
//  Checkpoint I/O
// ============================================================================

pub(crate) fn write_checkpoint<T: Serialize>(path: &Path, value: &T) -> TraderResult<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::FileSystem(format!(
                "Failed to create checkpoint directory '{}': {e}",
                dir.display()
            ))
        })?;
    }

    let bytes = postcard::to_allocvec(value).map_err(IoError::from)?;
    fs::write(path, bytes).map_err(IoError::from)?;
    Ok(())
}

pub(crate) fn read_checkpoint<T: for<'de> Deserialize<'de>>(path: &Path) -> TraderResult<T> {
    let bytes = fs::read(path).map_err(IoError::from)?;
    let value = postcard::from_bytes(&bytes).map_err(IoError::from)?;
    Ok(value)
}
