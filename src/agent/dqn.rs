use std::{fmt, path::Path};

use burn::{module::AutodiffModule, optim::GradientsParams, prelude::*, tensor::TensorData};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use strum::EnumCount;

use crate::{
    agent::{
        Agent, AgentKind,
        memory::{ReplayMemory, Transition},
        network::{
            InferenceBackend, LearnerBackend, LearnerDevice, NetworkOptimizer, QNetwork,
            QNetworkConfig, adam, column_tensor, decode_network, encode_network, huber_loss,
            rows_tensor, scalar, to_f64s,
        },
        read_checkpoint, write_checkpoint,
    },
    data::domain::Cash,
    error::{AgentError, TraderResult},
    gym::trading::{
        action::{ActionKind, ActionScores, Decision},
        ledger::Account,
        observation::Observation,
    },
};

/// Hyper-parameters of [`DqnAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Discount factor applied to the bootstrapped next-state value.
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay applied after every replay.
    pub epsilon_decay: f64,
    pub learning_rate: f64,
    /// Minibatch size, also the replay threshold.
    pub batch_size: usize,
    pub memory_capacity: usize,
    /// Huber threshold on the temporal-difference error.
    pub td_error_clip: f64,
    /// Width of the Q-network's hidden layer.
    pub hidden_dim: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 0.001,
            batch_size: 60,
            memory_capacity: 1000,
            td_error_clip: 1.0,
            hidden_dim: 64,
        }
    }
}

impl DqnConfig {
    pub fn validate(&self) -> TraderResult<()> {
        let err = |msg: &str| Err(AgentError::InvalidConfig(format!("DQN: {msg}")).into());

        if !(0.0..=1.0).contains(&self.gamma) {
            return err("gamma must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) || !(0.0..=1.0).contains(&self.epsilon_min) {
            return err("epsilon bounds must lie in [0, 1]");
        }
        if self.batch_size == 0 || self.hidden_dim == 0 {
            return err("batch_size and hidden_dim must be positive");
        }
        if self.memory_capacity <= self.batch_size {
            return err("memory_capacity must exceed batch_size");
        }
        if self.learning_rate <= 0.0 || self.td_error_clip <= 0.0 {
            return err("learning_rate and td_error_clip must be positive");
        }
        Ok(())
    }
}

/// Learned state of a [`DqnAgent`], as written to a checkpoint.
#[derive(Serialize, Deserialize)]
struct DqnCheckpoint {
    config: DqnConfig,
    state_dim: usize,
    epsilon: f64,
    q_network: Vec<u8>,
}

/// Discrete-action agent: a Q-network trained from replayed transitions,
/// acting epsilon-greedily.
pub struct DqnAgent {
    config: DqnConfig,
    state_dim: usize,
    q_network: QNetwork<LearnerBackend>,
    optimizer: Box<dyn NetworkOptimizer<QNetwork<LearnerBackend>>>,
    epsilon: f64,
    memory: ReplayMemory,
    account: Account,
    rng: StdRng,
    device: LearnerDevice,
    is_eval: bool,
}

impl fmt::Debug for DqnAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DqnAgent")
            .field("config", &self.config)
            .field("state_dim", &self.state_dim)
            .field("epsilon", &self.epsilon)
            .field("memory", &self.memory.len())
            .field("account", &self.account)
            .field("is_eval", &self.is_eval)
            .finish_non_exhaustive()
    }
}

impl DqnAgent {
    pub fn new(
        state_dim: usize,
        initial_funding: Cash,
        config: DqnConfig,
        seed: Option<u64>,
    ) -> TraderResult<Self> {
        config.validate()?;
        let rng = seeded_rng(seed);
        let device = LearnerDevice::default();
        let q_network = QNetworkConfig::new(state_dim, ActionKind::COUNT)
            .with_hidden_dim(config.hidden_dim)
            .init(&device);

        Ok(Self {
            config,
            state_dim,
            q_network,
            optimizer: adam(),
            epsilon: config.epsilon_start,
            memory: ReplayMemory::with_capacity(config.memory_capacity),
            account: Account::new(initial_funding),
            rng,
            device,
            is_eval: false,
        })
    }

    /// Restores learned parameters from a checkpoint written by [`Agent::save`].
    pub fn load(path: &Path, initial_funding: Cash, seed: Option<u64>) -> TraderResult<Self> {
        let checkpoint: DqnCheckpoint = read_checkpoint(path)?;
        let mut agent = Self::new(checkpoint.state_dim, initial_funding, checkpoint.config, seed)?;
        agent.q_network = decode_network::<LearnerBackend, _>(
            agent.q_network,
            checkpoint.q_network,
            &agent.device,
        )?;
        agent.epsilon = checkpoint.epsilon;
        Ok(agent)
    }

    /// Disables exploration: every decision is greedy.
    pub fn with_eval_mode(self, is_eval: bool) -> Self {
        Self { is_eval, ..self }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Action values for `state`.
    pub fn predict(&self, state: &Observation) -> TraderResult<ActionScores> {
        self.check_dim(state)?;
        let input = rows_tensor::<InferenceBackend>([state.view()], self.state_dim, &self.device);
        let q = to_f64s(self.q_network.valid().forward(input))?;
        ActionScores::try_from(q.as_slice())
    }

    fn check_dim(&self, state: &Observation) -> TraderResult<()> {
        if state.dim() != self.state_dim {
            return Err(AgentError::InvalidInput(format!(
                "DQN expects observations of length {}, got {}",
                self.state_dim,
                state.dim()
            ))
            .into());
        }
        Ok(())
    }

    /// `r` for terminal transitions, `r + γ max_a Q(s', a)` otherwise.
    fn td_targets(&self, batch: &[Transition]) -> TraderResult<Vec<f64>> {
        let next_states = rows_tensor::<InferenceBackend>(
            batch.iter().map(|t| t.next_state.view()),
            self.state_dim,
            &self.device,
        );
        let best_next = to_f64s(self.q_network.valid().forward(next_states).max_dim(1))?;

        Ok(batch
            .iter()
            .zip(best_next)
            .map(|(t, next)| match t.done {
                true => t.reward.0,
                false => t.reward.0 + self.config.gamma * next,
            })
            .collect())
    }

    /// `[batch, actions]` mask selecting the taken action of every row.
    fn action_mask(&self, batch: &[Transition]) -> Tensor<LearnerBackend, 2> {
        let mut mask = vec![0.0_f32; batch.len() * ActionKind::COUNT];
        for (row, transition) in batch.iter().enumerate() {
            mask[row * ActionKind::COUNT + transition.decision.action.index()] = 1.0;
        }
        Tensor::from_data(
            TensorData::new(mask, [batch.len(), ActionKind::COUNT]),
            &self.device,
        )
    }
}

impl Agent for DqnAgent {
    fn identifier(&self) -> &str {
        AgentKind::Dqn.as_str()
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    fn decide(&mut self, state: &Observation, _t: usize) -> TraderResult<Decision> {
        let scores = self.predict(state)?;

        if !self.is_eval && self.rng.random::<f64>() <= self.epsilon {
            let action = ActionKind::from_index(self.rng.random_range(0..ActionKind::COUNT))?;
            return Ok(Decision { action, scores });
        }

        Ok(Decision::greedy(scores))
    }

    fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    #[tracing::instrument(skip(self), fields(agent = "DQN", epsilon = self.epsilon))]
    fn experience_replay(&mut self, update_index: u64) -> TraderResult<f64> {
        let DqnConfig {
            batch_size,
            learning_rate,
            td_error_clip,
            epsilon_min,
            epsilon_decay,
            ..
        } = self.config;

        let batch: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, batch_size)
            .into_iter()
            .cloned()
            .collect();
        if batch.is_empty() {
            return Err(AgentError::Replay("replay memory is empty".to_string()).into());
        }

        let targets = column_tensor::<LearnerBackend>(&self.td_targets(&batch)?, &self.device);
        let states = rows_tensor::<LearnerBackend>(
            batch.iter().map(|t| t.state.view()),
            self.state_dim,
            &self.device,
        );
        let taken = (self.q_network.forward(states) * self.action_mask(&batch)).sum_dim(1);
        let loss = huber_loss(taken - targets, td_error_clip);

        let grads = loss.backward();
        let loss = scalar(loss);
        if !loss.is_finite() {
            let msg = format!("non-finite loss at update {update_index}");
            return Err(AgentError::Replay(msg).into());
        }

        let grads = GradientsParams::from_grads(grads, &self.q_network);
        self.q_network = self
            .optimizer
            .step(learning_rate, self.q_network.clone(), grads);

        if self.epsilon > epsilon_min {
            self.epsilon = (self.epsilon * epsilon_decay).max(epsilon_min);
        }

        tracing::trace!(loss, "Replay Step Complete");
        Ok(loss)
    }

    fn save(&self, path: &Path) -> TraderResult<()> {
        let checkpoint = DqnCheckpoint {
            config: self.config,
            state_dim: self.state_dim,
            epsilon: self.epsilon,
            q_network: encode_network::<LearnerBackend, _>(self.q_network.clone())?,
        };
        write_checkpoint(path, &checkpoint)
    }
}

/// Seeds both the sampling generator and the weight initialisation.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            LearnerBackend::seed(seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::domain::Price, gym::Reward};

    const DIM: usize = 4;

    fn agent(config: DqnConfig) -> DqnAgent {
        DqnAgent::new(DIM, Cash(1000.0), config, Some(42)).unwrap()
    }

    fn obs(v: f64) -> Observation {
        Observation::from(vec![v; DIM])
    }

    fn transition(action: ActionKind, reward: f64, done: bool) -> Transition {
        Transition {
            state: obs(0.5),
            decision: Decision {
                action,
                scores: ActionScores::default(),
            },
            reward: Reward(reward),
            next_state: obs(0.25),
            done,
        }
    }

    fn small_config() -> DqnConfig {
        DqnConfig {
            batch_size: 4,
            memory_capacity: 16,
            learning_rate: 0.01,
            hidden_dim: 8,
            ..Default::default()
        }
    }

    #[test]
    fn greedy_decisions_follow_predicted_scores() {
        let mut agent = agent(DqnConfig::default()).with_eval_mode(true);
        let state = obs(1.0);
        let scores = agent.predict(&state).unwrap();
        let decision = agent.decide(&state, 1).unwrap();
        assert_eq!(decision, Decision::greedy(scores));
    }

    #[test]
    fn rejects_mismatched_observation() {
        let mut agent = agent(DqnConfig::default());
        assert!(agent.decide(&Observation::from(vec![1.0; DIM + 1]), 1).is_err());
    }

    #[test]
    fn replay_moves_value_toward_target_and_decays_epsilon() {
        let mut agent = agent(small_config());
        for _ in 0..8 {
            agent.remember(transition(ActionKind::Buy, 1.0, true));
        }

        let before = agent.predict(&obs(0.5)).unwrap().get(ActionKind::Buy);
        for update in 1..=25 {
            let loss = agent.experience_replay(update).unwrap();
            assert!(loss >= 0.0);
        }
        let after = agent.predict(&obs(0.5)).unwrap().get(ActionKind::Buy);

        assert!((after - 1.0).abs() < (before - 1.0).abs());
        assert!((agent.epsilon() - 0.995_f64.powi(25)).abs() < 1e-9);
    }

    #[test]
    fn epsilon_never_drops_below_floor() {
        let config = DqnConfig {
            batch_size: 1,
            memory_capacity: 4,
            epsilon_start: 0.011,
            epsilon_decay: 0.5,
            ..small_config()
        };
        let mut agent = agent(config);
        agent.remember(transition(ActionKind::Hold, 0.0, false));
        agent.experience_replay(1).unwrap();
        agent.experience_replay(2).unwrap();
        assert_eq!(agent.epsilon(), config.epsilon_min);
    }

    #[test]
    fn replay_on_empty_memory_fails() {
        let mut agent = agent(DqnConfig::default());
        assert!(agent.experience_replay(1).is_err());
    }

    #[test]
    fn reset_keeps_learned_parameters() {
        let mut agent = agent(small_config());
        for _ in 0..4 {
            agent.remember(transition(ActionKind::Sell, 5.0, true));
        }
        agent.experience_replay(1).unwrap();

        let learned = agent.predict(&obs(0.5)).unwrap();
        agent.account_mut().debit_lot(Price(10.0));
        agent.reset(Cash(1000.0));

        assert_eq!(agent.account().balance(), Cash(1000.0));
        assert!(agent.account().inventory().is_empty());
        assert_eq!(agent.predict(&obs(0.5)).unwrap(), learned);
    }

    #[test]
    fn checkpoint_round_trips_parameters() {
        let mut agent = agent(small_config());
        for _ in 0..4 {
            agent.remember(transition(ActionKind::Buy, 1.0, true));
        }
        agent.experience_replay(1).unwrap();

        let path = std::env::temp_dir().join(format!(
            "replay_trader_dqn_{}/DQN_ep5.postcard",
            std::process::id()
        ));
        agent.save(&path).unwrap();
        let restored = DqnAgent::load(&path, Cash(500.0), Some(1)).unwrap();

        assert_eq!(
            restored.predict(&obs(0.3)).unwrap(),
            agent.predict(&obs(0.3)).unwrap()
        );
        assert_eq!(restored.epsilon(), agent.epsilon());
        assert_eq!(restored.config(), agent.config());
        assert_eq!(restored.account().balance(), Cash(500.0));

        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DqnConfig {
            memory_capacity: 10,
            batch_size: 10,
            ..Default::default()
        };
        assert!(DqnAgent::new(DIM, Cash(1.0), config, None).is_err());
    }
}
