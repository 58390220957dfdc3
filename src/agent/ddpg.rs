use std::{fmt, path::Path};

use burn::{module::AutodiffModule, optim::GradientsParams, prelude::*};
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use strum::EnumCount;

use crate::{
    agent::{
        Agent, AgentKind,
        dqn::seeded_rng,
        memory::{ReplayMemory, Transition},
        network::{
            Actor, ActorConfig, Critic, CriticConfig, InferenceBackend, LearnerBackend,
            LearnerDevice, NetworkOptimizer, adam, column_tensor, decode_network,
            encode_network, huber_loss, rows_tensor, scalar, to_f64s,
        },
        noise::{OuNoise, OuNoiseConfig},
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

/// Hyper-parameters of [`DdpgAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DdpgConfig {
    pub gamma: f64,
    /// Polyak factor for the target networks.
    pub tau: f64,
    pub actor_learning_rate: f64,
    pub critic_learning_rate: f64,
    pub batch_size: usize,
    pub memory_capacity: usize,
    pub td_error_clip: f64,
    /// Width of the actor's and the critic's hidden layer.
    pub hidden_dim: usize,
    pub noise: OuNoiseConfig,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            tau: 0.001,
            actor_learning_rate: 1e-4,
            critic_learning_rate: 1e-3,
            batch_size: 90,
            memory_capacity: 10_000,
            td_error_clip: 1.0,
            hidden_dim: 64,
            noise: OuNoiseConfig::default(),
        }
    }
}

impl DdpgConfig {
    pub fn validate(&self) -> TraderResult<()> {
        let err = |msg: &str| Err(AgentError::InvalidConfig(format!("DDPG: {msg}")).into());

        if !(0.0..=1.0).contains(&self.gamma) || !(0.0..=1.0).contains(&self.tau) {
            return err("gamma and tau must lie in [0, 1]");
        }
        if self.batch_size == 0 || self.hidden_dim == 0 {
            return err("batch_size and hidden_dim must be positive");
        }
        if self.memory_capacity <= self.batch_size {
            return err("memory_capacity must exceed batch_size");
        }
        if self.actor_learning_rate <= 0.0
            || self.critic_learning_rate <= 0.0
            || self.td_error_clip <= 0.0
        {
            return err("learning rates and td_error_clip must be positive");
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct DdpgCheckpoint {
    config: DdpgConfig,
    state_dim: usize,
    actor: Vec<u8>,
    critic: Vec<u8>,
    target_actor: Vec<u8>,
    target_critic: Vec<u8>,
}

/// Continuous-action actor-critic.
///
/// The actor maps a state to a probability vector over the three actions;
/// the critic scores `(state, action vector)` pairs. Exploration adds
/// Ornstein-Uhlenbeck noise to the actor output, and the discrete action is
/// the arg-max of the noisy vector.
pub struct DdpgAgent {
    config: DdpgConfig,
    state_dim: usize,
    actor: Actor<LearnerBackend>,
    critic: Critic<LearnerBackend>,
    target_actor: Actor<InferenceBackend>,
    target_critic: Critic<InferenceBackend>,
    actor_optimizer: Box<dyn NetworkOptimizer<Actor<LearnerBackend>>>,
    critic_optimizer: Box<dyn NetworkOptimizer<Critic<LearnerBackend>>>,
    memory: ReplayMemory,
    noise: OuNoise,
    account: Account,
    rng: StdRng,
    device: LearnerDevice,
    is_eval: bool,
}

impl fmt::Debug for DdpgAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpgAgent")
            .field("config", &self.config)
            .field("state_dim", &self.state_dim)
            .field("memory", &self.memory.len())
            .field("account", &self.account)
            .field("is_eval", &self.is_eval)
            .finish_non_exhaustive()
    }
}

impl DdpgAgent {
    pub fn new(
        state_dim: usize,
        initial_funding: Cash,
        config: DdpgConfig,
        seed: Option<u64>,
    ) -> TraderResult<Self> {
        config.validate()?;
        let rng = seeded_rng(seed);
        let device = LearnerDevice::default();
        let actor = ActorConfig::new(state_dim, ActionKind::COUNT)
            .with_hidden_dim(config.hidden_dim)
            .init::<LearnerBackend>(&device);
        let critic = CriticConfig::new(state_dim, ActionKind::COUNT)
            .with_hidden_dim(config.hidden_dim)
            .init::<LearnerBackend>(&device);

        Ok(Self {
            config,
            state_dim,
            target_actor: actor.valid(),
            target_critic: critic.valid(),
            actor,
            critic,
            actor_optimizer: adam(),
            critic_optimizer: adam(),
            memory: ReplayMemory::with_capacity(config.memory_capacity),
            noise: OuNoise::new(ActionKind::COUNT, config.noise),
            account: Account::new(initial_funding),
            rng,
            device,
            is_eval: false,
        })
    }

    pub fn load(path: &Path, initial_funding: Cash, seed: Option<u64>) -> TraderResult<Self> {
        let checkpoint: DdpgCheckpoint = read_checkpoint(path)?;
        let mut agent = Self::new(checkpoint.state_dim, initial_funding, checkpoint.config, seed)?;
        let device = LearnerDevice::default();

        agent.actor = decode_network::<LearnerBackend, _>(agent.actor, checkpoint.actor, &device)?;
        agent.critic =
            decode_network::<LearnerBackend, _>(agent.critic, checkpoint.critic, &device)?;
        agent.target_actor = decode_network::<InferenceBackend, _>(
            agent.target_actor,
            checkpoint.target_actor,
            &device,
        )?;
        agent.target_critic = decode_network::<InferenceBackend, _>(
            agent.target_critic,
            checkpoint.target_critic,
            &device,
        )?;
        Ok(agent)
    }

    /// Disables exploration noise.
    pub fn with_eval_mode(self, is_eval: bool) -> Self {
        Self { is_eval, ..self }
    }

    pub fn config(&self) -> &DdpgConfig {
        &self.config
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Noise-free action probabilities for `state`.
    pub fn policy(&self, state: &Observation) -> TraderResult<Array1<f64>> {
        self.check_dim(state)?;
        let input = rows_tensor::<InferenceBackend>([state.view()], self.state_dim, &self.device);
        Ok(Array1::from(to_f64s(self.actor.valid().forward(input))?))
    }

    /// Critic estimate `Q(state, action)`.
    pub fn value(&self, state: &Observation, action: &ActionScores) -> TraderResult<f64> {
        self.check_dim(state)?;
        let state = rows_tensor::<InferenceBackend>([state.view()], self.state_dim, &self.device);
        let action = rows_tensor::<InferenceBackend>(
            [ArrayView1::from(action.as_slice())],
            ActionKind::COUNT,
            &self.device,
        );
        let q = to_f64s(self.critic.valid().forward(state, action))?;
        q.first()
            .copied()
            .ok_or_else(|| AgentError::Network("critic produced no value".to_string()).into())
    }

    fn check_dim(&self, state: &Observation) -> TraderResult<()> {
        if state.dim() != self.state_dim {
            return Err(AgentError::InvalidInput(format!(
                "DDPG expects observations of length {}, got {}",
                self.state_dim,
                state.dim()
            ))
            .into());
        }
        Ok(())
    }

    fn states<B>(&self, batch: &[Transition], next: bool) -> Tensor<B, 2>
    where
        B: Backend<Device = LearnerDevice>,
    {
        let rows = batch.iter().map(|t| match next {
            true => t.next_state.view(),
            false => t.state.view(),
        });
        rows_tensor::<B>(rows, self.state_dim, &self.device)
    }

    /// Critic update on one minibatch; returns the mean Huber loss.
    ///
    /// Targets bootstrap from the target networks:
    /// `r + γ Q'(s', μ'(s'))`, or `r` for terminal transitions.
    fn train_critic(&mut self, batch: &[Transition]) -> TraderResult<f64> {
        let DdpgConfig {
            gamma,
            critic_learning_rate,
            td_error_clip,
            ..
        } = self.config;

        let next_states = self.states::<InferenceBackend>(batch, true);
        let next_actions = self.target_actor.forward(next_states.clone());
        let next_q = to_f64s(self.target_critic.forward(next_states, next_actions))?;
        let targets: Vec<f64> = batch
            .iter()
            .zip(next_q)
            .map(|(t, next)| match t.done {
                true => t.reward.0,
                false => t.reward.0 + gamma * next,
            })
            .collect();

        let actions = rows_tensor::<LearnerBackend>(
            batch
                .iter()
                .map(|t| ArrayView1::from(t.decision.scores.as_slice())),
            ActionKind::COUNT,
            &self.device,
        );
        let q = self
            .critic
            .forward(self.states::<LearnerBackend>(batch, false), actions);
        let loss = huber_loss(q - column_tensor(&targets, &self.device), td_error_clip);

        let grads = loss.backward();
        let loss = scalar(loss);
        if !loss.is_finite() {
            return Ok(loss);
        }

        let grads = GradientsParams::from_grads(grads, &self.critic);
        self.critic = self
            .critic_optimizer
            .step(critic_learning_rate, self.critic.clone(), grads);
        Ok(loss)
    }

    /// Deterministic policy-gradient ascent on `Q(s, μ(s))`.
    fn train_actor(&mut self, batch: &[Transition]) {
        let states = self.states::<LearnerBackend>(batch, false);
        let actions = self.actor.forward(states.clone());
        let objective = self.critic.forward(states, actions).mean().mul_scalar(-1.0);

        let grads = GradientsParams::from_grads(objective.backward(), &self.actor);
        self.actor = self.actor_optimizer.step(
            self.config.actor_learning_rate,
            self.actor.clone(),
            grads,
        );
    }

    fn track_targets(&mut self) {
        let tau = self.config.tau;
        self.target_actor = self
            .target_actor
            .clone()
            .soft_update(&self.actor.valid(), tau);
        self.target_critic = self
            .target_critic
            .clone()
            .soft_update(&self.critic.valid(), tau);
    }
}

impl Agent for DdpgAgent {
    fn identifier(&self) -> &str {
        AgentKind::Ddpg.as_str()
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    fn reset(&mut self, initial_funding: Cash) {
        self.account.reset(initial_funding);
        self.noise.reset();
    }

    fn decide(&mut self, state: &Observation, t: usize) -> TraderResult<Decision> {
        let mut action = self.policy(state)?;
        if !self.is_eval {
            action += &self.noise.sample(t, &mut self.rng);
        }
        let scores = ActionScores::try_from(action.to_vec().as_slice())?;
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

    #[tracing::instrument(skip(self), fields(agent = "DDPG"))]
    fn experience_replay(&mut self, update_index: u64) -> TraderResult<f64> {
        let batch: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, self.config.batch_size)
            .into_iter()
            .cloned()
            .collect();
        if batch.is_empty() {
            return Err(AgentError::Replay("replay memory is empty".to_string()).into());
        }

        let loss = self.train_critic(&batch)?;
        if !loss.is_finite() {
            let msg = format!("non-finite loss at update {update_index}");
            return Err(AgentError::Replay(msg).into());
        }
        self.train_actor(&batch);
        self.track_targets();

        tracing::trace!(loss, "Replay Step Complete");
        Ok(loss)
    }

    fn save(&self, path: &Path) -> TraderResult<()> {
        let checkpoint = DdpgCheckpoint {
            config: self.config,
            state_dim: self.state_dim,
            actor: encode_network::<LearnerBackend, _>(self.actor.clone())?,
            critic: encode_network::<LearnerBackend, _>(self.critic.clone())?,
            target_actor: encode_network::<InferenceBackend, _>(self.target_actor.clone())?,
            target_critic: encode_network::<InferenceBackend, _>(self.target_critic.clone())?,
        };
        write_checkpoint(path, &checkpoint)
    }
}
