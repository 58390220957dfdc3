//! Function approximators shared by the learning agents.
//!
//! Networks are burn modules trained on an autodiff CPU backend; target
//! copies and inference run on the inner backend.

use burn::{
    backend::{Autodiff, NdArray},
    module::{AutodiffModule, Param},
    nn::{Linear, LinearConfig, Relu},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{ElementConversion, TensorData, activation::softmax, backend::AutodiffBackend},
};
use ndarray::ArrayView1;

use crate::error::{AgentError, TraderResult};

/// Backend the agents train on.
pub type LearnerBackend = Autodiff<NdArray>;

/// Gradient-free backend of target networks and inference.
pub type InferenceBackend = <LearnerBackend as AutodiffBackend>::InnerBackend;

pub type LearnerDevice = <LearnerBackend as Backend>::Device;

// ================================================================================================
// Q-Network
// ================================================================================================

/// Q-network configuration
#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub state_dim: usize,
    pub action_dim: usize,
    #[config(default = "64")]
    pub hidden_dim: usize,
}

/// One action value per discrete action.
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    fc_hidden: Linear<B>,
    q_head: Linear<B>,
    activation: Relu,
}

impl QNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        QNetwork {
            fc_hidden: LinearConfig::new(self.state_dim, self.hidden_dim).init(device),
            q_head: LinearConfig::new(self.hidden_dim, self.action_dim).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// `[batch, state_dim]` -> `[batch, action_dim]`
    pub fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = self.activation.forward(self.fc_hidden.forward(state));
        self.q_head.forward(hidden)
    }
}

// ================================================================================================
// Actor
// ================================================================================================

/// Actor network configuration
#[derive(Config, Debug)]
pub struct ActorConfig {
    pub state_dim: usize,
    pub action_dim: usize,
    #[config(default = "64")]
    pub hidden_dim: usize,
}

/// Deterministic policy: a probability vector over the discrete actions.
#[derive(Module, Debug)]
pub struct Actor<B: Backend> {
    fc_hidden: Linear<B>,
    action_head: Linear<B>,
    activation: Relu,
}

impl ActorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Actor<B> {
        Actor {
            fc_hidden: LinearConfig::new(self.state_dim, self.hidden_dim).init(device),
            action_head: LinearConfig::new(self.hidden_dim, self.action_dim).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Actor<B> {
    /// Softmax over the action logits.
    pub fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let hidden = self.activation.forward(self.fc_hidden.forward(state));
        softmax(self.action_head.forward(hidden), 1)
    }

    /// Polyak step `θ ← τ θ_source + (1 - τ) θ`.
    pub fn soft_update(self, source: &Self, tau: f64) -> Self {
        Self {
            fc_hidden: blend(self.fc_hidden, &source.fc_hidden, tau),
            action_head: blend(self.action_head, &source.action_head, tau),
            activation: self.activation,
        }
    }
}

// ================================================================================================
// Critic
// ================================================================================================

/// Critic network configuration
#[derive(Config, Debug)]
pub struct CriticConfig {
    pub state_dim: usize,
    pub action_dim: usize,
    #[config(default = "64")]
    pub hidden_dim: usize,
}

/// Scores a `(state, action vector)` pair.
#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    fc_hidden: Linear<B>,
    q_head: Linear<B>,
    activation: Relu,
}

impl CriticConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Critic<B> {
        Critic {
            fc_hidden: LinearConfig::new(self.state_dim + self.action_dim, self.hidden_dim)
                .init(device),
            q_head: LinearConfig::new(self.hidden_dim, 1).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Critic<B> {
    /// `[batch, state_dim] x [batch, action_dim]` -> `[batch, 1]`
    pub fn forward(&self, state: Tensor<B, 2>, action: Tensor<B, 2>) -> Tensor<B, 2> {
        let combined = Tensor::cat(vec![state, action], 1);
        let hidden = self.activation.forward(self.fc_hidden.forward(combined));
        self.q_head.forward(hidden)
    }

    pub fn soft_update(self, source: &Self, tau: f64) -> Self {
        Self {
            fc_hidden: blend(self.fc_hidden, &source.fc_hidden, tau),
            q_head: blend(self.q_head, &source.q_head, tau),
            activation: self.activation,
        }
    }
}

fn blend<B: Backend>(target: Linear<B>, source: &Linear<B>, tau: f64) -> Linear<B> {
    let weight = mix(target.weight.val(), source.weight.val(), tau);
    let bias = match (target.bias, &source.bias) {
        (Some(t), Some(s)) => Some(Param::from_tensor(mix(t.val(), s.val(), tau))),
        (bias, _) => bias,
    };
    Linear {
        weight: Param::from_tensor(weight),
        bias,
    }
}

fn mix<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    source: Tensor<B, D>,
    tau: f64,
) -> Tensor<B, D> {
    source.mul_scalar(tau) + target.mul_scalar(1.0 - tau)
}

// ================================================================================================
// Optimisation
// ================================================================================================

/// A burn optimizer bound to one network type of the learner backend.
pub trait NetworkOptimizer<M>: Send {
    fn step(&mut self, learning_rate: f64, network: M, grads: GradientsParams) -> M;
}

impl<M, O> NetworkOptimizer<M> for O
where
    M: AutodiffModule<LearnerBackend>,
    O: Optimizer<M, LearnerBackend>,
{
    fn step(&mut self, learning_rate: f64, network: M, grads: GradientsParams) -> M {
        <O as Optimizer<M, LearnerBackend>>::step(self, learning_rate, network, grads)
    }
}

pub fn adam<M>() -> Box<dyn NetworkOptimizer<M>>
where
    M: AutodiffModule<LearnerBackend> + 'static,
{
    Box::new(AdamConfig::new().init::<LearnerBackend, M>())
}

/// Mean Huber loss of `error` with threshold `delta`.
pub fn huber_loss<B: Backend>(error: Tensor<B, 2>, delta: f64) -> Tensor<B, 1> {
    let abs = error.abs();
    let quadratic = abs.clone().clamp_max(delta);
    let linear = abs - quadratic.clone();
    ((quadratic.clone() * quadratic).mul_scalar(0.5) + linear.mul_scalar(delta)).mean()
}

// ================================================================================================
// Tensor Conversion
// ================================================================================================

/// Stacks equally long rows into a `[rows, width]` tensor.
pub fn rows_tensor<'a, B: Backend>(
    rows: impl IntoIterator<Item = ArrayView1<'a, f64>>,
    width: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut values = Vec::new();
    let mut count = 0;
    for row in rows {
        values.extend(row.iter().map(|v| *v as f32));
        count += 1;
    }
    Tensor::from_data(TensorData::new(values, [count, width]), device)
}

/// `[values.len(), 1]` column tensor.
pub fn column_tensor<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = values.iter().map(|v| *v as f32).collect();
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len, 1]), device)
}

pub fn to_f64s<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> TraderResult<Vec<f64>> {
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| AgentError::Network(format!("Failed to read tensor: {err:?}")))?;
    Ok(values.into_iter().map(f64::from).collect())
}

pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

// ================================================================================================
// Records
// ================================================================================================

/// Serialises the parameters of `network`.
pub fn encode_network<B: Backend, M: Module<B>>(network: M) -> TraderResult<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Recorder::<B>::record(&recorder, network.into_record(), ())
        .map_err(|err| AgentError::Network(format!("Failed to record network: {err:?}")).into())
}

/// Loads parameters written by [`encode_network`] into `network`.
pub fn decode_network<B: Backend, M: Module<B>>(
    network: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> TraderResult<M> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = Recorder::<B>::load::<M::Record>(&recorder, bytes, device)
        .map_err(|err| AgentError::Network(format!("Failed to load network: {err:?}")))?;
    Ok(network.load_record(record))
}
