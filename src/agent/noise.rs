use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Parameters of a mean-reverting Ornstein-Uhlenbeck exploration process.
///
/// The volatility decays linearly from `max_sigma` to `min_sigma` over
/// `decay_period` time steps and stays at `min_sigma` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OuNoiseConfig {
    pub mu: f64,
    pub theta: f64,
    pub max_sigma: f64,
    pub min_sigma: f64,
    pub decay_period: usize,
}

impl Default for OuNoiseConfig {
    fn default() -> Self {
        Self {
            mu: 0.0,
            theta: 0.15,
            max_sigma: 0.3,
            min_sigma: 0.3,
            decay_period: 100_000,
        }
    }
}

/// Temporally correlated noise added to continuous actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OuNoise {
    config: OuNoiseConfig,
    state: Array1<f64>,
}

impl OuNoise {
    pub fn new(dim: usize, config: OuNoiseConfig) -> Self {
        Self {
            state: Array1::from_elem(dim, config.mu),
            config,
        }
    }

    pub fn reset(&mut self) {
        self.state.fill(self.config.mu);
    }

    pub fn sigma(&self, t: usize) -> f64 {
        let OuNoiseConfig {
            max_sigma,
            min_sigma,
            decay_period,
            ..
        } = self.config;
        let progress = if decay_period == 0 {
            1.0
        } else {
            (t as f64 / decay_period as f64).min(1.0)
        };
        max_sigma - (max_sigma - min_sigma) * progress
    }

    /// Advances the process one step and returns the new state.
    pub fn sample<R: Rng>(&mut self, t: usize, rng: &mut R) -> Array1<f64> {
        let sigma = self.sigma(t);
        let OuNoiseConfig { mu, theta, .. } = self.config;
        self.state.mapv_inplace(|x| {
            let shock: f64 = StandardNormal.sample(&mut *rng);
            x + theta * (mu - x) + sigma * shock
        });
        self.state.clone()
    }
}
