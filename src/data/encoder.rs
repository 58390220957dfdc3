use ndarray::Array1;

use crate::{
    data::{
        domain::{Cash, Price},
        series::PriceSeries,
    },
    error::{SystemError, TraderResult},
    gym::trading::observation::Observation,
};

/// Number of account features appended after the price window.
pub const PORTFOLIO_FEATURES: usize = 3;

/// Offset keeping `ln(inventory_count)` finite for an empty inventory.
const EMPTY_INVENTORY_EPS: f64 = 1e-6;

/// Maps the market and account at time `t` to an [`Observation`].
///
/// Implementations must be pure: the same inputs always produce the same
/// vector, and nothing outside the returned value is touched.
pub trait StateEncoder {
    /// Length of every vector produced for the given window size.
    fn state_dim(&self, window_size: usize) -> usize;

    fn encode(
        &self,
        t: usize,
        window_size: usize,
        prices: &PriceSeries,
        balance: Cash,
        inventory_count: usize,
    ) -> TraderResult<Observation>;
}

/// Sigmoid-squashed price differences over a trailing window, followed by
/// log-scaled price, balance and holding count.
///
/// The window is `price[t - window_size ..= t]`. When `t < window_size` the
/// missing history is left-padded with `price[0]`, which yields zero
/// differences and therefore `0.5` features.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidWindowEncoder;

impl StateEncoder for SigmoidWindowEncoder {
    fn state_dim(&self, window_size: usize) -> usize {
        window_size + PORTFOLIO_FEATURES
    }

    fn encode(
        &self,
        t: usize,
        window_size: usize,
        prices: &PriceSeries,
        balance: Cash,
        inventory_count: usize,
    ) -> TraderResult<Observation> {
        let current = prices.price(t)?;
        let window = padded_window(prices.as_slice(), t, window_size)?;

        let mut features = Vec::with_capacity(self.state_dim(window_size));
        features.extend(window.windows(2).map(|w| sigmoid(w[1].0 - w[0].0)));
        features.push(current.0.ln());
        features.push(balance.0.ln());
        features.push((inventory_count as f64 + EMPTY_INVENTORY_EPS).ln());

        Ok(Observation::new(Array1::from_vec(features)))
    }
}

fn padded_window(prices: &[Price], t: usize, window_size: usize) -> TraderResult<Vec<Price>> {
    let first = *prices.first().ok_or_else(|| {
        SystemError::InvariantViolation("cannot encode an empty price series".to_string())
    })?;

    let missing = window_size.saturating_sub(t);
    let start = t.saturating_sub(window_size);

    let mut window = Vec::with_capacity(window_size + 1);
    window.extend(std::iter::repeat_n(first, missing));
    window.extend_from_slice(&prices[start..=t]);
    Ok(window)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
