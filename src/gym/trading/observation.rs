use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// A fixed-length numeric snapshot of the market window and the account.
///
/// Produced fresh by a [`StateEncoder`](crate::data::encoder::StateEncoder)
/// at every step and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation(Array1<f64>);

impl Observation {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.0
    }
}

impl From<Vec<f64>> for Observation {
    fn from(values: Vec<f64>) -> Self {
        Self(Array1::from_vec(values))
    }
}
