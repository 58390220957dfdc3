use std::sync::Arc;

use crate::{
    data::domain::Price,
    error::{DataError, SystemError, TraderResult},
};

/// An immutable, validated sequence of daily close prices for one instrument.
///
/// Index `0` is the oldest observation. Stepping covers `1..=trading_period`,
/// so `price[0]` only ever contributes to the first observation window and
/// `price[N - 1]` is the last tradable price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    instrument: Arc<String>,
    prices: Arc<[Price]>,
}

impl PriceSeries {
    /// Builds a series, rejecting non-finite or non-positive prices and
    /// series without at least one steppable transition.
    pub fn new(instrument: impl Into<String>, prices: Vec<f64>) -> TraderResult<Self> {
        let instrument = instrument.into();

        if prices.len() < 2 {
            return Err(DataError::SeriesTooShort {
                instrument,
                len: prices.len(),
            }
            .into());
        }

        if let Some((index, &value)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p <= 0.0)
        {
            return Err(DataError::InvalidPrice { index, value }.into());
        }

        Ok(Self {
            instrument: Arc::new(instrument),
            prices: prices.into_iter().map(Price).collect(),
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Number of steppable time indices (`len - 1`).
    pub fn trading_period(&self) -> usize {
        self.prices.len() - 1
    }

    pub fn as_slice(&self) -> &[Price] {
        &self.prices
    }

    pub fn price(&self, t: usize) -> TraderResult<Price> {
        self.prices.get(t).copied().ok_or_else(|| {
            SystemError::IndexOutOfBounds(format!(
                "time index {t} outside price series '{}' of length {}",
                self.instrument,
                self.prices.len()
            ))
            .into()
        })
    }
}
