use std::collections::BTreeMap;

use crate::{
    data::series::PriceSeries,
    data_provider::PriceSeriesProvider,
    error::{IoError, TraderResult},
};

/// Serves price histories registered up front, keyed by instrument name.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSeries(BTreeMap<String, Vec<f64>>);

impl StaticPriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, instrument: impl Into<String>, prices: Vec<f64>) -> Self {
        self.0.insert(instrument.into(), prices);
        self
    }
}

impl PriceSeriesProvider for StaticPriceSeries {
    fn load(&self, instrument: &str) -> TraderResult<PriceSeries> {
        let prices = self.0.get(instrument).ok_or_else(|| {
            IoError::FileSystem(format!("No price series registered for '{instrument}'"))
        })?;
        PriceSeries::new(instrument, prices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_registered_series_only() {
        let provider = StaticPriceSeries::new().with_series("A", vec![1.0, 2.0]);
        assert_eq!(provider.load("A").unwrap().trading_period(), 1);
        assert!(provider.load("B").is_err());
    }
}
