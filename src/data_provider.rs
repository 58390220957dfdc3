use crate::{data::series::PriceSeries, error::TraderResult};

pub mod csv_file;
pub mod in_memory;

pub use csv_file::CsvPriceSeries;
pub use in_memory::StaticPriceSeries;

/// Source of the close-price history for a named instrument.
///
/// Called once per run; the returned series is shared read-only by every
/// episode.
pub trait PriceSeriesProvider {
    fn load(&self, instrument: &str) -> TraderResult<PriceSeries>;
}
