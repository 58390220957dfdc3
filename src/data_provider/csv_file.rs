use std::path::{Path, PathBuf};

use polars::{
    error::PolarsError,
    prelude::{DataType, LazyCsvReader, LazyFileListReader, PlPath, col},
};

use crate::{
    data::series::PriceSeries,
    data_provider::PriceSeriesProvider,
    error::{DataError, IoError, TraderError, TraderResult},
};

/// Default column holding the daily close in exported quote files.
pub const DEFAULT_CLOSE_COLUMN: &str = "Close";

/// Reads `<dir>/<instrument>.csv` and extracts one price column.
///
/// The file must carry a header row. Any row whose close cannot be read as
/// a number is reported as a missing price rather than silently skipped.
#[derive(Debug, Clone)]
pub struct CsvPriceSeries {
    dir: PathBuf,
    close_column: String,
}

impl CsvPriceSeries {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            close_column: DEFAULT_CLOSE_COLUMN.to_string(),
        }
    }

    pub fn with_close_column(self, close_column: impl Into<String>) -> Self {
        Self {
            close_column: close_column.into(),
            ..self
        }
    }

    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{instrument}.csv"))
    }

    fn read_closes(&self, path: &Path) -> TraderResult<Vec<f64>> {
        let path_str = path.to_str().ok_or_else(|| {
            IoError::FileSystem(format!("Non UTF-8 path: {}", path.display()))
        })?;

        let mut lf = LazyCsvReader::new(PlPath::new(path_str))
            .with_has_header(true)
            .finish()
            .map_err(polars_err)?;

        let schema = lf.collect_schema().map_err(polars_err)?;
        if !schema.contains(self.close_column.as_str()) {
            return Err(DataError::MissingColumn(self.close_column.clone()).into());
        }

        let df = lf
            .select([col(self.close_column.as_str()).cast(DataType::Float64)])
            .collect()
            .map_err(polars_err)?;

        let closes = df
            .column(self.close_column.as_str())
            .map_err(polars_err)?
            .f64()
            .map_err(polars_err)?;

        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| close.ok_or_else(|| DataError::MissingPrice(i).into()))
            .collect()
    }
}

impl PriceSeriesProvider for CsvPriceSeries {
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    fn load(&self, instrument: &str) -> TraderResult<PriceSeries> {
        let path = self.path_for(instrument);
        if !path.is_file() {
            return Err(IoError::FileSystem(format!(
                "Price file not found: {}",
                path.display()
            ))
            .into());
        }

        let closes = self.read_closes(&path)?;
        tracing::info!(points = closes.len(), path = %path.display(), "Loaded price series");
        PriceSeries::new(instrument, closes)
    }
}

fn polars_err(e: PolarsError) -> TraderError {
    DataError::DataFrame(e.to_string()).into()
}
