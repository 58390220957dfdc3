use serde::{Deserialize, Serialize};

/// Calendar days used to de-annualize a yield.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Default annualized treasury yield in basis points (`275` = 2.75%).
pub const DEFAULT_TREASURY_BPS: u16 = 275;

/// Supplies the daily risk-free rate.
///
/// The rate prices the opportunity cost of idle cash and the excess return
/// used by the Sharpe ratio.
pub trait RateSource {
    fn daily_rate(&self) -> f64;
}

/// A constant daily rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FixedRate(pub f64);

impl RateSource for FixedRate {
    fn daily_rate(&self) -> f64 {
        self.0
    }
}

/// Approximate U.S. treasury bond return, compounded down to one day.
///
/// # Numeric Representation
/// The annual yield is stored in **Basis Points** (`1 bps = 0.01%`).
///
/// # Conversions
/// - `275` bps = 2.75% annual = `(1.0275)^(1/365) - 1` daily
/// - `0` bps = 0.0%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreasuryBondRate {
    annual_rate_bps: u16,
}

impl Default for TreasuryBondRate {
    fn default() -> Self {
        Self {
            annual_rate_bps: DEFAULT_TREASURY_BPS,
        }
    }
}

impl TreasuryBondRate {
    pub fn from_bps(annual_rate_bps: u16) -> Self {
        Self { annual_rate_bps }
    }

    pub fn annual_rate_bps(&self) -> u16 {
        self.annual_rate_bps
    }

    /// Converts the BPS rate to a normalized `f64` (e.g., `275` -> `0.0275`).
    pub fn annual_rate_f64(&self) -> f64 {
        f64::from(self.annual_rate_bps) / 10_000.0
    }
}

impl RateSource for TreasuryBondRate {
    fn daily_rate(&self) -> f64 {
        (1.0 + self.annual_rate_f64()).powf(1.0 / DAYS_PER_YEAR) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_rate_compounds_back_to_annual() {
        let rate = TreasuryBondRate::default();
        let annual = (1.0 + rate.daily_rate()).powf(DAYS_PER_YEAR) - 1.0;
        assert!((annual - 0.0275).abs() < 1e-12);
    }

    #[test]
    fn zero_bps_is_zero_daily() {
        assert_eq!(TreasuryBondRate::from_bps(0).daily_rate(), 0.0);
    }

    #[test]
    fn fixed_rate_is_returned_verbatim() {
        assert_eq!(FixedRate(0.001).daily_rate(), 0.001);
    }
}
