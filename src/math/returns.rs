/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Annualized Sharpe ratio of daily return rates in excess of `daily_risk_free`.
///
/// Returns `None` for an empty series or one without dispersion.
pub fn sharpe_ratio(return_rates: &[f64], daily_risk_free: f64) -> Option<f64> {
    let excess = mean(return_rates)? - daily_risk_free;
    let sd = std_dev(return_rates)?;
    if sd == 0.0 || !sd.is_finite() {
        return None;
    }
    Some(TRADING_DAYS_PER_YEAR.sqrt() * excess / sd)
}

/// Maximum drawdown of a value curve as a non-positive fraction.
///
/// The trough is the point with the largest dollar decline below its running
/// peak; the result is that decline relative to the highest value before the
/// trough. A curve that never declines yields `0.0`.
pub fn maximum_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: Option<(usize, f64)> = None;

    for (i, &v) in values.iter().enumerate() {
        peak = peak.max(v);
        let decline = peak - v;
        if decline > worst.map_or(0.0, |(_, d)| d) {
            worst = Some((i, decline));
        }
    }

    let Some((trough, _)) = worst else {
        return 0.0;
    };

    let prior_peak = values[..trough]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    if prior_peak <= 0.0 {
        return 0.0;
    }
    (values[trough] - prior_peak) / prior_peak
}
