use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::schema::SeriesKind;
use crate::series::TimeSeries;

/// Minimum number of monthly observations for any trend or
/// seasonality inference to be meaningful.
pub const MIN_SERIES_LEN: usize = 6;

/// A trend is "stable" when the fitted slope is below this fraction of
/// the series' mean absolute level.
pub const TREND_SLOPE_RATIO: f64 = 0.001;

/// Seasonality is declared present when the absolute annual
/// autocorrelation exceeds this threshold.
pub const SEASONALITY_THRESHOLD: f64 = 0.15;

/// Lag corresponding to one year under the monthly assumption.
pub const ANNUAL_LAG: usize = 12;

/// Upper bound on the number of autocorrelation lags computed.
pub const MAX_ACF_LAGS: usize = 18;

/// Immutable per-series analysis result. Deterministic for a given
/// input series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub series: SeriesKind,
    pub slope: f64,
    pub mean_abs_level: f64,
    pub trend_stable: bool,
    pub annual_autocorrelation: f64,
    pub has_seasonality: bool,
}

/// Runs the trend-stability and annual-seasonality tests on one
/// series.
pub fn analyze_series(series: &TimeSeries) -> Result<AnalysisVerdict> {
    let values = series.values();
    let n = values.len();

    if n < MIN_SERIES_LEN {
        return Err(ForecastError::InsufficientData {
            series: series.kind,
            len: n,
            min: MIN_SERIES_LEN,
        });
    }

    let slope = ols_slope(&values);
    let mean_abs_level = values.iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    let trend_stable = slope.abs() < TREND_SLOPE_RATIO * mean_abs_level;

    let nlags = MAX_ACF_LAGS.min(n - 1);
    let acf = autocorrelation(&values, nlags);
    let annual_autocorrelation = if acf.len() > ANNUAL_LAG {
        acf[ANNUAL_LAG]
    } else {
        // Fewer than 13 observations: the annual lag cannot be read,
        // which counts as no detected seasonality.
        debug!(
            "{} series too short ({} months) for the annual autocorrelation test",
            series.kind, n
        );
        0.0
    };
    let has_seasonality = annual_autocorrelation.abs() > SEASONALITY_THRESHOLD;

    debug!(
        "{} series analysis: slope={:.4}, mean_abs={:.2}, trend_stable={}, acf12={:.3}, seasonal={}",
        series.kind, slope, mean_abs_level, trend_stable, annual_autocorrelation, has_seasonality
    );

    Ok(AnalysisVerdict {
        series: series.kind,
        slope,
        mean_abs_level,
        trend_stable,
        annual_autocorrelation,
        has_seasonality,
    })
}

/// Slope of the ordinary least-squares line of `values` against the
/// 0-based observation index.
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Biased (non-FFT) autocorrelation function up to `nlags` lags.
/// Returns `nlags + 1` values; index 0 is always 1.0. A constant
/// series has no defined autocorrelation and yields zeros past lag 0.
fn autocorrelation(values: &[f64], nlags: usize) -> Vec<f64> {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let c0: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    let mut acf = Vec::with_capacity(nlags + 1);
    acf.push(1.0);
    for lag in 1..=nlags {
        if c0 == 0.0 {
            acf.push(0.0);
            continue;
        }
        let ck: f64 = (lag..n)
            .map(|t| (values[t] - mean) * (values[t - lag] - mean))
            .sum::<f64>()
            / n as f64;
        acf.push(ck / c0);
    }

    acf
}
