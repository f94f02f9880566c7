use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::configure::{ModelConfig, ANNUAL_PERIOD_DAYS};
use crate::error::{ForecastError, Result};
use crate::schema::SeriesKind;
use crate::series::TimeSeries;

/// Point forecast for one series at one month, with the uncertainty
/// band implied by the configured interval width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Full forecast run for one series, ordered by date. Covers the
/// historical continuation as well as the requested horizon; callers
/// keep only the dates strictly after the last historical month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    pub series: SeriesKind,
    pub points: Vec<ForecastPoint>,
}

impl ForecastRun {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The strictly-future portion of the run.
    pub fn future_after(&self, last_historical: NaiveDate) -> ForecastRun {
        ForecastRun {
            series: self.series,
            points: self
                .points
                .iter()
                .copied()
                .filter(|p| p.date > last_historical)
                .collect(),
        }
    }
}

/// A fitted model that can produce point forecasts for arbitrary
/// future month-start dates.
pub trait FittedModel: Send {
    fn predict(&self, dates: &[NaiveDate]) -> Vec<ForecastPoint>;
}

/// The curve-fitting capability consumed by the engine: given a
/// time-indexed series and a hyperparameter set, produce a fitted
/// model. Implementations must be deterministic for identical input.
pub trait TrendFitter: Send + Sync {
    fn fit(&self, series: &TimeSeries, config: &ModelConfig) -> Result<Box<dyn FittedModel>>;
}

/// Built-in seasonal-trend fitter: ridge-regularized least squares on
/// a piecewise-linear trend plus an additive annual Fourier expansion
/// with the configured order. Trend changepoints are placed every
/// three observations over the first 80% of the history; the
/// changepoint prior scale relaxes the penalty on the slope changes
/// and the seasonality prior scale the penalty on the harmonic
/// coefficients. The base level and slope are unpenalized.
#[derive(Debug, Clone, Default)]
pub struct HarmonicRegressionFitter;

/// Spacing of trend changepoints, in observations.
const CHANGEPOINT_STRIDE: usize = 3;

/// Fraction of the history eligible for changepoints.
const CHANGEPOINT_RANGE: f64 = 0.8;

impl HarmonicRegressionFitter {
    pub fn new() -> Self {
        Self
    }
}

impl TrendFitter for HarmonicRegressionFitter {
    fn fit(&self, series: &TimeSeries, config: &ModelConfig) -> Result<Box<dyn FittedModel>> {
        let n = series.len();
        if n == 0 {
            return Err(ForecastError::ModelFit {
                series: series.kind,
                details: "cannot fit an empty series".to_string(),
            });
        }

        let origin = series.points[0].date;
        let values = series.values();

        // Scale the observations so the ridge penalties are comparable
        // across ledgers of very different magnitude.
        let y_scale = values
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
            .max(1.0);
        let scaled: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

        let order = config.fourier_order as usize;
        let changepoints = changepoint_offsets(series, origin);
        let p = 2 + changepoints.len() + 2 * order;

        let rows: Vec<Vec<f64>> = series
            .points
            .iter()
            .map(|pt| design_row(pt.date, origin, &changepoints, order))
            .collect();

        // Normal equations with per-block ridge penalties. Level and
        // base slope carry a vanishing penalty purely to keep the
        // system positive definite.
        let mut ata = vec![vec![0.0; p]; p];
        let mut aty = vec![0.0; p];
        for (row, &y) in rows.iter().zip(scaled.iter()) {
            for i in 0..p {
                aty[i] += row[i] * y;
                for j in 0..p {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }

        let changepoint_penalty =
            1.0 / (config.changepoint_prior_scale * config.changepoint_prior_scale);
        let seasonal_penalty =
            1.0 / (config.seasonality_prior_scale * config.seasonality_prior_scale);
        ata[0][0] += 1e-8;
        ata[1][1] += 1e-8;
        for i in 2..2 + changepoints.len() {
            ata[i][i] += changepoint_penalty;
        }
        for i in 2 + changepoints.len()..p {
            ata[i][i] += seasonal_penalty;
        }

        let beta = solve_cholesky(&mut ata, &aty).ok_or_else(|| ForecastError::ModelFit {
            series: series.kind,
            details: "normal equations are not positive definite".to_string(),
        })?;

        // Residual spread on the original scale drives the band width.
        let mut sse = 0.0;
        for (row, &y) in rows.iter().zip(values.iter()) {
            let fitted = dot(row, &beta) * y_scale;
            sse += (y - fitted) * (y - fitted);
        }
        let sigma = (sse / n as f64).sqrt();

        let normal = Normal::new(0.0, 1.0).unwrap();
        let z = normal.inverse_cdf(0.5 + config.interval_width / 2.0);

        Ok(Box::new(HarmonicRegressionModel {
            origin,
            changepoints,
            order,
            beta,
            y_scale,
            band: z * sigma,
        }))
    }
}

struct HarmonicRegressionModel {
    origin: NaiveDate,
    changepoints: Vec<f64>,
    order: usize,
    beta: Vec<f64>,
    y_scale: f64,
    band: f64,
}

impl FittedModel for HarmonicRegressionModel {
    fn predict(&self, dates: &[NaiveDate]) -> Vec<ForecastPoint> {
        dates
            .iter()
            .map(|&date| {
                let row = design_row(date, self.origin, &self.changepoints, self.order);
                let point = dot(&row, &self.beta) * self.y_scale;
                ForecastPoint {
                    date,
                    point,
                    lower: point - self.band,
                    upper: point + self.band,
                }
            })
            .collect()
    }
}

/// Trend changepoint locations in years since the series origin:
/// every `CHANGEPOINT_STRIDE`-th observation within the first
/// `CHANGEPOINT_RANGE` of the history.
fn changepoint_offsets(series: &TimeSeries, origin: NaiveDate) -> Vec<f64> {
    let n = series.len();
    let cutoff = (n as f64 * CHANGEPOINT_RANGE) as usize;
    series
        .points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i > 0 && *i < cutoff && i % CHANGEPOINT_STRIDE == 0)
        .map(|(_, pt)| (pt.date - origin).num_days() as f64 / ANNUAL_PERIOD_DAYS)
        .collect()
}

/// Regression features for one date: intercept, base trend in years
/// since the series origin, one hinge per changepoint, and the annual
/// sin/cos harmonics.
fn design_row(date: NaiveDate, origin: NaiveDate, changepoints: &[f64], order: usize) -> Vec<f64> {
    let days = (date - origin).num_days() as f64;
    let tau = days / ANNUAL_PERIOD_DAYS;
    let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * order);
    row.push(1.0);
    row.push(tau);
    for &s in changepoints {
        row.push((tau - s).max(0.0));
    }
    for k in 1..=order {
        let angle = 2.0 * std::f64::consts::PI * k as f64 * days / ANNUAL_PERIOD_DAYS;
        row.push(angle.sin());
        row.push(angle.cos());
    }
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Solves `a * x = b` in place via Cholesky factorization. Returns
/// `None` when `a` is not positive definite.
fn solve_cholesky(a: &mut [Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();

    // Factor a = l * l^T, storing l in the lower triangle.
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= a[i][k] * a[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                a[i][j] = sum.sqrt();
            } else {
                a[i][j] = sum / a[j][j];
            }
        }
    }

    // Forward solve l * y = b.
    let mut x = b.to_vec();
    for i in 0..n {
        for k in 0..i {
            x[i] -= a[i][k] * x[k];
        }
        x[i] /= a[i][i];
    }

    // Back solve l^T * x = y.
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            x[i] -= a[k][i] * x[k];
        }
        x[i] /= a[i][i];
    }

    Some(x)
}
