use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisVerdict;
use crate::schema::{ModelDiagnostics, SeriesKind};

pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.95;
pub const DEFAULT_HORIZON: usize = 12;

/// Upper bound on the forecast horizon, in months. A century keeps
/// every projected date well inside chrono's representable range.
pub const MAX_HORIZON: usize = 1200;

/// Period of the single seasonal component, in days. The series is
/// strictly monthly, so only an annual component is fit.
pub const ANNUAL_PERIOD_DAYS: f64 = 365.25;

const CHANGEPOINT_PRIOR_STABLE: f64 = 0.15;
const CHANGEPOINT_PRIOR_UNSTABLE: f64 = 0.25;
const SEASONALITY_PRIOR_DETECTED: f64 = 5.0;
const SEASONALITY_PRIOR_UNDETECTED: f64 = 10.0;
const MAX_FOURIER_ORDER: u32 = 10;
const BASE_FOURIER_ORDER: u32 = 4;

/// Fixed knobs of the pipeline, set once at construction. There is no
/// mutable global state; every request reads the same settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub interval_width: f64,
    pub default_horizon: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            interval_width: DEFAULT_INTERVAL_WIDTH,
            default_horizon: DEFAULT_HORIZON,
        }
    }
}

/// Hyperparameter set for one series' model fit. Growth is always
/// linear and seasonality always additive; the annual component is the
/// only seasonal term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub series: SeriesKind,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub fourier_order: u32,
    pub interval_width: f64,
}

/// Maps an analysis verdict and the series length to a concrete model
/// configuration. Pure lookup; nothing here is learned.
///
/// An unstable trend gets a larger changepoint prior so the fit may
/// bend. Detected seasonality gets the *smaller* seasonality prior:
/// a confirmed signal is damped against overfitting, while an
/// unconfirmed one is left free to emerge.
pub fn configure_model(
    verdict: &AnalysisVerdict,
    n: usize,
    settings: &PipelineSettings,
) -> ModelConfig {
    let changepoint_prior_scale = if verdict.trend_stable {
        CHANGEPOINT_PRIOR_STABLE
    } else {
        CHANGEPOINT_PRIOR_UNSTABLE
    };

    let seasonality_prior_scale = if verdict.has_seasonality {
        SEASONALITY_PRIOR_DETECTED
    } else {
        SEASONALITY_PRIOR_UNDETECTED
    };

    let years = 1.max(n / 12) as u32;
    let fourier_order = MAX_FOURIER_ORDER.min(BASE_FOURIER_ORDER + 2 * years);

    ModelConfig {
        series: verdict.series,
        changepoint_prior_scale,
        seasonality_prior_scale,
        fourier_order,
        interval_width: settings.interval_width,
    }
}

/// Flattens a verdict and its derived configuration into the
/// primitive-typed diagnostics returned to the caller.
pub fn diagnostics(verdict: &AnalysisVerdict, config: &ModelConfig) -> ModelDiagnostics {
    ModelDiagnostics {
        series: verdict.series,
        slope: verdict.slope,
        mean_abs_level: verdict.mean_abs_level,
        trend_stable: verdict.trend_stable,
        annual_autocorrelation: verdict.annual_autocorrelation,
        has_seasonality: verdict.has_seasonality,
        changepoint_prior_scale: config.changepoint_prior_scale,
        seasonality_prior_scale: config.seasonality_prior_scale,
        fourier_order: config.fourier_order,
        interval_width: config.interval_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(trend_stable: bool, has_seasonality: bool) -> AnalysisVerdict {
        AnalysisVerdict {
            series: SeriesKind::Income,
            slope: 0.0,
            mean_abs_level: 1000.0,
            trend_stable,
            annual_autocorrelation: if has_seasonality { 0.5 } else { 0.0 },
            has_seasonality,
        }
    }

    #[test]
    fn test_stable_trend_gets_tight_changepoint_prior() {
        let config = configure_model(&verdict(true, false), 24, &PipelineSettings::default());
        assert_eq!(config.changepoint_prior_scale, 0.15);
    }

    #[test]
    fn test_unstable_trend_gets_loose_changepoint_prior() {
        let config = configure_model(&verdict(false, false), 24, &PipelineSettings::default());
        assert_eq!(config.changepoint_prior_scale, 0.25);
    }

    #[test]
    fn test_detected_seasonality_is_damped() {
        let config = configure_model(&verdict(true, true), 36, &PipelineSettings::default());
        assert_eq!(config.seasonality_prior_scale, 5.0);

        let config = configure_model(&verdict(true, false), 36, &PipelineSettings::default());
        assert_eq!(config.seasonality_prior_scale, 10.0);
    }

    #[test]
    fn test_fourier_order_grows_with_history() {
        let settings = PipelineSettings::default();
        assert_eq!(configure_model(&verdict(true, true), 6, &settings).fourier_order, 6);
        assert_eq!(configure_model(&verdict(true, true), 12, &settings).fourier_order, 6);
        assert_eq!(configure_model(&verdict(true, true), 24, &settings).fourier_order, 8);
        assert_eq!(configure_model(&verdict(true, true), 36, &settings).fourier_order, 10);
        assert_eq!(configure_model(&verdict(true, true), 48, &settings).fourier_order, 10);
    }

    #[test]
    fn test_fourier_order_bounds_hold_for_any_length() {
        let settings = PipelineSettings::default();
        for n in 6..=1200 {
            let order = configure_model(&verdict(false, false), n, &settings).fourier_order;
            assert!((4..=10).contains(&order), "order {} out of range at n={}", order, n);
        }
    }

    #[test]
    fn test_interval_width_comes_from_settings() {
        let settings = PipelineSettings {
            interval_width: 0.8,
            default_horizon: 6,
        };
        let config = configure_model(&verdict(true, true), 12, &settings);
        assert_eq!(config.interval_width, 0.8);
    }

    #[test]
    fn test_diagnostics_carry_both_halves() {
        let v = verdict(false, true);
        let config = configure_model(&v, 24, &PipelineSettings::default());
        let diag = diagnostics(&v, &config);
        assert_eq!(diag.series, SeriesKind::Income);
        assert!(!diag.trend_stable);
        assert!(diag.has_seasonality);
        assert_eq!(diag.changepoint_prior_scale, 0.25);
        assert_eq!(diag.seasonality_prior_scale, 5.0);
        assert_eq!(diag.fourier_order, 8);
    }
}
