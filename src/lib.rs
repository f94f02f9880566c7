//! # Balance Forecast
//!
//! A library for forecasting monthly income, expense and net balance
//! from an organization's historical monthly records.
//!
//! ## Core Concepts
//!
//! - **Series preparation**: raw records are validated, dated to the
//!   first of their month, sorted, and split into income and expense
//!   series sharing one date axis
//! - **Automatic configuration**: each series is tested for trend
//!   stability (OLS slope vs. its own scale) and annual seasonality
//!   (autocorrelation at a 12-month lag), and the model
//!   hyperparameters are derived from those verdicts, with no manual
//!   tuning
//! - **Parallel fitting**: the two series are fit and projected
//!   concurrently, then reconciled into a date-aligned balance
//!   forecast
//! - **Capability seam**: the fitting routine sits behind the
//!   [`TrendFitter`] trait; a deterministic harmonic-regression fitter
//!   is built in, and tests can inject stubs
//!
//! ## Example
//!
//! ```rust,ignore
//! use balance_forecast::{ForecastPipeline, MonthlyRecord};
//!
//! let records: Vec<MonthlyRecord> = load_ledger();
//! let pipeline = ForecastPipeline::new();
//! let outcome = pipeline.run(&records, Some(12)).await?;
//!
//! for record in &outcome.records {
//!     println!(
//!         "{}-{:02}: net {}",
//!         record.year, record.month, record.expected_net_balance
//!     );
//! }
//! ```

pub mod analysis;
pub mod configure;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod series;
pub mod utils;

pub use analysis::{analyze_series, AnalysisVerdict, MIN_SERIES_LEN};
pub use configure::{configure_model, ModelConfig, PipelineSettings};
pub use engine::ForecastEngine;
pub use error::{ForecastError, Result};
pub use model::{FittedModel, ForecastPoint, ForecastRun, HarmonicRegressionFitter, TrendFitter};
pub use reconcile::{reconcile, Reconciled};
pub use schema::{
    ErrorResponse, ForecastParameters, ForecastRecord, ForecastRequest, ForecastResponse,
    ModelDiagnostics, MonthlyRecord, SeriesKind,
};
pub use series::{prepare_ledger, PreparedLedger, SeriesPoint, TimeSeries};

use std::sync::Arc;

use log::{debug, info};

/// Everything a caller (or a charting collaborator) needs from one
/// forecast request: the summary table, the diagnostics, the ordered
/// historical ledger, and the three future-only runs. Constructed
/// once per request; nothing is retained between requests.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub records: Vec<ForecastRecord>,
    pub parameters: ForecastParameters,
    pub ledger: PreparedLedger,
    pub income_forecast: ForecastRun,
    pub expense_forecast: ForecastRun,
    pub balance_forecast: ForecastRun,
}

impl ForecastOutcome {
    /// Flattens the outcome into the serializable response envelope.
    pub fn into_response(self) -> ForecastResponse {
        ForecastResponse::ok(self.parameters, self.records)
    }
}

/// The full forecast pipeline: validation, per-series analysis and
/// configuration, concurrent fitting, and reconciliation. Stateless
/// across requests; settings and the fitter are fixed at construction.
pub struct ForecastPipeline {
    settings: PipelineSettings,
    engine: ForecastEngine,
}

impl ForecastPipeline {
    /// Pipeline with default settings and the built-in fitter.
    pub fn new() -> Self {
        Self::with_fitter(
            PipelineSettings::default(),
            Arc::new(HarmonicRegressionFitter::new()),
        )
    }

    pub fn with_fitter(settings: PipelineSettings, fitter: Arc<dyn TrendFitter>) -> Self {
        Self {
            settings,
            engine: ForecastEngine::new(fitter),
        }
    }

    /// Runs one forecast request. `periods_ahead` falls back to the
    /// configured default horizon when omitted. The request either
    /// completes with a full summary or fails as a whole.
    pub async fn run(
        &self,
        records: &[MonthlyRecord],
        periods_ahead: Option<usize>,
    ) -> Result<ForecastOutcome> {
        let periods_ahead = periods_ahead.unwrap_or(self.settings.default_horizon);
        if periods_ahead == 0 {
            return Err(ForecastError::Validation(
                "periods_ahead must be a positive number of months".to_string(),
            ));
        }
        if periods_ahead > configure::MAX_HORIZON {
            return Err(ForecastError::Validation(format!(
                "periods_ahead must be at most {} months, got {}",
                configure::MAX_HORIZON,
                periods_ahead
            )));
        }

        let ledger = prepare_ledger(records)?;
        info!(
            "forecasting {} months ahead from {} historical records",
            periods_ahead,
            ledger.records.len()
        );

        let income_verdict = analyze_series(&ledger.income)?;
        let expense_verdict = analyze_series(&ledger.expense)?;

        let income_config =
            configure_model(&income_verdict, ledger.income.len(), &self.settings);
        let expense_config =
            configure_model(&expense_verdict, ledger.expense.len(), &self.settings);

        debug!(
            "income config: {:?}; expense config: {:?}",
            income_config, expense_config
        );

        let parameters = ForecastParameters {
            income: configure::diagnostics(&income_verdict, &income_config),
            expense: configure::diagnostics(&expense_verdict, &expense_config),
        };

        let (income_run, expense_run) = self
            .engine
            .run(
                ledger.income.clone(),
                income_config,
                ledger.expense.clone(),
                expense_config,
                periods_ahead,
            )
            .await?;

        // The last historical month bounds the strictly-future window.
        let last_date = ledger
            .last_date()
            .ok_or_else(|| ForecastError::Validation("no monthly records provided".to_string()))?;
        let income_future = income_run.future_after(last_date);
        let expense_future = expense_run.future_after(last_date);

        let reconciled = reconcile(&income_future, &expense_future, periods_ahead)?;

        info!(
            "forecast complete: {} future months from {}",
            reconciled.records.len(),
            last_date
        );

        Ok(ForecastOutcome {
            records: reconciled.records,
            parameters,
            ledger,
            income_forecast: income_future,
            expense_forecast: expense_future,
            balance_forecast: reconciled.balance,
        })
    }
}

impl Default for ForecastPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot entry point for a parsed request payload.
pub async fn run_forecast(request: &ForecastRequest) -> Result<ForecastOutcome> {
    ForecastPipeline::new()
        .run(&request.records, request.periods_ahead)
        .await
}
