use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;

use crate::configure::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::model::{ForecastRun, TrendFitter};
use crate::series::TimeSeries;
use crate::utils::{add_months, month_starts_between};

/// Fits one model per series and projects both over the same
/// month-start grid. The two fit-and-predict operations share no
/// state and run as two concurrent blocking tasks.
pub struct ForecastEngine {
    fitter: Arc<dyn TrendFitter>,
}

impl ForecastEngine {
    pub fn new(fitter: Arc<dyn TrendFitter>) -> Self {
        Self { fitter }
    }

    /// Fits and predicts both series concurrently. The returned runs
    /// cover every month from the first historical month through
    /// `periods_ahead` months past the last one; a failure in either
    /// fit fails the whole call, surfacing the first error.
    pub async fn run(
        &self,
        income: TimeSeries,
        income_config: ModelConfig,
        expense: TimeSeries,
        expense_config: ModelConfig,
        periods_ahead: usize,
    ) -> Result<(ForecastRun, ForecastRun)> {
        let dates = self.forecast_grid(&income, &expense, periods_ahead)?;

        debug!(
            "forecast grid: {} months ({} historical + {} ahead)",
            dates.len(),
            dates.len() - periods_ahead,
            periods_ahead
        );

        let income_task = self.fit_and_predict(income, income_config, dates.clone());
        let expense_task = self.fit_and_predict(expense, expense_config, dates);

        tokio::try_join!(income_task, expense_task)
    }

    /// Month-start prediction dates shared by both series. The series
    /// were extracted from one record table, so their date axes must
    /// already agree.
    fn forecast_grid(
        &self,
        income: &TimeSeries,
        expense: &TimeSeries,
        periods_ahead: usize,
    ) -> Result<Vec<NaiveDate>> {
        let first = income
            .first_date()
            .ok_or_else(|| ForecastError::Validation("income series is empty".to_string()))?;
        let last = income
            .last_date()
            .ok_or_else(|| ForecastError::Validation("income series is empty".to_string()))?;

        if expense.first_date() != Some(first) || expense.last_date() != Some(last) {
            return Err(ForecastError::Alignment(format!(
                "income and expense series cover different ranges: {}..{} vs {:?}..{:?}",
                first,
                last,
                expense.first_date(),
                expense.last_date()
            )));
        }

        Ok(month_starts_between(first, add_months(last, periods_ahead)))
    }

    async fn fit_and_predict(
        &self,
        series: TimeSeries,
        config: ModelConfig,
        dates: Vec<NaiveDate>,
    ) -> Result<ForecastRun> {
        let kind = series.kind;
        let fitter = Arc::clone(&self.fitter);

        tokio::task::spawn_blocking(move || {
            let model = fitter.fit(&series, &config)?;
            Ok(ForecastRun {
                series: series.kind,
                points: model.predict(&dates),
            })
        })
        .await
        .map_err(|e| ForecastError::ModelFit {
            series: kind,
            details: format!("fit task did not complete: {}", e),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::{configure_model, PipelineSettings};
    use crate::analysis::analyze_series;
    use crate::model::{FittedModel, ForecastPoint, HarmonicRegressionFitter};
    use crate::schema::SeriesKind;
    use crate::series::SeriesPoint;

    fn monthly_series(kind: SeriesKind, values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| SeriesPoint {
                date: add_months(start, i),
                value,
            })
            .collect();
        TimeSeries::new(kind, points)
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(Arc::new(HarmonicRegressionFitter::new()))
    }

    fn configs_for(
        income: &TimeSeries,
        expense: &TimeSeries,
    ) -> (ModelConfig, ModelConfig) {
        let settings = PipelineSettings::default();
        let income_config =
            configure_model(&analyze_series(income).unwrap(), income.len(), &settings);
        let expense_config =
            configure_model(&analyze_series(expense).unwrap(), expense.len(), &settings);
        (income_config, expense_config)
    }

    #[tokio::test]
    async fn test_runs_cover_history_plus_horizon() {
        let income = monthly_series(SeriesKind::Income, &[100_000.0; 12]);
        let expense = monthly_series(SeriesKind::Expense, &[-40_000.0; 12]);
        let (ic, ec) = configs_for(&income, &expense);

        let (income_run, expense_run) = engine().run(income, ic, expense, ec, 3).await.unwrap();

        assert_eq!(income_run.len(), 15);
        assert_eq!(expense_run.len(), 15);
        assert_eq!(income_run.series, SeriesKind::Income);
        assert_eq!(expense_run.series, SeriesKind::Expense);

        for (i, e) in income_run.points.iter().zip(expense_run.points.iter()) {
            assert_eq!(i.date, e.date);
        }
        assert_eq!(
            income_run.points[0].date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(
            income_run.points[14].date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn test_misaligned_series_rejected() {
        let income = monthly_series(SeriesKind::Income, &[100.0; 12]);
        let mut expense = monthly_series(SeriesKind::Expense, &[-40.0; 12]);
        expense.points.remove(0);
        let (ic, ec) = configs_for(&income, &monthly_series(SeriesKind::Expense, &[-40.0; 12]));

        let result = engine().run(income, ic, expense, ec, 3).await;
        assert!(matches!(result, Err(ForecastError::Alignment(_))));
    }

    struct FailingFitter;

    impl TrendFitter for FailingFitter {
        fn fit(
            &self,
            series: &TimeSeries,
            _config: &ModelConfig,
        ) -> Result<Box<dyn FittedModel>> {
            Err(ForecastError::ModelFit {
                series: series.kind,
                details: "did not converge".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_fit_failure_names_series() {
        let income = monthly_series(SeriesKind::Income, &[100.0; 12]);
        let expense = monthly_series(SeriesKind::Expense, &[-40.0; 12]);
        let (ic, ec) = configs_for(&income, &expense);

        let engine = ForecastEngine::new(Arc::new(FailingFitter));
        let result = engine.run(income, ic, expense, ec, 3).await;
        match result {
            Err(ForecastError::ModelFit { series, details }) => {
                assert_eq!(series, SeriesKind::Income);
                assert!(details.contains("converge"));
            }
            other => panic!("expected model fit error, got {:?}", other),
        }
    }

    /// A stub capability proving the engine is decoupled from the
    /// built-in fitter.
    struct ConstantFitter(f64);

    struct ConstantModel(f64);

    impl FittedModel for ConstantModel {
        fn predict(&self, dates: &[NaiveDate]) -> Vec<ForecastPoint> {
            dates
                .iter()
                .map(|&date| ForecastPoint {
                    date,
                    point: self.0,
                    lower: self.0,
                    upper: self.0,
                })
                .collect()
        }
    }

    impl TrendFitter for ConstantFitter {
        fn fit(
            &self,
            _series: &TimeSeries,
            _config: &ModelConfig,
        ) -> Result<Box<dyn FittedModel>> {
            Ok(Box::new(ConstantModel(self.0)))
        }
    }

    #[tokio::test]
    async fn test_engine_uses_injected_fitter() {
        let income = monthly_series(SeriesKind::Income, &[100.0; 12]);
        let expense = monthly_series(SeriesKind::Expense, &[-40.0; 12]);
        let (ic, ec) = configs_for(&income, &expense);

        let engine = ForecastEngine::new(Arc::new(ConstantFitter(7.0)));
        let (income_run, _) = engine.run(income, ic, expense, ec, 2).await.unwrap();
        assert!(income_run.points.iter().all(|p| p.point == 7.0));
    }
}
