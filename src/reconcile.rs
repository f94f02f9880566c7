use chrono::Datelike;
use log::debug;

use crate::error::{ForecastError, Result};
use crate::model::{ForecastPoint, ForecastRun};
use crate::schema::{ForecastRecord, SeriesKind};
use crate::utils::round2;

/// Combined result of reconciling the two future runs: the summary
/// table plus the derived balance run kept for the charting
/// collaborator.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub records: Vec<ForecastRecord>,
    pub balance: ForecastRun,
}

/// Sums the two future-only forecast runs into a balance forecast and
/// assembles the output summary. The runs are positionally zipped but
/// every pair is checked for date equality; a mismatch is an internal
/// invariant violation, never silently truncated or zero-filled.
pub fn reconcile(
    income: &ForecastRun,
    expense: &ForecastRun,
    periods_ahead: usize,
) -> Result<Reconciled> {
    if income.len() != expense.len() {
        return Err(ForecastError::Alignment(format!(
            "future runs have different lengths: income {} vs expense {}",
            income.len(),
            expense.len()
        )));
    }

    if income.len() != periods_ahead {
        return Err(ForecastError::Alignment(format!(
            "expected {} future months, got {}",
            periods_ahead,
            income.len()
        )));
    }

    let mut records = Vec::with_capacity(periods_ahead);
    let mut balance_points = Vec::with_capacity(periods_ahead);

    for (i, e) in income.points.iter().zip(expense.points.iter()) {
        if i.date != e.date {
            return Err(ForecastError::Alignment(format!(
                "future runs disagree on dates: income {} vs expense {}",
                i.date, e.date
            )));
        }

        balance_points.push(ForecastPoint {
            date: i.date,
            point: i.point + e.point,
            lower: i.lower + e.lower,
            upper: i.upper + e.upper,
        });

        // Net balance is derived from the presented (rounded) fields
        // so the three columns always sum exactly.
        let expected_income = round2(i.point);
        let expected_expense = round2(e.point);
        records.push(ForecastRecord {
            year: i.date.year(),
            month: i.date.month(),
            expected_income,
            expected_expense,
            expected_net_balance: round2(expected_income + expected_expense),
        });
    }

    debug!("reconciled {} future months", records.len());

    Ok(Reconciled {
        records,
        balance: ForecastRun {
            series: SeriesKind::Balance,
            points: balance_points,
        },
    })
}
