use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::schema::{MonthlyRecord, SeriesKind};

/// One observation in a monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered monthly (date, value) sequence for one financial quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub kind: SeriesKind,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(kind: SeriesKind, points: Vec<SeriesPoint>) -> Self {
        Self { kind, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// A historical record with its derived month-start date. The ordered
/// table is kept alongside the extracted series for downstream
/// reporting and charting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedRecord {
    pub date: NaiveDate,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

/// Validated, calendar-ordered view of the raw records: the record
/// table plus three parallel series sharing the same date axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedLedger {
    pub records: Vec<DatedRecord>,
    pub income: TimeSeries,
    pub expense: TimeSeries,
    pub balance: TimeSeries,
}

impl PreparedLedger {
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}

/// Validates raw monthly records and reshapes them into the three
/// date-aligned series. Pure transformation; duplicated (year, month)
/// pairs are kept in sorted order rather than deduplicated.
pub fn prepare_ledger(records: &[MonthlyRecord]) -> Result<PreparedLedger> {
    if records.is_empty() {
        return Err(ForecastError::Validation(
            "no monthly records provided".to_string(),
        ));
    }

    let mut dated: Vec<DatedRecord> = Vec::with_capacity(records.len());
    for record in records {
        let date = NaiveDate::from_ymd_opt(record.year, record.month, 1).ok_or_else(|| {
            ForecastError::Validation(format!(
                "invalid year/month pair ({}, {}): month must be between 1 and 12",
                record.year, record.month
            ))
        })?;

        dated.push(DatedRecord {
            date,
            income: record.income,
            expense: record.expense,
            balance: record.balance(),
        });
    }

    dated.sort_by_key(|r| r.date);

    debug!(
        "prepared ledger: {} records from {} to {}",
        dated.len(),
        dated.first().map(|r| r.date.to_string()).unwrap_or_default(),
        dated.last().map(|r| r.date.to_string()).unwrap_or_default()
    );

    let extract = |kind: SeriesKind| -> TimeSeries {
        let points = dated
            .iter()
            .map(|r| SeriesPoint {
                date: r.date,
                value: match kind {
                    SeriesKind::Income => r.income,
                    SeriesKind::Expense => r.expense,
                    SeriesKind::Balance => r.balance,
                },
            })
            .collect();
        TimeSeries::new(kind, points)
    };

    Ok(PreparedLedger {
        income: extract(SeriesKind::Income),
        expense: extract(SeriesKind::Expense),
        balance: extract(SeriesKind::Balance),
        records: dated,
    })
}
