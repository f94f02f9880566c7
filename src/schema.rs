use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Which financial quantity a series, model or error refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Income,
    Expense,
    Balance,
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesKind::Income => write!(f, "income"),
            SeriesKind::Expense => write!(f, "expense"),
            SeriesKind::Balance => write!(f, "balance"),
        }
    }
}

/// One historical monthly observation for an organization's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyRecord {
    #[schemars(description = "Calendar year of the observation")]
    pub year: i32,

    #[schemars(description = "Calendar month of the observation (1 = January, 12 = December)")]
    pub month: u32,

    #[schemars(description = "Total income recorded for the month")]
    pub income: f64,

    #[schemars(
        description = "Total expense recorded for the month, as a signed quantity (outflows are negative)"
    )]
    pub expense: f64,
}

impl MonthlyRecord {
    /// Net position for the month. Expense carries its own sign, so
    /// the balance is a plain sum.
    pub fn balance(&self) -> f64 {
        self.income + self.expense
    }
}

/// Inbound forecast request as parsed by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForecastRequest {
    #[schemars(
        description = "Historical monthly records. Order is irrelevant; the pipeline sorts by derived date. At least 6 months are required per series."
    )]
    pub records: Vec<MonthlyRecord>,

    #[schemars(
        description = "Number of future months to forecast. Defaults to 12 when omitted."
    )]
    #[serde(default)]
    pub periods_ahead: Option<usize>,
}

impl ForecastRequest {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForecastRequest)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One forecast month in the output summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastRecord {
    pub year: i32,
    pub month: u32,
    pub expected_income: f64,
    pub expected_expense: f64,
    pub expected_net_balance: f64,
}

/// Per-series diagnostics: what the analyzer measured and which
/// hyperparameters the configurator derived from it. Every field is a
/// plain primitive so the transport layer can serialize it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDiagnostics {
    pub series: SeriesKind,
    pub slope: f64,
    pub mean_abs_level: f64,
    pub trend_stable: bool,
    pub annual_autocorrelation: f64,
    pub has_seasonality: bool,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub fourier_order: u32,
    pub interval_width: f64,
}

/// Diagnostics for both independently configured series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastParameters {
    pub income: ModelDiagnostics,
    pub expense: ModelDiagnostics,
}

/// Successful response envelope handed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForecastResponse {
    pub status: String,
    pub parameters: ForecastParameters,
    pub forecast: Vec<ForecastRecord>,
}

impl ForecastResponse {
    pub fn ok(parameters: ForecastParameters, forecast: Vec<ForecastRecord>) -> Self {
        Self {
            status: "ok".to_string(),
            parameters,
            forecast,
        }
    }
}

/// Structured error envelope. Preserves the error kind alongside the
/// human-readable detail so callers can map it to a transport outcome.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: String,
    pub detail: String,
    pub client_fault: bool,
}

impl ErrorResponse {
    pub fn from_error(err: &ForecastError) -> Self {
        Self {
            status: "error".to_string(),
            kind: err.kind().to_string(),
            detail: err.to_string(),
            client_fault: err.client_fault(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_schema_generation() {
        let schema_json = ForecastRequest::schema_as_json().unwrap();
        assert!(schema_json.contains("records"));
        assert!(schema_json.contains("periods_ahead"));
    }

    #[test]
    fn test_request_deserialization_defaults_horizon() {
        let json = r#"{
            "records": [
                { "year": 2023, "month": 1, "income": 1000.0, "expense": -400.0 }
            ]
        }"#;

        let request: ForecastRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.records.len(), 1);
        assert!(request.periods_ahead.is_none());
        assert_eq!(request.records[0].balance(), 600.0);
    }

    #[test]
    fn test_request_rejects_missing_fields() {
        let json = r#"{
            "records": [
                { "year": 2023, "month": 1, "income": 1000.0 }
            ]
        }"#;

        let result: Result<ForecastRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_round_trip() {
        let err = ForecastError::Validation("empty record set".to_string());
        let body = ErrorResponse::from_error(&err);
        assert_eq!(body.status, "error");
        assert_eq!(body.kind, "validation");
        assert!(body.client_fault);
        assert!(body.detail.contains("empty record set"));

        let json = serde_json::to_string(&body).unwrap();
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, "validation");
    }

    #[test]
    fn test_series_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SeriesKind::Income).unwrap(),
            "\"income\""
        );
        assert_eq!(SeriesKind::Expense.to_string(), "expense");
    }
}
