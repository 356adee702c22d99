pub mod binance;

pub use binance::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EvalResult, EvaluationError};
use crate::types::{Frame, TimeSeries};

/// What a provider hands back for one run.
#[derive(Debug, Clone)]
pub enum SourceData {
    /// Warehouse rows with indicators already derived. `frame` holds
    /// `close` and the three `_scale` columns from the start boundary on;
    /// `history` is the normalized price reaching 28 days further back.
    Precomputed {
        instrument: String,
        frame: Frame,
        history: TimeSeries,
    },
    /// Raw 1-minute close prices; indicators are derived locally.
    Raw {
        instrument: String,
        close: TimeSeries,
    },
}

impl SourceData {
    pub fn instrument(&self) -> &str {
        match self {
            SourceData::Precomputed { instrument, .. } | SourceData::Raw { instrument, .. } => instrument,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            SourceData::Precomputed { frame, .. } => frame.len(),
            SourceData::Raw { close, .. } => close.len(),
        }
    }
}

/// Identifies the series to evaluate. At least one of `table` or
/// `currency` must be set; `table` wins when both are.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub table: Option<String>,
    pub currency: Option<String>,
    pub start: Option<DateTime<Utc>>,
}

impl FetchRequest {
    pub fn for_currency(currency: impl Into<String>, start: Option<DateTime<Utc>>) -> Self {
        Self {
            table: None,
            currency: Some(currency.into()),
            start,
        }
    }

    /// Warehouse table to query, `crypto_ind_<currency>` by default.
    pub fn resolve_table(&self) -> EvalResult<String> {
        let table = match (&self.table, &self.currency) {
            (Some(table), _) => table.trim().to_string(),
            (None, Some(currency)) => format!("crypto_ind_{}", currency.trim().to_lowercase()),
            (None, None) => {
                return Err(EvaluationError::InvalidArgument(
                    "either a table or a currency must be provided".into(),
                ))
            }
        };
        validate_identifier(&table)?;
        Ok(table)
    }

    pub fn currency(&self) -> EvalResult<&str> {
        self.currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| EvaluationError::InvalidArgument("a currency symbol is required".into()))
    }

    pub fn require_start(&self) -> EvalResult<DateTime<Utc>> {
        self.start
            .ok_or_else(|| EvaluationError::InvalidArgument("a start date is required".into()))
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_identifier(name: &str) -> EvalResult<()> {
    let valid = name
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EvaluationError::InvalidArgument(format!(
            "'{}' is not a valid table name",
            name
        )))
    }
}

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, request: &FetchRequest) -> EvalResult<SourceData>;
}
