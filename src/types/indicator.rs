use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EvalResult, EvaluationError};

use super::Frame;

// Column names shared with the indicator warehouse schema.
pub const CLOSE: &str = "close";
pub const MA7_25H: &str = "ma7_25h";
pub const MA25_99H: &str = "ma25_99h";
pub const MA7_25D: &str = "ma7_25d";
pub const MA7_25H_SCALE: &str = "ma7_25h_scale";
pub const MA25_99H_SCALE: &str = "ma25_99h_scale";
pub const MA7_25D_SCALE: &str = "ma7_25d_scale";
pub const CLOSE_MINMAX_SCALE: &str = "close_minmax_scale";

/// One fully populated row of the evaluation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub time: DateTime<Utc>,
    pub close: f64,
    pub ma7_25h_scale: f64,
    pub ma25_99h_scale: f64,
    pub ma7_25d_scale: f64,
}

impl IndicatorRow {
    /// Scaled indicators in model input order.
    pub fn scaled(&self) -> [f64; 3] {
        [self.ma7_25h_scale, self.ma25_99h_scale, self.ma7_25d_scale]
    }
}

/// Dense, time-ordered indicator table for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTable {
    pub instrument: String,
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorTable {
    pub fn new(instrument: impl Into<String>, rows: Vec<IndicatorRow>) -> Self {
        Self {
            instrument: instrument.into(),
            rows,
        }
    }

    /// Reads the close and scaled-indicator columns of a dense frame. Extra
    /// columns are ignored.
    pub fn from_dense(frame: &Frame, instrument: impl Into<String>) -> EvalResult<Self> {
        let column = |name: &str| {
            frame.column(name).ok_or_else(|| {
                EvaluationError::DataAlignment(format!("column '{}' missing from merged table", name))
            })
        };
        let close = column(CLOSE)?;
        let h7_25 = column(MA7_25H_SCALE)?;
        let h25_99 = column(MA25_99H_SCALE)?;
        let d7_25 = column(MA7_25D_SCALE)?;

        let mut rows = Vec::with_capacity(frame.len());
        for (i, time) in frame.index().iter().enumerate() {
            match (close[i], h7_25[i], h25_99[i], d7_25[i]) {
                (Some(close), Some(a), Some(b), Some(c)) => rows.push(IndicatorRow {
                    time: *time,
                    close,
                    ma7_25h_scale: a,
                    ma25_99h_scale: b,
                    ma7_25d_scale: c,
                }),
                _ => {
                    return Err(EvaluationError::DataAlignment(format!(
                        "row at {} is incomplete; frame was not densified",
                        time
                    )))
                }
            }
        }

        Ok(Self::new(instrument, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|r| r.time)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|r| r.time)
    }

    /// Drops the first `n` rows.
    pub fn skip_leading(&mut self, n: usize) {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
    }
}
