use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EvalResult;
use crate::ml::ClassificationReport;
use crate::types::Frame;

/// One anchor of the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub time: DateTime<Utc>,
    pub actual_growth: f64,
    pub predicted_growth: f64,
}

/// Outcome of a completed evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub instrument: String,
    pub source: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rows: Vec<ComparisonRow>,
    pub classification: ClassificationReport,
    pub mse: f64,
    /// Incomplete rows plus leading rows without lag coverage.
    pub dropped_rows: usize,
}

impl EvaluationReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pretty print results to console
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                  GROWTH MODEL EVALUATION");
        println!("{}", "=".repeat(60));
        println!("Instrument:         {} ({})", self.instrument, self.source);
        println!("Period:             {} to {}", self.start, self.end);
        println!("Evaluated rows:     {}", self.rows.len());
        println!("Dropped rows:       {}", self.dropped_rows);
        println!("{}", "-".repeat(60));
        println!("CLASSIFICATION (growth >= 0 is class 1)");
        print!("{}", self.classification);
        println!("{}", "-".repeat(60));
        println!("Mean squared error: {:.10}", self.mse);
        println!("{}", "=".repeat(60));
    }

    pub fn write_csv(&self, path: &Path) -> EvalResult<()> {
        let mut writer = Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Writes a merged indicator table in warehouse column order. Missing
/// values are left empty.
pub fn write_frame_csv(frame: &Frame, path: &Path) -> EvalResult<()> {
    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["time"];
    header.extend(frame.column_names());
    writer.write_record(&header)?;

    for (i, time) in frame.index().iter().enumerate() {
        let mut record = vec![time.to_rfc3339()];
        record.extend(
            frame
                .columns()
                .iter()
                .map(|c| c.values[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
