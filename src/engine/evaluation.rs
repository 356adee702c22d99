use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::EvaluationConfig;
use crate::error::{EvalResult, EvaluationError};
use crate::exchange::{FetchRequest, SeriesProvider, SourceData};
use crate::indicators::derive_indicators;
use crate::ml::client::check_predictions;
use crate::ml::{mean_squared_error, ClassificationReport, FeatureAssembler, FeatureSet, Predictor};
use crate::types::{Frame, IndicatorTable, TimeSeries, CLOSE};

use super::results::{ComparisonRow, EvaluationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Init,
    Fetched,
    Transformed,
    Predicted,
    Scored,
    Failed,
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationState::Init => write!(f, "INIT"),
            EvaluationState::Fetched => write!(f, "FETCHED"),
            EvaluationState::Transformed => write!(f, "TRANSFORMED"),
            EvaluationState::Predicted => write!(f, "PREDICTED"),
            EvaluationState::Scored => write!(f, "SCORED"),
            EvaluationState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Dense rows, model inputs and the number of rows that fell out on the way.
struct Prepared {
    instrument: String,
    features: FeatureSet,
    dropped_rows: usize,
}

/// Runs fetch → transform → predict → score for one request.
pub struct Evaluator {
    provider: Arc<dyn SeriesProvider>,
    predictor: Arc<dyn Predictor>,
    config: EvaluationConfig,
    state: EvaluationState,
}

impl Evaluator {
    pub fn new(
        provider: Arc<dyn SeriesProvider>,
        predictor: Arc<dyn Predictor>,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            provider,
            predictor,
            config,
            state: EvaluationState::Init,
        }
    }

    pub fn state(&self) -> EvaluationState {
        self.state
    }

    fn transition(&mut self, next: EvaluationState) {
        debug!("Evaluation state {} -> {}", self.state, next);
        self.state = next;
    }

    fn check_rows(&self, rows: usize) -> EvalResult<()> {
        let required = self.config.pipeline.min_rows();
        if rows < required {
            return Err(EvaluationError::InsufficientHistory { rows, required });
        }
        Ok(())
    }

    pub async fn run(&mut self, request: &FetchRequest) -> EvalResult<EvaluationReport> {
        self.state = EvaluationState::Init;
        match self.execute(request).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Evaluation failed in state {}: {}", self.state, e);
                self.transition(EvaluationState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self, request: &FetchRequest) -> EvalResult<EvaluationReport> {
        info!("━━━ Step 1: Fetching series from {} ━━━", self.provider.name());
        let source = self.provider.fetch(request).await?;
        info!("Fetched {} rows for {}", source.row_count(), source.instrument());
        self.check_rows(source.row_count())?;
        self.transition(EvaluationState::Fetched);

        info!("━━━ Step 2: Building feature vectors ━━━");
        let prepared = self.prepare(source, request.start)?;
        self.transition(EvaluationState::Transformed);

        info!("━━━ Step 3: Requesting predictions ━━━");
        let features = &prepared.features;
        let predictions = self
            .predictor
            .predict(&features.vectors, &self.config.model)
            .await?;
        let predictions = check_predictions(features.len(), predictions)?;
        self.transition(EvaluationState::Predicted);

        info!("━━━ Step 4: Scoring ━━━");
        let report = self.score(prepared, predictions)?;
        self.transition(EvaluationState::Scored);
        info!(
            "Evaluated {} rows of {} (mse={:.10}, accuracy={:.4})",
            report.len(),
            report.instrument,
            report.mse,
            report.classification.accuracy
        );
        Ok(report)
    }

    fn prepare(&self, source: SourceData, start: Option<DateTime<Utc>>) -> EvalResult<Prepared> {
        let settings = &self.config.pipeline;
        let (instrument, frame, history): (String, Frame, TimeSeries) = match source {
            SourceData::Precomputed {
                instrument,
                frame,
                history,
            } => (instrument, frame, history),
            SourceData::Raw { instrument, close } => {
                let derived = derive_indicators(&close, settings);
                let frame = match start {
                    Some(start) => derived.frame.since(start),
                    None => derived.frame,
                };
                (instrument, frame, derived.normalized)
            }
        };

        let (dense, incomplete) = frame.drop_incomplete();
        if incomplete > 0 {
            warn!(
                "Dropped {} of {} merged rows of {} with missing values",
                incomplete,
                frame.len(),
                instrument
            );
        }
        let mut table = IndicatorTable::from_dense(&dense, instrument.as_str())?;
        self.check_rows(table.len())?;

        let assembler = FeatureAssembler::new(&history)?;
        let uncovered = assembler.trim_uncovered(&mut table);
        self.check_rows(table.len())?;

        if let (Some(first), Some(last)) = (table.start(), table.end()) {
            debug!("Dense rows of {} span {} to {}", instrument, first, last);
        }
        let gaps = TimeSeries::from_values(CLOSE, table.rows.iter().map(|r| (r.time, r.close)))
            .gap_count(Duration::minutes(1));
        if gaps > 0 {
            warn!(
                "{} has {} gaps between dense rows; labels follow row order",
                instrument, gaps
            );
        }

        let features = assembler.build(&table, settings.horizon_minutes)?;
        if features.vectors.len() != features.labels.len() {
            return Err(EvaluationError::DataAlignment(format!(
                "{} feature vectors but {} labels",
                features.vectors.len(),
                features.labels.len()
            )));
        }
        info!(
            "Built {} feature vectors from {} dense rows",
            features.len(),
            table.len()
        );

        Ok(Prepared {
            instrument,
            features,
            dropped_rows: incomplete + uncovered,
        })
    }

    fn score(&self, prepared: Prepared, predictions: Vec<f64>) -> EvalResult<EvaluationReport> {
        let FeatureSet { times, labels, .. } = prepared.features;
        let classification = ClassificationReport::from_growth(&labels, &predictions)?;
        let mse = mean_squared_error(&labels, &predictions)?;

        let (start, end) = match (times.first(), times.last()) {
            (Some(start), Some(end)) => (*start, *end),
            _ => {
                return Err(EvaluationError::InsufficientHistory {
                    rows: 0,
                    required: self.config.pipeline.min_rows(),
                })
            }
        };

        let rows = times
            .into_iter()
            .zip(labels)
            .zip(predictions)
            .map(|((time, actual_growth), predicted_growth)| ComparisonRow {
                time,
                actual_growth,
                predicted_growth,
            })
            .collect();

        Ok(EvaluationReport {
            instrument: prepared.instrument,
            source: self.provider.name().to_string(),
            start,
            end,
            rows,
            classification,
            mse,
            dropped_rows: prepared.dropped_rows,
        })
    }
}
