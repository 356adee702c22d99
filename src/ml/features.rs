use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EvalResult, EvaluationError};
use crate::types::{IndicatorRow, IndicatorTable, TimeSeries};

/// Hours back from the anchor at which normalized price is sampled. The
/// schedule is part of the deployed models' input shape and must not change.
pub const LAG_HOURS: [usize; 28] = [
    1, 25, 49, 73, 97, 121, 145, 169, 193, 217, 241, 265, 289, 313, 337, 361, 385, 409, 433, 467,
    491, 515, 539, 563, 587, 611, 635, 672,
];

/// Current normalized price + 3 scaled indicators + 28 lags.
pub const FEATURE_LEN: usize = 1 + 3 + LAG_HOURS.len();

pub const SAMPLES_PER_HOUR: usize = 60;

/// Extra history needed before the first anchor (the deepest lag).
pub fn lookback() -> Duration {
    Duration::days(28)
}

/// Fixed-size model input for one anchor timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub [f64; FEATURE_LEN]);

/// Aligned model inputs and ground truth for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub times: Vec<DateTime<Utc>>,
    pub vectors: Vec<FeatureVector>,
    pub labels: Vec<f64>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// `(close[i + horizon] − close[i]) / close[i]` for every row that has a
/// sample `horizon` rows ahead. A zero or non-finite base close has no
/// defined growth and is rejected.
pub fn realized_growth(closes: &[f64], horizon: usize) -> EvalResult<Vec<f64>> {
    if closes.len() <= horizon {
        return Ok(Vec::new());
    }
    (0..closes.len() - horizon)
        .map(|i| {
            let base = closes[i];
            if base == 0.0 || !base.is_finite() {
                return Err(EvaluationError::DataAlignment(format!(
                    "close {} at row {} has no defined growth",
                    base, i
                )));
            }
            Ok((closes[i + horizon] - base) / base)
        })
        .collect()
}

/// Builds lag vectors by reading a normalized-price history at fixed sample
/// offsets from each anchor.
///
/// Offsets assume 1-minute sampling; every read is checked against the
/// timestamp it is supposed to carry, so a gap in the history fails the run
/// instead of silently shifting the lags.
pub struct FeatureAssembler<'a> {
    history: &'a TimeSeries,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(history: &'a TimeSeries) -> EvalResult<Self> {
        if !history.is_strictly_increasing() {
            return Err(EvaluationError::DataAlignment(format!(
                "history '{}' has duplicate or unordered timestamps",
                history.name()
            )));
        }
        Ok(Self { history })
    }

    /// Current normalized price and the lagged values for `anchor`.
    fn lookup(&self, anchor: DateTime<Utc>) -> EvalResult<(f64, [f64; LAG_HOURS.len()])> {
        let points = self.history.points();
        let idx = self.history.position(anchor).ok_or_else(|| {
            EvaluationError::DataAlignment(format!("anchor {} not present in price history", anchor))
        })?;
        let current = points[idx].value.ok_or_else(|| {
            EvaluationError::DataAlignment(format!("normalized price missing at anchor {}", anchor))
        })?;

        let mut lags = [0.0; LAG_HOURS.len()];
        for (slot, hours) in lags.iter_mut().zip(LAG_HOURS) {
            let expected = anchor - Duration::hours(hours as i64);
            let point = idx
                .checked_sub(hours * SAMPLES_PER_HOUR)
                .map(|j| &points[j])
                .filter(|p| p.time == expected)
                .ok_or_else(|| {
                    EvaluationError::DataAlignment(format!(
                        "price history is not contiguous: {}h lag of {} expected at {}",
                        hours, anchor, expected
                    ))
                })?;
            *slot = point.value.ok_or_else(|| {
                EvaluationError::DataAlignment(format!(
                    "normalized price missing at {} ({}h lag of {})",
                    expected, hours, anchor
                ))
            })?;
        }
        Ok((current, lags))
    }

    pub fn has_lookback(&self, anchor: DateTime<Utc>) -> bool {
        self.lookup(anchor).is_ok()
    }

    pub fn vector(&self, row: &IndicatorRow) -> EvalResult<FeatureVector> {
        let (current, lags) = self.lookup(row.time)?;
        let mut values = [0.0; FEATURE_LEN];
        values[0] = current;
        values[1..4].copy_from_slice(&row.scaled());
        values[4..].copy_from_slice(&lags);
        Ok(FeatureVector(values))
    }

    /// Drops leading rows whose full lookback is not covered by the history.
    /// Returns the number of rows removed.
    pub fn trim_uncovered(&self, table: &mut IndicatorTable) -> usize {
        let uncovered = table
            .rows
            .iter()
            .take_while(|row| !self.has_lookback(row.time))
            .count();
        if uncovered > 0 {
            warn!(
                "Dropping {} leading rows of {} without {} days of price history",
                uncovered,
                table.instrument,
                lookback().num_days()
            );
            table.skip_leading(uncovered);
        }
        uncovered
    }

    /// One vector and one realized-growth label per row, except the last
    /// `horizon` rows which have no label.
    pub fn build(&self, table: &IndicatorTable, horizon: usize) -> EvalResult<FeatureSet> {
        let labels = realized_growth(&table.closes(), horizon)?;
        let anchors = &table.rows[..labels.len()];

        let vectors = anchors
            .iter()
            .map(|row| self.vector(row))
            .collect::<EvalResult<Vec<_>>>()?;
        let times = anchors.iter().map(|row| row.time).collect();

        debug!("Assembled {} feature vectors of length {}", vectors.len(), FEATURE_LEN);
        Ok(FeatureSet { times, vectors, labels })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Point;
    use chrono::TimeZone;

    impl FeatureVector {
        fn current_price(&self) -> f64 {
            self.0[0]
        }

        fn scaled_indicators(&self) -> &[f64] {
            &self.0[1..4]
        }

        fn lags(&self) -> &[f64] {
            &self.0[4..]
        }
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    /// Contiguous minute history starting 28 days before `start()`, value =
    /// minutes since its first sample scaled into [0, 1).
    pub fn history(extra_minutes: usize) -> TimeSeries {
        let first = start() - lookback();
        let total = lookback().num_minutes() as usize + extra_minutes;
        TimeSeries::from_values(
            "close_minmax_scale",
            (0..total).map(|i| (first + Duration::minutes(i as i64), i as f64 / total as f64)),
        )
    }

    pub fn table(rows: usize) -> IndicatorTable {
        let rows = (0..rows)
            .map(|i| IndicatorRow {
                time: start() + Duration::minutes(i as i64),
                close: 100.0 + (i % 10) as f64,
                ma7_25h_scale: 0.01,
                ma25_99h_scale: -0.02,
                ma7_25d_scale: 0.03,
            })
            .collect();
        IndicatorTable::new("BTCUSDT", rows)
    }

    #[test]
    fn test_lag_schedule_shape() {
        assert_eq!(LAG_HOURS.len(), 28);
        assert_eq!(FEATURE_LEN, 32);
        assert_eq!(*LAG_HOURS.last().unwrap() as i64, lookback().num_hours());
        assert!(LAG_HOURS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_realized_growth() {
        let closes = [100.0, 110.0, 90.0, 99.0];
        let growth = realized_growth(&closes, 2).unwrap();
        assert_eq!(growth.len(), 2);
        assert!((growth[0] - (-0.1)).abs() < 1e-12);
        assert!((growth[1] - (-0.1)).abs() < 1e-12);
        assert!(realized_growth(&closes, 4).unwrap().is_empty());
    }

    #[test]
    fn test_zero_base_close_is_rejected() {
        let err = realized_growth(&[100.0, 0.0, 90.0, 99.0], 2).unwrap_err();
        assert!(matches!(err, EvaluationError::DataAlignment(ref m) if m.contains("row 1")));

        // A zero close only as a target is a total loss, not an error.
        let growth = realized_growth(&[100.0, 110.0, 0.0], 2).unwrap();
        assert_eq!(growth, vec![-1.0]);
    }

    #[test]
    fn test_build_rejects_zero_close_anchor() {
        let history = history(3000);
        let mut table = table(3000);
        table.rows[10].close = 0.0;
        let assembler = FeatureAssembler::new(&history).unwrap();
        let err = assembler.build(&table, 1440).unwrap_err();
        assert!(matches!(err, EvaluationError::DataAlignment(_)));
    }

    #[test]
    fn test_counts_match_rows_minus_horizon() {
        let history = history(3000);
        let table = table(3000);
        let assembler = FeatureAssembler::new(&history).unwrap();
        let set = assembler.build(&table, 1440).unwrap();

        assert_eq!(set.len(), 3000 - 1440);
        assert_eq!(set.labels.len(), set.len());
        assert_eq!(set.times.len(), set.len());
        assert!(set.vectors.iter().all(|v| v.0.len() == 32));
    }

    #[test]
    fn test_vector_layout_reads_exact_offsets() {
        let history = history(10);
        let table = table(10);
        let assembler = FeatureAssembler::new(&history).unwrap();
        let vector = assembler.vector(&table.rows[3]).unwrap();

        let anchor = table.rows[3].time;
        assert_eq!(vector.current_price(), history.get(anchor).unwrap());
        assert_eq!(vector.scaled_indicators(), &[0.01, -0.02, 0.03]);
        for (value, hours) in vector.lags().iter().zip(LAG_HOURS) {
            let expected = history.get(anchor - Duration::hours(hours as i64)).unwrap();
            assert_eq!(*value, expected);
        }
        // deepest lag of the first anchor is the first history sample
        let first = assembler.vector(&table.rows[0]).unwrap();
        assert_eq!(first.lags()[27], history.points()[0].value.unwrap());
    }

    #[test]
    fn test_gap_in_history_is_rejected() {
        let full = history(10);
        let mut points: Vec<Point> = full.points().to_vec();
        // remove the sample 25 hours before the anchor
        let anchor = start();
        points.retain(|p| p.time != anchor - Duration::hours(25));
        let gapped = TimeSeries::from_points("close_minmax_scale", points);

        let assembler = FeatureAssembler::new(&gapped).unwrap();
        let err = assembler.vector(&table(1).rows[0]).unwrap_err();
        assert!(matches!(err, EvaluationError::DataAlignment(ref m) if m.contains("not contiguous")));
    }

    #[test]
    fn test_missing_lag_value_is_rejected() {
        let full = history(10);
        let mut points: Vec<Point> = full.points().to_vec();
        points[0].value = None;
        let history = TimeSeries::from_points("close_minmax_scale", points);
        let assembler = FeatureAssembler::new(&history).unwrap();
        assert!(assembler.vector(&table(1).rows[0]).is_err());
        assert!(assembler.vector(&table(2).rows[1]).is_ok());
    }

    #[test]
    fn test_trim_uncovered_leading_rows() {
        // history starts 5 minutes late, so the first 5 anchors lack their deepest lag
        let full = history(20);
        let history = TimeSeries::from_points("close_minmax_scale", full.points()[5..].to_vec());
        let assembler = FeatureAssembler::new(&history).unwrap();
        let mut table = table(20);

        assert_eq!(assembler.trim_uncovered(&mut table), 5);
        assert_eq!(table.len(), 15);
        assert_eq!(table.start(), Some(start() + Duration::minutes(5)));
    }
}
