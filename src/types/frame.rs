use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::{Point, TimeSeries};

/// A single numeric column of a [`Frame`], aligned with the frame index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Timestamp-indexed table built by outer-joining series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

impl Frame {
    /// Outer join on timestamp. A series without a sample at some index
    /// timestamp contributes a missing value there.
    pub fn outer_join(series: &[&TimeSeries]) -> Frame {
        let index: Vec<DateTime<Utc>> = series
            .iter()
            .flat_map(|s| s.points().iter().map(|p| p.time))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = series
            .iter()
            .map(|s| Column {
                name: s.name().to_string(),
                values: align(&index, s.points()),
            })
            .collect();

        Frame { index, columns }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_row_complete(&self, row: usize) -> bool {
        self.columns.iter().all(|c| c.values[row].is_some())
    }

    /// Keeps only rows where every column has a value. Returns the dense
    /// frame and the number of rows removed.
    pub fn drop_incomplete(&self) -> (Frame, usize) {
        let keep: Vec<usize> = (0..self.len()).filter(|&i| self.is_row_complete(i)).collect();
        let dropped = self.len() - keep.len();
        (self.take_rows(&keep), dropped)
    }

    /// Rows at or after `start`.
    pub fn since(&self, start: DateTime<Utc>) -> Frame {
        let first = self.index.partition_point(|t| *t < start);
        let keep: Vec<usize> = (first..self.len()).collect();
        self.take_rows(&keep)
    }

    fn take_rows(&self, rows: &[usize]) -> Frame {
        let index = rows.iter().map(|&i| self.index[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: rows.iter().map(|&i| c.values[i]).collect(),
            })
            .collect();
        Frame { index, columns }
    }
}

/// Projects sorted points onto a sorted index with a single merge pass.
fn align(index: &[DateTime<Utc>], points: &[Point]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(index.len());
    let mut j = 0;
    for time in index {
        while j < points.len() && points[j].time < *time {
            j += 1;
        }
        if j < points.len() && points[j].time == *time {
            out.push(points[j].value);
        } else {
            out.push(None);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    impl Frame {
        /// Extracts one column back into a series.
        pub(crate) fn series(&self, name: &str) -> Option<TimeSeries> {
            let values = self.column(name)?;
            let points = self
                .index
                .iter()
                .zip(values)
                .map(|(time, value)| Point::new(*time, *value))
                .collect();
            Some(TimeSeries::from_points(name, points))
        }
    }

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn test_since_keeps_start_boundary() {
        let a = TimeSeries::from_values("a", (0..5).map(|i| (t(i), i as f64)));
        let frame = Frame::outer_join(&[&a]).since(t(2));
        assert_eq!(frame.index(), &[t(2), t(3), t(4)]);
        assert_eq!(frame.column("a").unwrap(), &[Some(2.0), Some(3.0), Some(4.0)]);
        assert!(Frame::outer_join(&[&a]).since(t(9)).is_empty());
    }

    #[test]
    fn test_outer_join_fills_missing() {
        let a = TimeSeries::from_values("a", vec![(t(0), 1.0), (t(1), 2.0)]);
        let b = TimeSeries::from_values("b", vec![(t(1), 10.0), (t(2), 20.0)]);
        let frame = Frame::outer_join(&[&a, &b]);

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.column("a").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(frame.column("b").unwrap(), &[None, Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_drop_incomplete_counts_rows() {
        let a = TimeSeries::from_values("a", vec![(t(0), 1.0), (t(1), 2.0), (t(2), 3.0)]);
        let b = TimeSeries::from_values("b", vec![(t(1), 10.0)]);
        let (dense, dropped) = Frame::outer_join(&[&a, &b]).drop_incomplete();

        assert_eq!(dropped, 2);
        assert_eq!(dense.index(), &[t(1)]);
        assert_eq!(dense.column("a").unwrap(), &[Some(2.0)]);
    }

    #[test]
    fn test_series_round_trip_keeps_name() {
        let a = TimeSeries::from_values("close", vec![(t(0), 1.0)]);
        let frame = Frame::outer_join(&[&a]);
        assert_eq!(frame.series("close").unwrap(), a);
        assert!(frame.series("missing").is_none());
    }
}
