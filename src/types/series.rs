use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One sample of a time series. `None` marks a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { time, value }
    }

    pub fn present(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value: Some(value) }
    }
}

/// Named, time-ordered series. Points are kept sorted by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    name: String,
    points: Vec<Point>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Builds a series from arbitrary-order points; sorting is stable so
    /// duplicate timestamps keep their input order.
    pub fn from_points(name: impl Into<String>, mut points: Vec<Point>) -> Self {
        points.sort_by_key(|p| p.time);
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn from_values<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        let points = values
            .into_iter()
            .map(|(time, value)| Point::present(time, value))
            .collect();
        Self::from_points(name, points)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.time).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Position of `time` in the index, if present.
    pub fn position(&self, time: DateTime<Utc>) -> Option<usize> {
        self.points.binary_search_by_key(&time, |p| p.time).ok()
    }

    pub fn get(&self, time: DateTime<Utc>) -> Option<f64> {
        self.position(time).and_then(|i| self.points[i].value)
    }

    pub fn missing_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.points.windows(2).all(|w| w[0].time < w[1].time)
    }

    /// Number of places where consecutive samples are further apart than `step`.
    pub fn gap_count(&self, step: Duration) -> usize {
        self.points
            .windows(2)
            .filter(|w| w[1].time - w[0].time > step)
            .count()
    }
}
