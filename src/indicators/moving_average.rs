use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{Point, TimeSeries};

use super::round_to;

/// Which samples are treated as one subsequence when averaging.
///
/// An hourly phase groups samples by minute-of-hour, so a 7-hour average at
/// 10:15 is the mean of the 7 most recent samples taken at `:15`. A daily
/// phase groups by hour-and-minute-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Hourly,
    Daily,
}

impl Phase {
    fn key<T: Timelike>(&self, time: &T) -> u32 {
        match self {
            Phase::Hourly => time.minute(),
            Phase::Daily => time.hour() * 60 + time.minute(),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Phase::Hourly => "h",
            Phase::Daily => "d",
        }
    }
}

/// Phase-aligned moving average over `window` periods.
///
/// Each output sample is the mean of the `window` most recent same-phase
/// samples (the current one included), rounded to `precision` decimals.
/// Positions with fewer than `window` same-phase samples, or with a missing
/// value inside their window, are missing. The output keeps the input index.
pub fn phase_moving_average(
    series: &TimeSeries,
    window: usize,
    phase: Phase,
    precision: u32,
) -> TimeSeries {
    let name = format!("ma{}{}", window, phase.suffix());
    if window == 0 {
        let points = series.points().iter().map(|p| Point::new(p.time, None)).collect();
        return TimeSeries::from_points(name, points);
    }

    let mut slots: HashMap<u32, VecDeque<Option<f64>>> = HashMap::new();
    let mut points = Vec::with_capacity(series.len());

    for point in series.points() {
        let slot = slots
            .entry(phase.key(&point.time))
            .or_insert_with(|| VecDeque::with_capacity(window + 1));
        slot.push_back(point.value);
        if slot.len() > window {
            slot.pop_front();
        }

        let value = if slot.len() == window {
            slot.iter()
                .copied()
                .sum::<Option<f64>>()
                .and_then(|sum| round_to(sum / window as f64, precision))
        } else {
            None
        };
        points.push(Point::new(point.time, value));
    }

    TimeSeries::from_points(name, points)
}

pub fn hourly_moving_average(series: &TimeSeries, hours: usize, precision: u32) -> TimeSeries {
    phase_moving_average(series, hours, Phase::Hourly, precision)
}

pub fn daily_moving_average(series: &TimeSeries, days: usize, precision: u32) -> TimeSeries {
    phase_moving_average(series, days, Phase::Daily, precision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn minute_series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(
            "close",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start() + Duration::minutes(i as i64), *v)),
        )
    }

    #[test]
    fn test_constant_series_hourly() {
        for window in [1usize, 3, 7] {
            let n = 60 * (window + 2);
            let series = minute_series(&vec![42.5; n]);
            let ma = hourly_moving_average(&series, window, 10);

            assert_eq!(ma.len(), n);
            for (i, p) in ma.points().iter().enumerate() {
                // sample i has i / 60 same-phase predecessors
                if i / 60 + 1 >= window {
                    assert_eq!(p.value, Some(42.5), "window {} index {}", window, i);
                } else {
                    assert_eq!(p.value, None, "window {} index {}", window, i);
                }
            }
        }
    }

    #[test]
    fn test_hourly_uses_same_minute_only() {
        // value = hour index, so every same-minute subsequence is 0, 1, 2, ...
        let values: Vec<f64> = (0..180).map(|i| (i / 60) as f64).collect();
        let ma = hourly_moving_average(&minute_series(&values), 2, 10);

        let at = |m: i64| ma.get(start() + Duration::minutes(m));
        assert_eq!(at(59), None);
        assert_eq!(at(60), Some(0.5));
        assert_eq!(at(119), Some(0.5));
        assert_eq!(at(120), Some(1.5));
    }

    #[test]
    fn test_daily_phase_groups_by_hour_and_minute() {
        // two samples per day at 00:00 and 12:00 over three days
        let series = TimeSeries::from_values(
            "close",
            (0..6).map(|i| (start() + Duration::hours(12 * i), if i % 2 == 0 { 10.0 } else { 20.0 })),
        );
        let ma = daily_moving_average(&series, 3, 10);

        assert_eq!(ma.name(), "ma3d");
        assert_eq!(ma.values(), vec![None, None, None, None, Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_missing_input_blanks_window() {
        let mut points: Vec<Point> = (0..3)
            .map(|i| Point::present(start() + Duration::hours(i), 5.0))
            .collect();
        points[1].value = None;
        let series = TimeSeries::from_points("close", points);
        let ma = hourly_moving_average(&series, 2, 10);
        assert_eq!(ma.values(), vec![None, None, None]);
    }

    #[test]
    fn test_output_preserves_index() {
        let series = minute_series(&[1.0, 2.0, 3.0]);
        let ma = hourly_moving_average(&series, 1, 10);
        assert_eq!(ma.times(), series.times());
        assert_eq!(ma.values(), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }
}
