use std::collections::VecDeque;

use crate::types::{Point, TimeSeries};

use super::round_to;

/// Trailing-window min-max position of each sample.
///
/// For every position with a full `window`-sample history the output is
/// `(value − min) / (max − min)` over that window, rounded to `precision`.
/// Positions before the window fills, windows holding a missing sample, and
/// flat windows (`max == min`) are missing.
pub fn window_normalization(series: &TimeSeries, window: usize, precision: u32) -> TimeSeries {
    let points = series.points();
    let mut out = Vec::with_capacity(points.len());

    // Monotonic deques of indices: front is the window min / max.
    let mut mins: VecDeque<usize> = VecDeque::new();
    let mut maxs: VecDeque<usize> = VecDeque::new();
    let mut missing_in_window = 0usize;

    for (i, point) in points.iter().enumerate() {
        if point.value.is_none() {
            missing_in_window += 1;
        }
        if window > 0 && i >= window && points[i - window].value.is_none() {
            missing_in_window -= 1;
        }

        if let Some(value) = point.value {
            while mins.back().is_some_and(|&j| points[j].value.is_some_and(|v| v >= value)) {
                mins.pop_back();
            }
            mins.push_back(i);
            while maxs.back().is_some_and(|&j| points[j].value.is_some_and(|v| v <= value)) {
                maxs.pop_back();
            }
            maxs.push_back(i);
        }
        while mins.front().is_some_and(|&j| i >= window && j <= i - window) {
            mins.pop_front();
        }
        while maxs.front().is_some_and(|&j| i >= window && j <= i - window) {
            maxs.pop_front();
        }

        let filled = window > 0 && i + 1 >= window;
        let value = match (point.value, filled && missing_in_window == 0) {
            (Some(last), true) => {
                let lo = mins.front().and_then(|&j| points[j].value);
                let hi = maxs.front().and_then(|&j| points[j].value);
                match (lo, hi) {
                    (Some(lo), Some(hi)) if hi > lo => round_to((last - lo) / (hi - lo), precision),
                    _ => None,
                }
            }
            _ => None,
        };
        out.push(Point::new(point.time, value));
    }

    TimeSeries::from_points(format!("{}_minmax_scale", series.name()), out)
}
