use crate::types::{Frame, Point, TimeSeries};

use super::round_to;

/// Outer-aligned combination of two series. Timestamps present in only one
/// operand, or where either value is missing, yield a missing output.
fn combine<F>(left: &TimeSeries, right: &TimeSeries, name: &str, f: F) -> TimeSeries
where
    F: Fn(f64, f64) -> Option<f64>,
{
    let frame = Frame::outer_join(&[left, right]);
    let columns = frame.columns();
    let points = frame
        .index()
        .iter()
        .enumerate()
        .map(|(i, time)| {
            let value = match (columns[0].values[i], columns[1].values[i]) {
                (Some(a), Some(b)) => f(a, b),
                _ => None,
            };
            Point::new(*time, value)
        })
        .collect();
    TimeSeries::from_points(name, points)
}

/// `fast − slow` for two moving averages of different window lengths.
pub fn difference(fast: &TimeSeries, slow: &TimeSeries, name: &str, precision: u32) -> TimeSeries {
    combine(fast, slow, name, |a, b| round_to(a - b, precision))
}

/// Divides an indicator by the concurrent close so it is comparable across
/// price scales. A zero close yields a missing value.
pub fn scale_by_price(indicator: &TimeSeries, close: &TimeSeries, name: &str, precision: u32) -> TimeSeries {
    combine(indicator, close, name, |value, price| {
        if price == 0.0 {
            None
        } else {
            round_to(value / price, precision)
        }
    })
}
