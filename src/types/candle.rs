use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimeSeries;

/// One 1-minute OHLCV bar as found in the exchange kline dumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub currency: String,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Close prices indexed by bar open time.
pub fn close_series(candles: &[Candle]) -> TimeSeries {
    TimeSeries::from_values("close", candles.iter().map(|c| (c.open_time, c.close)))
}
