use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EvalResult, EvaluationError};
use crate::types::{close_series, Candle};

use super::{FetchRequest, SeriesProvider, SourceData};

/// Open times above this are microseconds (newer dumps), below are millis.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

fn open_time(raw: i64) -> Option<DateTime<Utc>> {
    if raw > MICROS_THRESHOLD {
        Utc.timestamp_micros(raw).single()
    } else {
        Utc.timestamp_millis_opt(raw).single()
    }
}

/// Reads Binance 1-minute kline dumps laid out as
/// `<root>/spot/{daily,monthly}/klines/<SYMBOL>/1m/*.csv`.
#[derive(Debug, Clone)]
pub struct KlineDumpProvider {
    root: PathBuf,
}

impl KlineDumpProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn kline_dirs(&self, symbol: &str) -> [PathBuf; 2] {
        ["daily", "monthly"].map(|period| {
            self.root
                .join("spot")
                .join(period)
                .join("klines")
                .join(symbol)
                .join("1m")
        })
    }

    /// Parses one dump file. Header lines, if any, are skipped.
    pub fn read_file(path: &Path, currency: &str) -> EvalResult<Vec<Candle>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut candles = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let Some(Ok(raw_time)) = record.get(0).map(|f| f.trim().parse::<i64>()) else {
                debug!("Skipping non-data line {} of {}", line + 1, path.display());
                continue;
            };
            if record.len() < 6 {
                return Err(EvaluationError::DataSource(format!(
                    "{}:{}: expected at least 6 fields, found {}",
                    path.display(),
                    line + 1,
                    record.len()
                )));
            }

            let field = |i: usize| -> EvalResult<f64> {
                record[i].trim().parse::<f64>().map_err(|e| {
                    EvaluationError::DataSource(format!(
                        "{}:{}: field {}: {}",
                        path.display(),
                        line + 1,
                        i,
                        e
                    ))
                })
            };

            let open_time = open_time(raw_time).ok_or_else(|| {
                EvaluationError::DataSource(format!(
                    "{}:{}: invalid open time {}",
                    path.display(),
                    line + 1,
                    raw_time
                ))
            })?;

            candles.push(Candle {
                currency: currency.to_string(),
                open_time,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            });
        }
        Ok(candles)
    }

    /// Every candle for `symbol`, sorted by open time with duplicates
    /// (daily and monthly files overlap) removed.
    pub fn load_candles(&self, symbol: &str) -> EvalResult<Vec<Candle>> {
        let mut candles = Vec::new();
        let mut files = 0usize;

        for dir in self.kline_dirs(symbol) {
            if !dir.is_dir() {
                debug!("No kline directory at {}", dir.display());
                continue;
            }
            let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("csv")))
                .collect();
            paths.sort();

            for path in paths {
                candles.extend(Self::read_file(&path, symbol)?);
                files += 1;
            }
        }

        if candles.is_empty() {
            return Err(EvaluationError::DataSource(format!(
                "no kline data for {} under {}",
                symbol,
                self.root.display()
            )));
        }

        candles.sort_by_key(|c| c.open_time);
        let before = candles.len();
        candles.dedup_by_key(|c| c.open_time);
        if candles.len() < before {
            warn!("Removed {} duplicate klines for {}", before - candles.len(), symbol);
        }

        info!("Loaded {} klines for {} from {} files", candles.len(), symbol, files);
        let gaps = close_series(&candles).gap_count(chrono::Duration::minutes(1));
        if gaps > 0 {
            warn!("{} kline series has {} gaps", symbol, gaps);
        }
        Ok(candles)
    }
}

#[async_trait]
impl SeriesProvider for KlineDumpProvider {
    fn name(&self) -> &str {
        "kline-dump"
    }

    async fn fetch(&self, request: &FetchRequest) -> EvalResult<SourceData> {
        let symbol = request.currency()?.to_uppercase();
        let candles = self.load_candles(&symbol)?;
        Ok(SourceData::Raw {
            instrument: symbol,
            close: close_series(&candles),
        })
    }
}
