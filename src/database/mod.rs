use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{DatabaseSettings, TimeoutSettings};
use crate::error::EvalResult;
use crate::exchange::{FetchRequest, SeriesProvider, SourceData};
use crate::ml::features::lookback;
use crate::types::{
    Frame, Point, TimeSeries, CLOSE, CLOSE_MINMAX_SCALE, MA25_99H_SCALE, MA7_25D_SCALE,
    MA7_25H_SCALE,
};

/// One warehouse row from the indicator query. Columns may be NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRecord {
    pub time: DateTime<Utc>,
    pub currency: Option<String>,
    pub close: Option<f64>,
    pub ma7_25h_scale: Option<f64>,
    pub ma25_99h_scale: Option<f64>,
    pub ma7_25d_scale: Option<f64>,
}

pub fn indicator_query(table: &str) -> String {
    format!(
        r#"
        SELECT time, currency, close::float8 AS close,
               ma7_25h_scale::float8 AS ma7_25h_scale,
               ma25_99h_scale::float8 AS ma25_99h_scale,
               ma7_25d_scale::float8 AS ma7_25d_scale
        FROM {}
        WHERE time >= $1
        ORDER BY time ASC
        "#,
        table
    )
}

pub fn history_query(table: &str) -> String {
    format!(
        r#"
        SELECT time, close_minmax_scale::float8 AS close_minmax_scale
        FROM {}
        WHERE time >= $1
        ORDER BY time ASC
        "#,
        table
    )
}

/// Lays warehouse rows out as a frame with `close` and the scaled columns.
pub fn indicator_frame(records: &[IndicatorRecord]) -> Frame {
    let column = |name: &str, pick: fn(&IndicatorRecord) -> Option<f64>| {
        TimeSeries::from_points(
            name,
            records.iter().map(|r| Point::new(r.time, pick(r))).collect(),
        )
    };
    let close = column(CLOSE, |r| r.close);
    let ma7_25h = column(MA7_25H_SCALE, |r| r.ma7_25h_scale);
    let ma25_99h = column(MA25_99H_SCALE, |r| r.ma25_99h_scale);
    let ma7_25d = column(MA7_25D_SCALE, |r| r.ma7_25d_scale);
    Frame::outer_join(&[&close, &ma7_25h, &ma25_99h, &ma7_25d])
}

/// Precomputed indicators stored in per-currency PostgreSQL tables.
pub struct WarehouseProvider {
    pool: PgPool,
}

impl WarehouseProvider {
    pub async fn connect(settings: &DatabaseSettings, timeouts: &TimeoutSettings) -> EvalResult<Self> {
        info!(
            "Connecting to indicator warehouse {}@{}:{}/{}",
            settings.username, settings.host, settings.port, settings.name
        );

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(timeouts.connect_secs))
            .connect_with(settings.connect_options())
            .await?;

        info!("Warehouse connection established");
        Ok(Self { pool })
    }

    async fn fetch_indicators(&self, table: &str, start: DateTime<Utc>) -> EvalResult<Vec<IndicatorRecord>> {
        let rows = sqlx::query(&indicator_query(table))
            .bind(start)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(IndicatorRecord {
                time: row.try_get("time")?,
                currency: row.try_get("currency")?,
                close: row.try_get("close")?,
                ma7_25h_scale: row.try_get("ma7_25h_scale")?,
                ma25_99h_scale: row.try_get("ma25_99h_scale")?,
                ma7_25d_scale: row.try_get("ma7_25d_scale")?,
            });
        }
        Ok(records)
    }

    async fn fetch_history(&self, table: &str, from: DateTime<Utc>) -> EvalResult<TimeSeries> {
        let rows = sqlx::query(&history_query(table))
            .bind(from)
            .fetch_all(&self.pool)
            .await?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            points.push(Point::new(
                row.try_get("time")?,
                row.try_get("close_minmax_scale")?,
            ));
        }
        Ok(TimeSeries::from_points(CLOSE_MINMAX_SCALE, points))
    }
}

#[async_trait]
impl SeriesProvider for WarehouseProvider {
    fn name(&self) -> &str {
        "warehouse"
    }

    async fn fetch(&self, request: &FetchRequest) -> EvalResult<SourceData> {
        let table = request.resolve_table()?;
        let start = request.require_start()?;

        info!("Querying {} from {}", table, start);
        let records = self.fetch_indicators(&table, start).await?;
        let history = self.fetch_history(&table, start - lookback()).await?;
        debug!(
            "Fetched {} indicator rows and {} history rows from {}",
            records.len(),
            history.len(),
            table
        );
        if history.missing_count() > 0 {
            warn!(
                "{} has {} NULL normalized prices in the lag window",
                table,
                history.missing_count()
            );
        }

        let instrument = records
            .iter()
            .find_map(|r| r.currency.clone())
            .or_else(|| request.currency.clone())
            .unwrap_or_else(|| table.clone());

        Ok(SourceData::Precomputed {
            instrument,
            frame: indicator_frame(&records),
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(minute: i64, close: Option<f64>) -> IndicatorRecord {
        IndicatorRecord {
            time: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute),
            currency: Some("ETHUSDT".into()),
            close,
            ma7_25h_scale: Some(0.1),
            ma25_99h_scale: Some(0.2),
            ma7_25d_scale: Some(0.3),
        }
    }

    #[test]
    fn test_queries_target_table_with_bound_start() {
        let q = indicator_query("crypto_ind_ethusdt");
        assert!(q.contains("FROM crypto_ind_ethusdt"));
        assert!(q.contains("time >= $1"));
        assert!(q.contains("ma7_25d_scale"));

        let h = history_query("crypto_ind_ethusdt");
        assert!(h.contains("close_minmax_scale"));
        assert!(h.contains("ORDER BY time"));
    }

    #[test]
    fn test_indicator_frame_keeps_nulls_explicit() {
        let frame = indicator_frame(&[record(0, Some(100.0)), record(1, None)]);
        assert_eq!(
            frame.column_names(),
            vec![CLOSE, MA7_25H_SCALE, MA25_99H_SCALE, MA7_25D_SCALE]
        );
        assert_eq!(frame.column(CLOSE).unwrap(), &[Some(100.0), None]);

        let (dense, dropped) = frame.drop_incomplete();
        assert_eq!(dense.len(), 1);
        assert_eq!(dropped, 1);
    }
}
