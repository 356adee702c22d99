use tracing::debug;

use crate::config::PipelineSettings;
use crate::types::{
    Frame, TimeSeries, CLOSE, CLOSE_MINMAX_SCALE, MA25_99H, MA25_99H_SCALE, MA7_25D, MA7_25D_SCALE,
    MA7_25H, MA7_25H_SCALE,
};

use super::{daily_moving_average, difference, hourly_moving_average, scale_by_price, window_normalization};

/// Output of the local indicator transform.
#[derive(Debug, Clone)]
pub struct DerivedIndicators {
    /// Outer-joined table in the warehouse column layout; not yet densified.
    pub frame: Frame,
    /// Rolling min-max position of close over the full input range.
    pub normalized: TimeSeries,
}

/// Derives the warehouse indicator columns from a raw close series.
///
/// Hourly averages feed `ma7_25h` and `ma25_99h`, daily averages feed
/// `ma7_25d`; each difference is then scaled by the concurrent close. The
/// min-max normalized close is joined in as `close_minmax_scale`.
pub fn derive_indicators(close: &TimeSeries, settings: &PipelineSettings) -> DerivedIndicators {
    let close = close.clone().renamed(CLOSE);
    let p = settings.precision;
    let [h_fast, h_mid, h_slow] = settings.hourly_windows;
    let [d_fast, d_slow] = settings.daily_windows;

    let ma_h_fast = hourly_moving_average(&close, h_fast, p);
    let ma_h_mid = hourly_moving_average(&close, h_mid, p);
    let ma_h_slow = hourly_moving_average(&close, h_slow, p);
    let ma7_25h = difference(&ma_h_fast, &ma_h_mid, MA7_25H, p);
    let ma25_99h = difference(&ma_h_mid, &ma_h_slow, MA25_99H, p);

    let ma_d_fast = daily_moving_average(&close, d_fast, p);
    let ma_d_slow = daily_moving_average(&close, d_slow, p);
    let ma7_25d = difference(&ma_d_fast, &ma_d_slow, MA7_25D, p);

    let ma7_25h_scale = scale_by_price(&ma7_25h, &close, MA7_25H_SCALE, p);
    let ma25_99h_scale = scale_by_price(&ma25_99h, &close, MA25_99H_SCALE, p);
    let ma7_25d_scale = scale_by_price(&ma7_25d, &close, MA7_25D_SCALE, p);

    let normalized = window_normalization(&close, settings.normalization_window, p)
        .renamed(CLOSE_MINMAX_SCALE);

    debug!(
        "Derived indicators over {} samples ({} normalized values missing)",
        close.len(),
        normalized.missing_count()
    );

    let frame = Frame::outer_join(&[
        &normalized,
        &close,
        &ma7_25h,
        &ma25_99h,
        &ma7_25d,
        &ma7_25h_scale,
        &ma25_99h_scale,
        &ma7_25d_scale,
    ]);

    DerivedIndicators { frame, normalized }
}
