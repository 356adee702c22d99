pub mod difference;
pub mod moving_average;
pub mod normalize;
pub mod transform;

pub use difference::*;
pub use moving_average::*;
pub use normalize::*;
pub use transform::*;

/// Decimal places every derived series is rounded to.
pub const DEFAULT_PRECISION: u32 = 10;

/// Rounds half-to-even at `decimals` places (scale, round, unscale), so
/// derived values match the warehouse's stored indicators bit for bit.
/// Non-finite input or output becomes missing.
pub fn round_to(value: f64, decimals: u32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round_ties_even() / factor;
    rounded.is_finite().then_some(rounded)
}
