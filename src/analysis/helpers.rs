//! Numeric helpers shared across the pipeline stages

use crate::{Bar, OHLCV};

/// Average volume over the `period` bars before `at` (bar `at` excluded).
///
/// At index 0 there are no trailing bars; the bar's own volume is used.
#[inline]
pub fn trailing_avg_volume(bars: &[Bar], at: usize, period: usize) -> f64 {
    if at == 0 {
        return bars[0].volume() as f64;
    }
    let s = at.saturating_sub(period);
    let slice = &bars[s..at];
    let sum: f64 = slice.iter().map(|b| b.volume() as f64).sum();
    sum / slice.len() as f64
}

/// Volume of bar `at` relative to its trailing average.
///
/// A zero baseline is floored at one unit of volume so the ratio stays finite.
#[inline]
pub fn volume_ratio(bars: &[Bar], at: usize, period: usize) -> f64 {
    let avg = trailing_avg_volume(bars, at, period);
    bars[at].volume() as f64 / avg.max(1.0)
}

/// True when `a` and `b` are within `tolerance` (fraction of the lower price)
#[inline]
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.min(b)
}

/// Log-price bucket of width `ln(1 + tolerance)`.
///
/// Two prices within tolerance always land in the same or adjacent buckets.
#[inline]
pub fn price_bucket(price: f64, tolerance: f64) -> i64 {
    (price.ln() / tolerance.ln_1p()).floor() as i64
}

/// Clamp into [0, 1], mapping NaN to 0
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
