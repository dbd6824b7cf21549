//! Volume-weighted average price
//!
//! VWAP = Σ(typical price × volume) / Σ(volume), with typical price
//! `(high + low + close) / 3`. The value is `None` wherever the cumulated
//! volume is zero.

use serde::{Deserialize, Serialize};

use crate::{Bar, BarSeries, HuntError, OHLCVExt, Period, Result};

/// Where the VWAP cumulation starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VwapAnchor {
    /// From the first bar of the series
    #[default]
    Cumulative,
    /// Reset whenever `(timestamp + offset_secs) / length_secs` changes
    Session { length_secs: i64, offset_secs: i64 },
    /// Trailing sums over the last `window` bars
    Rolling { window: Period },
}

impl VwapAnchor {
    /// One session per UTC day
    pub const fn daily() -> Self {
        VwapAnchor::Session {
            length_secs: 86_400,
            offset_secs: 0,
        }
    }
}

/// VWAP value at one bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VwapPoint {
    pub timestamp: i64,
    pub value: Option<f64>,
}

/// First defined VWAP value at or after `index`
pub fn first_defined_from(points: &[VwapPoint], index: usize) -> Option<f64> {
    points.get(index..)?.iter().find_map(|p| p.value)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapCalculator {
    pub anchor: VwapAnchor,
}

impl VwapCalculator {
    pub fn new(anchor: VwapAnchor) -> Self {
        Self { anchor }
    }

    pub fn validate_config(&self) -> Result<()> {
        if let VwapAnchor::Session { length_secs, .. } = self.anchor {
            if length_secs <= 0 {
                return Err(HuntError::InvalidConfig(format!(
                    "VWAP session length must be > 0, got {length_secs}"
                )));
            }
        }
        Ok(())
    }

    /// One point per bar, in bar order.
    pub fn compute(&self, series: &BarSeries) -> Vec<VwapPoint> {
        let bars = series.bars();
        match self.anchor {
            VwapAnchor::Cumulative => anchored(bars, |_| 0),
            VwapAnchor::Session {
                length_secs,
                offset_secs,
            } => anchored(bars, |ts| (ts + offset_secs).div_euclid(length_secs)),
            VwapAnchor::Rolling { window } => rolling(bars, window.get()),
        }
    }
}

#[inline]
fn vwap(price_volume: f64, volume: u128) -> Option<f64> {
    (volume > 0).then(|| price_volume / volume as f64)
}

fn anchored<F: Fn(i64) -> i64>(bars: &[Bar], session_of: F) -> Vec<VwapPoint> {
    let mut points = Vec::with_capacity(bars.len());
    let mut session = None;
    let mut price_volume = 0.0;
    let mut volume: u128 = 0;

    for bar in bars {
        let current = session_of(bar.timestamp);
        if session != Some(current) {
            session = Some(current);
            price_volume = 0.0;
            volume = 0;
        }
        price_volume += bar.typical_price() * bar.volume as f64;
        volume += bar.volume as u128;
        points.push(VwapPoint {
            timestamp: bar.timestamp,
            value: vwap(price_volume, volume),
        });
    }
    points
}

// summed per window: subtracting from a running f64 sum drifts
fn rolling(bars: &[Bar], window: usize) -> Vec<VwapPoint> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let start = (i + 1).saturating_sub(window);
            let (price_volume, volume) = bars[start..=i]
                .iter()
                .fold((0.0, 0u128), |(pv, v), b| {
                    (pv + b.typical_price() * b.volume as f64, v + b.volume as u128)
                });
            VwapPoint {
                timestamp: bar.timestamp,
                value: vwap(price_volume, volume),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bars with typical price == `price`
    fn series(rows: &[(i64, f64, u64)]) -> BarSeries {
        let bars = rows
            .iter()
            .map(|&(ts, p, v)| Bar::new(ts, p, p + 1.0, p - 1.0, p, v))
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn values(points: &[VwapPoint]) -> Vec<Option<f64>> {
        points.iter().map(|p| p.value).collect()
    }

    #[test]
    fn test_cumulative() {
        let s = series(&[(0, 10.0, 100), (60, 20.0, 300), (120, 30.0, 0)]);
        let points = VwapCalculator::default().compute(&s);

        assert_eq!(points.len(), 3);
        assert_eq!(points[1].timestamp, 60);
        assert_eq!(values(&points), vec![Some(10.0), Some(17.5), Some(17.5)]);
    }

    #[test]
    fn test_zero_volume_is_absent() {
        let s = series(&[(0, 10.0, 0), (60, 20.0, 0), (120, 30.0, 10)]);
        let points = VwapCalculator::default().compute(&s);
        assert_eq!(values(&points), vec![None, None, Some(30.0)]);
        assert_eq!(first_defined_from(&points, 0), Some(30.0));
        assert_eq!(first_defined_from(&points, 3), None);
    }

    #[test]
    fn test_session_resets() {
        let s = series(&[(0, 10.0, 100), (3_600, 20.0, 100), (86_400, 40.0, 0), (90_000, 50.0, 100)]);
        let points = VwapCalculator::new(VwapAnchor::daily()).compute(&s);
        assert_eq!(values(&points), vec![Some(10.0), Some(15.0), None, Some(50.0)]);
    }

    #[test]
    fn test_session_offset() {
        // a session boundary at 1h past midnight
        let anchor = VwapAnchor::Session {
            length_secs: 86_400,
            offset_secs: -3_600,
        };
        let s = series(&[(0, 10.0, 100), (3_000, 20.0, 100), (3_600, 40.0, 100)]);
        let points = VwapCalculator::new(anchor).compute(&s);
        assert_eq!(values(&points), vec![Some(10.0), Some(15.0), Some(40.0)]);
    }

    #[test]
    fn test_rolling_window() {
        let anchor = VwapAnchor::Rolling {
            window: Period::new(2).unwrap(),
        };
        let s = series(&[(0, 10.0, 100), (1, 20.0, 100), (2, 40.0, 100), (3, 10.0, 0), (4, 10.0, 0)]);
        let points = VwapCalculator::new(anchor).compute(&s);
        assert_eq!(
            values(&points),
            vec![Some(10.0), Some(15.0), Some(30.0), Some(40.0), None]
        );
    }

    #[test]
    fn test_rolling_long_series_matches_window() {
        let window = 5;
        let anchor = VwapAnchor::Rolling {
            window: Period::new(window).unwrap(),
        };
        // heavy early bars, then a long quiet tail at a much lower price
        let rows: Vec<(i64, f64, u64)> = (0..5_000)
            .map(|i| {
                if i < 100 {
                    (i, 1.0e6 + (i % 7) as f64 * 1234.567, 1_000_000_007)
                } else {
                    (i, 1.0 + (i % 3) as f64 * 0.25, 3 + (i % 5) as u64)
                }
            })
            .collect();
        let s = series(&rows);
        let points = VwapCalculator::new(anchor).compute(&s);

        for i in [window - 1, 104, 105, 2_500, 4_999] {
            let slice = &rows[i + 1 - window..=i];
            let pv: f64 = slice.iter().map(|&(_, p, v)| p * v as f64).sum();
            let vol: u64 = slice.iter().map(|&(_, _, v)| v).sum();
            let expected = pv / vol as f64;
            let got = points[i].value.unwrap();
            assert!(
                (got - expected).abs() <= expected * 1e-12,
                "bar {i}: {got} vs {expected}"
            );
        }
        // tail windows never see the early prices again
        assert!(points[4_999].value.unwrap() < 2.0);
    }

    #[test]
    fn test_rejects_empty_session() {
        let calc = VwapCalculator::new(VwapAnchor::Session {
            length_secs: 0,
            offset_secs: 0,
        });
        assert!(calc.validate_config().is_err());
    }
}
