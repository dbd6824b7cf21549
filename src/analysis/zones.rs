//! Liquidity zone detection
//!
//! Swing highs and lows over the trailing lookback are grouped into price
//! levels. Levels touched often enough become [`LiquidityZone`]s, ranked by a
//! recency-decayed touch count plus the volume traded around the level.

use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};

use super::helpers::{price_bucket, within_tolerance};
use crate::{Bar, BarSeries, Factor, HuntError, Period, Ratio, Result};

/// Side of the market a zone sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Above price, built from swing highs; stops of shorts rest above it
    Resistance,
    /// Below price, built from swing lows; stops of longs rest below it
    Support,
}

impl ZoneKind {
    /// The bar price that tests this kind of zone: high for resistance, low for support
    #[inline]
    pub fn extreme(self, bar: &Bar) -> f64 {
        match self {
            ZoneKind::Resistance => bar.high,
            ZoneKind::Support => bar.low,
        }
    }

    /// True when `price` lies strictly beyond `level` on this zone's side
    #[inline]
    pub fn beyond(self, price: f64, level: f64) -> bool {
        match self {
            ZoneKind::Resistance => price > level,
            ZoneKind::Support => price < level,
        }
    }

    /// The more extreme of two prices on this zone's side
    #[inline]
    pub fn outermost(self, a: f64, b: f64) -> f64 {
        match self {
            ZoneKind::Resistance => a.max(b),
            ZoneKind::Support => a.min(b),
        }
    }
}

/// A price level where stop orders are presumed to cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityZone {
    pub price: f64,
    pub kind: ZoneKind,
    pub strength: f64,
    /// Index of the most recent touch
    pub last_touch_index: usize,
    /// Index of the touch that made the zone qualify
    pub formed_index: usize,
    pub touch_count: usize,
    /// Volume of lookback bars overlapping the tolerance band
    pub band_volume: u64,
}

/// Strongest first; ties go to more volume, then the more recent touch.
fn zone_rank(a: &LiquidityZone, b: &LiquidityZone) -> Ordering {
    b.strength
        .total_cmp(&a.strength)
        .then(b.band_volume.cmp(&a.band_volume))
        .then(b.last_touch_index.cmp(&a.last_touch_index))
        .then(a.kind.cmp(&b.kind))
        .then(a.price.total_cmp(&b.price))
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    index: usize,
    price: f64,
}

/// Finds resistance and support zones in the trailing lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityZoneDetector {
    /// Bars scanned (L); fewer bars is an error
    pub lookback: Period,
    /// Bars on each side a swing extreme must strictly exceed
    pub swing_radius: Period,
    /// Grouping band, as a fraction of price
    pub tolerance: Ratio,
    /// Touches needed to qualify (T)
    pub min_touches: Period,
    /// Age in bars at which a touch counts half
    pub recency_half_life: Period,
    pub touch_weight: Factor,
    pub volume_weight: Factor,
}

impl Default for LiquidityZoneDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(50),
            swing_radius: Period::new_const(2),
            tolerance: Ratio::new_const(0.005),
            min_touches: Period::new_const(2),
            recency_half_life: Period::new_const(20),
            touch_weight: Factor::new_const(1.0),
            volume_weight: Factor::new_const(0.5),
        }
    }
}

impl LiquidityZoneDetector {
    pub fn validate_config(&self) -> Result<()> {
        if self.tolerance.get() <= 0.0 {
            return Err(HuntError::InvalidConfig(
                "zone tolerance must be > 0".to_string(),
            ));
        }
        if self.lookback.get() < 2 * self.swing_radius.get() + 1 {
            return Err(HuntError::InvalidConfig(format!(
                "lookback {} cannot hold a swing of radius {}",
                self.lookback.get(),
                self.swing_radius.get()
            )));
        }
        Ok(())
    }

    /// Detect zones over the trailing `lookback` bars, strongest first.
    pub fn detect(&self, series: &BarSeries) -> Result<Vec<LiquidityZone>> {
        let bars = series.bars();
        let lookback = self.lookback.get();
        if bars.len() < lookback {
            return Err(HuntError::InsufficientHistory {
                need: lookback,
                got: bars.len(),
            });
        }

        let start = bars.len() - lookback;
        let window = &bars[start..];
        let last = bars.len() - 1;
        let mean_volume = window.iter().map(|b| b.volume as f64).sum::<f64>() / lookback as f64;

        let mut candidates = Vec::new();
        for kind in [ZoneKind::Resistance, ZoneKind::Support] {
            let touches = self.swing_extremes(window, start, kind);
            candidates.extend(
                self.group(touches)
                    .into_iter()
                    .filter_map(|group| self.build_zone(kind, &group, window, last, mean_volume)),
            );
        }
        // a support and a resistance within tolerance are one level
        let zones = self.dedup(candidates);

        tracing::trace!(
            resistance = zones.iter().filter(|z| z.kind == ZoneKind::Resistance).count(),
            support = zones.iter().filter(|z| z.kind == ZoneKind::Support).count(),
            "liquidity zones detected"
        );
        Ok(zones)
    }

    /// Bars whose extreme strictly exceeds every neighbour within the radius.
    fn swing_extremes(&self, window: &[Bar], offset: usize, kind: ZoneKind) -> Vec<Touch> {
        let radius = self.swing_radius.get();
        if window.len() < 2 * radius + 1 {
            return Vec::new();
        }

        (radius..window.len() - radius)
            .filter_map(|i| {
                let price = kind.extreme(&window[i]);
                let dominates = (i - radius..=i + radius)
                    .filter(|&j| j != i)
                    .all(|j| kind.beyond(price, kind.extreme(&window[j])));
                dominates.then_some(Touch {
                    index: offset + i,
                    price,
                })
            })
            .collect()
    }

    /// Groups touches by price; a group spans `tolerance` above its lowest price.
    fn group(&self, mut touches: Vec<Touch>) -> Vec<Vec<Touch>> {
        let tolerance = self.tolerance.get();
        touches.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.index.cmp(&b.index)));

        let mut groups: Vec<Vec<Touch>> = Vec::new();
        for touch in touches {
            match groups.last_mut() {
                Some(group) if within_tolerance(group[0].price, touch.price, tolerance) => {
                    group.push(touch)
                }
                _ => groups.push(vec![touch]),
            }
        }
        groups
    }

    fn build_zone(
        &self,
        kind: ZoneKind,
        group: &[Touch],
        window: &[Bar],
        last: usize,
        mean_volume: f64,
    ) -> Option<LiquidityZone> {
        let min_touches = self.min_touches.get();
        if group.len() < min_touches {
            return None;
        }

        let mut chronological = group.to_vec();
        chronological.sort_by_key(|t| t.index);
        let formed_index = chronological[min_touches - 1].index;
        let last_touch_index = chronological[chronological.len() - 1].index;

        // The level is fixed when the zone forms; later touches only add strength.
        let price = chronological
            .iter()
            .take_while(|t| t.index <= formed_index)
            .map(|t| t.price)
            .reduce(|a, b| kind.outermost(a, b))?;

        let half_life = self.recency_half_life.get() as f64;
        let touch_score: f64 = chronological
            .iter()
            .map(|t| 0.5f64.powf((last - t.index) as f64 / half_life))
            .sum();

        let band = self.tolerance.get() * price;
        let (band_low, band_high) = (price - band, price + band);
        let band_volume: u64 = window
            .iter()
            .filter(|b| b.low <= band_high && b.high >= band_low)
            .map(|b| b.volume)
            .sum();
        let volume_score = if mean_volume > 0.0 {
            band_volume as f64 / mean_volume
        } else {
            0.0
        };

        Some(LiquidityZone {
            price,
            kind,
            strength: self.touch_weight.get() * touch_score
                + self.volume_weight.get() * volume_score,
            last_touch_index,
            formed_index,
            touch_count: chronological.len(),
            band_volume,
        })
    }

    /// Keeps the stronger of any two zones within tolerance of each other.
    fn dedup(&self, mut candidates: Vec<LiquidityZone>) -> Vec<LiquidityZone> {
        let tolerance = self.tolerance.get();
        candidates.sort_by(zone_rank);

        let mut kept: BTreeMap<i64, LiquidityZone> = BTreeMap::new();
        for zone in candidates {
            let bucket = price_bucket(zone.price, tolerance);
            let crowded = kept
                .range(bucket - 1..=bucket + 1)
                .any(|(_, other)| within_tolerance(other.price, zone.price, tolerance));
            if !crowded {
                kept.insert(bucket, zone);
            }
        }

        let mut zones: Vec<LiquidityZone> = kept.into_values().collect();
        zones.sort_by(zone_rank);
        zones
    }
}
