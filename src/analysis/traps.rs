//! Breach/reversal tracking per liquidity zone
//!
//! Each zone gets its own [`ZoneTracker`], advanced one bar at a time from the
//! bar after the zone formed:
//!
//! ```text
//! Idle ──pierce──▶ Breached ──close back + volume spike──▶ Reversed
//!                     │    └──close back, no spike──────▶ Unconfirmed
//!                     └──window elapsed─────────────────▶ Expired
//! ```
//!
//! Only `Reversed` yields a [`TrapCandidate`]. `Expired` is a genuine
//! breakout; `Unconfirmed` is a wick without participation.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    helpers::volume_ratio,
    zones::{LiquidityZone, ZoneKind},
};
use crate::{Bar, BarSeries, Factor, Period, Ratio, Result};

/// Direction of a failed move
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrapKind {
    /// False breakout above resistance
    BullTrap,
    /// False breakdown below support
    BearTrap,
}

impl TrapKind {
    #[inline]
    pub fn for_zone(kind: ZoneKind) -> Self {
        match kind {
            ZoneKind::Resistance => TrapKind::BullTrap,
            ZoneKind::Support => TrapKind::BearTrap,
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapKind::BullTrap => f.pad("BULL_TRAP"),
            TrapKind::BearTrap => f.pad("BEAR_TRAP"),
        }
    }
}

/// State of one zone's tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrapState {
    Idle,
    Breached {
        breach_index: usize,
        /// Outermost price since the breach
        extreme: f64,
    },
    Reversed {
        breach_index: usize,
        reversal_index: usize,
    },
    Unconfirmed {
        breach_index: usize,
        reversal_index: usize,
    },
    Expired {
        breach_index: usize,
    },
}

impl TrapState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrapState::Reversed { .. } | TrapState::Unconfirmed { .. } | TrapState::Expired { .. }
        )
    }
}

/// A confirmed breach-then-reversal at one zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrapCandidate {
    pub zone: LiquidityZone,
    pub kind: TrapKind,
    pub breach_index: usize,
    pub reversal_index: usize,
    /// Highest high (bull) or lowest low (bear) from breach through reversal
    pub breach_extreme: f64,
    /// Breach-bar volume over its trailing average
    pub volume_ratio: f64,
}

impl TrapCandidate {
    /// Bars from breach to reversal, at least 1
    #[inline]
    pub fn elapsed(&self) -> usize {
        self.reversal_index - self.breach_index
    }
}

/// Final state of a zone's tracker after the series was consumed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrapOutcome {
    pub zone: LiquidityZone,
    pub state: TrapState,
    pub candidate: Option<TrapCandidate>,
}

/// Step-wise state machine for a single zone
#[derive(Debug, Clone)]
pub struct ZoneTracker<'a> {
    detector: &'a TrapDetector,
    zone: &'a LiquidityZone,
    state: TrapState,
    breach_volume_ratio: f64,
}

impl<'a> ZoneTracker<'a> {
    pub fn new(detector: &'a TrapDetector, zone: &'a LiquidityZone) -> Self {
        Self {
            detector,
            zone,
            state: TrapState::Idle,
            breach_volume_ratio: 0.0,
        }
    }

    #[inline]
    pub fn state(&self) -> TrapState {
        self.state
    }

    /// Feed bar `index`. Returns a candidate on the transition to `Reversed`.
    ///
    /// Bars up to the zone's formation are ignored, as is anything once the
    /// tracker is terminal. A breach needs the previous close on the zone's
    /// original side.
    pub fn advance(&mut self, bars: &[Bar], index: usize) -> Option<TrapCandidate> {
        let bar = bars.get(index)?;
        let kind = self.zone.kind;
        let level = self.zone.price;

        match self.state {
            TrapState::Idle => {
                if index <= self.zone.formed_index {
                    return None;
                }
                // price already trading beyond the level is not a fresh pierce
                let from_inside = !kind.beyond(bars[index - 1].close, level);
                let extreme = kind.extreme(bar);
                if from_inside
                    && kind.beyond(extreme, level)
                    && self.detector.within_proximity(level, extreme)
                {
                    self.breach_volume_ratio =
                        volume_ratio(bars, index, self.detector.volume_period.get());
                    self.state = TrapState::Breached {
                        breach_index: index,
                        extreme,
                    };
                    tracing::trace!(?kind, level, index, extreme, "zone breached");
                }
                None
            }
            TrapState::Breached {
                breach_index,
                extreme,
            } => {
                let extreme = kind.outermost(extreme, kind.extreme(bar));
                let closed_back = !kind.beyond(bar.close, level) && bar.close != level;

                if closed_back {
                    if self.breach_volume_ratio > self.detector.spike_multiple.get() {
                        self.state = TrapState::Reversed {
                            breach_index,
                            reversal_index: index,
                        };
                        return Some(TrapCandidate {
                            zone: self.zone.clone(),
                            kind: TrapKind::for_zone(kind),
                            breach_index,
                            reversal_index: index,
                            breach_extreme: extreme,
                            volume_ratio: self.breach_volume_ratio,
                        });
                    }
                    self.state = TrapState::Unconfirmed {
                        breach_index,
                        reversal_index: index,
                    };
                    tracing::trace!(level, breach_index, index, "reversal without volume spike");
                } else if index - breach_index >= self.detector.window.get() {
                    self.state = TrapState::Expired { breach_index };
                } else {
                    self.state = TrapState::Breached {
                        breach_index,
                        extreme,
                    };
                }
                None
            }
            _ => None,
        }
    }
}

/// Runs one [`ZoneTracker`] per zone over a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapDetector {
    /// Maximum pierce beyond the zone, as a fraction of the zone price
    pub breach_proximity: Ratio,
    /// Bars allowed between breach and reversal
    pub window: Period,
    /// Bars averaged for the breach volume baseline
    pub volume_period: Period,
    /// Breach volume must exceed this multiple of the baseline
    pub spike_multiple: Factor,
}

impl Default for TrapDetector {
    fn default() -> Self {
        Self {
            breach_proximity: Ratio::new_const(0.01),
            window: Period::new_const(5),
            volume_period: Period::new_const(20),
            spike_multiple: Factor::new_const(1.8),
        }
    }
}

impl TrapDetector {
    pub fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn within_proximity(&self, level: f64, extreme: f64) -> bool {
        (extreme - level).abs() <= self.breach_proximity.get() * level
    }

    /// Run a single zone's tracker to a terminal state or the end of the series.
    pub fn track(&self, series: &BarSeries, zone: &LiquidityZone) -> TrapOutcome {
        let bars = series.bars();
        let mut tracker = ZoneTracker::new(self, zone);
        let mut candidate = None;

        for index in zone.formed_index + 1..bars.len() {
            if let Some(c) = tracker.advance(bars, index) {
                candidate = Some(c);
            }
            if tracker.state().is_terminal() {
                break;
            }
        }

        TrapOutcome {
            zone: zone.clone(),
            state: tracker.state(),
            candidate,
        }
    }

    /// One outcome per zone, in zone order.
    pub fn detect(&self, series: &BarSeries, zones: &[LiquidityZone]) -> Vec<TrapOutcome> {
        zones.par_iter().map(|zone| self.track(series, zone)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(price: f64, kind: ZoneKind, formed_index: usize) -> LiquidityZone {
        LiquidityZone {
            price,
            kind,
            strength: 1.0,
            last_touch_index: formed_index,
            formed_index,
            touch_count: 2,
            band_volume: 0,
        }
    }

    /// `n` quiet bars around 97 followed by `tail` (open, high, low, close, volume)
    fn series(n: usize, tail: &[(f64, f64, f64, f64, u64)]) -> BarSeries {
        let mut bars: Vec<Bar> = (0..n)
            .map(|i| Bar::new(i as i64, 97.0, 97.5, 96.5, 97.2, 1000))
            .collect();
        for (k, &(o, h, l, c, v)) in tail.iter().enumerate() {
            bars.push(Bar::new((n + k) as i64, o, h, l, c, v));
        }
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn test_bull_trap_reversal() {
        let s = series(
            20,
            &[
                (99.5, 100.5, 99.4, 100.2, 3000),
                (100.2, 100.7, 100.05, 100.1, 1000),
                (100.1, 100.2, 98.5, 98.8, 1000),
            ],
        );
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);

        assert_eq!(
            outcome.state,
            TrapState::Reversed {
                breach_index: 20,
                reversal_index: 22
            }
        );
        let c = outcome.candidate.unwrap();
        assert_eq!(c.kind, TrapKind::BullTrap);
        assert_eq!(c.elapsed(), 2);
        assert_eq!(c.breach_extreme, 100.7);
        assert!((c.volume_ratio - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bear_trap_reversal() {
        let s = series(
            20,
            &[(96.8, 97.0, 95.8, 96.0, 2500), (96.0, 97.3, 95.9, 97.1, 900)],
        );
        let z = zone(96.2, ZoneKind::Support, 5);
        let outcome = TrapDetector::default().track(&s, &z);

        let c = outcome.candidate.unwrap();
        assert_eq!(c.kind, TrapKind::BearTrap);
        assert_eq!((c.breach_index, c.reversal_index), (20, 21));
        assert_eq!(c.breach_extreme, 95.8);
    }

    #[test]
    fn test_genuine_breakout_expires() {
        let s = series(
            20,
            &[
                (99.5, 100.4, 99.4, 100.3, 3000),
                (100.3, 100.8, 100.2, 100.6, 1000),
                (100.6, 101.2, 100.5, 101.0, 1000),
                (101.0, 101.6, 100.9, 101.5, 1000),
                (101.5, 102.1, 101.4, 102.0, 1000),
                (102.0, 102.6, 101.9, 102.5, 1000),
                (102.5, 102.6, 98.0, 98.5, 1000),
            ],
        );
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);

        assert_eq!(outcome.state, TrapState::Expired { breach_index: 20 });
        assert!(outcome.candidate.is_none());
    }

    #[test]
    fn test_reversal_on_last_window_bar() {
        let window = TrapDetector {
            window: Period::new(2).unwrap(),
            ..Default::default()
        };
        let s = series(
            20,
            &[
                (99.5, 100.4, 99.4, 100.3, 3000),
                (100.3, 100.5, 100.1, 100.2, 1000),
                (100.2, 100.3, 99.0, 99.2, 1000),
            ],
        );
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let c = window.track(&s, &z).candidate.unwrap();
        assert_eq!(c.elapsed(), 2);
    }

    #[test]
    fn test_unconfirmed_wick_discarded() {
        let s = series(
            20,
            &[
                (99.5, 100.5, 99.4, 100.2, 1100),
                (100.2, 100.3, 98.5, 98.8, 1000),
            ],
        );
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);

        assert_eq!(
            outcome.state,
            TrapState::Unconfirmed {
                breach_index: 20,
                reversal_index: 21
            }
        );
        assert!(outcome.candidate.is_none());
    }

    #[test]
    fn test_far_breach_ignored() {
        // a gap 3% through the level is not a hunt
        let s = series(20, &[(103.0, 103.5, 102.8, 103.2, 5000), (103.0, 103.1, 98.0, 98.5, 1000)]);
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);
        assert_eq!(outcome.state, TrapState::Idle);
    }

    #[test]
    fn test_pullback_after_breakout_is_not_a_breach() {
        // breakout too far to count, then a spike bar dipping back through the level
        let s = series(
            20,
            &[
                (101.1, 101.5, 101.0, 101.3, 1000),
                (101.3, 101.7, 101.2, 101.5, 1000),
                (101.5, 101.9, 101.4, 101.7, 1000),
                (101.7, 101.9, 101.5, 101.6, 1000),
                (101.6, 101.8, 101.1, 101.2, 1000),
                (100.7, 100.8, 99.0, 99.2, 3000),
                (99.2, 99.5, 98.8, 99.0, 1000),
            ],
        );
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);

        assert_eq!(outcome.state, TrapState::Idle);
        assert!(outcome.candidate.is_none());
    }

    #[test]
    fn test_pending_breach_at_series_end() {
        let s = series(20, &[(99.5, 100.5, 99.4, 100.2, 3000)]);
        let z = zone(100.0, ZoneKind::Resistance, 10);
        let outcome = TrapDetector::default().track(&s, &z);
        assert!(matches!(outcome.state, TrapState::Breached { breach_index: 20, .. }));
        assert!(outcome.candidate.is_none());
    }

    #[test]
    fn test_bars_before_formation_ignored() {
        let s = series(20, &[]);
        let z = zone(97.0, ZoneKind::Resistance, 19);
        let detector = TrapDetector::default();
        let mut tracker = ZoneTracker::new(&detector, &z);
        assert!(tracker.advance(s.bars(), 5).is_none());
        assert_eq!(tracker.state(), TrapState::Idle);
    }

    #[test]
    fn test_detect_keeps_zone_order() {
        let s = series(20, &[(99.5, 100.5, 95.5, 98.0, 3000), (98.0, 98.5, 97.0, 98.2, 1000)]);
        let zones = vec![
            zone(100.0, ZoneKind::Resistance, 10),
            zone(96.0, ZoneKind::Support, 10),
        ];
        let outcomes = TrapDetector::default().detect(&s, &zones);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].zone.kind, ZoneKind::Resistance);
        assert_eq!(outcomes[1].zone.kind, ZoneKind::Support);
        // both machines breached on the same bar and reversed on the next
        assert!(outcomes.iter().all(|o| o.candidate.is_some()));
    }
}
