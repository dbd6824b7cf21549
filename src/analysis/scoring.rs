//! Confidence scoring and signal construction
//!
//! A confirmed [`TrapCandidate`] becomes a [`Signal`] with a confidence in
//! [0, 1] made of four components:
//!
//! | Component | Value |
//! |-----------|-------|
//! | spike | breach volume ratio / `spike_ceiling`, capped at 1 |
//! | strength | zone strength / strongest zone of the run |
//! | speed | 1 / bars from breach to reversal |
//! | vwap | 1 − distance of the reversal close from VWAP, in units of `vwap_proximity_scale` |

use serde::{Deserialize, Serialize};

use super::{
    clusters::VolumeProfile,
    helpers::clamp_unit,
    traps::{TrapCandidate, TrapKind},
    vwap::{first_defined_from, VwapPoint},
};
use crate::{BarSeries, Factor, HuntError, Ratio, Result};

/// Weights of the four confidence components; they sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub spike: Ratio,
    pub strength: Ratio,
    pub speed: Ratio,
    pub vwap: Ratio,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            spike: Ratio::new_const(0.3),
            strength: Ratio::new_const(0.3),
            speed: Ratio::new_const(0.2),
            vwap: Ratio::new_const(0.2),
        }
    }
}

impl ConfidenceWeights {
    pub fn new(spike: f64, strength: f64, speed: f64, vwap: f64) -> Result<Self> {
        let weights = Self {
            spike: Ratio::new(spike)?,
            strength: Ratio::new(strength)?,
            speed: Ratio::new(speed)?,
            vwap: Ratio::new(vwap)?,
        };
        weights.validate()?;
        Ok(weights)
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.spike.get() + self.strength.get() + self.speed.get() + self.vwap.get()
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(HuntError::InvalidConfig(format!(
                "confidence weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Per-component scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    pub spike: f64,
    pub strength: f64,
    pub speed: f64,
    pub vwap_proximity: f64,
}

impl ConfidenceBreakdown {
    pub fn weighted(&self, w: &ConfidenceWeights) -> f64 {
        clamp_unit(
            w.spike.get() * self.spike
                + w.strength.get() * self.strength
                + w.speed.get() * self.speed
                + w.vwap.get() * self.vwap_proximity,
        )
    }
}

/// Run-wide data the scorer reads
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub instrument: &'a str,
    pub series: &'a BarSeries,
    pub profile: &'a VolumeProfile,
    pub vwap: &'a [VwapPoint],
    /// Strength of the strongest zone in the run
    pub max_strength: f64,
}

/// A scored stop-hunt trade setup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub instrument: String,
    /// Timestamp of the reversal bar
    pub timestamp: i64,
    pub kind: TrapKind,
    /// The hunted zone's price
    pub entry_price: f64,
    /// Just beyond the breach extreme
    pub stop_price: f64,
    /// VWAP at or after the reversal; `None` when no volume traded since the anchor
    pub target_price: Option<f64>,
    pub confidence: f64,
    /// Rank of the volume cluster holding the entry price
    pub cluster_rank: Option<usize>,
    pub breakdown: ConfidenceBreakdown,
    pub candidate: TrapCandidate,
}

impl Signal {
    /// Reward over risk measured from the entry; `None` without a target or
    /// with a degenerate stop.
    pub fn reward_risk(&self) -> Option<f64> {
        let risk = (self.stop_price - self.entry_price).abs();
        let target = self.target_price?;
        (risk > 0.0).then(|| (target - self.entry_price).abs() / risk)
    }
}

/// Turns trap candidates into signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceScorer {
    /// Volume ratio at which the spike component saturates
    pub spike_ceiling: Factor,
    /// VWAP distance, as a fraction of VWAP, at which proximity scores zero
    pub vwap_proximity_scale: Ratio,
    pub weights: ConfidenceWeights,
    /// Stop distance beyond the breach extreme, as a fraction of price
    pub stop_buffer: Ratio,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            spike_ceiling: Factor::new_const(4.0),
            vwap_proximity_scale: Ratio::new_const(0.02),
            weights: ConfidenceWeights::default(),
            stop_buffer: Ratio::new_const(0.005),
        }
    }
}

impl ConfidenceScorer {
    pub fn validate_config(&self) -> Result<()> {
        if self.spike_ceiling.get() <= 0.0 {
            return Err(HuntError::InvalidConfig(
                "spike_ceiling must be > 0".to_string(),
            ));
        }
        if self.vwap_proximity_scale.get() <= 0.0 {
            return Err(HuntError::InvalidConfig(
                "vwap_proximity_scale must be > 0".to_string(),
            ));
        }
        self.weights.validate()
    }

    pub fn breakdown(&self, candidate: &TrapCandidate, ctx: &ScoringContext<'_>) -> ConfidenceBreakdown {
        let spike = clamp_unit(candidate.volume_ratio / self.spike_ceiling.get());

        let strength = if ctx.max_strength > 0.0 {
            clamp_unit(candidate.zone.strength / ctx.max_strength)
        } else {
            0.0
        };

        let speed = 1.0 / candidate.elapsed().max(1) as f64;

        let close = ctx.series.get(candidate.reversal_index).map(|b| b.close);
        let vwap = ctx.vwap.get(candidate.reversal_index).and_then(|p| p.value);
        let vwap_proximity = match (close, vwap) {
            (Some(close), Some(vwap)) if vwap > 0.0 => {
                let distance = (close - vwap).abs() / vwap;
                clamp_unit(1.0 - distance / self.vwap_proximity_scale.get())
            }
            _ => 0.0,
        };

        ConfidenceBreakdown {
            spike,
            strength,
            speed,
            vwap_proximity,
        }
    }

    pub fn score(&self, candidate: TrapCandidate, ctx: &ScoringContext<'_>) -> Signal {
        let breakdown = self.breakdown(&candidate, ctx);
        let confidence = breakdown.weighted(&self.weights);

        let buffer = self.stop_buffer.get();
        let stop_price = match candidate.kind {
            TrapKind::BullTrap => candidate.breach_extreme * (1.0 + buffer),
            TrapKind::BearTrap => candidate.breach_extreme * (1.0 - buffer),
        };
        let entry_price = candidate.zone.price;
        let timestamp = ctx
            .series
            .get(candidate.reversal_index)
            .map_or(0, |b| b.timestamp);

        tracing::trace!(
            instrument = ctx.instrument,
            kind = %candidate.kind,
            entry_price,
            confidence,
            "scored trap"
        );

        Signal {
            instrument: ctx.instrument.to_string(),
            timestamp,
            kind: candidate.kind,
            entry_price,
            stop_price,
            target_price: first_defined_from(ctx.vwap, candidate.reversal_index),
            confidence,
            cluster_rank: ctx.profile.cluster_at(entry_price).map(|c| c.rank),
            breakdown,
            candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{LiquidityZone, VolumeClusterAnalyzer, VwapCalculator, ZoneKind},
        Bar,
    };

    fn series() -> BarSeries {
        let bars = (0..10)
            .map(|i| Bar::new(i * 60, 99.0, 99.5, 98.5, 99.0, 1000))
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn candidate(kind: TrapKind, strength: f64, volume_ratio: f64) -> TrapCandidate {
        let (price, zone_kind, extreme) = match kind {
            TrapKind::BullTrap => (100.0, ZoneKind::Resistance, 100.6),
            TrapKind::BearTrap => (98.0, ZoneKind::Support, 97.5),
        };
        TrapCandidate {
            zone: LiquidityZone {
                price,
                kind: zone_kind,
                strength,
                last_touch_index: 2,
                formed_index: 2,
                touch_count: 2,
                band_volume: 0,
            },
            kind,
            breach_index: 6,
            reversal_index: 8,
            breach_extreme: extreme,
            volume_ratio,
        }
    }

    #[test]
    fn test_full_score() {
        let s = series();
        let profile = VolumeClusterAnalyzer::default().analyze(&s);
        let vwap = VwapCalculator::default().compute(&s);
        let ctx = ScoringContext {
            instrument: "X",
            series: &s,
            profile: &profile,
            vwap: &vwap,
            max_strength: 2.0,
        };
        let signal = ConfidenceScorer::default().score(candidate(TrapKind::BullTrap, 2.0, 6.0), &ctx);

        // spike and strength saturate, speed 1/2, close sits on VWAP
        assert_eq!(signal.breakdown.spike, 1.0);
        assert_eq!(signal.breakdown.strength, 1.0);
        assert_eq!(signal.breakdown.speed, 0.5);
        assert!((signal.breakdown.vwap_proximity - 1.0).abs() < 1e-12);
        assert!((signal.confidence - 0.9).abs() < 1e-9);

        assert_eq!(signal.timestamp, 480);
        assert_eq!(signal.entry_price, 100.0);
        assert!((signal.stop_price - 100.6 * 1.005).abs() < 1e-9);
        assert!((signal.target_price.unwrap() - 99.0).abs() < 1e-9);
        assert!(signal.reward_risk().is_some());
    }

    #[test]
    fn test_bear_stop_below_extreme() {
        let s = series();
        let profile = VolumeClusterAnalyzer::default().analyze(&s);
        let vwap = VwapCalculator::default().compute(&s);
        let ctx = ScoringContext {
            instrument: "X",
            series: &s,
            profile: &profile,
            vwap: &vwap,
            max_strength: 1.0,
        };
        let signal = ConfidenceScorer::default().score(candidate(TrapKind::BearTrap, 1.0, 2.0), &ctx);
        assert!(signal.stop_price < 97.5);
        assert_eq!(signal.kind, TrapKind::BearTrap);
    }

    #[test]
    fn test_zero_spike_and_strength() {
        let s = series();
        let profile = VolumeProfile::default();
        let vwap: Vec<VwapPoint> = s
            .iter()
            .map(|b| VwapPoint {
                timestamp: b.timestamp,
                value: None,
            })
            .collect();
        let ctx = ScoringContext {
            instrument: "X",
            series: &s,
            profile: &profile,
            vwap: &vwap,
            max_strength: 0.0,
        };
        let signal = ConfidenceScorer::default().score(candidate(TrapKind::BullTrap, 0.0, 0.0), &ctx);

        assert_eq!(signal.breakdown.spike, 0.0);
        assert_eq!(signal.breakdown.strength, 0.0);
        assert_eq!(signal.breakdown.vwap_proximity, 0.0);
        // only the speed component contributes
        assert!((signal.confidence - 0.1).abs() < 1e-9);
        assert_eq!(signal.target_price, None);
        assert_eq!(signal.cluster_rank, None);
        assert_eq!(signal.reward_risk(), None);
    }

    #[test]
    fn test_far_from_vwap_scores_zero() {
        let s = series();
        let profile = VolumeProfile::default();
        let vwap: Vec<VwapPoint> = s
            .iter()
            .map(|b| VwapPoint {
                timestamp: b.timestamp,
                value: Some(110.0),
            })
            .collect();
        let ctx = ScoringContext {
            instrument: "X",
            series: &s,
            profile: &profile,
            vwap: &vwap,
            max_strength: 1.0,
        };
        let b = ConfidenceScorer::default().breakdown(&candidate(TrapKind::BullTrap, 1.0, 1.0), &ctx);
        assert_eq!(b.vwap_proximity, 0.0);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(ConfidenceWeights::new(0.25, 0.25, 0.25, 0.25).is_ok());
        assert!(ConfidenceWeights::new(0.5, 0.5, 0.5, 0.0).is_err());
        assert!(ConfidenceWeights::new(1.5, -0.5, 0.0, 0.0).is_err());
    }
}
