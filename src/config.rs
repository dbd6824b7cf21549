//! Pipeline configuration
//!
//! [`HuntConfig`] gathers the settings of every stage. Each stage struct owns
//! its own tunables and checks them in `validate_config`; this module adds the
//! cross-stage rules, JSON loading and name-based overrides.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::{
        ConfidenceScorer, ConfidenceWeights, LiquidityZoneDetector, TrapDetector,
        VolumeClusterAnalyzer, VwapAnchor, VwapCalculator,
    },
    params::{get_factor, get_period, get_ratio, ParamMeta, ParameterizedConfig},
    HuntError, Ratio, Result,
};

/// Complete configuration of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    pub zones: LiquidityZoneDetector,
    pub clusters: VolumeClusterAnalyzer,
    pub vwap: VwapCalculator,
    pub traps: TrapDetector,
    pub scoring: ConfidenceScorer,
    /// Signals below this confidence are dropped
    pub min_confidence: Ratio,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            zones: LiquidityZoneDetector::default(),
            clusters: VolumeClusterAnalyzer::default(),
            vwap: VwapCalculator::default(),
            traps: TrapDetector::default(),
            scoring: ConfidenceScorer::default(),
            min_confidence: Ratio::new_const(0.0),
        }
    }
}

impl HuntConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| HuntError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| HuntError::InvalidConfig(e.to_string()))
    }

    /// Bars needed by the longest-lookback stage
    pub fn required_history(&self) -> usize {
        let vwap_window = match self.vwap.anchor {
            VwapAnchor::Rolling { window } => window.get(),
            _ => 0,
        };
        self.zones
            .lookback
            .get()
            .max(self.traps.volume_period.get())
            .max(vwap_window)
    }

    pub fn validate(&self) -> Result<()> {
        self.zones.validate_config()?;
        self.clusters.validate_config()?;
        self.vwap.validate_config()?;
        self.traps.validate_config()?;
        self.scoring.validate_config()?;
        Ok(())
    }
}

static HUNT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 50.0, (20.0, 200.0, 10.0), "Bars scanned for swing extremes"),
    ParamMeta::period("swing_radius", 2.0, (1.0, 5.0, 1.0), "Bars on each side a swing must exceed"),
    ParamMeta::ratio("zone_tolerance", 0.005, (0.001, 0.02, 0.001), "Band grouping extremes into one zone, fraction of price"),
    ParamMeta::period("min_touches", 2.0, (1.0, 5.0, 1.0), "Touches needed for a zone to qualify"),
    ParamMeta::period("recency_half_life", 20.0, (5.0, 100.0, 5.0), "Bars after which a touch counts half"),
    ParamMeta::factor("touch_weight", 1.0, (0.0, 2.0, 0.25), "Weight of decayed touch count in zone strength"),
    ParamMeta::factor("volume_weight", 0.5, (0.0, 2.0, 0.25), "Weight of band volume in zone strength"),
    ParamMeta::period("volume_bins", 20.0, (5.0, 50.0, 5.0), "Bins of the volume profile"),
    ParamMeta::ratio("breach_proximity", 0.01, (0.001, 0.05, 0.001), "Maximum pierce beyond a zone, fraction of price"),
    ParamMeta::period("reversal_window", 5.0, (1.0, 20.0, 1.0), "Bars allowed between breach and reversal"),
    ParamMeta::period("volume_period", 20.0, (5.0, 50.0, 5.0), "Bars averaged for the volume baseline"),
    ParamMeta::factor("spike_multiple", 1.8, (1.0, 5.0, 0.1), "Breach volume over baseline needed to confirm"),
    ParamMeta::factor("spike_ceiling", 4.0, (1.0, 10.0, 0.5), "Volume ratio at which the spike score saturates"),
    ParamMeta::ratio("vwap_proximity_scale", 0.02, (0.005, 0.1, 0.005), "Distance from VWAP scoring zero, fraction of VWAP"),
    ParamMeta::ratio("weight_spike", 0.3, (0.0, 1.0, 0.05), "Confidence weight of the volume spike"),
    ParamMeta::ratio("weight_strength", 0.3, (0.0, 1.0, 0.05), "Confidence weight of zone strength"),
    ParamMeta::ratio("weight_speed", 0.2, (0.0, 1.0, 0.05), "Confidence weight of reversal speed"),
    ParamMeta::ratio("weight_vwap", 0.2, (0.0, 1.0, 0.05), "Confidence weight of VWAP proximity"),
    ParamMeta::ratio("stop_buffer", 0.005, (0.0, 0.02, 0.001), "Stop distance beyond the breach extreme, fraction of price"),
    ParamMeta::ratio("min_confidence", 0.0, (0.0, 1.0, 0.05), "Signals below this confidence are dropped"),
];

impl ParameterizedConfig for HuntConfig {
    fn param_meta() -> &'static [ParamMeta] {
        HUNT_PARAMS
    }

    fn apply_params(self, params: &HashMap<&str, f64>) -> Result<Self> {
        if let Some(unknown) = params
            .keys()
            .find(|k| !HUNT_PARAMS.iter().any(|p| p.name == **k))
        {
            return Err(HuntError::InvalidConfig(format!(
                "unknown parameter: {unknown}"
            )));
        }

        let Self {
            zones,
            clusters,
            vwap,
            traps,
            scoring,
            min_confidence,
        } = self;
        let weights = scoring.weights;

        Ok(Self {
            zones: LiquidityZoneDetector {
                lookback: get_period(params, "lookback", zones.lookback)?,
                swing_radius: get_period(params, "swing_radius", zones.swing_radius)?,
                tolerance: get_ratio(params, "zone_tolerance", zones.tolerance)?,
                min_touches: get_period(params, "min_touches", zones.min_touches)?,
                recency_half_life: get_period(params, "recency_half_life", zones.recency_half_life)?,
                touch_weight: get_factor(params, "touch_weight", zones.touch_weight)?,
                volume_weight: get_factor(params, "volume_weight", zones.volume_weight)?,
            },
            clusters: VolumeClusterAnalyzer {
                bins: get_period(params, "volume_bins", clusters.bins)?,
            },
            vwap,
            traps: TrapDetector {
                breach_proximity: get_ratio(params, "breach_proximity", traps.breach_proximity)?,
                window: get_period(params, "reversal_window", traps.window)?,
                volume_period: get_period(params, "volume_period", traps.volume_period)?,
                spike_multiple: get_factor(params, "spike_multiple", traps.spike_multiple)?,
            },
            scoring: ConfidenceScorer {
                spike_ceiling: get_factor(params, "spike_ceiling", scoring.spike_ceiling)?,
                vwap_proximity_scale: get_ratio(
                    params,
                    "vwap_proximity_scale",
                    scoring.vwap_proximity_scale,
                )?,
                weights: ConfidenceWeights {
                    spike: get_ratio(params, "weight_spike", weights.spike)?,
                    strength: get_ratio(params, "weight_strength", weights.strength)?,
                    speed: get_ratio(params, "weight_speed", weights.speed)?,
                    vwap: get_ratio(params, "weight_vwap", weights.vwap)?,
                },
                stop_buffer: get_ratio(params, "stop_buffer", scoring.stop_buffer)?,
            },
            min_confidence: get_ratio(params, "min_confidence", min_confidence)?,
        })
    }
}
