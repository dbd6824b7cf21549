//! # stophunt - Stop-hunt detection
//!
//! Detects bull traps (false breakouts above resistance) and bear traps (false
//! breakdowns below support) in OHLCV bar series.
//!
//! ## Quick Start
//!
//! ```rust
//! use stophunt::prelude::*;
//!
//! let bars: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let base = 100.0 + (i % 10) as f64;
//!         Bar::new(i as i64 * 300, base, base + 1.0, base - 1.0, base + 0.5, 1_000)
//!     })
//!     .collect();
//! let series = BarSeries::new(bars).unwrap();
//!
//! let engine = EngineBuilder::new().reversal_window(5).build().unwrap();
//! let analysis = engine.analyze("AAPL", &series).unwrap();
//!
//! for signal in &analysis.signals {
//!     println!("{:?} at {} ({:.2})", signal.kind, signal.entry_price, signal.confidence);
//! }
//! ```

use std::collections::HashMap;

use crate::params::ParameterizedConfig;

pub mod analysis;
pub mod config;
pub mod params;
pub mod source;

pub use analysis::{
    ConfidenceBreakdown, ConfidenceScorer, ConfidenceWeights, LiquidityZone, LiquidityZoneDetector,
    Signal, TrapCandidate, TrapDetector, TrapKind, TrapOutcome, TrapState, VolumeCluster,
    VolumeClusterAnalyzer, VolumeProfile, VwapAnchor, VwapCalculator, VwapPoint, ZoneKind,
};
pub use config::HuntConfig;

pub mod prelude {
    pub use crate::{
        // Analysis stages
        analysis::*,
        // Configuration
        config::HuntConfig,
        // Parameters
        params::{ParamMeta, ParamType, ParameterizedConfig},
        // Parallel
        scan_parallel,
        // Input
        source::{load_bars, load_watchlist, read_bars},
        // Engine
        Analysis,
        // Types
        Bar,
        BarSeries,
        EngineBuilder,
        Factor,
        HuntEngine,
        // Errors
        HuntError,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, HuntError>;

/// Errors that can occur while building or running the pipeline
#[derive(Debug, Clone, thiserror::Error)]
pub enum HuntError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient history: need {need} bars, got {got}")]
    InsufficientHistory { need: usize, got: usize },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Timestamp at index {index} is not after the previous bar ({previous} >= {current})")]
    NonMonotonicTimestamp {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("Bar source error at line {line}: {message}")]
    Source { line: usize, message: String },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(HuntError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(HuntError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(HuntError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

/// Non-negative finite multiplier (weights, volume multiples)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Factor(f64);

impl Factor {
    /// Create a new Factor, validating the value is finite and >= 0
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(HuntError::InvalidValue("Factor cannot be NaN or infinite"));
        }
        if value < 0.0 {
            return Err(HuntError::OutOfRange {
                field: "Factor",
                value,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Factor {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Factor {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Factor::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
///
/// Timestamps are seconds since the Unix epoch.
pub trait OHLCV {
    fn timestamp(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> u64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// (high + low + close) / 3
    #[inline]
    fn typical_price(&self) -> f64 {
        (self.high() + self.low() + self.close()) / 3.0
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(HuntError::InvalidBar {
                index: 0,
                reason: "non-finite price",
            });
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err(HuntError::InvalidBar {
                index: 0,
                reason: "price must be positive",
            });
        }
        if self.high() < self.low() {
            return Err(HuntError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        let (open, close) = (self.open(), self.close());
        if open > self.high() || open < self.low() || close > self.high() || close < self.low() {
            return Err(HuntError::InvalidBar {
                index: 0,
                reason: "open/close outside [low, high]",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BAR SERIES
// ============================================================

/// One OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> u64 {
        self.volume
    }
}

/// Validated, immutable bar sequence for one instrument.
///
/// Bars are strictly increasing in timestamp and each bar passes
/// [`OHLCVExt::validate`]. Gaps are not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                HuntError::InvalidBar { reason, .. } => HuntError::InvalidBar { index: i, reason },
                other => other,
            })?;
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(HuntError::NonMonotonicTimestamp {
                    index: i,
                    previous: bars[i - 1].timestamp,
                    current: bar.timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Copy any OHLCV source into a validated series
    pub fn from_ohlcv<T: OHLCV>(source: &[T]) -> Result<Self> {
        let bars = source
            .iter()
            .map(|b| Bar::new(b.timestamp(), b.open(), b.high(), b.low(), b.close(), b.volume()))
            .collect();
        Self::new(bars)
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }
}

// ============================================================
// HUNT ENGINE
// ============================================================

/// Everything one pipeline run produced for an instrument.
///
/// Zones, profile and VWAP are exposed for chart overlays; `signals` is the
/// ordered result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Analysis {
    pub instrument: String,
    pub zones: Vec<LiquidityZone>,
    pub profile: VolumeProfile,
    pub vwap: Vec<VwapPoint>,
    pub outcomes: Vec<TrapOutcome>,
    pub signals: Vec<Signal>,
}

/// Main stop-hunt detection engine
#[derive(Debug, Clone)]
pub struct HuntEngine {
    config: HuntConfig,
}

impl HuntEngine {
    /// Create an engine after validating the configuration
    pub fn new(config: HuntConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HuntConfig {
        &self.config
    }

    /// Run the full pipeline for one instrument.
    pub fn analyze(&self, instrument: &str, series: &BarSeries) -> Result<Analysis> {
        let need = self.config.required_history();
        if series.len() < need {
            return Err(HuntError::InsufficientHistory {
                need,
                got: series.len(),
            });
        }

        let cfg = &self.config;
        let (zones, (profile, vwap)) = rayon::join(
            || cfg.zones.detect(series),
            || rayon::join(|| cfg.clusters.analyze(series), || cfg.vwap.compute(series)),
        );
        let zones = zones?;

        if zones.is_empty() {
            tracing::debug!(instrument, bars = series.len(), "no liquidity zone found");
        }

        let outcomes = cfg.traps.detect(series, &zones);
        let max_strength = zones.iter().map(|z| z.strength).fold(0.0, f64::max);
        let ctx = analysis::ScoringContext {
            instrument,
            series,
            profile: &profile,
            vwap: &vwap,
            max_strength,
        };

        let mut signals: Vec<Signal> = outcomes
            .iter()
            .filter_map(|o| o.candidate.clone())
            .map(|c| cfg.scoring.score(c, &ctx))
            .filter(|s| self.should_include(s))
            .collect();
        signals.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.kind.cmp(&b.kind))
                .then(a.entry_price.total_cmp(&b.entry_price))
        });

        tracing::debug!(
            instrument,
            zones = zones.len(),
            clusters = profile.len(),
            signals = signals.len(),
            "pipeline complete"
        );

        Ok(Analysis {
            instrument: instrument.to_string(),
            zones,
            profile,
            vwap,
            outcomes,
            signals,
        })
    }

    /// Run the pipeline and keep only the signals.
    pub fn scan(&self, instrument: &str, series: &BarSeries) -> Result<Vec<Signal>> {
        self.analyze(instrument, series).map(|a| a.signals)
    }

    fn should_include(&self, signal: &Signal) -> bool {
        signal.confidence >= self.config.min_confidence.get()
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating HuntEngine instances.
///
/// Numeric overrides are collected by parameter name and applied on top of the
/// base configuration in [`EngineBuilder::build`], where they are validated.
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: HuntConfig,
    params: HashMap<&'static str, f64>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the base configuration
    pub fn config(mut self, config: HuntConfig) -> Self {
        self.config = config;
        self
    }

    /// Override any numeric parameter by name (see [`params`])
    pub fn param(mut self, name: &'static str, value: f64) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Zone lookback window in bars
    pub fn lookback(self, bars: usize) -> Self {
        self.param("lookback", bars as f64)
    }

    pub fn min_touches(self, touches: usize) -> Self {
        self.param("min_touches", touches as f64)
    }

    /// Zone tolerance band as a fraction of price
    pub fn zone_tolerance(self, tolerance: f64) -> Self {
        self.param("zone_tolerance", tolerance)
    }

    pub fn volume_bins(self, bins: usize) -> Self {
        self.param("volume_bins", bins as f64)
    }

    pub fn vwap_anchor(mut self, anchor: VwapAnchor) -> Self {
        self.config.vwap.anchor = anchor;
        self
    }

    pub fn breach_proximity(self, proximity: f64) -> Self {
        self.param("breach_proximity", proximity)
    }

    /// Maximum bars between breach and reversal
    pub fn reversal_window(self, bars: usize) -> Self {
        self.param("reversal_window", bars as f64)
    }

    pub fn spike_multiple(self, multiple: f64) -> Self {
        self.param("spike_multiple", multiple)
    }

    /// Confidence weights in (spike, strength, speed, vwap) order
    pub fn weights(self, spike: f64, strength: f64, speed: f64, vwap: f64) -> Self {
        self.param("weight_spike", spike)
            .param("weight_strength", strength)
            .param("weight_speed", speed)
            .param("weight_vwap", vwap)
    }

    pub fn stop_buffer(self, buffer: f64) -> Self {
        self.param("stop_buffer", buffer)
    }

    /// Drop signals below this confidence
    pub fn min_confidence(self, confidence: f64) -> Self {
        self.param("min_confidence", confidence)
    }

    /// Build the engine
    pub fn build(self) -> Result<HuntEngine> {
        let config = self.config.apply_params(&self.params)?;
        HuntEngine::new(config)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub instrument: String,
    pub analysis: Analysis,
}

impl ScanResult {
    pub fn signals(&self) -> &[Signal] {
        &self.analysis.signals
    }
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub instrument: String,
    pub error: HuntError,
}

/// Parallel scanning of multiple instruments.
///
/// A failing instrument lands in the error list and never aborts the others.
pub fn scan_parallel<'a, I>(engine: &HuntEngine, instruments: I) -> (Vec<ScanResult>, Vec<ScanError>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a BarSeries)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(instrument, series)| {
            engine
                .analyze(instrument, series)
                .map(|analysis| ScanResult {
                    instrument: instrument.to_string(),
                    analysis,
                })
                .map_err(|error| ScanError {
                    instrument: instrument.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                tracing::warn!(instrument = %e.instrument, error = %e.error, "instrument skipped");
                errors.push(e);
            }
        }
    }

    tracing::info!(
        scanned = successes.len(),
        failed = errors.len(),
        signals = successes.iter().map(|r| r.signals().len()).sum::<usize>(),
        "watchlist scan complete"
    );

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
