//! Parameter metadata for the pipeline configuration
//!
//! Tolerance bands, spike multiples and window lengths have no universally
//! correct value. This module describes every numeric tunable so callers can:
//! - Run grid searches over them
//! - Document them
//! - Override them by name (see [`crate::EngineBuilder::param`])
//!
//! # Example
//!
//! ```rust
//! use stophunt::params::ParameterizedConfig;
//! use stophunt::prelude::*;
//!
//! for param in HuntConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{Factor, HuntError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer, in bars)
  Period,
  /// Non-negative multiplier
  Factor,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "spike_multiple")
  pub name: &'static str,
  /// Parameter type
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Factor parameter
  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value against the search range and type of this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(HuntError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Factor => Factor::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(HuntError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

/// Look up the metadata of a named parameter
pub fn find_param<'a>(params: &'a [ParamMeta], name: &str) -> Option<&'a ParamMeta> {
  params.iter().find(|p| p.name == name)
}

// ============================================================
// PARAMETERIZED CONFIG TRAIT
// ============================================================

/// Trait for configurations that support parameterization by name
pub trait ParameterizedConfig: Sized + Default {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Returns a copy of `self` with the given parameters overridden.
  ///
  /// Unknown names are rejected.
  fn apply_params(self, params: &HashMap<&str, f64>) -> Result<Self>;

  /// Creates a configuration from defaults plus the given overrides
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Self::default().apply_params(params)
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: Ratio) -> Result<Ratio> {
  match params.get(key) {
    Some(&value) => Ratio::new(value),
    None => Ok(default),
  }
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: Period) -> Result<Period> {
  match params.get(key) {
    Some(&value) if value < 0.0 || !value.is_finite() || value.fract() != 0.0 => {
      Err(HuntError::InvalidValue("Period must be a positive integer"))
    },
    Some(&value) => Period::new(value as usize),
    None => Ok(default),
  }
}

/// Helper to get a Factor from params with default fallback
pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: Factor) -> Result<Factor> {
  match params.get(key) {
    Some(&value) => Factor::new(value),
    None => Ok(default),
  }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_ratio() {
    let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7, 0.1), "Test ratio parameter");

    assert_eq!(meta.name, "test_ratio");
    assert_eq!(meta.param_type, ParamType::Ratio);
    assert_eq!(meta.default, 0.5);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.2), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.3).abs() < f64::EPSILON);
    assert!((grid[1] - 0.5).abs() < f64::EPSILON);
    assert!((grid[2] - 0.7).abs() < f64::EPSILON);
  }

  #[test]
  fn test_validate_period() {
    let meta = ParamMeta::period("test", 14.0, (10.0, 20.0, 2.0), "Test");

    assert!(meta.validate(14.0).is_ok());
    assert!(meta.validate(8.0).is_err());
    assert!(meta.validate(12.5).is_err());
  }

  #[test]
  fn test_validate_factor() {
    let meta = ParamMeta::factor("test", 1.8, (1.0, 5.0, 0.1), "Test");

    assert!(meta.validate(1.0).is_ok());
    assert!(meta.validate(5.5).is_err());
  }

  #[test]
  fn test_get_helpers() {
    let mut params = HashMap::new();
    params.insert("ratio", 0.8);
    params.insert("period", 20.0);
    params.insert("negative", -3.0);
    params.insert("fractional", 2.7);

    let r = get_ratio(&params, "ratio", Ratio::new_const(0.5)).unwrap();
    assert!((r.get() - 0.8).abs() < f64::EPSILON);
    assert_eq!(get_period(&params, "period", Period::new_const(14)).unwrap().get(), 20);
    assert_eq!(get_period(&params, "missing", Period::new_const(14)).unwrap().get(), 14);
    assert!(get_period(&params, "negative", Period::new_const(14)).is_err());
    assert!(get_period(&params, "fractional", Period::new_const(14)).is_err());
    assert!(get_factor(&params, "negative", Factor::new_const(1.0)).is_err());
  }

  #[test]
  fn test_find_param() {
    let table = [ParamMeta::period("a", 1.0, (1.0, 2.0, 1.0), ""), ParamMeta::ratio("b", 0.1, (0.0, 1.0, 0.1), "")];
    assert_eq!(find_param(&table, "b").map(|p| p.param_type), Some(ParamType::Ratio));
    assert!(find_param(&table, "c").is_none());
  }
}
