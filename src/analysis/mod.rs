//! Pipeline stages
//!
//! Leaf-first:
//!
//! - **Zones**: swing extremes grouped into resistance/support levels
//! - **Clusters**: volume profile over the traded range
//! - **VWAP**: cumulative, session-anchored or rolling
//! - **Traps**: per-zone breach/reversal state machines
//! - **Scoring**: confidence of each trap and the resulting signal
//!
//! Zones, clusters and VWAP only read the [`crate::BarSeries`] and can run
//! concurrently; traps and scoring consume their results.

pub mod helpers;

pub mod clusters;
pub mod scoring;
pub mod traps;
pub mod vwap;
pub mod zones;

pub use clusters::*;
pub use helpers::*;
pub use scoring::*;
pub use traps::*;
pub use vwap::*;
pub use zones::*;
