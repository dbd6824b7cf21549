//! Volume profile
//!
//! The traded range `[min(low), max(high)]` is cut into equal-width bins and
//! each bar's whole volume is credited to the bin holding its close. Bins are
//! then ranked by volume.

use serde::{Deserialize, Serialize};

use crate::{BarSeries, Period, Result};

/// One price bin of the volume profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeCluster {
    pub price_low: f64,
    pub price_high: f64,
    pub aggregated_volume: u64,
    /// 1 = highest volume
    pub rank: usize,
}

impl VolumeCluster {
    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        price >= self.price_low && price <= self.price_high
    }
}

/// Clusters ordered by rank, highest volume first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeProfile {
    clusters: Vec<VolumeCluster>,
}

impl VolumeProfile {
    pub fn clusters(&self) -> &[VolumeCluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The `n` highest-volume clusters (high volume nodes)
    pub fn top(&self, n: usize) -> &[VolumeCluster] {
        &self.clusters[..n.min(self.clusters.len())]
    }

    /// The best-ranked cluster whose range contains `price`
    pub fn cluster_at(&self, price: f64) -> Option<&VolumeCluster> {
        self.clusters.iter().find(|c| c.contains(price))
    }

    pub fn total_volume(&self) -> u64 {
        self.clusters.iter().map(|c| c.aggregated_volume).sum()
    }
}

/// Builds a [`VolumeProfile`] with a fixed number of bins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeClusterAnalyzer {
    pub bins: Period,
}

impl Default for VolumeClusterAnalyzer {
    fn default() -> Self {
        Self {
            bins: Period::new_const(20),
        }
    }
}

impl VolumeClusterAnalyzer {
    pub fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Empty when the series has no volume or no price range.
    pub fn analyze(&self, series: &BarSeries) -> VolumeProfile {
        let bars = series.bars();
        let total: u64 = bars.iter().map(|b| b.volume).sum();
        if total == 0 {
            return VolumeProfile::default();
        }

        let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        if high <= low {
            return VolumeProfile::default();
        }

        let n = self.bins.get();
        let width = (high - low) / n as f64;
        let mut volumes = vec![0u64; n];
        for bar in bars {
            let bin = (((bar.close - low) / width) as usize).min(n - 1);
            volumes[bin] += bar.volume;
        }

        let mut clusters: Vec<VolumeCluster> = volumes
            .into_iter()
            .enumerate()
            .map(|(i, aggregated_volume)| VolumeCluster {
                price_low: low + i as f64 * width,
                price_high: if i == n - 1 {
                    high
                } else {
                    low + (i + 1) as f64 * width
                },
                aggregated_volume,
                rank: 0,
            })
            .collect();

        clusters.sort_by(|a, b| {
            b.aggregated_volume
                .cmp(&a.aggregated_volume)
                .then(a.price_low.total_cmp(&b.price_low))
        });
        for (i, cluster) in clusters.iter_mut().enumerate() {
            cluster.rank = i + 1;
        }

        VolumeProfile { clusters }
    }
}
