//! Degree distributions p_k used to weight per-degree terms of the EBCM sums.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on `Σ p_k = 1`.
const MASS_TOLERANCE: f64 = 1e-6;

/// Probability mass over positive degrees.
///
/// Degrees are kept sorted so derivative sums always visit them in the same
/// order and floating-point results are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, f64>", into = "BTreeMap<u32, f64>")]
pub struct DegreeDistribution {
    masses: BTreeMap<u32, f64>,
}

impl DegreeDistribution {
    /// Builds a distribution from explicit masses.
    ///
    /// Rejects degree 0, negative or non-finite masses, and totals that do not
    /// sum to one.
    pub fn new(masses: BTreeMap<u32, f64>) -> Result<Self, CoreError> {
        if masses.is_empty() {
            return Err(CoreError::distribution("no degrees given"));
        }
        if masses.contains_key(&0) {
            return Err(CoreError::distribution("degree 0 is not allowed"));
        }
        if let Some((k, p)) = masses.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
            return Err(CoreError::distribution(format!("mass for degree {} is {}", k, p)));
        }

        let total: f64 = masses.values().sum();
        if (total - 1.0).abs() > MASS_TOLERANCE {
            return Err(CoreError::distribution(format!("masses sum to {}, expected 1", total)));
        }

        Ok(Self { masses })
    }

    /// Builds a distribution from `(degree, mass)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f64)>) -> Result<Self, CoreError> {
        Self::new(pairs.into_iter().collect())
    }

    /// All nodes have degree `k`.
    pub fn regular(k: u32) -> Result<Self, CoreError> {
        Self::from_pairs([(k, 1.0)])
    }

    /// Poisson(`mean`) truncated to `1..=k_max` and renormalized.
    ///
    /// The mean-field counterpart of an Erdős–Rényi contact network.
    pub fn poisson(mean: f64, k_max: u32) -> Result<Self, CoreError> {
        if !(mean > 0.0) || !mean.is_finite() {
            return Err(CoreError::parameter("mean_degree", format!("must be > 0, got {}", mean)));
        }
        if k_max == 0 {
            return Err(CoreError::parameter("k_max", "must be >= 1"));
        }

        let mut masses = BTreeMap::new();
        let mut pmf = (-mean).exp();
        let mut total = 0.0;
        for k in 1..=k_max {
            pmf *= mean / k as f64;
            masses.insert(k, pmf);
            total += pmf;
        }

        if !(total > 0.0) {
            return Err(CoreError::distribution("truncated Poisson has no mass"));
        }
        for p in masses.values_mut() {
            *p /= total;
        }

        Self::new(masses)
    }

    /// Empirical distribution of a degree sequence.
    ///
    /// Isolated nodes (degree 0) carry no edges and are dropped before
    /// normalizing.
    pub fn from_degrees(degrees: &[usize]) -> Result<Self, CoreError> {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for &d in degrees.iter().filter(|&&d| d > 0) {
            *counts.entry(d as u32).or_default() += 1;
        }

        let total: usize = counts.values().sum();
        if total == 0 {
            return Err(CoreError::distribution("degree sequence has no edges"));
        }

        Self::new(
            counts
                .into_iter()
                .map(|(k, c)| (k, c as f64 / total as f64))
                .collect(),
        )
    }

    /// Mass for degree `k`, or `MissingDegreeMass`.
    pub fn mass(&self, k: u32) -> Result<f64, CoreError> {
        self.masses
            .get(&k)
            .copied()
            .ok_or(CoreError::MissingDegreeMass { degree: k })
    }

    /// Mass for degree `k` if present.
    pub fn get(&self, k: u32) -> Option<f64> {
        self.masses.get(&k).copied()
    }

    /// Supported degrees in ascending order.
    pub fn degrees(&self) -> Vec<u32> {
        self.masses.keys().copied().collect()
    }

    /// Iterates over `(degree, mass)` in ascending degree order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.masses.iter().map(|(&k, &p)| (k, p))
    }

    /// Mean degree z = Σ k p_k.
    pub fn mean_degree(&self) -> f64 {
        self.iter().map(|(k, p)| k as f64 * p).sum()
    }

    /// Largest supported degree.
    pub fn max_degree(&self) -> u32 {
        self.masses.keys().next_back().copied().unwrap_or(0)
    }
}

impl TryFrom<BTreeMap<u32, f64>> for DegreeDistribution {
    type Error = CoreError;

    fn try_from(masses: BTreeMap<u32, f64>) -> Result<Self, Self::Error> {
        Self::new(masses)
    }
}

impl From<DegreeDistribution> for BTreeMap<u32, f64> {
    fn from(dist: DegreeDistribution) -> Self {
        dist.masses
    }
}
