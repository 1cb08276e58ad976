//! The mean-field engine: edge-based compartmental model (EBCM) for two
//! competing adoption variants.
//!
//! State vector layout (8 components):
//!
//! | index | symbol | meaning                                             |
//! |-------|--------|-----------------------------------------------------|
//! | 0     | θ      | P(edge has not transmitted to its endpoint)         |
//! | 1     | q      | per-edge survival against spontaneous adoption      |
//! | 2     | s_l    | susceptible fraction of the low-threshold class     |
//! | 3     | s_h    | susceptible fraction of the high-threshold class    |
//! | 4     | a_a    | active fraction of the low class (variant A)        |
//! | 5     | a_b    | active fraction of the high class (variant B)       |
//! | 6     | r_a    | recovered fraction of the low class                 |
//! | 7     | r_b    | recovered fraction of the high class                |
//!
//! Class fractions are per class: `s_l + a_a + r_a` and `s_h + a_b + r_b`
//! each stay at one, and population aggregates weight them by the
//! low/high population shares.
//!
//! The binomial sums in [`dtheta`] and [`dsh`] run over `m = 0..t_high`
//! with `t_high` the configured high threshold, not over `m = 0..k`.

use crate::config::{PopulationSplit, SarConfig, ThresholdPair};
use crate::degree::DegreeDistribution;
use crate::error::CoreError;
use crate::ode::{self, linspace};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The 8-component mean-field state.
pub type SarState = SVector<f64, 8>;

pub const THETA: usize = 0;
pub const Q: usize = 1;
pub const S_LOW: usize = 2;
pub const S_HIGH: usize = 3;
pub const ACTIVE_A: usize = 4;
pub const ACTIVE_B: usize = 5;
pub const RECOVERED_A: usize = 6;
pub const RECOVERED_B: usize = 7;

/// Slack allowed before θ or q count as having left [0, 1].
const DOMAIN_TOLERANCE: f64 = 1e-9;

/// Scalar parameters of the mean-field equations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EbcmParams {
    /// Spontaneous adoption rate α
    pub alpha: f64,

    /// Transmission rate λ
    pub lambda: f64,

    /// Recovery rate γ
    pub gamma: f64,

    /// Initial adopter fraction ρ0
    pub rho0: f64,

    /// Threshold pair; `high` bounds the binomial sums
    pub thresholds: ThresholdPair,

    /// Population shares; `low` is the p weighting the θ^(k-1) term
    pub population: PopulationSplit,
}

impl EbcmParams {
    /// Extracts the mean-field parameters from a run configuration.
    pub fn from_config(config: &SarConfig) -> Self {
        Self {
            alpha: config.alpha,
            lambda: config.lambda,
            gamma: config.gamma,
            rho0: config.rho0,
            thresholds: config.thresholds,
            population: config.population,
        }
    }
}

/// Degrees visited by the derivative sums, paired with their mass.
///
/// Building this is where a missing p_k is caught, so the derivative
/// functions themselves cannot fail.
#[derive(Debug, Clone)]
pub struct DegreeSupport {
    terms: Vec<(u32, f64)>,
    mean_degree: f64,
}

impl DegreeSupport {
    /// Pairs each of `degree_values` with its mass in `pk`.
    ///
    /// The mean degree defaults to Σ k p_k of `pk`.
    ///
    /// # Errors
    /// `MissingDegreeMass` for the first listed degree without mass.
    pub fn new(degree_values: &[u32], pk: &DegreeDistribution) -> Result<Self, CoreError> {
        let terms = degree_values
            .iter()
            .map(|&k| pk.mass(k).map(|p| (k, p)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            terms,
            mean_degree: pk.mean_degree(),
        })
    }

    /// Visits every degree of `pk`.
    pub fn full(pk: &DegreeDistribution) -> Self {
        Self {
            terms: pk.iter().collect(),
            mean_degree: pk.mean_degree(),
        }
    }

    /// Overrides the normalizing mean degree z.
    pub fn with_mean_degree(mut self, mean_degree: f64) -> Result<Self, CoreError> {
        if !(mean_degree > 0.0) || !mean_degree.is_finite() {
            return Err(CoreError::parameter("mean_degree", format!("must be > 0, got {}", mean_degree)));
        }
        self.mean_degree = mean_degree;
        Ok(self)
    }

    /// Normalizing mean degree z.
    pub fn mean_degree(&self) -> f64 {
        self.mean_degree
    }

    /// `(k, p_k)` pairs in visiting order.
    pub fn terms(&self) -> &[(u32, f64)] {
        &self.terms
    }
}

/// Binomial coefficient C(n, m) as a float; zero when `m > n`.
pub fn binomial(n: u32, m: u32) -> f64 {
    if m > n {
        return 0.0;
    }
    let m = m.min(n - m);
    (0..m).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Rate of change of θ.
///
/// ξ_s = (1-ρ0)·q/z · Σ_k k p_k [p·θ^(k-1) + (1-p)·Σ_{m<t_high} C(k-1,m) θ^(k-1-m) (1-θ)^m]
///
/// dθ/dt = -λ(θ - ξ_s) + γ(1-θ)(1-λ)
pub fn dtheta(theta: f64, q: f64, params: &EbcmParams, support: &DegreeSupport) -> f64 {
    let p = params.population.low;
    let t_high = params.thresholds.high;

    let mut xi_s = 0.0;
    for &(k, pk) in support.terms() {
        let below = k - 1;
        let low_term = p * theta.powi(below as i32);

        let high_sum: f64 = (0..t_high.min(k))
            .map(|m| binomial(below, m) * theta.powi((below - m) as i32) * (1.0 - theta).powi(m as i32))
            .sum();

        xi_s += k as f64 * pk * (low_term + (1.0 - p) * high_sum);
    }
    xi_s *= (1.0 - params.rho0) * q / support.mean_degree();

    -params.lambda * (theta - xi_s) + params.gamma * (1.0 - theta) * (1.0 - params.lambda)
}

/// Rate of change of the low-threshold susceptible fraction.
///
/// s_l = (1-ρ0)·q·Σ p_k θ^k, differentiated with the product and chain rules.
pub fn dsl(theta: f64, dtheta_dt: f64, q: f64, dq_dt: f64, params: &EbcmParams, support: &DegreeSupport) -> f64 {
    let mut phi = 0.0;
    let mut dphi = 0.0;
    for &(k, pk) in support.terms() {
        phi += pk * theta.powi(k as i32);
        dphi += pk * k as f64 * theta.powi(k as i32 - 1) * dtheta_dt;
    }

    let scale = 1.0 - params.rho0;
    scale * dq_dt * phi + scale * q * dphi
}

/// Rate of change of the high-threshold susceptible fraction.
///
/// s_h = (1-ρ0)·q·Σ p_k Σ_{m<t_high} C(k,m) θ^(k-m) (1-θ)^m.
///
/// At θ == 1 exactly the degenerate form Φ = Σ p_k θ^k, Φ' = Σ p_k (k·θ' - k·θ')
/// is used so the general expression never evaluates (1-θ)^(-1).
pub fn dsh(theta: f64, dtheta_dt: f64, q: f64, dq_dt: f64, params: &EbcmParams, support: &DegreeSupport) -> f64 {
    let mut phi = 0.0;
    let mut dphi = 0.0;

    if theta == 1.0 {
        for &(k, pk) in support.terms() {
            let kf = k as f64;
            phi += pk * theta.powi(k as i32);
            dphi += pk * (kf * dtheta_dt - kf * dtheta_dt);
        }
    } else {
        let t_high = params.thresholds.high;
        let one_minus = 1.0 - theta;

        for &(k, pk) in support.terms() {
            for m in 0..t_high.min(k + 1) {
                let c = binomial(k, m);
                let rest = k - m;

                phi += pk * c * theta.powi(rest as i32) * one_minus.powi(m as i32);

                // d/dt [θ^(k-m) (1-θ)^m]; zero-coefficient parts are dropped
                let mut slope = 0.0;
                if rest > 0 {
                    slope += rest as f64 * theta.powi(rest as i32 - 1) * one_minus.powi(m as i32);
                }
                if m > 0 {
                    slope -= theta.powi(rest as i32) * m as f64 * one_minus.powi(m as i32 - 1);
                }
                dphi += pk * c * slope * dtheta_dt;
            }
        }
    }

    let scale = 1.0 - params.rho0;
    scale * dq_dt * phi + scale * q * dphi
}

/// Where θ or q left [0, 1] during an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainViolation {
    /// Grid index
    pub index: usize,

    /// Grid time
    pub time: f64,

    /// State component (`THETA` or `Q`)
    pub component: usize,

    /// Offending value
    pub value: f64,
}

/// Mean-field trajectory plus any domain warnings raised along the way.
#[derive(Debug, Clone)]
pub struct MeanFieldSolution {
    /// Time points
    pub times: Vec<f64>,

    /// State at each time point
    pub states: Vec<SarState>,

    /// θ/q excursions outside [0, 1]
    pub domain_violations: Vec<DomainViolation>,

    population: PopulationSplit,
}

impl MeanFieldSolution {
    /// Time series of one state component.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|y| y[index]).collect()
    }

    /// Population active fraction a = p_low·a_a + p_high·a_b.
    pub fn active_fraction(&self) -> Vec<f64> {
        self.states
            .iter()
            .map(|y| self.population.low * y[ACTIVE_A] + self.population.high * y[ACTIVE_B])
            .collect()
    }

    /// Population recovered fraction p_low·r_a + p_high·r_b.
    pub fn recovered_fraction(&self) -> Vec<f64> {
        self.states
            .iter()
            .map(|y| self.population.low * y[RECOVERED_A] + self.population.high * y[RECOVERED_B])
            .collect()
    }

    /// Population susceptible fraction p_low·s_l + p_high·s_h.
    pub fn susceptible_fraction(&self) -> Vec<f64> {
        self.states
            .iter()
            .map(|y| self.population.low * y[S_LOW] + self.population.high * y[S_HIGH])
            .collect()
    }

    /// True if θ and q stayed inside [0, 1] everywhere.
    pub fn is_in_domain(&self) -> bool {
        self.domain_violations.is_empty()
    }
}

/// The composite right-hand side plus the parameters it closes over.
#[derive(Debug, Clone)]
pub struct MeanFieldModel {
    params: EbcmParams,
    support: DegreeSupport,
}

impl MeanFieldModel {
    /// Creates a model after validating the scalar parameters.
    pub fn new(params: EbcmParams, support: DegreeSupport) -> Result<Self, CoreError> {
        if !params.alpha.is_finite() || params.alpha < 0.0 {
            return Err(CoreError::parameter("alpha", format!("must be finite and >= 0, got {}", params.alpha)));
        }
        for (name, value) in [("lambda", params.lambda), ("gamma", params.gamma), ("rho0", params.rho0)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::parameter(name, format!("must lie in [0, 1], got {}", value)));
            }
        }
        params.thresholds.validate()?;
        params.population.validate()?;

        Ok(Self { params, support })
    }

    /// Builds the model for a configuration on a Poisson(mean_degree) distribution.
    pub fn from_config(config: &SarConfig) -> Result<Self, CoreError> {
        let pk = DegreeDistribution::poisson(config.mean_degree, config.k_max)?;
        Self::new(EbcmParams::from_config(config), DegreeSupport::full(&pk))
    }

    /// Parameters in use.
    pub fn params(&self) -> &EbcmParams {
        &self.params
    }

    /// Initial state: no edge has transmitted, ρ0 of each class is active.
    pub fn initial_state(&self) -> SarState {
        let rho0 = self.params.rho0;
        SarState::from_column_slice(&[1.0, 1.0, 1.0 - rho0, 1.0 - rho0, rho0, rho0, 0.0, 0.0])
    }

    /// The composite derivative of the 8-component state.
    ///
    /// dq/dt is driven directly by the current adoption pressure,
    /// dq/dt = -α·a·q, rather than through its own sub-function.
    pub fn derivatives(&self, y: &SarState, _t: f64) -> SarState {
        let EbcmParams { alpha, gamma, population, .. } = self.params;
        let (theta, q) = (y[THETA], y[Q]);
        let (aa, ab) = (y[ACTIVE_A], y[ACTIVE_B]);

        let a = population.low * aa + population.high * ab;

        let dtheta_dt = dtheta(theta, q, &self.params, &self.support);
        let dq_dt = -alpha * a * q;
        let dsl_dt = dsl(theta, dtheta_dt, q, dq_dt, &self.params, &self.support);
        let dsh_dt = dsh(theta, dtheta_dt, q, dq_dt, &self.params, &self.support);

        SarState::from_column_slice(&[
            dtheta_dt,
            dq_dt,
            dsl_dt,
            dsh_dt,
            -dsl_dt - gamma * aa,
            -dsh_dt - gamma * ab,
            gamma * aa,
            gamma * ab,
        ])
    }

    /// Integrates from [`initial_state`](Self::initial_state) over `grid`.
    pub fn solve(&self, grid: &[f64]) -> Result<MeanFieldSolution, CoreError> {
        self.solve_from(self.initial_state(), grid)
    }

    /// Integrates from `[0, t_end]` on `points` evenly spaced grid points.
    pub fn solve_uniform(&self, t_end: f64, points: usize) -> Result<MeanFieldSolution, CoreError> {
        self.solve(&linspace(0.0, t_end, points))
    }

    /// Integrates from an arbitrary initial state over `grid`.
    ///
    /// θ or q leaving [0, 1] is logged and recorded on the solution; a
    /// non-finite state aborts with `NonFinite`.
    pub fn solve_from(&self, y0: SarState, grid: &[f64]) -> Result<MeanFieldSolution, CoreError> {
        debug!(
            "EBCM solve: alpha={} lambda={} gamma={} points={}",
            self.params.alpha,
            self.params.lambda,
            self.params.gamma,
            grid.len()
        );

        let trajectory = ode::integrate(|y, t| self.derivatives(y, t), y0, grid)?;

        let mut domain_violations = Vec::new();
        for (index, (state, &time)) in trajectory.states.iter().zip(&trajectory.times).enumerate() {
            for component in [THETA, Q] {
                let value = state[component];
                if value < -DOMAIN_TOLERANCE || value > 1.0 + DOMAIN_TOLERANCE {
                    domain_violations.push(DomainViolation { index, time, component, value });
                }
            }
        }

        if let Some(first) = domain_violations.first() {
            warn!(
                "EBCM state left [0, 1]: component {} = {} at t = {} ({} violations)",
                first.component,
                first.value,
                first.time,
                domain_violations.len()
            );
        }

        Ok(MeanFieldSolution {
            times: trajectory.times,
            states: trajectory.states,
            domain_violations,
            population: self.params.population,
        })
    }
}
