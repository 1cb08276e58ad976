//! Fixed-step classical Runge-Kutta (RK4) over an explicit time grid.
//!
//! The grid need not be uniform: each step uses the local spacing
//! `h = t[i+1] - t[i]`. There is no adaptive step control and no error
//! estimate, so the cost is exactly four derivative evaluations per interval.
//!
//! Non-finite states are reported as [`CoreError::NonFinite`] instead of being
//! carried silently through the rest of the grid.

use crate::error::CoreError;
use nalgebra::SVector;

/// States sampled on a time grid.
#[derive(Debug, Clone)]
pub struct Trajectory<const N: usize> {
    /// Time points (copy of the input grid)
    pub times: Vec<f64>,

    /// `states[i]` is the state at `times[i]`
    pub states: Vec<SVector<f64, N>>,
}

impl<const N: usize> Trajectory<N> {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no point was recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State at the last grid point.
    pub fn final_state(&self) -> Option<&SVector<f64, N>> {
        self.states.last()
    }

    /// Time series of a single component.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|y| y[index]).collect()
    }
}

/// Performs a single RK4 step of size `h` from `(t, y)`.
pub fn rk4_step<const N: usize, F>(f: &mut F, y: &SVector<f64, N>, t: f64, h: f64) -> SVector<f64, N>
where
    F: FnMut(&SVector<f64, N>, f64) -> SVector<f64, N>,
{
    let half = 0.5 * h;

    let k1 = f(y, t);
    let k2 = f(&(y + k1 * half), t + half);
    let k3 = f(&(y + k2 * half), t + half);
    let k4 = f(&(y + k3 * h), t + h);

    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// Integrates `dy/dt = f(y, t)` from `y0` over the grid `t`.
///
/// Returns one state per grid point, the first being `y0`.
///
/// # Errors
/// * `InvalidGrid` - empty grid, non-finite or non-increasing time points
/// * `NonFinite` - a state component became NaN or infinite
pub fn integrate<const N: usize, F>(mut f: F, y0: SVector<f64, N>, t: &[f64]) -> Result<Trajectory<N>, CoreError>
where
    F: FnMut(&SVector<f64, N>, f64) -> SVector<f64, N>,
{
    validate_grid(t)?;
    check_finite(&y0, 0, t[0])?;

    let mut states = Vec::with_capacity(t.len());
    states.push(y0);

    let mut y = y0;
    for (i, window) in t.windows(2).enumerate() {
        let h = window[1] - window[0];
        y = rk4_step(&mut f, &y, window[0], h);
        check_finite(&y, i + 1, window[1])?;
        states.push(y);
    }

    Ok(Trajectory {
        times: t.to_vec(),
        states,
    })
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

fn validate_grid(t: &[f64]) -> Result<(), CoreError> {
    if t.is_empty() {
        return Err(CoreError::InvalidGrid("time grid is empty".to_string()));
    }
    if let Some(bad) = t.iter().position(|x| !x.is_finite()) {
        return Err(CoreError::InvalidGrid(format!("t[{}] is not finite", bad)));
    }
    if let Some(i) = t.windows(2).position(|w| w[1] <= w[0]) {
        return Err(CoreError::InvalidGrid(format!(
            "grid not strictly increasing at index {} ({} -> {})",
            i + 1,
            t[i],
            t[i + 1]
        )));
    }
    Ok(())
}

fn check_finite<const N: usize>(y: &SVector<f64, N>, step: usize, time: f64) -> Result<(), CoreError> {
    match y.iter().position(|v| !v.is_finite()) {
        Some(component) => Err(CoreError::NonFinite { step, time, component }),
        None => Ok(()),
    }
}
