//! JSON export of a single run for plotting and offline analysis.

use crate::engine::SeriesSet;
use crate::error::SimError;
use sar_core::ebcm::{THETA, Q};
use sar_core::{MeanFieldSolution, SarConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Mean-field trajectory flattened into plain columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanFieldExport {
    pub times: Vec<f64>,
    pub theta: Vec<f64>,
    pub q: Vec<f64>,
    pub susceptible: Vec<f64>,
    pub active: Vec<f64>,
    pub recovered: Vec<f64>,

    /// Grid points where θ or q left [0, 1]
    pub domain_violations: usize,
}

impl From<&MeanFieldSolution> for MeanFieldExport {
    fn from(solution: &MeanFieldSolution) -> Self {
        Self {
            times: solution.times.clone(),
            theta: solution.component(THETA),
            q: solution.component(Q),
            susceptible: solution.susceptible_fraction(),
            active: solution.active_fraction(),
            recovered: solution.recovered_fraction(),
            domain_violations: solution.domain_violations.len(),
        }
    }
}

/// Complete export of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    /// Run mode name
    pub mode: String,

    /// Seed used
    pub seed: u64,

    /// Parameters of the run
    pub config: SarConfig,

    /// Agent-based series, if an agent run was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<SeriesSet>,

    /// Mean-field columns, if the mean field was integrated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_field: Option<MeanFieldExport>,
}

impl RunExport {
    /// Creates an empty export for `config`.
    pub fn new(mode: &str, config: &SarConfig) -> Self {
        Self {
            mode: mode.to_string(),
            seed: config.seed,
            config: config.clone(),
            agent: None,
            mean_field: None,
        }
    }

    /// Attaches agent-based series.
    pub fn with_agent(mut self, series: SeriesSet) -> Self {
        self.agent = Some(series);
        self
    }

    /// Attaches a mean-field solution.
    pub fn with_mean_field(mut self, solution: &MeanFieldSolution) -> Self {
        self.mean_field = Some(MeanFieldExport::from(solution));
        self
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sar_core::MeanFieldModel;

    #[test]
    fn test_export_json_shape() {
        let config = SarConfig {
            mean_degree: 4.0,
            k_max: 15,
            rho0: 0.01,
            t_end: 5.0,
            grid_points: 11,
            ..Default::default()
        };
        let solution = MeanFieldModel::from_config(&config).unwrap().solve_uniform(5.0, 11).unwrap();
        let series = SeriesSet {
            aa: vec![1, 2],
            ab: vec![0, 1],
            a: vec![1, 3],
            r: vec![0, 0],
            ra: vec![0, 0],
            rb: vec![0, 0],
            s: vec![9, 7],
        };

        let export = RunExport::new("agent", &config)
            .with_agent(series)
            .with_mean_field(&solution);
        let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&export).unwrap()).unwrap();

        assert_eq!(value["mode"], "agent");
        assert_eq!(value["seed"], 42);
        assert_eq!(value["agent"]["a"][1], 3);
        assert_eq!(value["mean_field"]["theta"].as_array().unwrap().len(), 11);
        assert_eq!(value["mean_field"]["theta"][0], 1.0);
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let export = RunExport::new("mean-field", &SarConfig::default());
        let json = serde_json::to_string(&export).unwrap();

        assert!(!json.contains("\"agent\""));
        assert!(!json.contains("\"mean_field\""));
    }
}
