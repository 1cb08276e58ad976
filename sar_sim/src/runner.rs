//! Single runs and parameter sweeps over (α, λ).
//!
//! A sweep cell is one (α, λ) pair. Each cell draws its own connected
//! Erdős–Rényi networks and runs several simulations per network, all from
//! streams derived from the master seed, so cells can run on any rayon
//! worker in any order and still give identical results.

use crate::context::RunContext;
use crate::engine::{SeriesSet, TransitionEngine, TransitionRates};
use crate::error::SimError;
use crate::initializer::initialize;
use crate::network::ContactNetwork;
use crate::results::ResultTable;
use rayon::prelude::*;
use sar_core::{
    DegreeDistribution, DegreeSupport, EbcmParams, MeanFieldModel, MeanFieldSolution, PopulationSplit, SarConfig,
    ThresholdPair,
};
use sar_env::ContactGraph;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Default bound on "regenerate until connected" attempts.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

/// Progress is logged every this many α rows.
const PROGRESS_EVERY: usize = 20;

/// Sweep parameters written next to the result tables.
pub const MANIFEST_FILE: &str = "parameters.json";

/// Half-open grid `start, start + step, ...` below `stop`.
///
/// Points are computed as `start + i·step` rather than by accumulation.
/// A non-positive or non-finite step gives an empty grid.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    (0..)
        .map(|i| start + i as f64 * step)
        .take_while(|&x| x < stop)
        .collect()
}

/// Result of one agent-based run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Seed the run was derived from
    pub seed: u64,

    /// Nodes in the contact network
    pub node_count: usize,

    /// Undirected edges in the contact network
    pub edge_count: usize,

    /// Population series
    pub series: SeriesSet,
}

/// Runs one agent-based simulation on a fresh connected ER network.
pub fn run_agent(config: &SarConfig, max_attempts: usize, halt_on_extinction: bool) -> Result<AgentRun, SimError> {
    config.validate()?;
    let ctx = RunContext::new(config.seed);

    let network = ContactNetwork::connected_erdos_renyi(
        &mut ctx.network_rng(),
        config.node_count,
        config.mean_degree,
        max_attempts,
    )?;

    let mut rng = ctx.simulation_rng(0);
    let series = simulate_on(&network, config, config.alpha, config.lambda, halt_on_extinction, &mut rng)?;

    Ok(AgentRun {
        seed: config.seed,
        node_count: network.node_count(),
        edge_count: network.edge_count(),
        series,
    })
}

/// Runs the mean-field model for `config` on a Poisson degree distribution.
pub fn run_mean_field(config: &SarConfig) -> Result<MeanFieldSolution, SimError> {
    config.validate()?;
    let model = MeanFieldModel::from_config(config)?;
    Ok(model.solve_uniform(config.t_end, config.grid_points)?)
}

fn simulate_on<G: ContactGraph>(
    graph: &G,
    config: &SarConfig,
    alpha: f64,
    lambda: f64,
    halt_on_extinction: bool,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<SeriesSet, SimError> {
    let mut state = initialize(config.node_count, config.rho0, config.thresholds, config.population, rng)?;
    let engine = TransitionEngine::new(graph, TransitionRates::new(alpha, lambda, config.gamma))?
        .with_halt_on_extinction(halt_on_extinction);
    engine.run(&mut state, config.steps, rng)
}

/// Everything needed to interpret (and re-read) a sweep directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepManifest {
    /// Contact network family
    pub graph: String,
    pub node_count: usize,
    pub mean_degree: f64,
    pub alphas: Vec<f64>,
    pub lambdas: Vec<f64>,
    pub network_iterations: usize,
    pub simulation_iterations: usize,
    pub steps: usize,
    pub thresholds: ThresholdPair,
    pub population: PopulationSplit,
    pub rho0: f64,
    pub gamma: f64,
    pub seed: u64,
    pub halt_on_extinction: bool,
}

impl SweepManifest {
    /// Iterations per (α, λ) cell.
    pub fn iterations(&self) -> usize {
        self.network_iterations * self.simulation_iterations
    }

    /// Entries per time series, initial state included.
    pub fn time_len(&self) -> usize {
        self.steps + 1
    }

    fn empty_table(&self) -> ResultTable {
        ResultTable::zeros(self.alphas.clone(), self.lambdas.clone(), self.iterations(), self.time_len())
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Agent-based sweep output: one table per observable plus the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResults {
    pub manifest: SweepManifest,
    pub s: ResultTable,
    pub aa: ResultTable,
    pub ab: ResultTable,
    pub a: ResultTable,
    pub r: ResultTable,
    pub ra: ResultTable,
    pub rb: ResultTable,
}

impl SweepResults {
    fn empty(manifest: SweepManifest) -> Self {
        let table = manifest.empty_table();
        Self {
            s: table.clone(),
            aa: table.clone(),
            ab: table.clone(),
            a: table.clone(),
            r: table.clone(),
            ra: table.clone(),
            rb: table,
            manifest,
        }
    }

    /// Writes `<name>_results.csv` for every observable and
    /// [`MANIFEST_FILE`] into `dir`, creating it if needed.
    pub fn write_csv_dir(&self, dir: impl AsRef<Path>) -> Result<(), SimError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.manifest.write_to_file(dir.join(MANIFEST_FILE))?;
        for (name, table) in self.tables() {
            table.write_csv_file(dir.join(format!("{}_results.csv", name)))?;
        }
        info!("Wrote sweep results to {}", dir.display());
        Ok(())
    }

    /// Reads a directory written by [`write_csv_dir`](Self::write_csv_dir).
    ///
    /// The table shape comes from the manifest; a table whose size does not
    /// match it fails with `ShapeMismatch`.
    pub fn read_csv_dir(dir: impl AsRef<Path>) -> Result<Self, SimError> {
        let dir = dir.as_ref();
        let manifest = SweepManifest::read_from_file(dir.join(MANIFEST_FILE))?;
        let read = |name: &str| {
            ResultTable::read_csv_file(
                dir.join(format!("{}_results.csv", name)),
                manifest.alphas.clone(),
                manifest.lambdas.clone(),
                manifest.iterations(),
                manifest.time_len(),
            )
        };

        Ok(Self {
            s: read("s")?,
            aa: read("aa")?,
            ab: read("ab")?,
            a: read("a")?,
            r: read("r")?,
            ra: read("ra")?,
            rb: read("rb")?,
            manifest,
        })
    }

    /// `(name, table)` pairs in file order.
    pub fn tables(&self) -> [(&'static str, &ResultTable); 7] {
        [
            ("s", &self.s),
            ("aa", &self.aa),
            ("ab", &self.ab),
            ("a", &self.a),
            ("r", &self.r),
            ("ra", &self.ra),
            ("rb", &self.rb),
        ]
    }

    fn record(&mut self, alpha: usize, lambda: usize, iteration: usize, series: &SeriesSet) {
        copy_series(self.s.series_mut(alpha, lambda, iteration), &series.s);
        copy_series(self.aa.series_mut(alpha, lambda, iteration), &series.aa);
        copy_series(self.ab.series_mut(alpha, lambda, iteration), &series.ab);
        copy_series(self.a.series_mut(alpha, lambda, iteration), &series.a);
        copy_series(self.r.series_mut(alpha, lambda, iteration), &series.r);
        copy_series(self.ra.series_mut(alpha, lambda, iteration), &series.ra);
        copy_series(self.rb.series_mut(alpha, lambda, iteration), &series.rb);
    }
}

/// Agent-based sweep over an α × λ grid.
pub struct SweepRunner {
    config: SarConfig,
    alphas: Vec<f64>,
    lambdas: Vec<f64>,
    network_iterations: usize,
    simulation_iterations: usize,
    max_attempts: usize,
    halt_on_extinction: bool,
}

impl SweepRunner {
    /// Creates a sweep over the configuration's single (α, λ) point.
    pub fn new(config: SarConfig) -> Self {
        Self {
            alphas: vec![config.alpha],
            lambdas: vec![config.lambda],
            config,
            network_iterations: 1,
            simulation_iterations: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            halt_on_extinction: false,
        }
    }

    /// Sets the α grid.
    pub fn with_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    /// Sets the λ grid.
    pub fn with_lambdas(mut self, lambdas: Vec<f64>) -> Self {
        self.lambdas = lambdas;
        self
    }

    /// Sets networks per cell and simulations per network.
    pub fn with_iterations(mut self, networks: usize, simulations: usize) -> Self {
        self.network_iterations = networks;
        self.simulation_iterations = simulations;
        self
    }

    /// Sets the connected-graph attempt budget.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_halt_on_extinction(mut self, halt: bool) -> Self {
        self.halt_on_extinction = halt;
        self
    }

    /// Total iterations per cell.
    pub fn iterations(&self) -> usize {
        self.network_iterations * self.simulation_iterations
    }

    /// The manifest describing this sweep.
    pub fn manifest(&self) -> SweepManifest {
        SweepManifest {
            graph: "erdos-renyi".to_string(),
            node_count: self.config.node_count,
            mean_degree: self.config.mean_degree,
            alphas: self.alphas.clone(),
            lambdas: self.lambdas.clone(),
            network_iterations: self.network_iterations,
            simulation_iterations: self.simulation_iterations,
            steps: self.config.steps,
            thresholds: self.config.thresholds,
            population: self.config.population,
            rho0: self.config.rho0,
            gamma: self.config.gamma,
            seed: self.config.seed,
            halt_on_extinction: self.halt_on_extinction,
        }
    }

    /// Runs every cell in parallel and gathers one table per observable.
    pub fn run(&self) -> Result<SweepResults, SimError> {
        self.config.validate()?;
        if self.alphas.is_empty() || self.lambdas.is_empty() || self.iterations() == 0 {
            return Err(SimError::invalid("sweep grid is empty"));
        }

        let started = Instant::now();
        let n_lambda = self.lambdas.len();
        let master = RunContext::new(self.config.seed);

        info!(
            "Sweep: {} alphas x {} lambdas x {} iterations on {} nodes (seed={})",
            self.alphas.len(),
            n_lambda,
            self.iterations(),
            self.config.node_count,
            self.config.seed
        );

        let cells: Vec<Vec<SeriesSet>> = (0..self.alphas.len() * n_lambda)
            .into_par_iter()
            .map(|cell| {
                let (ai, li) = (cell / n_lambda, cell % n_lambda);
                if ai % PROGRESS_EVERY == 0 && li == 0 {
                    info!(
                        "Processing alpha: {} (elapsed {:.1}s)",
                        self.alphas[ai],
                        started.elapsed().as_secs_f64()
                    );
                }
                self.run_cell(master.child(cell as u64), self.alphas[ai], self.lambdas[li])
            })
            .collect::<Result<_, _>>()?;

        let mut results = SweepResults::empty(self.manifest());
        for (cell, runs) in cells.iter().enumerate() {
            let (ai, li) = (cell / n_lambda, cell % n_lambda);
            for (it, series) in runs.iter().enumerate() {
                results.record(ai, li, it, series);
            }
        }

        info!("Sweep finished in {:.1}s", started.elapsed().as_secs_f64());
        Ok(results)
    }

    fn run_cell(&self, ctx: RunContext, alpha: f64, lambda: f64) -> Result<Vec<SeriesSet>, SimError> {
        let mut runs = Vec::with_capacity(self.iterations());

        for net_iter in 0..self.network_iterations {
            let net_ctx = ctx.child(net_iter as u64);
            let network = ContactNetwork::connected_erdos_renyi(
                &mut net_ctx.network_rng(),
                self.config.node_count,
                self.config.mean_degree,
                self.max_attempts,
            )?;

            for sim_iter in 0..self.simulation_iterations {
                let mut rng = net_ctx.simulation_rng(sim_iter as u64);
                runs.push(simulate_on(
                    &network,
                    &self.config,
                    alpha,
                    lambda,
                    self.halt_on_extinction,
                    &mut rng,
                )?);
            }
        }

        debug!("Cell alpha={} lambda={} done ({} runs)", alpha, lambda, runs.len());
        Ok(runs)
    }
}

fn copy_series(dst: &mut [f64], src: &[usize]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f64;
    }
}

/// Mean-field sweep over an α × λ grid, producing a(t) per cell.
pub struct MeanFieldSweep {
    config: SarConfig,
    alphas: Vec<f64>,
    lambdas: Vec<f64>,
    degrees: Option<DegreeDistribution>,
}

impl MeanFieldSweep {
    pub fn new(config: SarConfig) -> Self {
        Self {
            alphas: vec![config.alpha],
            lambdas: vec![config.lambda],
            config,
            degrees: None,
        }
    }

    pub fn with_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    pub fn with_lambdas(mut self, lambdas: Vec<f64>) -> Self {
        self.lambdas = lambdas;
        self
    }

    /// Uses `pk` instead of Poisson(mean_degree), e.g. the empirical
    /// distribution of a generated network.
    pub fn with_degree_distribution(mut self, pk: DegreeDistribution) -> Self {
        self.degrees = Some(pk);
        self
    }

    /// Integrates every cell in parallel.
    ///
    /// The table has a single iteration and `grid_points` time entries.
    pub fn run(&self) -> Result<ResultTable, SimError> {
        self.config.validate()?;

        let pk = match &self.degrees {
            Some(pk) => pk.clone(),
            None => DegreeDistribution::poisson(self.config.mean_degree, self.config.k_max)?,
        };
        let support = DegreeSupport::full(&pk);
        let n_lambda = self.lambdas.len();

        let cells: Vec<Vec<f64>> = (0..self.alphas.len() * n_lambda)
            .into_par_iter()
            .map(|cell| -> Result<Vec<f64>, SimError> {
                let params = EbcmParams {
                    alpha: self.alphas[cell / n_lambda],
                    lambda: self.lambdas[cell % n_lambda],
                    ..EbcmParams::from_config(&self.config)
                };
                let model = MeanFieldModel::new(params, support.clone())?;
                let solution = model.solve_uniform(self.config.t_end, self.config.grid_points)?;
                Ok(solution.active_fraction())
            })
            .collect::<Result<_, _>>()?;

        ResultTable::from_values(
            self.alphas.clone(),
            self.lambdas.clone(),
            1,
            self.config.grid_points,
            cells.into_iter().flatten().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_config() -> SarConfig {
        SarConfig {
            node_count: 200,
            mean_degree: 8.0,
            rho0: 0.05,
            steps: 20,
            seed: 17,
            ..Default::default()
        }
    }

    #[test]
    fn test_arange_half_open() {
        assert_eq!(arange(0.0, 1.0, 0.25), vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(arange(0.0, 1.005, 0.01).len(), 101);
        assert!(arange(0.0, 1.0, 0.0).is_empty());
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }

    #[test]
    fn test_run_agent_conserves_population() {
        let run = run_agent(&small_config(), 50, false).unwrap();

        assert_eq!(run.node_count, 200);
        assert_eq!(run.edge_count, 800);
        assert_eq!(run.series.len(), 21);
        for t in 0..run.series.len() {
            assert_eq!(run.series.s[t] + run.series.a[t] + run.series.r[t], 200);
        }
        assert_eq!(run.series.a[0], 10);
    }

    #[test]
    fn test_run_agent_is_reproducible() {
        let a = run_agent(&small_config(), 50, false).unwrap();
        let b = run_agent(&small_config(), 50, false).unwrap();
        assert_eq!(a.series, b.series);
    }

    #[test]
    fn test_sweep_shape_and_determinism() {
        let runner = SweepRunner::new(small_config())
            .with_alphas(vec![0.0, 0.5])
            .with_lambdas(vec![0.2, 0.6, 1.0])
            .with_iterations(2, 2);

        let first = runner.run().unwrap();
        let second = runner.run().unwrap();

        assert_eq!(first.a.shape(), [2, 3, 4, 21]);
        assert_eq!(first, second);

        // Initial adopters are the same count in every cell
        for ai in 0..2 {
            for li in 0..3 {
                for it in 0..4 {
                    assert_eq!(first.a.get(ai, li, it, 0), 10.0);
                }
            }
        }
    }

    #[test]
    fn test_sweep_cell_matches_when_grid_grows() {
        // Cell (0, 0) is derived from its own stream, independent of grid size
        let small = SweepRunner::new(small_config())
            .with_alphas(vec![0.3])
            .with_lambdas(vec![0.4])
            .run()
            .unwrap();
        let large = SweepRunner::new(small_config())
            .with_alphas(vec![0.3, 0.9])
            .with_lambdas(vec![0.4, 0.8])
            .run()
            .unwrap();

        assert_eq!(small.aa.series(0, 0, 0), large.aa.series(0, 0, 0));
    }

    #[test]
    fn test_sweep_csv_dir_round_trip() {
        let dir = std::env::temp_dir().join(format!("sar_sweep_{}", std::process::id()));
        let results = SweepRunner::new(small_config())
            .with_alphas(vec![0.2, 0.4])
            .with_lambdas(vec![0.5])
            .with_iterations(1, 2)
            .run()
            .unwrap();

        results.write_csv_dir(&dir).unwrap();

        let mut files: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(
            files,
            vec![
                "a_results.csv",
                "aa_results.csv",
                "ab_results.csv",
                "parameters.json",
                "r_results.csv",
                "ra_results.csv",
                "rb_results.csv",
                "s_results.csv",
            ]
        );

        // Shape is rebuilt from the manifest alone
        let back = SweepResults::read_csv_dir(&dir).unwrap();
        assert_eq!(back, results);
        assert_eq!(back.manifest.alphas, vec![0.2, 0.4]);
        assert_eq!(back.manifest.iterations(), 2);
        assert_eq!(back.manifest.steps, 20);
        assert_eq!(back.manifest.seed, 17);

        // A manifest that disagrees with the tables is rejected
        let mut wrong = back.manifest.clone();
        wrong.alphas = vec![0.2];
        wrong.write_to_file(dir.join(MANIFEST_FILE)).unwrap();
        assert!(matches!(SweepResults::read_csv_dir(&dir), Err(SimError::ShapeMismatch { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sweep_keeps_every_observable() {
        let results = SweepRunner::new(small_config())
            .with_alphas(vec![0.5])
            .with_lambdas(vec![0.5])
            .run()
            .unwrap();

        for t in 0..21 {
            let s = results.s.get(0, 0, 0, t);
            let a = results.a.get(0, 0, 0, t);
            let r = results.r.get(0, 0, 0, t);
            assert_eq!(s + a + r, 200.0);
            assert_eq!(results.ra.get(0, 0, 0, t) + results.rb.get(0, 0, 0, t), r);
        }
        assert_eq!(results.s.get(0, 0, 0, 0), 190.0);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let runner = SweepRunner::new(small_config()).with_alphas(Vec::new());
        assert!(runner.run().is_err());
    }

    #[test]
    fn test_mean_field_sweep() {
        let config = SarConfig {
            mean_degree: 4.0,
            k_max: 20,
            rho0: 0.01,
            gamma: 0.5,
            t_end: 10.0,
            grid_points: 101,
            ..Default::default()
        };
        let table = MeanFieldSweep::new(config.clone())
            .with_alphas(vec![0.2, 0.8])
            .with_lambdas(vec![0.3])
            .run()
            .unwrap();

        assert_eq!(table.shape(), [2, 1, 1, 101]);
        assert_relative_eq!(table.get(0, 0, 0, 0), 0.01, epsilon = 1e-12);

        // Matches a direct solve of the same cell
        let direct = run_mean_field(&SarConfig { alpha: 0.8, lambda: 0.3, ..config }).unwrap();
        for (x, y) in table.series(1, 0, 0).iter().zip(direct.active_fraction()) {
            assert_relative_eq!(*x, y, epsilon = 1e-12);
        }
    }
}
