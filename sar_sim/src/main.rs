//! SAR Simulator CLI
//!
//! Run the agent-based model, the mean-field model, or sweeps over (α, λ).

use clap::Parser;
use sar_core::SarConfig;
use sar_sim::modes::RunMode;
use sar_sim::{arange, run_agent, run_mean_field, MeanFieldSweep, RunExport, SimError, SweepRunner};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Two-variant SAR adoption simulator
#[derive(Parser, Debug)]
#[command(name = "sar-sim")]
#[command(about = "Agent-based and mean-field simulation of two-variant SAR adoption", long_about = None)]
struct Args {
    /// Mode (agent, mean-field, compare, sweep, mean-field-sweep)
    #[arg(short, long, default_value = "agent")]
    mode: String,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON configuration file; command-line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spontaneous adoption rate α
    #[arg(long)]
    alpha: Option<f64>,

    /// Transmission probability λ
    #[arg(long)]
    lambda: Option<f64>,

    /// Recovery probability γ
    #[arg(long)]
    gamma: Option<f64>,

    /// Initial adopter fraction ρ0 (without a config file, defaults to one
    /// adopter among --nodes)
    #[arg(long)]
    rho0: Option<f64>,

    /// Number of nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Number of discrete steps
    #[arg(long)]
    steps: Option<usize>,

    /// Step of the α and λ sweep grids
    #[arg(long, default_value = "0.1")]
    grid_step: f64,

    /// Upper bound (exclusive) of the α sweep grid
    #[arg(long, default_value = "1.1")]
    alpha_max: f64,

    /// Upper bound (exclusive) of the λ sweep grid
    #[arg(long, default_value = "1.05")]
    lambda_max: f64,

    /// Networks generated per sweep cell
    #[arg(long, default_value = "1")]
    networks: usize,

    /// Simulations per network
    #[arg(long, default_value = "20")]
    iterations: usize,

    /// Stop a run once no node is active
    #[arg(long)]
    halt_on_extinction: bool,

    /// Directory for sweep CSV files
    #[arg(long, default_value = "simulation_results")]
    out_dir: PathBuf,

    /// Export the run to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<SarConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => SarConfig::from_json_file(path)?,
        None => SarConfig::default(),
    };
    let rho0_from_file = args.config.is_some();

    if let Some(seed) = args.seed {
        config.seed = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        } else {
            seed
        };
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(lambda) = args.lambda {
        config.lambda = lambda;
    }
    if let Some(gamma) = args.gamma {
        config.gamma = gamma;
    }
    if let Some(nodes) = args.nodes {
        config.node_count = nodes;
        if !rho0_from_file {
            config.rho0 = 1.0 / nodes.max(1) as f64;
        }
    }
    if let Some(rho0) = args.rho0 {
        config.rho0 = rho0;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args, mode: RunMode, config: &SarConfig) -> Result<serde_json::Value, SimError> {
    let alphas = arange(0.0, args.alpha_max, args.grid_step);
    let lambdas = arange(0.0, args.lambda_max, args.grid_step);

    match mode {
        RunMode::Agent | RunMode::Compare => {
            let agent = run_agent(config, sar_sim::DEFAULT_MAX_ATTEMPTS, args.halt_on_extinction)?;
            let (peak_t, peak_a) = agent.series.peak_active().unwrap_or((0, 0));
            info!(
                "Agent run: {} nodes, {} edges, peak active {} at t={}, final recovered {}",
                agent.node_count,
                agent.edge_count,
                peak_a,
                peak_t,
                agent.series.r.last().copied().unwrap_or(0)
            );

            let mut export = RunExport::new(mode.name(), config).with_agent(agent.series.clone());
            let mut summary = serde_json::json!({
                "mode": mode.name(),
                "seed": config.seed,
                "nodes": agent.node_count,
                "edges": agent.edge_count,
                "peak_active": peak_a,
                "peak_step": peak_t,
                "final_recovered": agent.series.r.last(),
            });

            if mode == RunMode::Compare {
                let solution = run_mean_field(config)?;
                let final_r = solution.recovered_fraction().last().copied().unwrap_or(0.0);
                info!(
                    "Mean field: final recovered fraction {:.4} vs agent {:.4}",
                    final_r,
                    agent.series.r.last().copied().unwrap_or(0) as f64 / agent.node_count as f64
                );
                summary["mean_field_final_recovered"] = serde_json::json!(final_r);
                export = export.with_mean_field(&solution);
            }

            if let Some(path) = &args.export {
                export.write_to_file(path)?;
                info!("Exported run to {}", path.display());
            }
            Ok(summary)
        }
        RunMode::MeanField => {
            let solution = run_mean_field(config)?;
            let active = solution.active_fraction();
            let peak = active.iter().copied().fold(0.0, f64::max);
            info!(
                "Mean field: {} grid points, peak active fraction {:.4}, {} domain warnings",
                solution.times.len(),
                peak,
                solution.domain_violations.len()
            );

            if let Some(path) = &args.export {
                RunExport::new(mode.name(), config)
                    .with_mean_field(&solution)
                    .write_to_file(path)?;
                info!("Exported run to {}", path.display());
            }
            Ok(serde_json::json!({
                "mode": mode.name(),
                "grid_points": solution.times.len(),
                "peak_active_fraction": peak,
                "domain_violations": solution.domain_violations.len(),
            }))
        }
        RunMode::Sweep => {
            let results = SweepRunner::new(config.clone())
                .with_alphas(alphas.clone())
                .with_lambdas(lambdas.clone())
                .with_iterations(args.networks, args.iterations)
                .with_halt_on_extinction(args.halt_on_extinction)
                .run()?;
            results.write_csv_dir(&args.out_dir)?;

            Ok(serde_json::json!({
                "mode": mode.name(),
                "seed": config.seed,
                "alphas": alphas.len(),
                "lambdas": lambdas.len(),
                "iterations": args.networks * args.iterations,
                "out_dir": args.out_dir.display().to_string(),
            }))
        }
        RunMode::MeanFieldSweep => {
            let table = MeanFieldSweep::new(config.clone())
                .with_alphas(alphas.clone())
                .with_lambdas(lambdas.clone())
                .run()?;
            std::fs::create_dir_all(&args.out_dir)?;
            let path = args.out_dir.join("a_mean_field.csv");
            table.write_csv_file(&path)?;
            info!("Wrote mean-field sweep to {}", path.display());

            Ok(serde_json::json!({
                "mode": mode.name(),
                "alphas": alphas.len(),
                "lambdas": lambdas.len(),
                "path": path.display().to_string(),
            }))
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let mode: RunMode = args.mode.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available modes:");
        for m in RunMode::all() {
            eprintln!("  {:<18} {}", m.name(), m.description());
        }
        std::process::exit(1);
    });

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if !args.json {
        info!("SAR Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "mode={} seed={} alpha={} lambda={} gamma={} nodes={} steps={}",
            mode, config.seed, config.alpha, config.lambda, config.gamma, config.node_count, config.steps
        );
        if mode.is_sweep() {
            info!("CSV tables go to {}", args.out_dir.display());
        }
    }

    match run(&args, mode, &config) {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        error!("Failed to encode summary: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                info!("✓ {} finished", mode);
            }
        }
        Err(e) => {
            error!("✗ {} failed: {}", mode, e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nodes_sets_single_adopter_without_config() {
        let args = Args::try_parse_from(["sar-sim", "--nodes", "500"]).unwrap();
        let config = load_config(&args).unwrap();

        assert_eq!(config.node_count, 500);
        assert_relative_eq!(config.rho0, 1.0 / 500.0);
    }

    #[test]
    fn test_nodes_keeps_rho0_from_config_file() {
        let path = std::env::temp_dir().join(format!("sar_cli_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "rho0": 0.1, "node_count": 1000 }"#).unwrap();

        let args = Args::try_parse_from(["sar-sim", "--config", path.to_str().unwrap(), "--nodes", "500"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.node_count, 500);
        assert_relative_eq!(config.rho0, 0.1);

        // An explicit --rho0 still wins
        let args = Args::try_parse_from(["sar-sim", "--config", path.to_str().unwrap(), "--rho0", "0.02"]).unwrap();
        assert_relative_eq!(load_config(&args).unwrap().rho0, 0.02);

        std::fs::remove_file(&path).ok();
    }
}
