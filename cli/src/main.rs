use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use repair_planner_core_rs::{
    BasePolicyKind, EpochRecord, NetworkSpec, Orchestrator, OrchestratorConfig, PlannerConfig,
    RolloutConfig, RunReport,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod testbed;

#[derive(Parser)]
#[command(
    name = "repair-planner",
    version,
    about = "Rollout-based repair scheduling for damaged power networks"
)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file ({"config": {...}, "network": {...}})
    Run {
        /// Scenario JSON
        scenario: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run the built-in 12-node study network
    Testbed {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Resume a scenario from a saved snapshot
    Resume {
        /// Scenario JSON the snapshot was taken from
        scenario: PathBuf,

        /// Snapshot JSON written by --checkpoint
        snapshot: PathBuf,

        /// Write the run report and trajectory here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Overrides {
    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Crews available
    #[arg(long)]
    crews: Option<u32>,

    /// Epoch budget
    #[arg(long)]
    epochs: Option<usize>,

    /// Planner to use
    #[arg(long, value_enum)]
    planner: Option<PlannerChoice>,

    /// Evaluate rollout replicates on one thread
    #[arg(long)]
    sequential: bool,

    /// Write the run report and trajectory here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stop after this many epochs and write a snapshot to --checkpoint
    #[arg(long, requires = "checkpoint")]
    stop_after: Option<usize>,

    /// Snapshot path used with --stop-after
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlannerChoice {
    Rollout,
    Greedy,
    Importance,
}

#[derive(Serialize, Deserialize)]
struct Scenario {
    #[serde(default)]
    config: OrchestratorConfig,
    network: NetworkSpec,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a RunReport,
    trajectory: &'a [EpochRecord],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            overrides,
        } => {
            let Scenario { config, network } = load_scenario(&scenario)?;
            execute(apply_overrides(config, &overrides), network, &overrides)
        }
        Commands::Testbed { overrides } => {
            info!("running built-in 12-node study network");
            let config = apply_overrides(OrchestratorConfig::default(), &overrides);
            execute(config, testbed::network_spec(), &overrides)
        }
        Commands::Resume {
            scenario,
            snapshot,
            output,
        } => {
            let Scenario { config, network } = load_scenario(&scenario)?;
            let json = fs::read_to_string(&snapshot)
                .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
            let mut orchestrator = Orchestrator::load_state(config, network, &json)?;
            let report = orchestrator.run()?;
            finish(&orchestrator, &report, output.as_deref())
        }
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading scenario {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
}

fn apply_overrides(mut config: OrchestratorConfig, overrides: &Overrides) -> OrchestratorConfig {
    if let Some(seed) = overrides.seed {
        config.rng_seed = seed;
    }
    if let Some(crews) = overrides.crews {
        config.total_crews = crews;
    }
    if let Some(epochs) = overrides.epochs {
        config.max_epochs = epochs;
    }
    match overrides.planner {
        Some(PlannerChoice::Rollout) => {
            if !matches!(config.planner, PlannerConfig::Rollout(_)) {
                config.planner = PlannerConfig::Rollout(RolloutConfig::default());
            }
        }
        Some(PlannerChoice::Greedy) => {
            config.planner = PlannerConfig::Greedy {
                base_policy: BasePolicyKind::PriorityScore,
            }
        }
        Some(PlannerChoice::Importance) => {
            config.planner = PlannerConfig::Greedy {
                base_policy: BasePolicyKind::Importance,
            }
        }
        None => {}
    }
    if overrides.sequential {
        if let PlannerConfig::Rollout(rollout) = &mut config.planner {
            rollout.parallel = false;
        }
    }
    config
}

fn execute(config: OrchestratorConfig, network: NetworkSpec, overrides: &Overrides) -> Result<()> {
    let mut orchestrator = Orchestrator::new(config, network)?;

    if let Some(limit) = overrides.stop_after {
        let Some(path) = overrides.checkpoint.as_ref() else {
            bail!("--stop-after requires --checkpoint");
        };
        while orchestrator.current_epoch() < limit && !orchestrator.is_finished() {
            orchestrator.tick()?;
        }
        fs::write(path, orchestrator.save_state()?)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(epoch = orchestrator.current_epoch(), path = %path.display(), "snapshot written");
        return Ok(());
    }

    let report = orchestrator.run()?;
    finish(&orchestrator, &report, overrides.output.as_deref())
}

fn finish(orchestrator: &Orchestrator, report: &RunReport, output: Option<&Path>) -> Result<()> {
    println!("epoch  metric  dispatched");
    for record in orchestrator.trajectory() {
        println!(
            "{:>5}  {:>6.3}  {}",
            record.epoch,
            record.service_metric,
            record.dispatched.join(",")
        );
    }
    println!(
        "status={:?} epochs={} final_metric={:.3} unserved_population_epochs={}",
        report.status,
        report.epochs_run,
        report.final_service_metric,
        report.unserved_population_epochs
    );
    println!("repair order: {}", report.repair_order.join(" -> "));

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&RunOutput {
            report,
            trajectory: orchestrator.trajectory(),
        })?;
        fs::write(path, json).with_context(|| format!("writing output {}", path.display()))?;
        info!(path = %path.display(), "results written");
    }
    Ok(())
}
