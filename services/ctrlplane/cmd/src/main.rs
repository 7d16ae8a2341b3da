//! Control-plane simulator binary.
//!
//! Loads a scenario, builds the simulated network with its protocol engines
//! and ticks it for the configured number of steps, then logs the resulting
//! routing tables, discovered neighbors and management sessions.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;
mod scenario;

use config::ScenarioConfig;
use logging::CtrlplaneLogFormatter;
use scenario::Simulation;

const LOG_TARGETS: &[&str] = &[
    "ctrlplane",
    "redb_ctrlplane",
    "ctrlplane_engine",
    "ctrlplane_routing",
    "ctrlplane_discovery",
    "ctrlplane_management",
    "ctrlplane_topology",
];

/// Network device control-plane simulator
#[derive(Parser, Debug)]
#[command(name = "ctrlplane", version, about = "Tick protocol engines over a simulated network")]
struct Args {
    /// Scenario file (YAML); the built-in demo is used when it does not exist
    #[arg(long, default_value = "scenario.yaml")]
    scenario: PathBuf,

    /// Number of ticks, overriding the scenario
    #[arg(long)]
    ticks: Option<u64>,

    /// Simulated time per tick, e.g. 1s
    #[arg(long)]
    tick: Option<humantime::Duration>,

    /// Real time to wait between ticks, e.g. 100ms
    #[arg(long, default_value = "0s")]
    pace: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = config::resolve_log_level(args.log_level.as_deref());
    let mut env_filter = EnvFilter::new("info");
    for target in LOG_TARGETS {
        env_filter = env_filter.add_directive(format!("{}={}", target, log_level).parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .event_format(CtrlplaneLogFormatter::new("ctrlplane"))
        .init();

    info!("Starting control-plane simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut scenario = ScenarioConfig::load_from_file(&args.scenario)?;
    if let Some(ticks) = args.ticks {
        scenario.ticks = ticks;
    }
    let step: Duration = match args.tick {
        Some(tick) => tick.into(),
        None => Duration::from_secs(scenario.tick_secs),
    };
    if step.is_zero() {
        anyhow::bail!("tick length must be greater than zero");
    }
    let pace: Duration = args.pace.into();

    let mut simulation = Simulation::build(&scenario)?;
    info!(
        "Running '{}' for {} ticks of {:?}",
        scenario.name, scenario.ticks, step
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut pacer = (!pace.is_zero()).then(|| tokio::time::interval(pace));

    let mut completed = 0;
    while completed < scenario.ticks {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, stopping after {} ticks", completed);
                break;
            }
            _ = next_tick(pacer.as_mut()) => {}
        }

        simulation.step(step);
        completed += 1;
    }

    info!("Simulation reached {}", simulation.now());
    simulation.log_state();
    simulation.stop();

    info!("Control-plane simulator shutdown complete");
    Ok(())
}

async fn next_tick(pacer: Option<&mut tokio::time::Interval>) {
    match pacer {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
