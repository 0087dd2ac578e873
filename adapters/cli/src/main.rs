#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Blocks levels headlessly.

mod generator;
mod scenario;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use blocks_core::Event;
use blocks_simulation::{Simulation, PLAYER};
use blocks_world::{query, World};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{generator::RandomLevel, scenario::Scenario};

/// Runs a level for a fixed number of steps and reports what happened.
#[derive(Debug, Parser)]
#[command(name = "blocks", version, about = "Headless runner for Blocks levels")]
struct CliArgs {
    /// Scenario TOML with `[simulation]`, `[level]` and `[[script]]` tables.
    #[arg(long, value_name = "PATH")]
    scenario: Option<PathBuf>,
    /// Generates a random level instead of reading `[level]`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    random: Option<(u32, u32)>,
    /// Seed for random level generation.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Upper bound of each wall draw; larger values produce fewer walls.
    #[arg(long, default_value_t = 5)]
    empty_factor: u32,
    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 600)]
    steps: u64,
    /// Simulated milliseconds per step.
    #[arg(long, default_value_t = 16)]
    dt_ms: u64,
}

fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{raw}`"))?;
    let parse = |side: &str| {
        side.trim()
            .parse::<u32>()
            .map_err(|error| format!("invalid side `{side}`: {error}"))
    };
    Ok((parse(width)?, parse(height)?))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Entry point for the Blocks command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    let layout = match (args.random, &scenario.level) {
        (Some((width, height)), _) => {
            let generator = RandomLevel {
                width,
                height,
                empty_factor: args.empty_factor,
            };
            generator
                .generate(&mut ChaCha8Rng::seed_from_u64(args.seed))
                .context("failed to generate random level")?
        }
        (None, Some(level)) => level.clone(),
        (None, None) => bail!("pass --scenario with a [level] table or --random WIDTHxHEIGHT"),
    };

    let world = World::from_level(&layout).context("failed to build level")?;
    let mut simulation = Simulation::new(world, scenario.simulation);
    let inputs = scenario.inputs(args.steps, Duration::from_millis(args.dt_ms));

    let mut dissolved = 0;
    for (step, input) in inputs.iter().enumerate() {
        for event in simulation.step(input) {
            if matches!(event, Event::CellDissolved { .. }) {
                dissolved += 1;
            }
            report(step, &event);
        }
    }

    let world = simulation.world();
    let grid = query::grid(world);
    println!(
        "ran {} steps on a {}x{} grid: {} of {} cells dissolved",
        inputs.len(),
        grid.length_x(),
        grid.length_y(),
        dissolved,
        query::cell_view(world).iter().count(),
    );
    if let Some(agent) = query::agent_view(world).get(PLAYER) {
        println!(
            "agent at node {} ({:.2}, {:.2}), {}",
            agent.node,
            agent.pose.position.x,
            agent.pose.position.z,
            if agent.moving { "moving" } else { "idle" },
        );
    }
    Ok(())
}

fn report(step: usize, event: &Event) {
    match event {
        Event::TimeAdvanced { .. } | Event::AgentMoved { .. } | Event::TriggerChanged { .. } => {
            debug!(step, ?event);
        }
        _ => info!(step, ?event),
    }
}
