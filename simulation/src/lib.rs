#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed per-step schedule that wires the systems around the world.

use std::{collections::BTreeSet, time::Duration};

use blocks_core::{AgentId, CellId, Command, Event};
use blocks_system_lifecycle::Lifecycle;
use blocks_system_movement::Movement;
use blocks_system_overlap::Overlap;
use blocks_system_pathing::Pathing;
use blocks_system_switches::Switches;
use blocks_world::{self as world, query, World};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Agent driven by pointer input.
pub const PLAYER: AgentId = AgentId::new(0);

/// Tunable parameters for a simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent speed factor; progress per step is `velocity² / segment_length`.
    pub velocity: f32,
    /// Rate at which agents turn toward their heading, scaled by `dt`.
    pub rotation_smoothing: f32,
    /// Whether pointer requests only accept axis-aligned straight paths.
    pub straight_line_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            velocity: 0.2,
            rotation_smoothing: 10.0,
            straight_line_only: true,
        }
    }
}

/// External input consumed by a single step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInput {
    /// Simulated time covered by the step.
    pub dt: Duration,
    /// Cells currently overlapped by an agent body. `None` derives the set
    /// from each agent's position.
    pub overlapping: Option<BTreeSet<CellId>>,
    /// Pointer hits in arrival order; only the last surviving request is served.
    pub pointer: Vec<Vec3>,
}

impl StepInput {
    /// Creates an input that only advances time.
    #[must_use]
    pub fn idle(dt: Duration) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }
}

/// Owns the world and every system, and advances them in a fixed order.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    overlap: Overlap,
    lifecycle: Lifecycle,
    switches: Switches,
    pathing: Pathing,
    movement: Movement,
}

impl Simulation {
    /// Creates a simulation over `world` configured by `config`.
    #[must_use]
    pub fn new(world: World, config: Config) -> Self {
        Self {
            world,
            overlap: Overlap,
            lifecycle: Lifecycle,
            switches: Switches,
            pathing: Pathing::new(config.straight_line_only),
            movement: Movement::new(config.velocity, config.rotation_smoothing),
        }
    }

    /// Read-only access to the simulated world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Advances the simulation by one step and returns every event it produced.
    ///
    /// Steps run in order: time, pointer requests, trigger and lifecycle
    /// bookkeeping, the structural barrier, path servicing, then movement.
    /// Grid and hierarchy changes queued during bookkeeping only become
    /// visible at the barrier, so the path search always sees the post-barrier
    /// grid.
    pub fn step(&mut self, input: &StepInput) -> Vec<Event> {
        let mut log = Vec::new();
        self.apply_all(vec![Command::Tick { dt: input.dt }], &mut log);

        let mut requests = Vec::new();
        for hit in &input.pointer {
            self.pathing.handle_pointer(
                *hit,
                PLAYER,
                query::grid(&self.world),
                &query::agent_view(&self.world),
                &mut requests,
            );
        }
        self.apply_all(requests, &mut log);

        let overlapping = match &input.overlapping {
            Some(cells) => cells.clone(),
            None => agent_footprint(&self.world),
        };
        let mut commands = Vec::new();
        self.overlap.handle(
            &query::cell_view(&self.world),
            &overlapping,
            &mut commands,
        );
        self.pump(commands, &mut log);

        let mut dissolves = Vec::new();
        self.lifecycle
            .sweep(&query::cell_view(&self.world), &mut dissolves);
        self.apply_all(dissolves, &mut log);
        self.apply_all(vec![Command::FlushMutations], &mut log);

        let mut completions = Vec::new();
        self.pathing.service(
            query::grid(&self.world),
            query::pending_request(&self.world),
            &mut completions,
        );
        self.apply_all(completions, &mut log);

        let mut poses = Vec::new();
        self.movement
            .handle(&log, &query::agent_view(&self.world), &mut poses);
        self.apply_all(poses, &mut log);

        trace!(
            step = query::step_index(&self.world),
            events = log.len(),
            "step complete"
        );
        log
    }

    /// Feeds bookkeeping events back through lifecycle and switches until quiet.
    fn pump(&mut self, commands: Vec<Command>, log: &mut Vec<Event>) {
        let mut pending = commands;
        while !pending.is_empty() {
            let mut events = Vec::new();
            for command in pending {
                world::apply(&mut self.world, command, &mut events);
            }

            let mut next = Vec::new();
            self.lifecycle.handle(&events, &mut next);
            let world = &self.world;
            self.switches.handle(
                &events,
                &query::cell_view(world),
                |cell| query::switch_group(world, cell),
                &mut next,
            );
            log.extend(events);
            pending = next;
        }
    }

    fn apply_all(&mut self, commands: Vec<Command>, log: &mut Vec<Event>) {
        for command in commands {
            world::apply(&mut self.world, command, log);
        }
    }
}

/// Cells whose node lies under an agent's current position.
#[must_use]
pub fn agent_footprint(world: &World) -> BTreeSet<CellId> {
    let grid = query::grid(world);
    let nodes: BTreeSet<_> = query::agent_view(world)
        .iter()
        .filter_map(|agent| grid.node_at(agent.pose.position))
        .map(|node| node.id())
        .collect();

    let cells: BTreeSet<_> = query::cell_view(world)
        .iter()
        .filter(|cell| nodes.contains(&cell.node))
        .map(|cell| cell.id)
        .collect();
    if cells.is_empty() && !nodes.is_empty() {
        debug!("agents stand outside every cell");
    }
    cells
}
