use std::{collections::BTreeSet, time::Duration};

use blocks_core::{BlockType, CellId, Event, GridCoord, NodeId};
use blocks_simulation::{Config, Simulation, StepInput, PLAYER};
use blocks_world::{query, BlockLayout, LevelLayout, World};
use glam::Vec3;

const DT: Duration = Duration::from_millis(50);

fn corridor() -> World {
    World::from_level(&LevelLayout {
        blocks: vec![
            BlockLayout::new(Vec3::ZERO).with_type(BlockType::Start),
            BlockLayout::new(Vec3::X),
            BlockLayout::new(Vec3::new(2.0, 0.0, 0.0)),
            BlockLayout::new(Vec3::new(3.0, 0.0, 0.0)).with_type(BlockType::Goal),
        ],
        ..LevelLayout::default()
    })
    .expect("level")
}

fn config() -> Config {
    Config {
        velocity: 0.5,
        ..Config::default()
    }
}

/// Walk to the far end, wait, then try to walk back over dissolved cells.
fn script() -> Vec<StepInput> {
    let mut inputs = vec![StepInput {
        pointer: vec![Vec3::new(3.0, 0.0, 0.0)],
        ..StepInput::idle(DT)
    }];
    inputs.extend((0..20).map(|_| StepInput::idle(DT)));
    inputs.push(StepInput {
        pointer: vec![Vec3::ZERO],
        ..StepInput::idle(DT)
    });
    inputs
}

fn replay(inputs: &[StepInput]) -> (Vec<Event>, Simulation) {
    let mut simulation = Simulation::new(corridor(), config());
    let log = inputs
        .iter()
        .flat_map(|input| simulation.step(input))
        .collect();
    (log, simulation)
}

fn node(x: u32) -> NodeId {
    NodeId::from_coord(GridCoord::new(x, 0), 4)
}

#[test]
fn replay_is_deterministic() {
    let (first, _) = replay(&script());
    let (second, _) = replay(&script());

    assert_eq!(first, second, "replay diverged between runs");
}

#[test]
fn walking_dissolves_cells_behind_the_agent() {
    let (log, simulation) = replay(&script());

    let dissolved: Vec<_> = log
        .iter()
        .filter_map(|event| match event {
            Event::CellDissolved { cell, .. } => Some(*cell),
            _ => None,
        })
        .collect();
    assert_eq!(
        dissolved,
        vec![CellId::new(0), CellId::new(1), CellId::new(2)]
    );

    let arrivals: Vec<_> = log
        .iter()
        .filter(|event| matches!(event, Event::AgentArrived { .. }))
        .collect();
    assert_eq!(
        arrivals,
        vec![&Event::AgentArrived {
            agent: PLAYER,
            node: node(3),
        }]
    );
    assert_eq!(log.last(), Some(&Event::PathNotFound { agent: PLAYER }));

    let agent = query::agent_view(simulation.world())
        .get(PLAYER)
        .copied()
        .expect("agent");
    assert_eq!(agent.pose.position, Vec3::new(3.0, 0.0, 0.0));
    assert!(!agent.moving);
}

#[test]
fn last_pointer_hit_in_a_step_is_served() {
    let mut simulation = Simulation::new(corridor(), config());

    let events = simulation.step(&StepInput {
        pointer: vec![Vec3::new(3.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
        ..StepInput::idle(DT)
    });

    assert!(events
        .iter()
        .any(|event| matches!(event, Event::PathRequestSuperseded { .. })));
    let solved: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::PathSolved { path, .. } => path.waypoints().last().map(|last| last.node),
            _ => None,
        })
        .collect();
    assert_eq!(solved, vec![node(2)]);
}

#[test]
fn dissolve_lands_before_same_step_search() {
    let mut simulation = Simulation::new(corridor(), config());
    let middle = BTreeSet::from([CellId::new(1)]);

    let _ = simulation.step(&StepInput {
        overlapping: Some(middle),
        ..StepInput::idle(DT)
    });
    let events = simulation.step(&StepInput {
        overlapping: Some(BTreeSet::new()),
        pointer: vec![Vec3::new(2.0, 0.0, 0.0)],
        ..StepInput::idle(DT)
    });

    let dissolved = events
        .iter()
        .position(|event| matches!(event, Event::CellDissolved { .. }))
        .expect("dissolve");
    let not_found = events
        .iter()
        .position(|event| *event == Event::PathNotFound { agent: PLAYER })
        .expect("search result");
    assert!(dissolved < not_found);
}
