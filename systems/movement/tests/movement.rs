use std::time::Duration;

use blocks_core::{AgentId, BlockType, Command, Event, GridCoord, SolvedPath};
use blocks_system_movement::Movement;
use blocks_world::{self as world, query, BlockLayout, LevelLayout, World};
use glam::Vec3;

const AGENT: AgentId = AgentId::new(0);
const STEP: Duration = Duration::from_millis(100);

fn corridor(length: u32) -> World {
    let blocks = (0..length)
        .map(|x| {
            let block = BlockLayout::new(Vec3::new(x as f32, 0.0, 0.0));
            if x == 0 {
                block.with_type(BlockType::Start)
            } else {
                block
            }
        })
        .collect();
    World::from_level(&LevelLayout {
        blocks,
        ..LevelLayout::default()
    })
    .expect("level")
}

fn path_along(world: &World, coords: &[(u32, u32)]) -> SolvedPath {
    let grid = query::grid(world);
    SolvedPath::new(
        coords
            .iter()
            .map(|&(x, y)| grid.waypoint(grid.get(GridCoord::new(x, y)).expect("node")))
            .collect(),
    )
}

/// Feeds `events` plus a tick through the movement system and applies its output.
fn step(world: &mut World, movement: &mut Movement, mut events: Vec<Event>) -> Vec<Event> {
    world::apply(world, Command::Tick { dt: STEP }, &mut events);
    let mut commands = Vec::new();
    movement.handle(&events, &query::agent_view(world), &mut commands);

    let mut produced = Vec::new();
    for command in commands {
        world::apply(world, command, &mut produced);
    }
    produced
}

fn agent_position(world: &World) -> Vec3 {
    query::agent_view(world)
        .get(AGENT)
        .expect("agent")
        .pose
        .position
}

#[test]
fn agent_walks_path_and_arrives() {
    let mut world = corridor(3);
    let mut movement = Movement::new(0.5, 10.0);
    let path = path_along(&world, &[(0, 0), (1, 0), (2, 0)]);

    let mut log = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved { agent: AGENT, path }],
    );
    for _ in 0..16 {
        log.extend(step(&mut world, &mut movement, Vec::new()));
    }

    let arrivals: Vec<_> = log
        .iter()
        .filter(|event| matches!(event, Event::AgentArrived { .. }))
        .collect();
    assert_eq!(arrivals.len(), 1);
    let snapshot = query::agent_view(&world).get(AGENT).copied().expect("agent");
    assert!(!snapshot.moving);
    assert_eq!(snapshot.pose.position, Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(movement.active_followers(), 0);
}

#[test]
fn progress_ignores_frame_duration() {
    let mut world = corridor(2);
    let mut movement = Movement::new(0.5, 10.0);
    let path = path_along(&world, &[(0, 0), (1, 0)]);

    let _ = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved { agent: AGENT, path }],
    );

    assert!((agent_position(&world).x - 0.25).abs() < 1e-6);
}

#[test]
fn idle_agents_receive_no_commands() {
    let mut world = corridor(2);
    let mut movement = Movement::new(0.5, 10.0);

    assert!(step(&mut world, &mut movement, Vec::new()).is_empty());

    let path = path_along(&world, &[(0, 0), (1, 0)]);
    let mut log = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved { agent: AGENT, path }],
    );
    for _ in 0..3 {
        log.extend(step(&mut world, &mut movement, Vec::new()));
    }
    assert!(matches!(log.last(), Some(Event::AgentArrived { .. })));
    assert!(step(&mut world, &mut movement, Vec::new()).is_empty());
}

#[test]
fn new_path_replaces_current_follower() {
    let mut world = corridor(4);
    let mut movement = Movement::new(0.5, 10.0);
    let forward = path_along(&world, &[(0, 0), (1, 0), (2, 0), (3, 0)]);

    let _ = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved {
            agent: AGENT,
            path: forward,
        }],
    );
    let _ = step(&mut world, &mut movement, Vec::new());
    let back = path_along(&world, &[(1, 0), (0, 0)]);
    let _ = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved {
            agent: AGENT,
            path: back,
        }],
    );
    assert!((agent_position(&world).x - 0.75).abs() < 1e-6);

    for _ in 0..3 {
        let _ = step(&mut world, &mut movement, Vec::new());
    }
    assert_eq!(agent_position(&world), Vec3::ZERO);
    assert_eq!(movement.active_followers(), 0);
}

#[test]
fn single_waypoint_path_cancels_follower() {
    let mut world = corridor(3);
    let mut movement = Movement::new(0.1, 10.0);
    let path = path_along(&world, &[(0, 0), (1, 0), (2, 0)]);

    let _ = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved { agent: AGENT, path }],
    );
    let single = path_along(&world, &[(1, 0)]);
    let events = step(
        &mut world,
        &mut movement,
        vec![Event::PathSolved {
            agent: AGENT,
            path: single,
        }],
    );

    assert!(events.is_empty());
    assert_eq!(movement.active_followers(), 0);
}
