use blocks_core::{AgentId, BlockType, Command, Event, GridCoord, NodeId, PathRequest};
use blocks_system_pathing::Pathing;
use blocks_world::{self as world, query, BlockLayout, LevelLayout, World};
use glam::Vec3;

const AGENT: AgentId = AgentId::new(0);

/// Builds an L-shaped level: a row of three cells plus one cell above the end.
fn level() -> World {
    World::from_level(&LevelLayout {
        blocks: vec![
            BlockLayout::new(Vec3::ZERO).with_type(BlockType::Start),
            BlockLayout::new(Vec3::X),
            BlockLayout::new(Vec3::new(2.0, 0.0, 0.0)),
            BlockLayout::new(Vec3::new(2.0, 0.0, 1.0)).with_type(BlockType::Goal),
        ],
        ..LevelLayout::default()
    })
    .expect("level")
}

fn apply_all(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn click(world: &mut World, pathing: &Pathing, hit: Vec3) -> Vec<Event> {
    let mut commands = Vec::new();
    pathing.handle_pointer(
        hit,
        AGENT,
        query::grid(world),
        &query::agent_view(world),
        &mut commands,
    );
    apply_all(world, commands)
}

fn service(world: &mut World, pathing: &mut Pathing) -> Vec<Event> {
    let mut commands = Vec::new();
    pathing.service(
        query::grid(world),
        query::pending_request(world),
        &mut commands,
    );
    apply_all(world, commands)
}

fn node(world: &World, x: u32, y: u32) -> NodeId {
    NodeId::from_coord(GridCoord::new(x, y), query::grid(world).length_x())
}

#[test]
fn pointer_hit_requests_path_from_agent_node() {
    let mut world = level();
    let pathing = Pathing::new(true);

    let events = click(&mut world, &pathing, Vec3::new(1.8, 0.4, 0.2));

    assert_eq!(
        events,
        vec![Event::PathRequested {
            agent: AGENT,
            request: PathRequest::new(node(&world, 0, 0), node(&world, 2, 0), true),
        }]
    );
}

#[test]
fn pointer_misses_and_self_clicks_are_ignored() {
    let mut world = level();
    let pathing = Pathing::new(true);

    assert!(click(&mut world, &pathing, Vec3::new(0.0, 0.0, 1.0)).is_empty());
    assert!(click(&mut world, &pathing, Vec3::new(-3.0, 0.0, 0.0)).is_empty());
    assert!(click(&mut world, &pathing, Vec3::new(0.1, 0.0, -0.1)).is_empty());
    assert_eq!(query::pending_request(&world), None);
}

#[test]
fn last_click_in_a_step_wins() {
    let mut world = level();
    let mut pathing = Pathing::new(false);

    let _ = click(&mut world, &pathing, Vec3::X);
    let events = click(&mut world, &pathing, Vec3::new(2.0, 0.0, 1.0));
    assert!(matches!(events[0], Event::PathRequestSuperseded { .. }));

    let events = service(&mut world, &mut pathing);
    let [Event::PathSolved { agent, path }] = events.as_slice() else {
        panic!("expected a solved path, got {events:?}");
    };
    assert_eq!(*agent, AGENT);
    assert_eq!(
        path.waypoints().last().map(|waypoint| waypoint.coord),
        Some(GridCoord::new(2, 1))
    );
    assert!(service(&mut world, &mut pathing).is_empty(), "slot is cleared");
}

#[test]
fn straight_line_requests_reject_turning_paths() {
    let mut world = level();
    let mut pathing = Pathing::new(true);

    let _ = click(&mut world, &pathing, Vec3::new(2.0, 0.0, 1.0));
    let events = service(&mut world, &mut pathing);

    assert_eq!(events, vec![Event::PathNotFound { agent: AGENT }]);
}

#[test]
fn dissolved_cells_block_later_requests() {
    let mut world = level();
    let mut pathing = Pathing::new(true);
    let middle = blocks_core::CellId::new(1);

    let _ = apply_all(
        &mut world,
        vec![
            Command::RecordTraversal { cell: middle },
            Command::DissolveCell { cell: middle },
            Command::FlushMutations,
        ],
    );
    let _ = click(&mut world, &pathing, Vec3::new(2.0, 0.0, 0.0));
    let events = service(&mut world, &mut pathing);

    assert_eq!(events, vec![Event::PathNotFound { agent: AGENT }]);
}
