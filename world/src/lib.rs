#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Blocks.
//!
//! The world owns the navigation grid, every level cell, the presentation
//! object hierarchy, the agent records and the pending path request slot.
//! All mutation flows through [`apply`]. Structural changes (dissolving a
//! cell, enabling or disabling a hierarchy) are queued in a mutation buffer
//! and only take effect at the [`Command::FlushMutations`] barrier.

mod hierarchy;
mod level;

use std::collections::BTreeMap;

use blocks_core::{
    AgentId, CellId, CellLifecycle, Command, Event, GridCoord, NavigationError, NodeId, ObjectId,
    Pose, SwitchRecord, TriggerState,
};
use blocks_navigation::{Grid, PendingRequest, RequestSlot};
use tracing::{debug, trace, warn};

pub use hierarchy::ObjectTree;
pub use level::{BlockLayout, GroupLayout, LevelLayout, ObjectLayout, SwitchLayout, WorldError};

/// Represents the authoritative Blocks world state.
#[derive(Debug)]
pub struct World {
    grid: Grid,
    cells: Vec<Cell>,
    objects: ObjectTree,
    groups: BTreeMap<String, Vec<ObjectId>>,
    agents: Vec<Agent>,
    requests: RequestSlot,
    mutations: MutationBuffer,
    step_index: u64,
}

impl World {
    fn cell_mut(&mut self, cell: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(cell.get() as usize)
    }

    fn agent_mut(&mut self, agent: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|candidate| candidate.id == agent)
    }

    fn flush_mutations(&mut self, out_events: &mut Vec<Event>) {
        for mutation in self.mutations.drain() {
            match mutation {
                Mutation::Dissolve(cell) => self.apply_dissolve(cell, out_events),
                Mutation::Enable(root) => {
                    if let Some(enabled) = self.objects.set_subtree_enabled(root, true) {
                        let changed = enabled.saturating_sub(self.rehide_dissolved_views());
                        debug!(root = root.get(), changed, "hierarchy enabled");
                        out_events.push(Event::HierarchyEnabled { root, changed });
                    }
                }
                Mutation::Disable(root) => {
                    if let Some(changed) = self.objects.set_subtree_enabled(root, false) {
                        debug!(root = root.get(), changed, "hierarchy disabled");
                        out_events.push(Event::HierarchyDisabled { root, changed });
                    }
                }
            }
        }
    }

    /// Dissolved cells stay hidden even when an enabled group reaches them.
    fn rehide_dissolved_views(&mut self) -> usize {
        let objects = &mut self.objects;
        self.cells
            .iter()
            .filter(|cell| cell.dissolve_applied)
            .filter_map(|cell| objects.set_subtree_enabled(cell.view, false))
            .sum()
    }

    fn apply_dissolve(&mut self, cell: CellId, out_events: &mut Vec<Event>) {
        let Some(record) = self.cells.get_mut(cell.get() as usize) else {
            return;
        };
        if record.dissolve_applied || !record.lifecycle.is_dissolving() {
            return;
        }
        record.dissolve_applied = true;
        let (node, view) = (record.node, record.view);

        if expect_node(self.grid.set_traversable(node, false)).is_none() {
            return;
        }
        debug!(cell = cell.get(), %node, "cell dissolved");
        out_events.push(Event::CellDissolved { cell, node });

        if let Some(changed) = self.objects.set_subtree_enabled(view, false) {
            out_events.push(Event::HierarchyDisabled {
                root: view,
                changed,
            });
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.step_index = world.step_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::SetTriggerState { cell, state } => {
            if let Some(record) = world.cell_mut(cell) {
                if record.trigger != state {
                    record.trigger = state;
                    out_events.push(Event::TriggerChanged { cell, state });
                }
            }
        }
        Command::RecordTraversal { cell } => {
            let Some(record) = world.cell_mut(cell) else {
                return;
            };
            let before = record.lifecycle.current_traversal_count();
            let started_dissolving = record.lifecycle.record_traversal();
            let count = record.lifecycle.current_traversal_count();
            if count != before {
                trace!(cell = cell.get(), count, "traversal recorded");
                out_events.push(Event::TraversalRecorded { cell, count });
            }
            if started_dissolving {
                out_events.push(Event::CellDissolving { cell });
            }
        }
        Command::DissolveCell { cell } => {
            if world.cell_mut(cell).is_some() {
                world.mutations.push(Mutation::Dissolve(cell));
            }
        }
        Command::ActivateSwitch { cell } => {
            let toggled = world
                .cell_mut(cell)
                .and_then(|record| record.switch.as_mut())
                .and_then(SwitchRecord::activate);
            if let Some(state) = toggled {
                debug!(cell = cell.get(), ?state, "switch toggled");
                out_events.push(Event::SwitchToggled { cell, state });
            }
        }
        Command::EnableHierarchy { root } => world.mutations.push(Mutation::Enable(root)),
        Command::DisableHierarchy { root } => world.mutations.push(Mutation::Disable(root)),
        Command::FlushMutations => world.flush_mutations(out_events),
        Command::RequestPath { agent, request } => {
            if let Some(superseded) = world.requests.submit(PendingRequest { agent, request }) {
                debug!(
                    agent = superseded.agent.get(),
                    start = %superseded.request.start,
                    end = %superseded.request.end,
                    "pending path request superseded"
                );
                out_events.push(Event::PathRequestSuperseded {
                    agent: superseded.agent,
                    request: superseded.request,
                });
            }
            out_events.push(Event::PathRequested { agent, request });
        }
        Command::CompletePathRequest { agent, path } => {
            if world.requests.take().is_none() {
                trace!(agent = agent.get(), "completion without a pending request");
                return;
            }
            if path.is_found() {
                out_events.push(Event::PathSolved { agent, path });
            } else {
                out_events.push(Event::PathNotFound { agent });
            }
        }
        Command::SetAgentPose {
            agent,
            node,
            pose,
            moving,
        } => {
            let Some(record) = world.agent_mut(agent) else {
                return;
            };
            let arrived = record.moving && !moving;
            record.node = node;
            record.pose = pose;
            record.moving = moving;
            out_events.push(Event::AgentMoved { agent, node, pose });
            if arrived {
                out_events.push(Event::AgentArrived { agent, node });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use blocks_core::{
        AgentId, BlockType, CellId, GridCoord, NodeId, ObjectId, Pose, SwitchState, TriggerState,
    };
    use blocks_navigation::{Grid, PendingRequest};

    use super::{ObjectTree, World};

    /// Provides read-only access to the navigation grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Provides read-only access to the presentation object hierarchy.
    #[must_use]
    pub fn objects(world: &World) -> &ObjectTree {
        &world.objects
    }

    /// Number of steps processed since the level was loaded.
    #[must_use]
    pub fn step_index(world: &World) -> u64 {
        world.step_index
    }

    /// Request currently waiting in the grid's pending slot.
    #[must_use]
    pub fn pending_request(world: &World) -> Option<PendingRequest> {
        world.requests.peek().copied()
    }

    /// Objects revealed when the switch at `cell` flips on.
    #[must_use]
    pub fn switch_group(world: &World, cell: CellId) -> &[ObjectId] {
        world
            .cells
            .get(cell.get() as usize)
            .and_then(|record| record.group.as_ref())
            .and_then(|group| world.groups.get(group))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Captures a read-only view of every cell in the level.
    #[must_use]
    pub fn cell_view(world: &World) -> CellView {
        let snapshots = world
            .cells
            .iter()
            .map(|cell| CellSnapshot {
                id: cell.id,
                coord: cell.coord,
                node: cell.node,
                view: cell.view,
                block_type: cell.lifecycle.block_type(),
                solid: cell.lifecycle.is_solid(),
                max_traversal_count: cell.lifecycle.max_traversal_count(),
                traversal_count: cell.lifecycle.current_traversal_count(),
                dissolving: cell.lifecycle.is_dissolving(),
                dissolved: cell.dissolve_applied,
                trigger: cell.trigger,
                switch: cell.switch.map(|switch| switch.state()),
            })
            .collect();
        CellView { snapshots }
    }

    /// Captures a read-only view of the agents in the level.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        let mut snapshots: Vec<AgentSnapshot> = world
            .agents
            .iter()
            .map(|agent| AgentSnapshot {
                id: agent.id,
                node: agent.node,
                pose: agent.pose,
                moving: agent.moving,
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        AgentView { snapshots }
    }

    /// Read-only snapshot describing all cells in id order.
    #[derive(Clone, Debug)]
    pub struct CellView {
        snapshots: Vec<CellSnapshot>,
    }

    impl CellView {
        /// Iterator over the captured cell snapshots in id order.
        pub fn iter(&self) -> impl Iterator<Item = &CellSnapshot> {
            self.snapshots.iter()
        }

        /// Snapshot of `cell`, if it exists.
        #[must_use]
        pub fn get(&self, cell: CellId) -> Option<&CellSnapshot> {
            self.snapshots.get(cell.get() as usize)
        }

        /// Consumes the view, yielding the underlying snapshots.
        pub fn into_vec(self) -> Vec<CellSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single cell's state used for queries.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct CellSnapshot {
        /// Unique identifier assigned to the cell.
        pub id: CellId,
        /// Grid coordinate of the cell.
        pub coord: GridCoord,
        /// Grid node backing the cell.
        pub node: NodeId,
        /// Root of the cell's presentation subtree.
        pub view: ObjectId,
        /// Gameplay role of the cell.
        pub block_type: BlockType,
        /// Whether the cell is excluded from dissolving.
        pub solid: bool,
        /// Exits after which the cell dissolves.
        pub max_traversal_count: u32,
        /// Exits counted so far.
        pub traversal_count: u32,
        /// Whether the cell exhausted its traversal budget.
        pub dissolving: bool,
        /// Whether the dissolve has been applied to the grid.
        pub dissolved: bool,
        /// Current debounced trigger state.
        pub trigger: TriggerState,
        /// Switch position for switch cells.
        pub switch: Option<SwitchState>,
    }

    /// Read-only snapshot describing all agents.
    #[derive(Clone, Debug)]
    pub struct AgentView {
        snapshots: Vec<AgentSnapshot>,
    }

    impl AgentView {
        /// Iterator over the captured agent snapshots in deterministic order.
        pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
            self.snapshots.iter()
        }

        /// Snapshot of `agent`, if it exists.
        #[must_use]
        pub fn get(&self, agent: AgentId) -> Option<&AgentSnapshot> {
            self.snapshots.iter().find(|snapshot| snapshot.id == agent)
        }

        /// Consumes the view, yielding the underlying snapshots.
        pub fn into_vec(self) -> Vec<AgentSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single agent's state used for queries.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct AgentSnapshot {
        /// Unique identifier assigned to the agent.
        pub id: AgentId,
        /// Node the agent last departed from or arrived at.
        pub node: NodeId,
        /// World-space pose published by the path follower.
        pub pose: Pose,
        /// Whether the agent is following a path.
        pub moving: bool,
    }
}

#[derive(Clone, Debug)]
struct Cell {
    id: CellId,
    coord: GridCoord,
    node: NodeId,
    view: ObjectId,
    lifecycle: CellLifecycle,
    trigger: TriggerState,
    switch: Option<SwitchRecord>,
    group: Option<String>,
    dissolve_applied: bool,
}

#[derive(Clone, Debug)]
struct Agent {
    id: AgentId,
    node: NodeId,
    pose: Pose,
    moving: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mutation {
    Dissolve(CellId),
    Enable(ObjectId),
    Disable(ObjectId),
}

#[derive(Debug, Default)]
struct MutationBuffer {
    queued: Vec<Mutation>,
}

impl MutationBuffer {
    fn push(&mut self, mutation: Mutation) {
        self.queued.push(mutation);
    }

    fn drain(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.queued)
    }
}

/// Grid lookups inside `apply` only miss when the level was built wrongly.
fn expect_node<T>(result: Result<T, NavigationError>) -> Option<T> {
    debug_assert!(result.is_ok(), "world references a missing grid node");
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%error, "structural mutation skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blocks_core::{BlockType, PathRequest, SolvedPath, SwitchState};
    use glam::{Quat, Vec3};

    use super::*;

    fn corridor() -> World {
        let mut blocks: Vec<BlockLayout> = (0..4)
            .map(|x| BlockLayout::new(Vec3::new(x as f32, 0.0, 0.0)))
            .collect();
        blocks[0].block_type = BlockType::Start;
        blocks[1].max_traversal_count = 2;
        blocks[2].block_type = BlockType::Switch;
        World::from_level(&LevelLayout {
            blocks,
            ..LevelLayout::default()
        })
        .expect("corridor level")
    }

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    #[test]
    fn tick_advances_step_index() {
        let mut world = corridor();
        let dt = Duration::from_millis(16);

        assert_eq!(run(&mut world, Command::Tick { dt }), vec![Event::TimeAdvanced { dt }]);
        assert_eq!(query::step_index(&world), 1);
    }

    #[test]
    fn trigger_changes_are_reported_once() {
        let mut world = corridor();
        let cell = CellId::new(1);
        let command = Command::SetTriggerState {
            cell,
            state: TriggerState::Enter,
        };

        assert_eq!(
            run(&mut world, command.clone()),
            vec![Event::TriggerChanged {
                cell,
                state: TriggerState::Enter
            }]
        );
        assert!(run(&mut world, command).is_empty());
    }

    #[test]
    fn dissolve_waits_for_flush() {
        let mut world = corridor();
        let cell = CellId::new(1);
        let node = query::cell_view(&world).get(cell).expect("cell").node;

        let _ = run(&mut world, Command::RecordTraversal { cell });
        let events = run(&mut world, Command::RecordTraversal { cell });
        assert_eq!(
            events,
            vec![
                Event::TraversalRecorded { cell, count: 2 },
                Event::CellDissolving { cell },
            ]
        );

        assert!(run(&mut world, Command::DissolveCell { cell }).is_empty());
        assert!(query::grid(&world)
            .get_index(node)
            .expect("node")
            .is_traversable());

        let events = run(&mut world, Command::FlushMutations);
        assert_eq!(events[0], Event::CellDissolved { cell, node });
        assert!(matches!(
            events[1],
            Event::HierarchyDisabled { changed: 1, .. }
        ));
        assert!(!query::grid(&world)
            .get_index(node)
            .expect("node")
            .is_traversable());
        assert!(query::cell_view(&world).get(cell).expect("cell").dissolved);
    }

    #[test]
    fn repeated_dissolves_are_noops() {
        let mut world = corridor();
        let cell = CellId::new(3);
        let _ = run(&mut world, Command::RecordTraversal { cell });

        let _ = run(&mut world, Command::DissolveCell { cell });
        let _ = run(&mut world, Command::DissolveCell { cell });
        let events = run(&mut world, Command::FlushMutations);

        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::CellDissolved { .. }))
                .count(),
            1
        );
        assert!(run(&mut world, Command::FlushMutations).is_empty());
    }

    #[test]
    fn active_cells_ignore_dissolve_commands() {
        let mut world = corridor();
        let _ = run(&mut world, Command::DissolveCell { cell: CellId::new(1) });

        assert!(run(&mut world, Command::FlushMutations).is_empty());
        assert!(query::grid(&world).nodes().all(|node| node.is_traversable()));
    }

    #[test]
    fn switch_activation_toggles_state() {
        let mut world = corridor();
        let cell = CellId::new(2);

        assert_eq!(
            run(&mut world, Command::ActivateSwitch { cell }),
            vec![Event::SwitchToggled {
                cell,
                state: SwitchState::On
            }]
        );
        assert!(run(&mut world, Command::ActivateSwitch { cell: CellId::new(1) }).is_empty());
    }

    #[test]
    fn newer_path_request_supersedes_pending_one() {
        let mut world = corridor();
        let agent = AgentId::new(0);
        let first = PathRequest::new(NodeId::new(0), NodeId::new(2), true);
        let second = PathRequest::new(NodeId::new(0), NodeId::new(3), true);

        let _ = run(&mut world, Command::RequestPath { agent, request: first });
        let events = run(&mut world, Command::RequestPath { agent, request: second });

        assert_eq!(
            events,
            vec![
                Event::PathRequestSuperseded {
                    agent,
                    request: first
                },
                Event::PathRequested {
                    agent,
                    request: second
                },
            ]
        );
        assert_eq!(
            query::pending_request(&world).map(|pending| pending.request),
            Some(second)
        );

        let events = run(
            &mut world,
            Command::CompletePathRequest {
                agent,
                path: SolvedPath::not_found(),
            },
        );
        assert_eq!(events, vec![Event::PathNotFound { agent }]);
        assert_eq!(query::pending_request(&world), None);
    }

    #[test]
    fn agent_arrival_is_reported_when_motion_stops() {
        let mut world = corridor();
        let agent = AgentId::new(0);
        let pose = Pose::new(Vec3::X, Quat::IDENTITY);

        let moving = run(
            &mut world,
            Command::SetAgentPose {
                agent,
                node: NodeId::new(0),
                pose,
                moving: true,
            },
        );
        assert_eq!(moving.len(), 1);

        let stopped = run(
            &mut world,
            Command::SetAgentPose {
                agent,
                node: NodeId::new(1),
                pose,
                moving: false,
            },
        );
        assert_eq!(
            stopped.last(),
            Some(&Event::AgentArrived {
                agent,
                node: NodeId::new(1)
            })
        );
        let snapshot = *query::agent_view(&world).get(agent).expect("agent");
        assert!(!snapshot.moving);
        assert_eq!(snapshot.node, NodeId::new(1));
    }
}
