#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blocks engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Systems consume event streams,
//! query immutable snapshots, and respond exclusively with new command
//! batches.
//!
//! Commands that change the structure of the level (grid traversability and
//! object hierarchy visibility) are deferred by the world until an explicit
//! [`Command::FlushMutations`] barrier, so no search ever observes a dissolve
//! half way through a step.

use std::{fmt, time::Duration};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as x and y coordinates.
///
/// Grid x follows world X and grid y follows world Z; the level lies on the
/// ground plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    x: u32,
    y: u32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Computes the Manhattan distance between two grid coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: GridCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the neighbouring coordinate one step in `direction`, if it
    /// stays within a grid of `length_x` by `length_y` cells.
    #[must_use]
    pub fn step(self, direction: Direction, length_x: u32, length_y: u32) -> Option<GridCoord> {
        let (x, y) = match direction {
            Direction::PosX => (self.x.checked_add(1)?, self.y),
            Direction::NegX => (self.x.checked_sub(1)?, self.y),
            Direction::PosY => (self.x, self.y.checked_add(1)?),
            Direction::NegY => (self.x, self.y.checked_sub(1)?),
        };
        (x < length_x && y < length_y).then_some(GridCoord::new(x, y))
    }

    /// Direction of travel between two 4-adjacent coordinates.
    #[must_use]
    pub fn direction_to(self, other: GridCoord) -> Option<Direction> {
        if self.manhattan_distance(other) != 1 {
            return None;
        }

        if other.x > self.x {
            Some(Direction::PosX)
        } else if other.x < self.x {
            Some(Direction::NegX)
        } else if other.y > self.y {
            Some(Direction::PosY)
        } else {
            Some(Direction::NegY)
        }
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Linear index of a grid node, `y * length_x + x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node identifier from its raw linear index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Derives the linear index of `coord` in a grid `length_x` cells wide.
    #[must_use]
    pub const fn from_coord(coord: GridCoord, length_x: u32) -> Self {
        Self(coord.y * length_x + coord.x)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier assigned to a level cell (one block).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a new cell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a traversing agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a presentation object in the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Creates a new object identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Grid-axis directions available to traversing agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward increasing x.
    PosX,
    /// Movement toward decreasing x.
    NegX,
    /// Movement toward increasing y.
    PosY,
    /// Movement toward decreasing y.
    NegY,
}

impl Direction {
    /// Every direction in neighbour expansion order.
    pub const ALL: [Direction; 4] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
    ];

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
        }
    }
}

/// Per-node directional block flags.
///
/// Each flag is independent, so edges may be one-way or asymmetric. An edge
/// travelled in direction `d` is usable only when neither endpoint blocks `d`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockedEdges {
    /// Travel toward increasing x is blocked.
    pub pos_x: bool,
    /// Travel toward decreasing x is blocked.
    pub neg_x: bool,
    /// Travel toward increasing y is blocked.
    pub pos_y: bool,
    /// Travel toward decreasing y is blocked.
    pub neg_y: bool,
}

impl BlockedEdges {
    /// No direction is blocked.
    pub const NONE: Self = Self {
        pos_x: false,
        neg_x: false,
        pos_y: false,
        neg_y: false,
    };

    /// Every direction is blocked.
    pub const ALL: Self = Self {
        pos_x: true,
        neg_x: true,
        pos_y: true,
        neg_y: true,
    };

    /// Reports whether travel in `direction` is blocked.
    #[must_use]
    pub const fn blocks(&self, direction: Direction) -> bool {
        match direction {
            Direction::PosX => self.pos_x,
            Direction::NegX => self.neg_x,
            Direction::PosY => self.pos_y,
            Direction::NegY => self.neg_y,
        }
    }

    /// Returns a copy with `direction` blocked.
    #[must_use]
    pub const fn with(mut self, direction: Direction) -> Self {
        match direction {
            Direction::PosX => self.pos_x = true,
            Direction::NegX => self.neg_x = true,
            Direction::PosY => self.pos_y = true,
            Direction::NegY => self.neg_y = true,
        }
        self
    }
}

/// Request to solve a path between two grid nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRequest {
    /// Node the path starts from.
    pub start: NodeId,
    /// Node the path must reach.
    pub end: NodeId,
    /// Rejects any found path that turns, leaving only pure row or column paths.
    pub straight_line_only: bool,
}

impl PathRequest {
    /// Creates a new path request.
    #[must_use]
    pub const fn new(start: NodeId, end: NodeId, straight_line_only: bool) -> Self {
        Self {
            start,
            end,
            straight_line_only,
        }
    }
}

/// One node of a solved path together with its world-space position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Grid coordinate of the node.
    pub coord: GridCoord,
    /// Linear index of the node.
    pub node: NodeId,
    /// World-space position of the node centre.
    pub position: Vec3,
}

/// Ordered path from start to end inclusive.
///
/// An empty path means no path was found.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolvedPath {
    waypoints: Vec<Waypoint>,
}

impl SolvedPath {
    /// Wraps the provided waypoints; an empty list represents "not found".
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Result describing a failed search.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Reports whether the search produced a path.
    #[must_use]
    pub fn is_found(&self) -> bool {
        !self.waypoints.is_empty()
    }

    /// Waypoints from start to end inclusive.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Number of waypoints in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Reports whether the path has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Consumes the path, yielding the underlying waypoints.
    #[must_use]
    pub fn into_waypoints(self) -> Vec<Waypoint> {
        self.waypoints
    }
}

/// Debounced overlap signal derived from one raw overlap bit per step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerState {
    /// Nothing overlaps the cell.
    #[default]
    None,
    /// An overlap started this step.
    Enter,
    /// An overlap continues from a previous step.
    Stay,
    /// An overlap ended this step.
    Exit,
}

impl TriggerState {
    /// Next trigger state given whether the cell is overlapped this step.
    ///
    /// | state | overlapping | not overlapping |
    /// |---|---|---|
    /// | `None` | `Enter` | `None` |
    /// | `Enter` | `Stay` | `Exit` |
    /// | `Stay` | `Stay` | `Exit` |
    /// | `Exit` | `Enter` | `None` |
    #[must_use]
    pub const fn next(self, overlapping: bool) -> Self {
        match (self, overlapping) {
            (Self::None | Self::Exit, true) => Self::Enter,
            (Self::Enter | Self::Stay, true) => Self::Stay,
            (Self::Enter | Self::Stay, false) => Self::Exit,
            (Self::None | Self::Exit, false) => Self::None,
        }
    }
}

/// Gameplay role of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Plain traversable block.
    #[default]
    Basic,
    /// Block the agent starts on.
    Start,
    /// Block the agent tries to reach.
    Goal,
    /// Block that toggles a switch when entered.
    Switch,
}

/// Traversal bookkeeping for one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLifecycle {
    block_type: BlockType,
    solid: bool,
    max_traversal_count: u32,
    current_traversal_count: u32,
    dissolving: bool,
}

impl CellLifecycle {
    /// Creates an active cell that dissolves after `max_traversal_count` exits.
    #[must_use]
    pub const fn new(block_type: BlockType, solid: bool, max_traversal_count: u32) -> Self {
        Self {
            block_type,
            solid,
            max_traversal_count,
            current_traversal_count: 0,
            dissolving: false,
        }
    }

    /// Gameplay role of the cell.
    #[must_use]
    pub const fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Solid cells never count traversals and never dissolve.
    #[must_use]
    pub const fn is_solid(&self) -> bool {
        self.solid
    }

    /// Number of exits after which the cell dissolves.
    #[must_use]
    pub const fn max_traversal_count(&self) -> u32 {
        self.max_traversal_count
    }

    /// Number of exits counted so far.
    #[must_use]
    pub const fn current_traversal_count(&self) -> u32 {
        self.current_traversal_count
    }

    /// Reports whether the cell has started dissolving.
    #[must_use]
    pub const fn is_dissolving(&self) -> bool {
        self.dissolving
    }

    /// Counts one traversal and reports whether the cell just started dissolving.
    ///
    /// Solid and already dissolving cells are left untouched.
    pub fn record_traversal(&mut self) -> bool {
        if self.solid || self.dissolving {
            return false;
        }

        self.current_traversal_count = self.current_traversal_count.saturating_add(1);
        if self.current_traversal_count >= self.max_traversal_count {
            self.dissolving = true;
        }
        self.dissolving
    }
}

/// Position of a two-state switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchState {
    /// Switch is off.
    #[default]
    Off,
    /// Switch is on.
    On,
}

impl SwitchState {
    /// The other switch position.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

/// Runtime state of a switch block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRecord {
    start_state: SwitchState,
    single_activation: bool,
    current: SwitchState,
    has_activated: bool,
}

impl SwitchRecord {
    /// Creates a switch resting in `start_state`.
    #[must_use]
    pub const fn new(start_state: SwitchState, single_activation: bool) -> Self {
        Self {
            start_state,
            single_activation,
            current: start_state,
            has_activated: false,
        }
    }

    /// Current switch position.
    #[must_use]
    pub const fn state(&self) -> SwitchState {
        self.current
    }

    /// Whether the switch locks after its first flip.
    #[must_use]
    pub const fn is_single_activation(&self) -> bool {
        self.single_activation
    }

    /// Whether the switch has flipped at least once since the last reset.
    #[must_use]
    pub const fn has_activated(&self) -> bool {
        self.has_activated
    }

    /// Flips the switch and returns the new position, or `None` when locked.
    pub fn activate(&mut self) -> Option<SwitchState> {
        if self.has_activated && self.single_activation {
            return None;
        }

        self.current = self.current.toggled();
        self.has_activated = true;
        Some(self.current)
    }

    /// Restores the start position and unlocks the switch.
    pub fn reset(&mut self) {
        self.current = self.start_state;
        self.has_activated = false;
    }
}

/// World-space position and orientation of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space orientation.
    pub rotation: Quat,
}

impl Pose {
    /// Creates a pose from a position and rotation.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation by one step.
    Tick {
        /// Duration of simulated time that elapsed since the previous step.
        dt: Duration,
    },
    /// Stores the debounced trigger state computed for a cell this step.
    SetTriggerState {
        /// Cell whose trigger state changed.
        cell: CellId,
        /// New trigger state.
        state: TriggerState,
    },
    /// Counts one traversal of a cell.
    RecordTraversal {
        /// Cell that was left by an agent.
        cell: CellId,
    },
    /// Queues the permanent removal of a dissolving cell. Deferred.
    DissolveCell {
        /// Cell to remove from play.
        cell: CellId,
    },
    /// Flips a switch cell.
    ActivateSwitch {
        /// Switch cell that was entered.
        cell: CellId,
    },
    /// Queues enabling an object and its descendants. Deferred.
    EnableHierarchy {
        /// Root of the subtree to enable.
        root: ObjectId,
    },
    /// Queues disabling an object and its descendants. Deferred.
    DisableHierarchy {
        /// Root of the subtree to disable.
        root: ObjectId,
    },
    /// Synchronization barrier applying every deferred structural mutation.
    FlushMutations,
    /// Writes a request into the grid's pending request slot, replacing any
    /// request not yet serviced.
    RequestPath {
        /// Agent that will follow the path.
        agent: AgentId,
        /// Nodes to connect.
        request: PathRequest,
    },
    /// Clears the pending request slot and delivers its result.
    CompletePathRequest {
        /// Agent the request belonged to.
        agent: AgentId,
        /// Search result, empty when no path exists.
        path: SolvedPath,
    },
    /// Publishes the pose computed by the path follower.
    SetAgentPose {
        /// Agent that moved.
        agent: AgentId,
        /// Node the agent last departed from or arrived at.
        node: NodeId,
        /// New world-space pose.
        pose: Pose,
        /// Whether the agent is still following a path.
        moving: bool,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the step.
        dt: Duration,
    },
    /// Announces a new debounced trigger state for a cell.
    TriggerChanged {
        /// Cell whose trigger state changed.
        cell: CellId,
        /// New trigger state.
        state: TriggerState,
    },
    /// Confirms that a traversal was counted.
    TraversalRecorded {
        /// Cell that was traversed.
        cell: CellId,
        /// Traversal count after the increment.
        count: u32,
    },
    /// Announces that a cell exhausted its traversal budget.
    CellDissolving {
        /// Cell that started dissolving.
        cell: CellId,
    },
    /// Confirms that a dissolve was applied at the barrier.
    CellDissolved {
        /// Cell removed from play.
        cell: CellId,
        /// Grid node that became non-traversable.
        node: NodeId,
    },
    /// Confirms that a hierarchy enable was applied at the barrier.
    HierarchyEnabled {
        /// Root of the enabled subtree.
        root: ObjectId,
        /// Number of objects whose state actually changed.
        changed: usize,
    },
    /// Confirms that a hierarchy disable was applied at the barrier.
    HierarchyDisabled {
        /// Root of the disabled subtree.
        root: ObjectId,
        /// Number of objects whose state actually changed.
        changed: usize,
    },
    /// Announces that a switch changed position.
    SwitchToggled {
        /// Switch cell that flipped.
        cell: CellId,
        /// New switch position.
        state: SwitchState,
    },
    /// Confirms that a request now occupies the pending slot.
    PathRequested {
        /// Agent that raised the request.
        agent: AgentId,
        /// Request stored in the slot.
        request: PathRequest,
    },
    /// Reports that an unserviced request was overwritten by a newer one.
    PathRequestSuperseded {
        /// Agent whose request was dropped.
        agent: AgentId,
        /// Request that was dropped.
        request: PathRequest,
    },
    /// Delivers a found path to the requesting agent.
    PathSolved {
        /// Agent that requested the path.
        agent: AgentId,
        /// Path from start to end inclusive.
        path: SolvedPath,
    },
    /// Reports that the request produced no usable path.
    PathNotFound {
        /// Agent that requested the path.
        agent: AgentId,
    },
    /// Announces a new agent pose.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Node the agent last departed from or arrived at.
        node: NodeId,
        /// New world-space pose.
        pose: Pose,
    },
    /// Announces that an agent reached the end of its path.
    AgentArrived {
        /// Agent that stopped.
        agent: AgentId,
        /// Node the agent stopped on.
        node: NodeId,
    },
}

/// Grid lookup key reported by [`NavigationError::NodeNotFound`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeLocation {
    /// Lookup by coordinate pair.
    Coord(GridCoord),
    /// Lookup by linear index.
    Index(NodeId),
}

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coord(coord) => write!(f, "coordinate {coord}"),
            Self::Index(node) => write!(f, "index {node}"),
        }
    }
}

/// Failures reported by grid lookups and the search engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// The coordinate or index is not populated in the grid.
    #[error("no grid node at {location}")]
    NodeNotFound {
        /// Lookup key that missed.
        location: NodeLocation,
    },
    /// The search exhausted its open set without reaching the goal.
    #[error("no path between the requested nodes")]
    PathNotFound,
    /// The start or end node of a request is absent from the grid.
    #[error("path request {start} -> {end} references a node outside the grid")]
    InvalidRequest {
        /// Requested start node.
        start: NodeId,
        /// Requested end node.
        end: NodeId,
    },
}
