//! Serializable level description and world construction.

use std::collections::{BTreeMap, BTreeSet};

use blocks_core::{
    AgentId, BlockType, BlockedEdges, CellId, CellLifecycle, ObjectId, Pose, SwitchRecord,
    SwitchState, TriggerState,
};
use blocks_navigation::{Grid, GridError, GridNode, RequestSlot};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{hierarchy::ObjectTree, Agent, Cell, MutationBuffer, World};

const fn default_cell_size() -> f32 {
    1.0
}

const fn default_max_traversal_count() -> u32 {
    1
}

const fn default_traversal_cost() -> u32 {
    1
}

/// Complete description of one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    /// Side length of one grid cell in world units.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Every block in the level; each becomes one grid node.
    #[serde(default)]
    pub blocks: Vec<BlockLayout>,
    /// Named sets of objects that switches can reveal.
    #[serde(default)]
    pub groups: Vec<GroupLayout>,
}

impl Default for LevelLayout {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            blocks: Vec::new(),
            groups: Vec::new(),
        }
    }
}

/// One block of a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockLayout {
    /// Name of the block's view object; defaults to `block-<index>`.
    #[serde(default)]
    pub name: Option<String>,
    /// World-space position of the block.
    pub position: Vec3,
    /// Gameplay role of the block.
    #[serde(default)]
    pub block_type: BlockType,
    /// Solid blocks never dissolve.
    #[serde(default)]
    pub solid: bool,
    /// Exits after which the block dissolves.
    #[serde(default = "default_max_traversal_count")]
    pub max_traversal_count: u32,
    /// Cost added when a path enters the block.
    #[serde(default = "default_traversal_cost")]
    pub traversal_cost: u32,
    /// Directions of travel blocked at this block.
    #[serde(default)]
    pub blocked: BlockedEdges,
    /// Switch settings; only read for [`BlockType::Switch`] blocks.
    #[serde(default)]
    pub switch: Option<SwitchLayout>,
    /// Objects attached below the block's view object.
    #[serde(default)]
    pub children: Vec<ObjectLayout>,
}

impl BlockLayout {
    /// Creates a basic, non-solid block at `position` with default settings.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            name: None,
            position,
            block_type: BlockType::Basic,
            solid: false,
            max_traversal_count: default_max_traversal_count(),
            traversal_cost: default_traversal_cost(),
            blocked: BlockedEdges::NONE,
            switch: None,
            children: Vec::new(),
        }
    }

    /// Returns a copy with the provided gameplay role.
    #[must_use]
    pub fn with_type(mut self, block_type: BlockType) -> Self {
        self.block_type = block_type;
        self
    }
}

/// Switch configuration of a switch block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchLayout {
    /// Position the switch rests in when the level starts.
    #[serde(default)]
    pub start_state: SwitchState,
    /// Locks the switch after its first flip.
    #[serde(default)]
    pub single_activation: bool,
    /// Group revealed whenever the switch flips on.
    #[serde(default)]
    pub group: Option<String>,
}

/// Named presentation object with optional children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLayout {
    /// Unique object name.
    pub name: String,
    /// Objects attached below this one.
    #[serde(default)]
    pub children: Vec<ObjectLayout>,
}

/// Named set of objects toggled together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLayout {
    /// Unique group name.
    pub name: String,
    /// Hides every member when the level starts.
    #[serde(default)]
    pub initially_hidden: bool,
    /// Names of the member objects.
    #[serde(default)]
    pub members: Vec<String>,
}

/// Failures raised while building a world from a [`LevelLayout`].
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The block positions do not form a valid grid.
    #[error("invalid level geometry: {0}")]
    Grid(#[from] GridError),
    /// No block is marked as the start.
    #[error("level has no start block")]
    MissingStart,
    /// More than one block is marked as the start.
    #[error("level has more than one start block")]
    DuplicateStart,
    /// Two objects share a name.
    #[error("object name `{name}` is used more than once")]
    DuplicateObject {
        /// Shared name.
        name: String,
    },
    /// Two groups share a name.
    #[error("group `{name}` is declared more than once")]
    DuplicateGroup {
        /// Shared name.
        name: String,
    },
    /// A group lists an object that does not exist.
    #[error("group `{group}` references unknown object `{member}`")]
    UnknownGroupMember {
        /// Group that holds the reference.
        group: String,
        /// Missing object name.
        member: String,
    },
    /// A switch names a group that does not exist.
    #[error("switch block {cell} references unknown group `{group}`")]
    UnknownGroup {
        /// Switch cell holding the reference.
        cell: u32,
        /// Missing group name.
        group: String,
    },
}

impl World {
    /// Builds a world from a level description.
    ///
    /// The grid is derived from the block positions; the single agent spawns
    /// on the start block, idle and facing +Z.
    pub fn from_level(layout: &LevelLayout) -> Result<Self, WorldError> {
        let positions: Vec<Vec3> = layout.blocks.iter().map(|block| block.position).collect();
        let (mut grid, coords) = Grid::scan(&positions, layout.cell_size)?;

        let mut objects = ObjectTree::default();
        let mut names = BTreeSet::new();
        let mut cells = Vec::with_capacity(layout.blocks.len());
        let mut start = None;

        for (index, (block, coord)) in layout.blocks.iter().zip(&coords).enumerate() {
            let id = CellId::new(index as u32);
            let node = GridNode::new(*coord, grid.length_x())
                .with_traversal_cost(block.traversal_cost)
                .with_blocked(block.blocked);
            if node.traversal_cost() == 0 {
                return Err(GridError::ZeroTraversalCost { coord: *coord }.into());
            }
            grid.set(*coord, node)
                .map_err(|_| GridError::OutOfBounds { coord: *coord })?;

            let name = block
                .name
                .clone()
                .unwrap_or_else(|| format!("block-{index}"));
            let view = insert_object(&mut objects, &mut names, name, None)?;
            insert_children(&mut objects, &mut names, view, &block.children)?;

            if block.block_type == BlockType::Start {
                if start.is_some() {
                    return Err(WorldError::DuplicateStart);
                }
                start = Some(*coord);
            }

            let switch = (block.block_type == BlockType::Switch).then(|| {
                let settings = block.switch.clone().unwrap_or_default();
                SwitchRecord::new(settings.start_state, settings.single_activation)
            });

            cells.push(Cell {
                id,
                coord: *coord,
                node: node.id(),
                view,
                lifecycle: CellLifecycle::new(
                    block.block_type,
                    block.solid,
                    block.max_traversal_count,
                ),
                trigger: TriggerState::None,
                switch,
                group: None,
                dissolve_applied: false,
            });
        }

        let mut groups: BTreeMap<String, Vec<ObjectId>> = BTreeMap::new();
        for group in &layout.groups {
            if groups.contains_key(&group.name) {
                return Err(WorldError::DuplicateGroup {
                    name: group.name.clone(),
                });
            }

            let mut members = Vec::with_capacity(group.members.len());
            for member in &group.members {
                let object = objects.find(member).ok_or_else(|| WorldError::UnknownGroupMember {
                    group: group.name.clone(),
                    member: member.clone(),
                })?;
                if group.initially_hidden {
                    let _ = objects.set_subtree_enabled(object, false);
                }
                members.push(object);
            }
            let _ = groups.insert(group.name.clone(), members);
        }

        for (cell, block) in cells.iter_mut().zip(&layout.blocks) {
            if cell.switch.is_none() {
                continue;
            }
            let Some(group) = block.switch.as_ref().and_then(|settings| settings.group.as_ref())
            else {
                continue;
            };
            if !groups.contains_key(group) {
                return Err(WorldError::UnknownGroup {
                    cell: cell.id.get(),
                    group: group.clone(),
                });
            }
            cell.group = Some(group.clone());
        }

        let start = start.ok_or(WorldError::MissingStart)?;
        let start_node = grid
            .get(start)
            .map_err(|_| GridError::OutOfBounds { coord: start })?;
        let agent = Agent {
            id: AgentId::new(0),
            node: start_node.id(),
            pose: Pose::new(grid.world_position(start), Quat::IDENTITY),
            moving: false,
        };

        debug!(
            cells = cells.len(),
            length_x = grid.length_x(),
            length_y = grid.length_y(),
            objects = objects.len(),
            "level loaded"
        );

        Ok(Self {
            grid,
            cells,
            objects,
            groups,
            agents: vec![agent],
            requests: RequestSlot::new(),
            mutations: MutationBuffer::default(),
            step_index: 0,
        })
    }
}

fn insert_object(
    objects: &mut ObjectTree,
    names: &mut BTreeSet<String>,
    name: String,
    parent: Option<ObjectId>,
) -> Result<ObjectId, WorldError> {
    if !names.insert(name.clone()) {
        return Err(WorldError::DuplicateObject { name });
    }
    Ok(objects.insert(name, parent, true))
}

fn insert_children(
    objects: &mut ObjectTree,
    names: &mut BTreeSet<String>,
    parent: ObjectId,
    children: &[ObjectLayout],
) -> Result<(), WorldError> {
    let mut stack: Vec<(ObjectId, &ObjectLayout)> =
        children.iter().rev().map(|child| (parent, child)).collect();
    while let Some((parent, layout)) = stack.pop() {
        let id = insert_object(objects, names, layout.name.clone(), Some(parent))?;
        stack.extend(layout.children.iter().rev().map(|child| (id, child)));
    }
    Ok(())
}
