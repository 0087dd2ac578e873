//! Bounded node grid with world-space mapping.

use blocks_core::{BlockedEdges, GridCoord, NavigationError, NodeId, NodeLocation, Waypoint};
use glam::{Vec2, Vec3};

/// Largest supported grid side, in cells.
pub const MAX_SIDE_LENGTH: u32 = 50;

/// One addressable grid square with traversability and cost attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridNode {
    coord: GridCoord,
    id: NodeId,
    traversable: bool,
    traversal_cost: u32,
    blocked: BlockedEdges,
}

impl GridNode {
    /// Creates a traversable node with unit cost and no blocked edges.
    #[must_use]
    pub const fn new(coord: GridCoord, length_x: u32) -> Self {
        Self {
            coord,
            id: NodeId::from_coord(coord, length_x),
            traversable: true,
            traversal_cost: 1,
            blocked: BlockedEdges::NONE,
        }
    }

    /// Returns a copy with the provided traversability.
    #[must_use]
    pub const fn with_traversable(mut self, traversable: bool) -> Self {
        self.traversable = traversable;
        self
    }

    /// Returns a copy with the provided traversal cost.
    #[must_use]
    pub const fn with_traversal_cost(mut self, traversal_cost: u32) -> Self {
        self.traversal_cost = traversal_cost;
        self
    }

    /// Returns a copy with the provided directional block flags.
    #[must_use]
    pub const fn with_blocked(mut self, blocked: BlockedEdges) -> Self {
        self.blocked = blocked;
        self
    }

    /// Grid coordinate of the node.
    #[must_use]
    pub const fn coord(&self) -> GridCoord {
        self.coord
    }

    /// Linear index of the node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Whether agents may enter the node.
    #[must_use]
    pub const fn is_traversable(&self) -> bool {
        self.traversable
    }

    /// Cost added when a path enters the node.
    #[must_use]
    pub const fn traversal_cost(&self) -> u32 {
        self.traversal_cost
    }

    /// Directional block flags of the node.
    #[must_use]
    pub const fn blocked(&self) -> BlockedEdges {
        self.blocked
    }
}

/// Affine mapping between the ground plane and grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridTransform {
    bounds_min: Vec2,
    cell_size: f32,
}

impl GridTransform {
    /// Creates a transform anchored at `bounds_min` (world X, world Z).
    #[must_use]
    pub const fn new(bounds_min: Vec2, cell_size: f32) -> Self {
        Self {
            bounds_min,
            cell_size,
        }
    }

    /// World-space X/Z position of grid cell (0, 0).
    #[must_use]
    pub const fn bounds_min(&self) -> Vec2 {
        self.bounds_min
    }

    /// Side length of one cell in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Snaps a world position to the nearest cell.
    ///
    /// Computes `floor((world - bounds_min) / cell_size + 0.5)` on both axes,
    /// so positions resolve to the cell whose centre is closest. Blocks and
    /// agents must agree on this rounding. The result may lie outside the grid.
    #[must_use]
    pub fn world_to_grid(&self, position: Vec3) -> (i32, i32) {
        let x = ((position.x - self.bounds_min.x) / self.cell_size + 0.5).floor();
        let y = ((position.z - self.bounds_min.y) / self.cell_size + 0.5).floor();
        (x as i32, y as i32)
    }

    /// World-space centre of a grid cell, on the ground plane.
    #[must_use]
    pub fn grid_to_world(&self, coord: GridCoord) -> Vec3 {
        Vec3::new(
            coord.x() as f32 * self.cell_size + self.bounds_min.x,
            0.0,
            coord.y() as f32 * self.cell_size + self.bounds_min.y,
        )
    }
}

/// Failures raised while constructing a grid.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GridError {
    /// The level scan contained no positions.
    #[error("level scan produced no blocks")]
    EmptyLevel,
    /// The cell size is zero, negative or not finite.
    #[error("cell size {cell_size} must be positive and finite")]
    InvalidCellSize {
        /// Offending cell size.
        cell_size: f32,
    },
    /// A side is zero or exceeds [`MAX_SIDE_LENGTH`].
    #[error("grid of {length_x}x{length_y} cells is outside the supported range")]
    InvalidDimensions {
        /// Requested width.
        length_x: u32,
        /// Requested height.
        length_y: u32,
    },
    /// A node lies outside the grid bounds.
    #[error("node {coord} lies outside the grid")]
    OutOfBounds {
        /// Offending coordinate.
        coord: GridCoord,
    },
    /// Two nodes share the same coordinate.
    #[error("more than one node occupies {coord}")]
    DuplicateNode {
        /// Shared coordinate.
        coord: GridCoord,
    },
    /// A node declares a traversal cost of zero.
    #[error("node {coord} has a traversal cost of zero")]
    ZeroTraversalCost {
        /// Offending coordinate.
        coord: GridCoord,
    },
}

/// Sparse rectangular grid of traversability nodes.
///
/// Nodes are populated at construction and never added or removed
/// afterwards; only traversability and block flags change.
#[derive(Clone, Debug)]
pub struct Grid {
    length_x: u32,
    length_y: u32,
    transform: GridTransform,
    nodes: Vec<Option<GridNode>>,
}

impl Grid {
    /// Builds a grid from explicitly placed nodes.
    ///
    /// Node indices are rederived from each node's coordinate so they always
    /// agree with `length_x`.
    pub fn new(
        length_x: u32,
        length_y: u32,
        transform: GridTransform,
        nodes: impl IntoIterator<Item = GridNode>,
    ) -> Result<Self, GridError> {
        if length_x == 0
            || length_y == 0
            || length_x > MAX_SIDE_LENGTH
            || length_y > MAX_SIDE_LENGTH
        {
            return Err(GridError::InvalidDimensions { length_x, length_y });
        }
        let cell_size = transform.cell_size();
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GridError::InvalidCellSize { cell_size });
        }

        let linear_length = (length_x * length_y) as usize;
        let mut slots = vec![None; linear_length];
        for node in nodes {
            let coord = node.coord();
            if coord.x() >= length_x || coord.y() >= length_y {
                return Err(GridError::OutOfBounds { coord });
            }
            if node.traversal_cost() == 0 {
                return Err(GridError::ZeroTraversalCost { coord });
            }

            let id = NodeId::from_coord(coord, length_x);
            let slot = &mut slots[id.get() as usize];
            if slot.is_some() {
                return Err(GridError::DuplicateNode { coord });
            }
            *slot = Some(GridNode { id, ..node });
        }

        Ok(Self {
            length_x,
            length_y,
            transform,
            nodes: slots,
        })
    }

    /// Builds a grid from the world positions of every block in a level.
    ///
    /// Bounds span the minimum and maximum X/Z of the positions; each side
    /// ends at the cell the maximum position snaps to, so every position lands
    /// inside the grid. Every position becomes one
    /// traversable node of unit cost. The returned coordinates follow the
    /// order of `positions`.
    pub fn scan(positions: &[Vec3], cell_size: f32) -> Result<(Self, Vec<GridCoord>), GridError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GridError::InvalidCellSize { cell_size });
        }
        let Some(first) = positions.first() else {
            return Err(GridError::EmptyLevel);
        };

        let ground = |position: &Vec3| Vec2::new(position.x, position.z);
        let (mut min, mut max) = (ground(first), ground(first));
        for position in positions {
            min = min.min(ground(position));
            max = max.max(ground(position));
        }

        let transform = GridTransform::new(min, cell_size);
        let (far_x, far_y) = transform.world_to_grid(Vec3::new(max.x, 0.0, max.y));
        let side = |far: i32| u32::try_from(far).unwrap_or(u32::MAX).saturating_add(1);
        let (length_x, length_y) = (side(far_x), side(far_y));
        if length_x > MAX_SIDE_LENGTH || length_y > MAX_SIDE_LENGTH {
            return Err(GridError::InvalidDimensions { length_x, length_y });
        }

        let mut coords = Vec::with_capacity(positions.len());
        for position in positions {
            let (x, y) = transform.world_to_grid(*position);
            let coord = GridCoord::new(
                u32::try_from(x).unwrap_or(u32::MAX),
                u32::try_from(y).unwrap_or(u32::MAX),
            );
            coords.push(coord);
        }

        let grid = Self::new(
            length_x,
            length_y,
            transform,
            coords
                .iter()
                .map(|coord| GridNode::new(*coord, length_x)),
        )?;
        Ok((grid, coords))
    }

    /// Number of columns.
    #[must_use]
    pub const fn length_x(&self) -> u32 {
        self.length_x
    }

    /// Number of rows.
    #[must_use]
    pub const fn length_y(&self) -> u32 {
        self.length_y
    }

    /// Number of addressable slots, populated or not.
    #[must_use]
    pub const fn linear_length(&self) -> usize {
        (self.length_x * self.length_y) as usize
    }

    /// World-space mapping of the grid.
    #[must_use]
    pub const fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Looks up the node at `coord`.
    pub fn get(&self, coord: GridCoord) -> Result<&GridNode, NavigationError> {
        self.slot(coord)
            .and_then(|index| self.nodes[index].as_ref())
            .ok_or(NavigationError::NodeNotFound {
                location: NodeLocation::Coord(coord),
            })
    }

    /// Looks up the node with linear index `id`.
    pub fn get_index(&self, id: NodeId) -> Result<&GridNode, NavigationError> {
        self.nodes
            .get(id.get() as usize)
            .and_then(Option::as_ref)
            .ok_or(NavigationError::NodeNotFound {
                location: NodeLocation::Index(id),
            })
    }

    /// Reports whether `coord` holds a node.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.get(coord).is_ok()
    }

    /// Reports whether linear index `id` holds a node.
    #[must_use]
    pub fn contains_index(&self, id: NodeId) -> bool {
        self.get_index(id).is_ok()
    }

    /// Overwrites the mutable attributes of the node at `coord`.
    ///
    /// The stored node keeps its own coordinate and index; only
    /// traversability, cost and block flags are copied from `node`.
    pub fn set(&mut self, coord: GridCoord, node: GridNode) -> Result<(), NavigationError> {
        let stored = self.node_mut(coord)?;
        stored.traversable = node.traversable;
        stored.traversal_cost = node.traversal_cost.max(1);
        stored.blocked = node.blocked;
        Ok(())
    }

    /// Sets the traversability of node `id`, reporting whether it changed.
    pub fn set_traversable(&mut self, id: NodeId, traversable: bool) -> Result<bool, NavigationError> {
        let node = self
            .nodes
            .get_mut(id.get() as usize)
            .and_then(Option::as_mut)
            .ok_or(NavigationError::NodeNotFound {
                location: NodeLocation::Index(id),
            })?;
        let changed = node.traversable != traversable;
        node.traversable = traversable;
        Ok(changed)
    }

    /// Resolves a world position to the node of the nearest cell, if populated.
    #[must_use]
    pub fn node_at(&self, position: Vec3) -> Option<&GridNode> {
        let (x, y) = self.transform.world_to_grid(position);
        let coord = GridCoord::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        self.get(coord).ok()
    }

    /// World-space centre of `coord`.
    #[must_use]
    pub fn world_position(&self, coord: GridCoord) -> Vec3 {
        self.transform.grid_to_world(coord)
    }

    /// Describes `node` as a path waypoint.
    #[must_use]
    pub fn waypoint(&self, node: &GridNode) -> Waypoint {
        Waypoint {
            coord: node.coord,
            node: node.id,
            position: self.world_position(node.coord),
        }
    }

    /// Iterator over every populated node in index order.
    pub fn nodes(&self) -> impl Iterator<Item = &GridNode> {
        self.nodes.iter().flatten()
    }

    fn node_mut(&mut self, coord: GridCoord) -> Result<&mut GridNode, NavigationError> {
        let missing = NavigationError::NodeNotFound {
            location: NodeLocation::Coord(coord),
        };
        let index = self.slot(coord).ok_or(missing)?;
        self.nodes[index].as_mut().ok_or(missing)
    }

    fn slot(&self, coord: GridCoord) -> Option<usize> {
        (coord.x() < self.length_x && coord.y() < self.length_y)
            .then(|| NodeId::from_coord(coord, self.length_x).get() as usize)
    }
}
