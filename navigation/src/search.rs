//! Best-first path search over a [`Grid`].

use blocks_core::{Direction, NavigationError, NodeId, SolvedPath};

use crate::grid::{Grid, GridNode};

const NO_PARENT: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct Scratch {
    heuristic: u32,
    cost: u32,
    parent: usize,
    generation: u32,
    open: bool,
    closed: bool,
}

impl Scratch {
    const EMPTY: Self = Self {
        heuristic: 0,
        cost: 0,
        parent: NO_PARENT,
        generation: 0,
        open: false,
        closed: false,
    };

    const fn priority(&self) -> u32 {
        self.heuristic.saturating_add(self.cost)
    }
}

/// Reusable search workspace.
///
/// Per-node bookkeeping lives here rather than on the grid, so searches only
/// need shared access to the grid. Buffers are invalidated lazily by bumping a
/// generation counter between searches.
#[derive(Clone, Debug, Default)]
pub struct Solver {
    scratch: Vec<Scratch>,
    open: Vec<usize>,
    generation: u32,
}

impl Solver {
    /// Creates an empty workspace that grows on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches for a path from `start` to `end`.
    ///
    /// Each node is expanded at most once and never relaxed once discovered.
    /// Neighbours are visited in `+x, -x, +y, -y` order; a neighbour is skipped
    /// when it is absent, non-traversable, already open or already closed, or
    /// when either endpoint blocks the direction of travel. A discovered node
    /// records `heuristic = manhattan(node, end)` and
    /// `cost = parent.cost + node.traversal_cost`.
    ///
    /// Selection takes the priority (`heuristic + cost`) of the first open
    /// entry as a fixed baseline and picks the last later entry whose priority
    /// is strictly below that baseline, falling back to the first entry. The
    /// selected entry is removed by swapping the final entry into its place.
    /// The result is deterministic but not guaranteed to be shortest.
    ///
    /// The start node is not required to be traversable.
    pub fn solve(
        &mut self,
        grid: &Grid,
        start: NodeId,
        end: NodeId,
    ) -> Result<SolvedPath, NavigationError> {
        let invalid = NavigationError::InvalidRequest { start, end };
        let start_node = grid.get_index(start).map_err(|_| invalid)?;
        let end_node = grid.get_index(end).map_err(|_| invalid)?;
        let target = end_node.coord();

        self.prepare(grid.linear_length());
        let generation = self.generation;

        let start_index = start_node.id().get() as usize;
        self.scratch[start_index] = Scratch {
            generation,
            open: true,
            ..Scratch::EMPTY
        };
        self.open.push(start_index);

        while !self.open.is_empty() {
            let selected = self.select();
            let current_index = self.open.swap_remove(selected);
            let current = &mut self.scratch[current_index];
            current.open = false;
            current.closed = true;
            let current_cost = current.cost;

            let Some(current_node) = node_at(grid, current_index) else {
                continue;
            };
            if current_node.id() == end_node.id() {
                return Ok(self.reconstruct(grid, current_index));
            }

            for direction in Direction::ALL {
                let Some(neighbour) = traversable_neighbour(grid, current_node, direction) else {
                    continue;
                };

                let neighbour_index = neighbour.id().get() as usize;
                let entry = &mut self.scratch[neighbour_index];
                if entry.generation == generation && (entry.open || entry.closed) {
                    continue;
                }

                *entry = Scratch {
                    heuristic: neighbour.coord().manhattan_distance(target),
                    cost: current_cost.saturating_add(neighbour.traversal_cost()),
                    parent: current_index,
                    generation,
                    open: true,
                    closed: false,
                };
                self.open.push(neighbour_index);
            }
        }

        Err(NavigationError::PathNotFound)
    }

    fn prepare(&mut self, linear_length: usize) {
        self.open.clear();
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.scratch.iter_mut().for_each(|entry| *entry = Scratch::EMPTY);
            self.generation = 1;
        }
        if self.scratch.len() < linear_length {
            self.scratch.resize(linear_length, Scratch::EMPTY);
        }
    }

    fn select(&self) -> usize {
        let baseline = self.scratch[self.open[0]].priority();
        let mut selected = 0;
        for (position, index) in self.open.iter().enumerate().skip(1) {
            if baseline > self.scratch[*index].priority() {
                selected = position;
            }
        }
        selected
    }

    fn reconstruct(&self, grid: &Grid, end_index: usize) -> SolvedPath {
        let mut waypoints = Vec::new();
        let mut index = end_index;
        while index != NO_PARENT {
            if let Some(node) = node_at(grid, index) {
                waypoints.push(grid.waypoint(node));
            }
            index = self.scratch[index].parent;
        }
        waypoints.reverse();
        SolvedPath::new(waypoints)
    }
}

/// Convenience wrapper running a single search with a fresh [`Solver`].
pub fn solve_path(grid: &Grid, start: NodeId, end: NodeId) -> Result<SolvedPath, NavigationError> {
    Solver::new().solve(grid, start, end)
}

fn node_at(grid: &Grid, index: usize) -> Option<&GridNode> {
    let id = NodeId::new(u32::try_from(index).ok()?);
    grid.get_index(id).ok()
}

fn traversable_neighbour(grid: &Grid, from: &GridNode, direction: Direction) -> Option<GridNode> {
    if from.blocked().blocks(direction) {
        return None;
    }
    let coord = from
        .coord()
        .step(direction, grid.length_x(), grid.length_y())?;
    let to = grid.get(coord).ok()?;
    (to.is_traversable() && !to.blocked().blocks(direction)).then_some(*to)
}
